//! File extension resolution for import sources.
//!
//! [`resolve_extension`] turns a file name, URL, or `data:` URL into an extension such as
//! `".parquet"`. The extension becomes part of the registered buffer name, which is how the
//! database picks a reader for it.

/// Extension used for `data:` URLs whose MIME type is unknown or malformed.
pub const BINARY_EXTENSION: &str = ".bin";

/// Resolve the file extension (including the leading dot) for a source name or URL.
///
/// Returns `None` when the type cannot be determined: empty names, names without a dot, and
/// dotfiles such as `.gitignore`. `data:` URLs always resolve, falling back to
/// [`BINARY_EXTENSION`]. Only the rightmost extension is considered, so `archive.tar.gz`
/// resolves to `".gz"`.
pub fn resolve_extension(source_name: &str) -> Option<String> {
    if let Some(rest) = source_name.strip_prefix("data:") {
        let end = rest.find([';', ',']).unwrap_or(rest.len());
        let mime = &rest[..end];
        if mime.is_empty() {
            return Some(BINARY_EXTENSION.to_string());
        }
        return Some(extension_from_mime_type(mime).to_string());
    }

    let clean = source_name.split('#').next().unwrap_or_default();
    let clean = clean.split('?').next().unwrap_or_default();
    let filename = match clean.rfind('/') {
        Some(slash) => &clean[slash + 1..],
        None => clean,
    };

    if filename.is_empty() || (filename.starts_with('.') && !filename[1..].contains('.')) {
        return None;
    }

    match filename.rfind('.') {
        Some(dot) if dot > 0 => Some(filename[dot..].to_string()),
        _ => None,
    }
}

/// Map a MIME type (case-insensitive) to an extension, defaulting to [`BINARY_EXTENSION`].
pub fn extension_from_mime_type(mime_type: &str) -> &'static str {
    match mime_type.trim().to_ascii_lowercase().as_str() {
        "application/json" | "text/json" => ".json",
        "application/x-ndjson"
        | "application/ndjson"
        | "application/jsonlines"
        | "application/json-seq" => ".jsonl",
        "application/vnd.apache.parquet" | "application/x-parquet" => ".parquet",
        _ => BINARY_EXTENSION,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_urls_resolve_from_mime_type() {
        assert_eq!(
            resolve_extension("data:application/json;base64,xxx").as_deref(),
            Some(".json")
        );
        assert_eq!(
            resolve_extension("data:Application/X-NDJSON,{}").as_deref(),
            Some(".jsonl")
        );
        assert_eq!(
            resolve_extension("data:application/vnd.apache.parquet;base64,UEFSMQ==").as_deref(),
            Some(".parquet")
        );
        assert_eq!(resolve_extension("data:image/png;base64,xxx").as_deref(), Some(".bin"));
        assert_eq!(resolve_extension("data:,hello").as_deref(), Some(".bin"));
    }

    #[test]
    fn urls_strip_query_and_fragment() {
        assert_eq!(
            resolve_extension("https://x/y/data.parquet?q=1#f").as_deref(),
            Some(".parquet")
        );
        assert_eq!(resolve_extension("https://x/y/data.csv#frag?x=1.json").as_deref(), Some(".csv"));
    }

    #[test]
    fn unknown_types_resolve_to_none() {
        assert_eq!(resolve_extension("https://x/.gitignore"), None);
        assert_eq!(resolve_extension("https://x/noext"), None);
        assert_eq!(resolve_extension("https://x/dir/"), None);
        assert_eq!(resolve_extension(""), None);
    }

    #[test]
    fn rightmost_dot_wins() {
        assert_eq!(resolve_extension("https://x/archive.tar.gz").as_deref(), Some(".gz"));
        assert_eq!(resolve_extension(".config.json").as_deref(), Some(".json"));
        assert_eq!(resolve_extension("people.CSV").as_deref(), Some(".CSV"));
    }
}

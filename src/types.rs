//! Core data model types for importing.
//!
//! - [`Input`] / [`LocalFile`] / [`ByteSource`]: what a caller asks to import.
//! - [`TempObject`]: a named byte buffer registered with the database for one input.
//! - [`LogMessage`] / [`LogOptions`]: entries of the observable import log.
//! - [`DataSet`] and its [`Schema`]: table snapshots returned by
//!   [`crate::ingestion::MemoryDatabase::table`].

use std::path::{Path, PathBuf};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{ImportError, ImportResult};

/// Where the bytes of a [`LocalFile`] come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ByteSource {
    /// Bytes already in memory.
    Bytes(Bytes),
    /// A file on the local filesystem, read when the input is processed.
    Path(PathBuf),
}

/// A file-like input with a display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    /// Name used for extension resolution and the `filename` provenance column.
    pub name: String,
    /// Byte source.
    pub source: ByteSource,
}

impl LocalFile {
    /// Create a local file from in-memory bytes.
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            source: ByteSource::Bytes(bytes.into()),
        }
    }

    /// Create a local file from a filesystem path; the name is the path's final component.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            name,
            source: ByteSource::Path(path.to_path_buf()),
        }
    }

    /// Read the file contents.
    pub async fn read(&self) -> ImportResult<Bytes> {
        match &self.source {
            ByteSource::Bytes(b) => Ok(b.clone()),
            ByteSource::Path(p) => Ok(Bytes::from(tokio::fs::read(p).await?)),
        }
    }
}

/// One unit of import: a local file or a remote URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// File-like input.
    LocalFile(LocalFile),
    /// Remote source fetched over HTTP(S).
    RemoteSource { url: String },
}

impl Input {
    /// Convenience constructor for a remote source.
    pub fn url(url: impl Into<String>) -> Self {
        Self::RemoteSource { url: url.into() }
    }

    /// The name recorded for this input: the file name or the URL.
    pub fn source_name(&self) -> &str {
        match self {
            Self::LocalFile(f) => &f.name,
            Self::RemoteSource { url } => url,
        }
    }

    /// Parse an input descriptor received as JSON.
    ///
    /// Accepted shapes:
    ///
    /// - `{"url": "https://..."}`
    /// - `{"path": "/data/file.csv"}`, optionally with `"name"` overriding the display name
    ///
    /// Any other shape is rejected with [`ImportError::InvalidInputType`].
    pub fn from_json(value: &serde_json::Value) -> ImportResult<Self> {
        let invalid = || ImportError::InvalidInputType {
            message: format!("expected {{\"url\": ...}} or {{\"path\": ...}}, got {value}"),
        };

        let obj = value.as_object().ok_or_else(invalid)?;
        match (obj.get("url"), obj.get("path")) {
            (Some(serde_json::Value::String(url)), None) => Ok(Self::url(url.clone())),
            (None, Some(serde_json::Value::String(path))) => {
                let mut file = LocalFile::from_path(path);
                match obj.get("name") {
                    None => {}
                    Some(serde_json::Value::String(name)) => file.name = name.clone(),
                    Some(_) => return Err(invalid()),
                }
                Ok(Self::LocalFile(file))
            }
            _ => Err(invalid()),
        }
    }
}

impl From<LocalFile> for Input {
    fn from(file: LocalFile) -> Self {
        Self::LocalFile(file)
    }
}

/// A named byte buffer registered with the database for the duration of one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempObject {
    /// Registered name, `data-{index}{extension}`.
    pub name: String,
    /// Buffer contents.
    pub bytes: Bytes,
}

impl TempObject {
    /// Build the temp object for the input at `index`.
    pub fn new(index: usize, extension: Option<&str>, bytes: Bytes) -> Self {
        Self {
            name: format!("data-{index}{}", extension.unwrap_or("")),
            bytes,
        }
    }
}

/// Optional attributes of a [`LogMessage`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogOptions {
    /// Render `text` as markdown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markdown: Option<bool>,
    /// Progress percentage (0..=100).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    /// Free-form progress text, e.g. `"1.50 MB"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_text: Option<String>,
    /// Marks an error entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<bool>,
}

impl LogOptions {
    /// Options rendering the message as markdown.
    pub fn markdown() -> Self {
        Self {
            markdown: Some(true),
            ..Self::default()
        }
    }

    /// Options carrying only a progress text.
    pub fn progress_text(text: impl Into<String>) -> Self {
        Self {
            progress_text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Options carrying only a progress percentage.
    pub fn progress(percent: f64) -> Self {
        Self {
            progress: Some(percent),
            ..Self::default()
        }
    }
}

/// A log entry shown by an import progress view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMessage {
    /// Displayed text. Consecutive entries with equal text coalesce.
    pub text: String,
    /// Rendering and progress attributes.
    #[serde(flatten)]
    pub options: LogOptions,
}

impl LogMessage {
    /// Create a new log message.
    pub fn new(text: impl Into<String>, options: LogOptions) -> Self {
        Self {
            text: text.into(),
            options,
        }
    }

    /// Whether this entry is flagged as an error.
    pub fn is_error(&self) -> bool {
        self.options.error.unwrap_or(false)
    }
}

/// Logical data type for a table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point number.
    Float64,
    /// Boolean.
    Bool,
    /// UTF-8 string.
    Utf8,
}

/// A single named, typed field in a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Field/column name.
    pub name: String,
    /// Field data type.
    pub data_type: DataType,
}

impl Field {
    /// Create a new field.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Ordered list of columns describing a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    /// Ordered list of fields.
    pub fields: Vec<Field>,
}

impl Schema {
    /// Create a new schema from fields.
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Iterate field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Returns the index of a field by name, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

/// A single typed value in a [`DataSet`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing/empty value.
    Null,
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit float.
    Float64(f64),
    /// Boolean.
    Bool(bool),
    /// UTF-8 string.
    Utf8(String),
}

/// Snapshot of a table, read back from the database.
///
/// Rows are stored as `Vec<Vec<Value>>` in the same order as the [`Schema`] fields.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSet {
    /// Schema describing row shape.
    pub schema: Schema,
    /// Row-major value storage.
    pub rows: Vec<Vec<Value>>,
}

impl DataSet {
    /// Create a dataset from schema and rows.
    pub fn new(schema: Schema, rows: Vec<Vec<Value>>) -> Self {
        Self { schema, rows }
    }

    /// Number of rows in the dataset.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Values of one column in row order, or `None` if the column does not exist.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.schema.index_of(name)?;
        Some(self.rows.iter().filter_map(|row| row.get(idx)).collect())
    }
}

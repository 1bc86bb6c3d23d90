use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use rust_data_import::ingestion::fetch::default_client;
use rust_data_import::ingestion::{fetch_with_progress, FetchOptions, Logger};
use rust_data_import::types::LogMessage;
use rust_data_import::{ErrorKind, ImportError};

/// Serve one request, writing `parts` with a short pause between them.
async fn serve_parts(parts: Vec<Vec<u8>>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = Vec::with_capacity(4096);
        loop {
            let mut tmp = [0_u8; 1024];
            let n = socket.read(&mut tmp).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&tmp[..n]);
            if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                break;
            }
        }
        for part in parts {
            if socket.write_all(&part).await.is_err() {
                return;
            }
            let _ = socket.flush().await;
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let _ = socket.shutdown().await;
    });
    format!("http://{addr}/data.csv")
}

fn client() -> reqwest::Client {
    default_client().unwrap()
}

fn head(status_line: &str, content_length: Option<usize>) -> Vec<u8> {
    let length = content_length
        .map(|n| format!("Content-Length: {n}\r\n"))
        .unwrap_or_default();
    format!("HTTP/1.1 {status_line}\r\n{length}Connection: close\r\n\r\n").into_bytes()
}

#[tokio::test]
async fn body_is_accumulated_and_progress_coalesces_into_one_line() {
    let first = vec![b'a'; 1200];
    let second = vec![b'b'; 300];
    let url = serve_parts(vec![head("200 OK", Some(1500)), first, second]).await;

    let log = Logger::new();
    let progress_seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&progress_seen);
    let _sub = log.subscribe(move |messages: &[LogMessage]| {
        if let Some(p) = messages.last().and_then(|m| m.options.progress) {
            sink.lock().unwrap().push(p);
        }
    });

    let body = fetch_with_progress(&client(), &url, &FetchOptions::default(), Some(&log))
        .await
        .unwrap();

    assert_eq!(body.len(), 1500);
    assert_eq!(&body[..1200], &[b'a'; 1200][..]);
    assert_eq!(&body[1200..], &[b'b'; 300][..]);

    let messages = log.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].text, "Loading data from URL...");
    assert_eq!(messages[0].options.progress_text.as_deref(), Some("1.50 KB"));
    assert_eq!(messages[0].options.progress, Some(100.0));

    let seen = progress_seen.lock().unwrap().clone();
    assert!(!seen.is_empty());
    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{seen:?}");
}

#[tokio::test]
async fn unknown_length_reports_size_without_percentage() {
    let url = serve_parts(vec![head("200 OK", None), b"id\n1\n".to_vec()]).await;
    let log = Logger::new();

    let body = fetch_with_progress(&client(), &url, &FetchOptions::default(), Some(&log))
        .await
        .unwrap();

    assert_eq!(&body[..], b"id\n1\n");
    let last = log.messages().pop().unwrap();
    assert_eq!(last.options.progress_text.as_deref(), Some("5 B"));
    assert_eq!(last.options.progress, None);
}

#[tokio::test]
async fn error_status_maps_to_status_text() {
    for (line, expected) in [
        ("404 Not Found", "HTTP 404 - Not Found"),
        ("503 Service Unavailable", "HTTP 503 - Service Unavailable"),
        ("418 I'm a teapot", "HTTP 418"),
    ] {
        let url = serve_parts(vec![head(line, Some(0))]).await;
        let err = fetch_with_progress(&client(), &url, &FetchOptions::default(), None)
            .await
            .unwrap_err();
        match err {
            ImportError::HttpStatus { reason, .. } => assert_eq!(reason, expected),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

#[tokio::test]
async fn no_content_is_an_empty_body_failure() {
    let url = serve_parts(vec![head("204 No Content", None)]).await;
    let log = Logger::new();

    let err = fetch_with_progress(&client(), &url, &FetchOptions::default(), Some(&log))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::EmptyBodyFailure);
    assert!(log.messages().is_empty());
}

#[tokio::test]
async fn truncated_body_is_a_stream_read_failure() {
    let url = serve_parts(vec![head("200 OK", Some(100)), vec![b'x'; 10]]).await;
    let log = Logger::new();

    let err = fetch_with_progress(&client(), &url, &FetchOptions::default(), Some(&log))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StreamReadFailure);
    assert_eq!(err.to_string(), "Failed to fetch data from URL: Error while reading data.");
}

#[tokio::test]
async fn refused_connection_is_a_markdown_network_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let log = Logger::new();
    let err = fetch_with_progress(
        &client(),
        &format!("http://{addr}/data.csv"),
        &FetchOptions::default(),
        Some(&log),
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NetworkFailure);
    log.exception(&err);

    let m = log.messages().pop().unwrap();
    assert!(m.is_error());
    assert_eq!(m.options.markdown, Some(true));
    assert!(m.text.contains("cross-origin requests (CORS)"));
}

#[tokio::test]
async fn timeout_option_is_applied() {
    // The second half of the body only arrives after ~200ms of empty writes.
    let mut parts = vec![head("200 OK", Some(4)), b"ab".to_vec()];
    parts.extend(std::iter::repeat_n(Vec::new(), 10));
    parts.push(b"cd".to_vec());
    let url = serve_parts(parts).await;
    let options = FetchOptions {
        timeout: Some(Duration::from_millis(50)),
        ..FetchOptions::default()
    };

    let err = fetch_with_progress(&client(), &url, &options, None)
        .await
        .unwrap_err();

    assert!(
        matches!(err.kind(), ErrorKind::StreamReadFailure | ErrorKind::NetworkFailure),
        "{err:?}"
    );
}

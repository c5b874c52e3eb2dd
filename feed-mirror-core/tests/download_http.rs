// Integration tests for HttpFetcher against a local wiremock server.

use feed_mirror_core::config::{MirrorConfig, SourceEntry};
use feed_mirror_core::contract::Fetcher;
use feed_mirror_core::download::HttpFetcher;
use feed_mirror_core::error::FetchFailure;
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn gzip_bytes(len: usize) -> Vec<u8> {
    let mut body = vec![0u8; len];
    body[0] = 0x1f;
    body[1] = 0x8b;
    body
}

async fn serve(server: &MockServer, route: &str, template: ResponseTemplate) -> String {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(template)
        .mount(server)
        .await;
    format!("{}{}", server.uri(), route)
}

fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

struct TestCase {
    name: &'static str,
    route: &'static str,
    body: Vec<u8>,
    expected_extension: &'static str,
}

#[tokio::test]
async fn fetch_stages_file_and_sniffs_extension_table_driven() {
    let server = MockServer::start().await;
    let cases = vec![
        TestCase {
            name: "gzip body behind a .json url",
            route: "/feed.json",
            body: gzip_bytes(4096),
            expected_extension: ".xml.gz",
        },
        TestCase {
            name: "xml body without extension",
            route: "/export",
            body: b"<?xml version=\"1.0\"?><tv/>".to_vec(),
            expected_extension: ".xml",
        },
        TestCase {
            name: "unknown body keeps url suffixes",
            route: "/dump.tar.gz",
            body: b"plain bytes".to_vec(),
            expected_extension: ".tar.gz",
        },
        TestCase {
            name: "unknown body, no suffix",
            route: "/blob",
            body: b"plain bytes".to_vec(),
            expected_extension: ".bin",
        },
    ];

    for case in cases {
        let tmp = tempfile::tempdir().unwrap();
        let config = MirrorConfig::new(tmp.path(), vec![]);
        let fetcher = HttpFetcher::new(&config).unwrap();
        let url = serve(
            &server,
            case.route,
            ResponseTemplate::new(200).set_body_bytes(case.body.clone()),
        )
        .await;

        let staged = fetcher
            .fetch(&SourceEntry::new(url, "Case"), tmp.path())
            .await
            .unwrap_or_else(|e| panic!("case {} failed: {e}", case.name));

        assert_eq!(staged.extension, case.expected_extension, "case: {}", case.name);
        assert_eq!(staged.size_bytes, case.body.len() as u64, "case: {}", case.name);
        assert_eq!(std::fs::read(&staged.staging_path).unwrap(), case.body);
        let staged_name = staged.staging_path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(staged_name.starts_with("tmp_"), "case: {}", case.name);
    }
}

#[tokio::test]
async fn oversized_body_fails_and_leaves_no_file() {
    let server = MockServer::start().await;
    let url = serve(
        &server,
        "/huge.xml.gz",
        ResponseTemplate::new(200).set_body_bytes(gzip_bytes(2 * 1024 * 1024 + 10)),
    )
    .await;

    let tmp = tempfile::tempdir().unwrap();
    let mut config = MirrorConfig::new(tmp.path(), vec![]);
    config.max_file_size_mb = 1;
    let fetcher = HttpFetcher::new(&config).unwrap();

    let failure = fetcher
        .fetch(&SourceEntry::new(url, "Huge"), tmp.path())
        .await
        .unwrap_err();

    match &failure {
        FetchFailure::SizeExceeded { size_mb, limit_mb } => {
            assert_eq!(*limit_mb, 1);
            assert!(*size_mb > 1.0);
        }
        other => panic!("expected SizeExceeded, got {other:?}"),
    }
    assert!(failure.to_string().contains("too large"));
    assert!(files_in(tmp.path()).is_empty(), "staging file must be removed");
}

/// Serves one request with a chunked body of `total` bytes and no
/// Content-Length, so the ceiling can only trip while streaming.
async fn serve_chunked_once(total: usize) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            match socket.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => request.extend_from_slice(&buf[..n]),
            }
        }

        let head = "HTTP/1.1 200 OK\r\nContent-Type: application/gzip\r\nTransfer-Encoding: chunked\r\n\r\n";
        if socket.write_all(head.as_bytes()).await.is_err() {
            return;
        }
        let body = gzip_bytes(total);
        for chunk in body.chunks(64 * 1024) {
            let framed = [
                format!("{:x}\r\n", chunk.len()).into_bytes(),
                chunk.to_vec(),
                b"\r\n".to_vec(),
            ]
            .concat();
            // The client hangs up once the ceiling trips.
            if socket.write_all(&framed).await.is_err() {
                return;
            }
        }
        let _ = socket.write_all(b"0\r\n\r\n").await;
    });
    format!("http://{addr}/stream.xml.gz")
}

#[tokio::test]
async fn chunked_body_over_limit_fails_mid_stream_and_leaves_no_file() {
    let url = serve_chunked_once(5 * 512 * 1024).await;

    let tmp = tempfile::tempdir().unwrap();
    let mut config = MirrorConfig::new(tmp.path(), vec![]);
    config.max_file_size_mb = 1;
    let fetcher = HttpFetcher::new(&config).unwrap();

    let failure = fetcher
        .fetch(&SourceEntry::new(url, "Stream"), tmp.path())
        .await
        .unwrap_err();

    match &failure {
        FetchFailure::SizeExceeded { size_mb, limit_mb } => {
            assert_eq!(*limit_mb, 1);
            assert!(*size_mb > 1.0, "got {size_mb}");
            assert!(*size_mb < 2.5, "transfer should stop at the ceiling, got {size_mb}");
        }
        other => panic!("expected SizeExceeded, got {other:?}"),
    }
    assert!(files_in(tmp.path()).is_empty(), "staging file must be removed");
}

#[tokio::test]
async fn non_success_status_is_a_transfer_failure() {
    let server = MockServer::start().await;
    let url = serve(&server, "/missing.xml", ResponseTemplate::new(404)).await;

    let tmp = tempfile::tempdir().unwrap();
    let config = MirrorConfig::new(tmp.path(), vec![]);
    let fetcher = HttpFetcher::new(&config).unwrap();

    let failure = fetcher
        .fetch(&SourceEntry::new(url, "Missing"), tmp.path())
        .await
        .unwrap_err();

    assert!(matches!(failure, FetchFailure::Transfer(_)));
    assert!(failure.to_string().contains("404"), "got: {failure}");
    assert!(files_in(tmp.path()).is_empty());
}

#[tokio::test]
async fn timeout_is_a_transfer_failure() {
    let server = MockServer::start().await;
    let url = serve(
        &server,
        "/slow.xml",
        ResponseTemplate::new(200)
            .set_body_bytes(b"<?xml".to_vec())
            .set_delay(std::time::Duration::from_secs(3)),
    )
    .await;

    let tmp = tempfile::tempdir().unwrap();
    let mut config = MirrorConfig::new(tmp.path(), vec![]);
    config.timeout_secs = 1;
    let fetcher = HttpFetcher::new(&config).unwrap();

    let failure = fetcher
        .fetch(&SourceEntry::new(url, "Slow"), tmp.path())
        .await
        .unwrap_err();
    assert!(matches!(failure, FetchFailure::Transfer(_)), "got: {failure:?}");
    assert!(files_in(tmp.path()).is_empty());
}

#[tokio::test]
async fn unreachable_host_is_a_transfer_failure() {
    let tmp = tempfile::tempdir().unwrap();
    let config = MirrorConfig::new(tmp.path(), vec![]);
    let fetcher = HttpFetcher::new(&config).unwrap();

    // Port 9 (discard) on localhost is not served by anything in the test environment.
    let failure = fetcher
        .fetch(&SourceEntry::new("http://127.0.0.1:9/feed.xml", "Nowhere"), tmp.path())
        .await
        .unwrap_err();
    assert!(matches!(failure, FetchFailure::Transfer(_)));
}

#[tokio::test]
async fn missing_store_directory_is_an_io_failure() {
    let server = MockServer::start().await;
    let url = serve(
        &server,
        "/feed.xml",
        ResponseTemplate::new(200).set_body_bytes(b"<?xml".to_vec()),
    )
    .await;

    let tmp = tempfile::tempdir().unwrap();
    let config = MirrorConfig::new(tmp.path(), vec![]);
    let fetcher = HttpFetcher::new(&config).unwrap();

    let failure = fetcher
        .fetch(&SourceEntry::new(url, "Feed"), &tmp.path().join("does-not-exist"))
        .await
        .unwrap_err();
    assert!(matches!(failure, FetchFailure::Io(_)), "got: {failure:?}");
}

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use serde::Deserialize;

use super::ChromeError;

/// Browser version information returned by `/json/version`.
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub struct BrowserVersion {
    /// The browser name and version (e.g. "Chrome/120.0.6099.71").
    #[serde(rename = "Browser")]
    pub browser: String,

    /// The CDP protocol version (e.g. "1.3").
    #[serde(rename = "Protocol-Version")]
    pub protocol_version: String,

    /// The browser-level WebSocket debugger URL.
    #[serde(rename = "webSocketDebuggerUrl")]
    pub ws_debugger_url: String,
}

/// A single debuggable target (page, service worker, ...) from `/json/list`.
#[derive(Debug, Clone, Deserialize)]
#[allow(dead_code)]
pub struct TargetInfo {
    /// Unique target identifier.
    pub id: String,

    /// Target type (e.g. "page", "`background_page`").
    #[serde(rename = "type")]
    pub target_type: String,

    /// Page title.
    pub title: String,

    /// Current URL.
    pub url: String,
}

/// Query the browser's `/json/version` endpoint.
///
/// # Errors
///
/// Returns `ChromeError::HttpError` on connection failure or
/// `ChromeError::ParseError` if the response cannot be deserialized.
pub async fn query_version(host: &str, port: u16) -> Result<BrowserVersion, ChromeError> {
    let body = http_get(host, port, "/json/version").await?;
    serde_json::from_str(&body).map_err(|e| ChromeError::ParseError(e.to_string()))
}

/// Query the browser's `/json/list` endpoint for debuggable targets.
///
/// # Errors
///
/// Returns `ChromeError::HttpError` on connection failure or
/// `ChromeError::ParseError` if the response cannot be deserialized.
pub async fn query_targets(host: &str, port: u16) -> Result<Vec<TargetInfo>, ChromeError> {
    let body = http_get(host, port, "/json/list").await?;
    serde_json::from_str(&body).map_err(|e| ChromeError::ParseError(e.to_string()))
}

/// Probe for a running browser on `host:port`.
///
/// Returns the browser-level WebSocket URL on success.
///
/// # Errors
///
/// Returns `ChromeError::NotRunning` if nothing answers.
pub async fn discover_chrome(host: &str, port: u16) -> Result<String, ChromeError> {
    query_version(host, port)
        .await
        .map(|version| version.ws_debugger_url)
        .map_err(|e| ChromeError::NotRunning(format!("discovery failed on {host}:{port}: {e}")))
}

/// Check whether `buf` contains a complete HTTP response (headers plus the
/// full body per Content-Length).
fn is_http_response_complete(buf: &[u8]) -> bool {
    let Some(header_end) = find_header_end(buf) else {
        return false;
    };
    let body_start = header_end + 4; // past \r\n\r\n
    let headers = &buf[..header_end];
    match parse_content_length(headers) {
        Some(cl) => buf.len() >= body_start + cl,
        None => true, // no Content-Length; assume headers-complete means done
    }
}

/// Byte offset of `\r\n\r\n` in `buf` (position of the first `\r`).
fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Parse `Content-Length` from raw header bytes (case-insensitive).
fn parse_content_length(headers: &[u8]) -> Option<usize> {
    let header_str = std::str::from_utf8(headers).ok()?;
    for line in header_str.lines() {
        if let Some((key, value)) = line.split_once(':') {
            if key.trim().eq_ignore_ascii_case("content-length") {
                return value.trim().parse().ok();
            }
        }
    }
    None
}

/// Parse a raw HTTP response buffer into the body string.
///
/// Validates the status line is 200 OK and extracts the body after headers.
fn parse_http_response(buf: &[u8]) -> Result<String, ChromeError> {
    let header_end = find_header_end(buf)
        .ok_or_else(|| ChromeError::HttpError("malformed HTTP response".into()))?;
    let body_start = header_end + 4;

    let headers = std::str::from_utf8(&buf[..header_end])
        .map_err(|e| ChromeError::HttpError(format!("invalid UTF-8 in headers: {e}")))?;

    let status_line = headers
        .lines()
        .next()
        .ok_or_else(|| ChromeError::HttpError("empty response".into()))?;
    if !status_line.contains(" 200 ") {
        return Err(ChromeError::HttpError(format!(
            "unexpected HTTP status: {status_line}"
        )));
    }

    let body_bytes = if let Some(cl) = parse_content_length(&buf[..header_end]) {
        let end = (body_start + cl).min(buf.len());
        &buf[body_start..end]
    } else {
        &buf[body_start..]
    };

    String::from_utf8(body_bytes.to_vec())
        .map_err(|e| ChromeError::HttpError(format!("invalid UTF-8 in body: {e}")))
}

/// Connect-and-read timeout for debug endpoint requests.
const HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// Perform a simple HTTP GET using blocking I/O inside `spawn_blocking`.
///
/// The debug endpoint is plain HTTP/1.1 on localhost; a full HTTP client
/// dependency is not warranted for two tiny JSON endpoints.
async fn http_get(host: &str, port: u16, path: &str) -> Result<String, ChromeError> {
    let addr = format!("{host}:{port}");
    let request = format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");

    tokio::task::spawn_blocking(move || {
        let sock_addr = addr
            .parse()
            .map_err(|e| ChromeError::HttpError(format!("invalid address {addr}: {e}")))?;
        let mut stream = TcpStream::connect_timeout(&sock_addr, HTTP_TIMEOUT)
            .map_err(|e| ChromeError::HttpError(format!("connect to {addr} failed: {e}")))?;
        stream
            .set_read_timeout(Some(HTTP_TIMEOUT))
            .map_err(|e| ChromeError::HttpError(e.to_string()))?;
        stream
            .write_all(request.as_bytes())
            .map_err(|e| ChromeError::HttpError(format!("write failed: {e}")))?;

        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            match stream.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    buf.extend_from_slice(&chunk[..n]);
                    if is_http_response_complete(&buf) {
                        break;
                    }
                }
                Err(e) => {
                    if buf.is_empty() {
                        return Err(ChromeError::HttpError(format!("read failed: {e}")));
                    }
                    break;
                }
            }
        }

        parse_http_response(&buf)
    })
    .await
    .map_err(|e| ChromeError::HttpError(format!("blocking task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_end_found() {
        let buf = b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok";
        assert_eq!(find_header_end(buf), Some(buf.len() - 6));
    }

    #[test]
    fn header_end_missing() {
        assert_eq!(find_header_end(b"HTTP/1.1 200 OK\r\n"), None);
    }

    #[test]
    fn content_length_case_insensitive() {
        let headers = b"HTTP/1.1 200 OK\r\ncontent-length: 42";
        assert_eq!(parse_content_length(headers), Some(42));
    }

    #[test]
    fn content_length_absent() {
        let headers = b"HTTP/1.1 200 OK\r\nConnection: close";
        assert_eq!(parse_content_length(headers), None);
    }

    #[test]
    fn response_complete_with_content_length() {
        let buf = b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok";
        assert!(is_http_response_complete(buf));
        assert!(!is_http_response_complete(&buf[..buf.len() - 1]));
    }

    #[test]
    fn parse_response_extracts_body() {
        let buf = b"HTTP/1.1 200 OK\r\nContent-Length: 11\r\n\r\nhello world";
        assert_eq!(parse_http_response(buf).unwrap(), "hello world");
    }

    #[test]
    fn parse_response_rejects_non_200() {
        let buf = b"HTTP/1.1 404 Not Found\r\n\r\n";
        let err = parse_http_response(buf).unwrap_err();
        assert!(err.to_string().contains("404"));
    }

    #[test]
    fn parse_response_without_content_length_takes_rest() {
        let buf = b"HTTP/1.1 200 OK\r\nConnection: close\r\n\r\n{\"a\":1}";
        assert_eq!(parse_http_response(buf).unwrap(), "{\"a\":1}");
    }

    #[test]
    fn target_info_deserializes() {
        let json = r#"[{"id": "T1", "type": "page", "title": "Example", "url": "https://example.com"}]"#;
        let targets: Vec<TargetInfo> = serde_json::from_str(json).unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].target_type, "page");
    }

    #[test]
    fn browser_version_deserializes() {
        let json = r#"{"Browser": "Chrome/120.0", "Protocol-Version": "1.3",
                       "webSocketDebuggerUrl": "ws://127.0.0.1:9222/devtools/browser/x"}"#;
        let version: BrowserVersion = serde_json::from_str(json).unwrap();
        assert!(version.ws_debugger_url.starts_with("ws://"));
    }
}

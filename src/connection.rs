use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use crate::cdp::{CdpError, CdpEvent, CdpSession};
use crate::chrome::{
    ChromeProcess, LaunchConfig, TargetInfo, discover_chrome, find_available_port,
    find_chrome_executable, launch_chrome, query_version,
};
use crate::error::AppError;

/// Default Chrome `DevTools` Protocol port.
pub const DEFAULT_CDP_PORT: u16 = 9222;

/// How the browser was obtained, plus everything needed to talk to it.
///
/// When `process` is present the browser was launched by this invocation
/// and is killed (with its temp profile removed) when the value drops.
pub struct BrowserConnection {
    pub ws_url: String,
    pub host: String,
    pub port: u16,
    pub process: Option<ChromeProcess>,
}

/// Knobs for the auto-launch fallback.
pub struct LaunchOptions {
    /// Explicit executable path; falls back to `CHROME_PATH` and platform
    /// well-known locations.
    pub chrome_path: Option<PathBuf>,
    /// Extra command-line arguments for the launched browser.
    pub extra_args: Vec<String>,
    /// How long to wait for the launched browser to become ready.
    pub startup_timeout: Duration,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            chrome_path: None,
            extra_args: Vec::new(),
            startup_timeout: Duration::from_secs(30),
        }
    }
}

/// Resolve a browser to drive, using the priority chain:
///
/// 1. Explicit `--ws-url`
/// 2. Explicit `--port` (only that port is tried)
/// 3. Auto-discover on the default port
/// 4. Auto-launch a headless browser
///
/// # Errors
///
/// Returns `AppError` if no browser can be reached or launched.
pub async fn resolve_browser(
    host: &str,
    port: Option<u16>,
    ws_url: Option<&str>,
    launch: &LaunchOptions,
) -> Result<BrowserConnection, AppError> {
    // 1. Explicit --ws-url
    if let Some(ws_url) = ws_url {
        let resolved_port =
            extract_port_from_ws_url(ws_url).unwrap_or(port.unwrap_or(DEFAULT_CDP_PORT));
        return Ok(BrowserConnection {
            ws_url: ws_url.to_string(),
            host: host.to_string(),
            port: resolved_port,
            process: None,
        });
    }

    // 2. Explicit --port: only this port, no fallback
    if let Some(explicit_port) = port {
        return match query_version(host, explicit_port).await {
            Ok(version) => Ok(BrowserConnection {
                ws_url: version.ws_debugger_url,
                host: host.to_string(),
                port: explicit_port,
                process: None,
            }),
            Err(_) => Err(AppError::no_browser_found()),
        };
    }

    // 3. Auto-discover on the default port
    if let Ok(ws_url) = discover_chrome(host, DEFAULT_CDP_PORT).await {
        return Ok(BrowserConnection {
            ws_url,
            host: host.to_string(),
            port: DEFAULT_CDP_PORT,
            process: None,
        });
    }

    // 4. Auto-launch a headless browser
    launch_browser(launch).await
}

async fn launch_browser(launch: &LaunchOptions) -> Result<BrowserConnection, AppError> {
    let executable = match &launch.chrome_path {
        Some(path) => path.clone(),
        None => find_chrome_executable()?,
    };
    let port = find_available_port()?;

    let config = LaunchConfig {
        executable,
        port,
        extra_args: launch.extra_args.clone(),
    };

    let process = launch_chrome(config, launch.startup_timeout).await?;
    let version = query_version("127.0.0.1", port).await?;

    Ok(BrowserConnection {
        ws_url: version.ws_debugger_url,
        host: "127.0.0.1".to_string(),
        port,
        process: Some(process),
    })
}

/// Extract the port from a WebSocket URL like `ws://host:port/path`.
#[must_use]
pub fn extract_port_from_ws_url(url: &str) -> Option<u16> {
    let without_scheme = url
        .strip_prefix("ws://")
        .or_else(|| url.strip_prefix("wss://"))?;
    let host_port = without_scheme.split('/').next()?;
    let port_str = host_port.rsplit(':').next()?;
    port_str.parse().ok()
}

/// Pick the first `page`-type target, if any.
///
/// A freshly launched headless browser normally exposes one blank page;
/// when it does not, the caller creates one via `Target.createTarget`.
#[must_use]
pub fn select_page_target(targets: &[TargetInfo]) -> Option<&TargetInfo> {
    targets.iter().find(|t| t.target_type == "page")
}

/// A CDP session wrapper that tracks which domains have been enabled,
/// so each `{domain}.enable` is sent at most once.
#[derive(Debug)]
pub struct ManagedSession {
    session: CdpSession,
    enabled_domains: HashSet<String>,
}

impl ManagedSession {
    /// Wrap a [`CdpSession`] with domain tracking.
    #[must_use]
    pub fn new(session: CdpSession) -> Self {
        Self {
            session,
            enabled_domains: HashSet::new(),
        }
    }

    /// Ensure a CDP domain is enabled, sending `{domain}.enable` only if it
    /// has not been enabled in this session yet.
    ///
    /// # Errors
    ///
    /// Returns `CdpError` if the enable command fails.
    pub async fn ensure_domain(&mut self, domain: &str) -> Result<(), CdpError> {
        if self.enabled_domains.contains(domain) {
            return Ok(());
        }
        let method = format!("{domain}.enable");
        self.session.send_command(&method, None).await?;
        self.enabled_domains.insert(domain.to_string());
        Ok(())
    }

    /// Send a command within this session.
    ///
    /// # Errors
    ///
    /// Returns `CdpError` if the command fails.
    pub async fn send_command(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, CdpError> {
        self.session.send_command(method, params).await
    }

    /// Subscribe to CDP events matching a method name within this session.
    ///
    /// # Errors
    ///
    /// Returns `CdpError` if the transport task has exited.
    pub async fn subscribe(
        &self,
        method: &str,
    ) -> Result<tokio::sync::mpsc::Receiver<CdpEvent>, CdpError> {
        self.session.subscribe(method).await
    }

    /// The underlying session ID.
    #[must_use]
    pub fn session_id(&self) -> &str {
        self.session.session_id()
    }

    /// The set of currently enabled domains.
    #[must_use]
    pub fn enabled_domains(&self) -> &HashSet<String> {
        &self.enabled_domains
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_target(id: &str, target_type: &str) -> TargetInfo {
        TargetInfo {
            id: id.to_string(),
            target_type: target_type.to_string(),
            title: format!("Title {id}"),
            url: format!("https://example.com/{id}"),
        }
    }

    #[test]
    fn extract_port_ws() {
        assert_eq!(
            extract_port_from_ws_url("ws://127.0.0.1:9222/devtools/browser/abc"),
            Some(9222)
        );
    }

    #[test]
    fn extract_port_wss() {
        assert_eq!(
            extract_port_from_ws_url("wss://localhost:9333/devtools/browser/abc"),
            Some(9333)
        );
    }

    #[test]
    fn extract_port_no_scheme() {
        assert_eq!(extract_port_from_ws_url("http://localhost:9222"), None);
    }

    #[test]
    fn select_target_picks_first_page() {
        let targets = vec![
            make_target("bg1", "background_page"),
            make_target("page1", "page"),
            make_target("page2", "page"),
        ];
        assert_eq!(select_page_target(&targets).unwrap().id, "page1");
    }

    #[test]
    fn select_target_skips_non_page() {
        let targets = vec![
            make_target("sw1", "service_worker"),
            make_target("p1", "page"),
        ];
        assert_eq!(select_page_target(&targets).unwrap().id, "p1");
    }

    #[test]
    fn select_target_none_when_no_pages() {
        let targets = vec![make_target("sw1", "service_worker")];
        assert!(select_page_target(&targets).is_none());
        assert!(select_page_target(&[]).is_none());
    }

    #[tokio::test]
    async fn managed_session_enables_domain_once() {
        use crate::cdp::{CdpClient, CdpConfig};
        use futures_util::{SinkExt, StreamExt};
        use std::time::Duration;
        use tokio::net::TcpListener;
        use tokio::sync::mpsc;
        use tokio_tungstenite::tungstenite::Message;

        // Mock CDP server that acks every command and records what it saw.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (record_tx, mut record_rx) = mpsc::channel::<serde_json::Value>(32);

        tokio::spawn(async move {
            if let Ok((stream, _)) = listener.accept().await {
                let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
                let (mut sink, mut source) = ws.split();
                while let Some(Ok(Message::Text(text))) = source.next().await {
                    let cmd: serde_json::Value = serde_json::from_str(&text).unwrap();
                    let _ = record_tx.send(cmd.clone()).await;

                    let mut resp = if cmd["method"] == "Target.attachToTarget" {
                        serde_json::json!({"id": cmd["id"], "result": {"sessionId": "sess-1"}})
                    } else {
                        serde_json::json!({"id": cmd["id"], "result": {}})
                    };
                    if let Some(sid) = cmd.get("sessionId") {
                        resp["sessionId"] = sid.clone();
                    }
                    let _ = sink.send(Message::Text(resp.to_string().into())).await;
                }
            }
        });

        let url = format!("ws://{addr}");
        let config = CdpConfig {
            connect_timeout: Duration::from_secs(5),
            command_timeout: Duration::from_secs(5),
            channel_capacity: 256,
        };
        let client = CdpClient::connect(&url, config).await.unwrap();
        let session = client.create_session("test-target").await.unwrap();
        // Drain the attachToTarget message
        let _ = tokio::time::timeout(Duration::from_millis(200), record_rx.recv()).await;

        let mut managed = ManagedSession::new(session);
        assert!(managed.enabled_domains().is_empty());

        managed.ensure_domain("Page").await.unwrap();
        let msg = tokio::time::timeout(Duration::from_millis(200), record_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msg["method"], "Page.enable");
        assert!(managed.enabled_domains().contains("Page"));

        // Second enable of the same domain sends nothing.
        managed.ensure_domain("Page").await.unwrap();
        let no_msg = tokio::time::timeout(Duration::from_millis(100), record_rx.recv()).await;
        assert!(no_msg.is_err());

        managed.ensure_domain("Runtime").await.unwrap();
        let msg2 = tokio::time::timeout(Duration::from_millis(200), record_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msg2["method"], "Runtime.enable");
    }
}

//! Load-render orchestration.
//!
//! One [`RenderSession`] exists per invocation. The sequencing is fixed:
//! apply geometry, navigate, wait for the load event, sleep the settle
//! delay, capture the frame, write it out. A navigation failure is
//! terminal; there is no retry.

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Serialize;
use serde_json::{Value, json};
use url::Url;

use crate::cdp::{CdpClient, CdpConfig, CdpEvent};
use crate::connection::{
    BrowserConnection, LaunchOptions, ManagedSession, resolve_browser, select_page_target,
};
use crate::chrome::query_targets;
use crate::error::AppError;
use crate::geometry::{
    A4_INCHES, Orientation, OutputFormat, OutputGeometry, dimension_to_inches,
    paper_format_inches,
};

/// Fixed grace period between the load event and capture, allowing
/// deferred script-driven rendering to finish. Overridable with
/// `--settle-delay`.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 200;

/// Everything one invocation needs to render: created at startup,
/// destroyed at process exit.
pub struct RenderSession {
    pub address: String,
    pub output: String,
    pub format: OutputFormat,
    pub geometry: OutputGeometry,
    pub zoom: Option<f64>,
    pub settle_delay: Duration,
    /// Bound on the load-event wait. `None` means wait indefinitely, which
    /// is the default: a hung load blocks rather than guessing.
    pub load_timeout: Option<Duration>,
}

/// Connection knobs merged from CLI flags, environment, and config file.
pub struct RenderOpts {
    pub host: String,
    pub port: Option<u16>,
    pub ws_url: Option<String>,
    pub launch: LaunchOptions,
}

/// Printed as a JSON line on stdout after a successful capture.
#[derive(Serialize)]
pub struct RenderOutcome {
    pub output: String,
    pub format: &'static str,
    pub bytes: usize,
}

/// Run one complete render session.
///
/// # Errors
///
/// Returns `AppError` for any failure along the way: no browser, no page
/// target, navigation failure, load timeout, capture failure, or an
/// unwritable output path.
pub async fn run(session: &RenderSession, opts: &RenderOpts) -> Result<RenderOutcome, AppError> {
    let mut browser = resolve_browser(
        &opts.host,
        opts.port,
        opts.ws_url.as_deref(),
        &opts.launch,
    )
    .await?;

    let client = CdpClient::connect(&browser.ws_url, CdpConfig::default()).await?;
    let target_id = resolve_page_target(&client, &browser).await?;
    let cdp_session = client.create_session(&target_id).await?;
    let mut managed = ManagedSession::new(cdp_session);

    let bytes = drive(&mut managed, session).await?;
    write_artifact(&session.output, &bytes)?;

    let _ = client.close().await;
    if let Some(process) = browser.process.as_mut() {
        process.kill();
    }

    Ok(RenderOutcome {
        output: session.output.clone(),
        format: session.format.as_str(),
        bytes: bytes.len(),
    })
}

/// Pick an existing page target, or create a blank one.
async fn resolve_page_target(
    client: &CdpClient,
    browser: &BrowserConnection,
) -> Result<String, AppError> {
    let targets = query_targets(&browser.host, browser.port).await?;
    if let Some(target) = select_page_target(&targets) {
        return Ok(target.id.clone());
    }

    let result = client
        .send_command(
            "Target.createTarget",
            Some(json!({ "url": "about:blank" })),
        )
        .await?;
    result["targetId"]
        .as_str()
        .map(ToOwned::to_owned)
        .ok_or_else(AppError::no_page_targets)
}

/// Drive the navigate → settle → capture sequence over an attached
/// session, returning the captured artifact bytes.
///
/// This is the orchestration state machine proper; `run` wraps it with
/// browser resolution and the output write.
///
/// # Errors
///
/// Returns `AppError::navigation_failed` if the engine rejects the
/// navigation, `AppError::load_timeout` if a bounded wait expires, or a
/// capture/protocol error from the engine.
pub async fn drive(
    managed: &mut ManagedSession,
    session: &RenderSession,
) -> Result<Vec<u8>, AppError> {
    managed.ensure_domain("Page").await?;
    apply_geometry(managed, session).await?;

    // Subscribe before navigating so the load event cannot be missed.
    let mut load_rx = managed.subscribe("Page.loadEventFired").await?;

    let result = managed
        .send_command("Page.navigate", Some(json!({ "url": session.address })))
        .await?;
    if let Some(error_text) = result["errorText"].as_str() {
        if !error_text.is_empty() {
            return Err(AppError::navigation_failed(error_text));
        }
    }

    wait_for_load(&mut load_rx, session.load_timeout).await?;

    // Unconditional settle: deferred page-driven rendering gets this long.
    tokio::time::sleep(session.settle_delay).await;

    capture(managed, session).await
}

/// Apply the default viewport, the resolved geometry, and the zoom factor.
async fn apply_geometry(
    managed: &ManagedSession,
    session: &RenderSession,
) -> Result<(), AppError> {
    let (width, height) = viewport_dimensions(&session.geometry);
    managed
        .send_command(
            "Emulation.setDeviceMetricsOverride",
            Some(json!({
                "width": width,
                "height": height,
                "deviceScaleFactor": 1,
                "mobile": false,
            })),
        )
        .await?;

    // PDFs carry zoom as the print scale instead.
    if session.format != OutputFormat::Pdf {
        if let Some(zoom) = session.zoom {
            managed
                .send_command(
                    "Emulation.setPageScaleFactor",
                    Some(json!({ "pageScaleFactor": zoom })),
                )
                .await?;
        }
    }

    Ok(())
}

/// The viewport to lay the page out in: the pixel geometry's own size, or
/// the 600x600 default for paper output.
fn viewport_dimensions(geometry: &OutputGeometry) -> (u32, u32) {
    match geometry {
        OutputGeometry::PixelViewport { width, height, .. } => (*width, *height),
        OutputGeometry::PaperSize { .. } | OutputGeometry::PaperFormat { .. } => (
            crate::geometry::DEFAULT_VIEWPORT_WIDTH,
            crate::geometry::DEFAULT_VIEWPORT_HEIGHT,
        ),
    }
}

async fn wait_for_load(
    load_rx: &mut tokio::sync::mpsc::Receiver<CdpEvent>,
    timeout: Option<Duration>,
) -> Result<(), AppError> {
    match timeout {
        None => match load_rx.recv().await {
            Some(_) => Ok(()),
            None => Err(crate::cdp::CdpError::ConnectionClosed.into()),
        },
        Some(bound) => {
            tokio::select! {
                event = load_rx.recv() => match event {
                    Some(_) => Ok(()),
                    None => Err(crate::cdp::CdpError::ConnectionClosed.into()),
                },
                () = tokio::time::sleep(bound) => {
                    let ms = u64::try_from(bound.as_millis()).unwrap_or(u64::MAX);
                    Err(AppError::load_timeout(ms))
                }
            }
        }
    }
}

/// Ask the engine for the current frame in the session's format.
async fn capture(managed: &ManagedSession, session: &RenderSession) -> Result<Vec<u8>, AppError> {
    let (method, params) = match session.format {
        OutputFormat::Pdf => (
            "Page.printToPDF",
            print_params(&session.geometry, session.zoom),
        ),
        OutputFormat::Png | OutputFormat::Jpeg => (
            "Page.captureScreenshot",
            screenshot_params(session.format, &session.geometry),
        ),
    };

    let result = managed.send_command(method, Some(params)).await?;
    let data = result["data"]
        .as_str()
        .ok_or_else(|| AppError::capture_failed("response missing 'data' payload"))?;
    BASE64
        .decode(data)
        .map_err(|e| AppError::capture_failed(&format!("invalid base64 payload: {e}")))
}

/// Parameters for `Page.captureScreenshot`.
///
/// A clip rect captures exactly that region; without one the capture
/// extends beyond the viewport to the full page height.
fn screenshot_params(format: OutputFormat, geometry: &OutputGeometry) -> Value {
    let mut params = json!({ "format": format.screenshot_format() });
    if let OutputGeometry::PixelViewport {
        clip: Some(clip), ..
    } = geometry
    {
        params["clip"] = json!({
            "x": clip.left,
            "y": clip.top,
            "width": clip.width,
            "height": clip.height,
            "scale": 1,
        });
    } else {
        params["captureBeyondViewport"] = json!(true);
    }
    params
}

/// Parameters for `Page.printToPDF`, with paper dimensions converted to
/// the inches the protocol expects.
fn print_params(geometry: &OutputGeometry, zoom: Option<f64>) -> Value {
    let mut params = json!({ "printBackground": true });
    if let Some(zoom) = zoom {
        params["scale"] = json!(zoom);
    }

    match geometry {
        OutputGeometry::PaperSize {
            width,
            height,
            margin,
        } => {
            params["paperWidth"] = json!(dimension_to_inches(width));
            params["paperHeight"] = json!(dimension_to_inches(height));
            set_margins(&mut params, dimension_to_inches(margin));
        }
        OutputGeometry::PaperFormat {
            name,
            orientation,
            margin,
        } => {
            let (width, height) = paper_format_inches(name).unwrap_or(A4_INCHES);
            params["paperWidth"] = json!(width);
            params["paperHeight"] = json!(height);
            params["landscape"] = json!(matches!(orientation, Orientation::Landscape));
            set_margins(&mut params, dimension_to_inches(margin));
        }
        // No paper spec was given: the engine's default paper applies.
        OutputGeometry::PixelViewport { .. } => {}
    }

    params
}

fn set_margins(params: &mut Value, inches: f64) {
    params["marginTop"] = json!(inches);
    params["marginBottom"] = json!(inches);
    params["marginLeft"] = json!(inches);
    params["marginRight"] = json!(inches);
}

/// Write the captured bytes to the output path.
///
/// The write outcome is part of the contract: an unwritable path is a
/// reported failure, not a silent success.
///
/// # Errors
///
/// Returns `AppError::file_write_failed` on any I/O error.
pub fn write_artifact(path: &str, bytes: &[u8]) -> Result<(), AppError> {
    std::fs::write(path, bytes).map_err(|e| AppError::file_write_failed(path, &e.to_string()))
}

/// Normalize a bare host like `example.com` to `http://example.com`.
///
/// Anything that already parses as an absolute URL passes through
/// untouched, as does anything that cannot be fixed by prefixing a scheme.
#[must_use]
pub fn normalize_address(input: &str) -> String {
    if Url::parse(input).is_ok() {
        return input.to_string();
    }
    let candidate = format!("http://{input}");
    if Url::parse(&candidate).is_ok() {
        candidate
    } else {
        input.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::ClipRect;

    // --- normalize_address ---

    #[test]
    fn absolute_urls_pass_through() {
        assert_eq!(
            normalize_address("https://example.com/a?b=c"),
            "https://example.com/a?b=c"
        );
        assert_eq!(
            normalize_address("file:///tmp/page.html"),
            "file:///tmp/page.html"
        );
    }

    #[test]
    fn bare_host_gets_http_scheme() {
        assert_eq!(normalize_address("example.com"), "http://example.com");
        assert_eq!(
            normalize_address("example.com:8080/path"),
            "http://example.com:8080/path"
        );
    }

    // --- screenshot_params ---

    #[test]
    fn screenshot_with_clip() {
        let geometry = OutputGeometry::PixelViewport {
            width: 800,
            height: 600,
            clip: Some(ClipRect {
                top: 0,
                left: 0,
                width: 800,
                height: 600,
            }),
        };
        let params = screenshot_params(OutputFormat::Png, &geometry);
        assert_eq!(params["format"], "png");
        assert_eq!(params["clip"]["width"], 800);
        assert_eq!(params["clip"]["height"], 600);
        assert_eq!(params["clip"]["x"], 0);
        assert!(params.get("captureBeyondViewport").is_none());
    }

    #[test]
    fn screenshot_without_clip_is_full_page() {
        let geometry = OutputGeometry::PixelViewport {
            width: 1920,
            height: 1440,
            clip: None,
        };
        let params = screenshot_params(OutputFormat::Jpeg, &geometry);
        assert_eq!(params["format"], "jpeg");
        assert_eq!(params["captureBeyondViewport"], true);
        assert!(params.get("clip").is_none());
    }

    // --- print_params ---

    #[test]
    fn print_with_explicit_paper_size() {
        let geometry = OutputGeometry::PaperSize {
            width: "5in".into(),
            height: "7.5in".into(),
            margin: "0px".into(),
        };
        let params = print_params(&geometry, None);
        assert!((params["paperWidth"].as_f64().unwrap() - 5.0).abs() < 1e-9);
        assert!((params["paperHeight"].as_f64().unwrap() - 7.5).abs() < 1e-9);
        assert!(params["marginTop"].as_f64().unwrap().abs() < 1e-9);
        assert!(params.get("scale").is_none());
    }

    #[test]
    fn print_with_metric_paper_size() {
        let geometry = OutputGeometry::PaperSize {
            width: "10cm".into(),
            height: "20cm".into(),
            margin: "0px".into(),
        };
        let params = print_params(&geometry, None);
        assert!((params["paperWidth"].as_f64().unwrap() - 10.0 / 2.54).abs() < 1e-9);
        assert!((params["paperHeight"].as_f64().unwrap() - 20.0 / 2.54).abs() < 1e-9);
    }

    #[test]
    fn print_with_named_format() {
        let geometry = OutputGeometry::PaperFormat {
            name: "A4".into(),
            orientation: Orientation::Portrait,
            margin: "1cm".into(),
        };
        let params = print_params(&geometry, None);
        assert!((params["paperWidth"].as_f64().unwrap() - 8.27).abs() < 1e-9);
        assert!((params["paperHeight"].as_f64().unwrap() - 11.69).abs() < 1e-9);
        assert_eq!(params["landscape"], false);
        assert!((params["marginTop"].as_f64().unwrap() - 1.0 / 2.54).abs() < 1e-9);
    }

    #[test]
    fn print_with_unknown_format_falls_back_to_a4() {
        let geometry = OutputGeometry::PaperFormat {
            name: "Napkin".into(),
            orientation: Orientation::Portrait,
            margin: "1cm".into(),
        };
        let params = print_params(&geometry, None);
        assert!((params["paperWidth"].as_f64().unwrap() - 8.27).abs() < 1e-9);
    }

    #[test]
    fn print_without_paper_spec_uses_engine_defaults() {
        let geometry = OutputGeometry::PixelViewport {
            width: 600,
            height: 600,
            clip: None,
        };
        let params = print_params(&geometry, Some(1.5));
        assert!(params.get("paperWidth").is_none());
        assert!((params["scale"].as_f64().unwrap() - 1.5).abs() < 1e-9);
    }

    // --- viewport_dimensions ---

    #[test]
    fn paper_output_keeps_default_viewport() {
        let geometry = OutputGeometry::PaperFormat {
            name: "A4".into(),
            orientation: Orientation::Portrait,
            margin: "1cm".into(),
        };
        assert_eq!(viewport_dimensions(&geometry), (600, 600));
    }

    #[test]
    fn pixel_output_uses_resolved_viewport() {
        let geometry = OutputGeometry::PixelViewport {
            width: 1024,
            height: 768,
            clip: None,
        };
        assert_eq!(viewport_dimensions(&geometry), (1024, 768));
    }

    // --- write_artifact ---

    #[test]
    fn write_artifact_writes_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        write_artifact(path.to_str().unwrap(), b"not-really-a-png").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"not-really-a-png");
    }

    #[test]
    fn write_artifact_propagates_io_failure() {
        let err = write_artifact("/no/such/dir/out.png", b"x").unwrap_err();
        assert!(err.message.contains("/no/such/dir/out.png"));
        assert!(matches!(err.code, crate::error::ExitCode::GeneralError));
    }
}

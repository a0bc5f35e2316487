#![allow(clippy::doc_markdown)]

use std::path::PathBuf;

use clap::{Args, Parser};

#[derive(Parser)]
#[command(
    name = "rasterize",
    version,
    about = "Capture a web page as PNG, JPEG, or PDF via the Chrome DevTools Protocol",
    long_about = "rasterize loads a page in a headless Chrome/Chromium instance and captures it \
        to a file. The output extension selects the artifact: .pdf produces a paginated PDF via \
        the browser's print pipeline, .jpg/.jpeg a JPEG screenshot, and anything else a PNG \
        screenshot.\n\n\
        If no browser is reachable on the DevTools port, rasterize launches a headless one, \
        captures, and cleans it up afterwards.",
    after_long_help = "\
SIZE EXAMPLES:
  paper (pdf output):      \"5in*7.5in\", \"10cm*20cm\", \"A4\", \"Letter\"
  image (png/jpg output):  \"1920px\"       entire page, window width 1920px
                           \"800px*600px\"  window, clipped to 800x600

EXAMPLES:
  # Capture a page with the default 600x600 viewport
  rasterize https://example.com page.png

  # Full-page capture at a 1920px-wide viewport (4:3 height)
  rasterize https://example.com page.png 1920px

  # Clipped 800x600 JPEG, zoomed to 2x
  rasterize https://example.com page.jpg 800px*600px 2

  # A4 PDF with a 1cm margin
  rasterize https://example.com page.pdf A4

EXIT CODES:
  0  Success
  1  General error (invalid arguments, navigation failure, unwritable output)
  2  Connection error (no browser reachable or launchable)
  3  Target error (no page target available)
  4  Timeout error (load or browser startup timeout)
  5  Protocol error (CDP protocol failure)

ENVIRONMENT VARIABLES:
  RASTERIZE_HOST     DevTools host address (default: 127.0.0.1)
  RASTERIZE_PORT     DevTools port number
  RASTERIZE_TIMEOUT  Page-load timeout in milliseconds (default: unbounded)
  RASTERIZE_CONFIG   Path to configuration file
  CHROME_PATH        Browser executable for auto-launch",
    term_width = 100
)]
pub struct Cli {
    /// URL of the page to load
    pub address: String,

    /// Output file path; the extension selects PNG, JPEG, or PDF
    pub output: String,

    /// Size spec: WIDTHpx*HEIGHTpx, WIDTHpx, paper dimensions (5in*7.5in),
    /// or a paper format name (A4, Letter)
    pub size: Option<String>,

    /// Zoom factor applied before capture
    pub zoom: Option<f64>,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(Args)]
pub struct GlobalOpts {
    /// DevTools host address [default: 127.0.0.1]
    #[arg(long, global = true, env = "RASTERIZE_HOST")]
    pub host: Option<String>,

    /// DevTools port number; when given, only this port is tried
    #[arg(long, global = true, env = "RASTERIZE_PORT")]
    pub port: Option<u16>,

    /// Direct DevTools WebSocket URL (overrides --host and --port)
    #[arg(long, global = true)]
    pub ws_url: Option<String>,

    /// Page-load timeout in milliseconds; unbounded when absent
    #[arg(long, global = true, env = "RASTERIZE_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Delay between the load event and capture, in milliseconds [default: 200]
    #[arg(long, global = true)]
    pub settle_delay: Option<u64>,

    /// Browser executable used when auto-launching
    #[arg(long, global = true)]
    pub chrome_path: Option<PathBuf>,

    /// Extra command-line argument for a launched browser (repeatable)
    #[arg(long = "chrome-arg", global = true, allow_hyphen_values = true)]
    pub chrome_arg: Vec<String>,

    /// Path to configuration file (overrides default search)
    #[arg(long, global = true, env = "RASTERIZE_CONFIG")]
    pub config: Option<PathBuf>,
}

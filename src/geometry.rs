//! Output geometry resolution.
//!
//! Maps the positional `<OUTPUT> [SIZE]` arguments to a concrete capture
//! geometry: a pixel viewport with an optional clip rectangle for image
//! output, or a paper size / named paper format for PDF output. The
//! resolution is a pure function of its inputs.

/// Default viewport applied when no size spec is given.
pub const DEFAULT_VIEWPORT_WIDTH: u32 = 600;
/// Default viewport height, see [`DEFAULT_VIEWPORT_WIDTH`].
pub const DEFAULT_VIEWPORT_HEIGHT: u32 = 600;

/// Output artifact format, derived once from the output path and never
/// re-inspected afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Pdf,
    Png,
    Jpeg,
}

impl OutputFormat {
    /// Derive the format from the output file path.
    ///
    /// The `.pdf` check is an exact, case-sensitive match on the path tail;
    /// `output.PDF` is treated as an image.
    #[must_use]
    pub fn from_output_path(path: &str) -> Self {
        if path.ends_with(".pdf") {
            Self::Pdf
        } else if path.ends_with(".jpg") || path.ends_with(".jpeg") {
            Self::Jpeg
        } else {
            Self::Png
        }
    }

    /// The `format` parameter value for `Page.captureScreenshot`.
    ///
    /// Only meaningful for the image variants; PDF capture goes through
    /// `Page.printToPDF` instead.
    #[must_use]
    pub fn screenshot_format(self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Pdf | Self::Png => "png",
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Png => "png",
            Self::Jpeg => "jpeg",
        }
    }
}

/// A sub-region of the rendered surface captured to the output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipRect {
    pub top: u32,
    pub left: u32,
    pub width: u32,
    pub height: u32,
}

/// Page orientation for named paper formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Portrait,
    Landscape,
}

/// Resolved capture geometry. Exactly one variant is produced per
/// invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputGeometry {
    /// Pixel viewport for image output. `clip` is present only for the
    /// two-part `WxH` form; a single-width spec captures the full page.
    PixelViewport {
        width: u32,
        height: u32,
        clip: Option<ClipRect>,
    },
    /// Explicit paper dimensions for PDF output, preserved verbatim as
    /// number+unit strings (e.g. `"5in"`, `"10cm"`).
    PaperSize {
        width: String,
        height: String,
        margin: String,
    },
    /// Named paper format for PDF output (e.g. `"A4"`, `"Letter"`).
    PaperFormat {
        name: String,
        orientation: Orientation,
        margin: String,
    },
}

/// Resolve the output geometry from the output path and optional size spec.
///
/// Decision order, first match wins:
///
/// 1. PDF output with a size spec: two `*`-separated parts are explicit
///    paper dimensions with a `0px` margin; anything else is a named paper
///    format, portrait, with a `1cm` margin.
/// 2. A size spec whose last two characters are `px`: two parts set the
///    viewport and an equal clip rect; a single token sets the viewport
///    width with a 4:3 height and no clip (full-page capture).
/// 3. Otherwise the 600x600 default viewport with no clip.
///
/// Malformed numeric tokens coerce to 0 rather than erroring; callers
/// depend on the tolerance.
#[must_use]
pub fn resolve(output: &str, size_spec: Option<&str>) -> OutputGeometry {
    if output.ends_with(".pdf") {
        if let Some(spec) = size_spec {
            return resolve_paper(spec);
        }
    } else if let Some(spec) = size_spec {
        if spec.ends_with("px") {
            return resolve_pixels(spec);
        }
    }

    OutputGeometry::PixelViewport {
        width: DEFAULT_VIEWPORT_WIDTH,
        height: DEFAULT_VIEWPORT_HEIGHT,
        clip: None,
    }
}

fn resolve_paper(spec: &str) -> OutputGeometry {
    let parts: Vec<&str> = spec.split('*').collect();
    if parts.len() == 2 {
        OutputGeometry::PaperSize {
            width: parts[0].to_string(),
            height: parts[1].to_string(),
            margin: "0px".to_string(),
        }
    } else {
        OutputGeometry::PaperFormat {
            name: spec.to_string(),
            orientation: Orientation::Portrait,
            margin: "1cm".to_string(),
        }
    }
}

fn resolve_pixels(spec: &str) -> OutputGeometry {
    let parts: Vec<&str> = spec.split('*').collect();
    if parts.len() == 2 {
        let width = parse_leading_u32(parts[0]);
        let height = parse_leading_u32(parts[1]);
        OutputGeometry::PixelViewport {
            width,
            height,
            clip: Some(ClipRect {
                top: 0,
                left: 0,
                width,
                height,
            }),
        }
    } else {
        let width = parse_leading_u32(spec);
        // 4:3 is as good an assumption as any for a single-width spec.
        #[allow(clippy::cast_possible_truncation)]
        let height = (u64::from(width) * 3 / 4) as u32;
        OutputGeometry::PixelViewport {
            width,
            height,
            clip: None,
        }
    }
}

/// Parse the leading base-10 digit run of `s`, ignoring any trailing unit
/// text. An empty or overflowing digit run coerces to 0.
fn parse_leading_u32(s: &str) -> u32 {
    let digits: &str = {
        let end = s
            .as_bytes()
            .iter()
            .position(|b| !b.is_ascii_digit())
            .unwrap_or(s.len());
        &s[..end]
    };
    digits.parse().unwrap_or(0)
}

// =============================================================================
// Unit conversion for the PDF collaborator
// =============================================================================

/// Convert a dimension string (`5in`, `10cm`, `200mm`, `96px`, `8.5`) to
/// inches, the unit `Page.printToPDF` expects.
///
/// A bare number is taken as inches. Unparsable input coerces to 0.0, the
/// same tolerance posture as the pixel parsing above.
#[must_use]
pub fn dimension_to_inches(dim: &str) -> f64 {
    let split = dim
        .as_bytes()
        .iter()
        .position(|b| !b.is_ascii_digit() && *b != b'.')
        .unwrap_or(dim.len());
    let value: f64 = dim[..split].parse().unwrap_or(0.0);
    match dim[split..].trim() {
        "in" | "" => value,
        "cm" => value / 2.54,
        "mm" => value / 25.4,
        "px" => value / 96.0,
        _ => 0.0,
    }
}

/// Portrait dimensions in inches for a named paper format.
///
/// Lookup is case-insensitive. Unknown names yield `None`; the caller
/// falls back to A4.
#[must_use]
pub fn paper_format_inches(name: &str) -> Option<(f64, f64)> {
    match name.to_ascii_lowercase().as_str() {
        "a3" => Some((11.69, 16.54)),
        "a4" => Some((8.27, 11.69)),
        "a5" => Some((5.83, 8.27)),
        "legal" => Some((8.5, 14.0)),
        "letter" => Some((8.5, 11.0)),
        "tabloid" => Some((11.0, 17.0)),
        _ => None,
    }
}

/// A4 portrait, the fallback for unknown format names.
pub const A4_INCHES: (f64, f64) = (8.27, 11.69);

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Images smaller than this are treated as incidental artwork rather than a
/// scanned page.
pub const DEFAULT_MIN_IMAGE_BYTES: u64 = 100_000;

/// Settings for one recompression run.
///
/// Every field has a default, so an empty YAML profile is valid.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecompressConfig {
    pub brightness: Brightness,
    pub min_image_bytes: u64,
    pub extensions: Vec<String>,
    pub compression: Compression,
    pub temp_root: Option<PathBuf>,
    pub extraction: ExtractionSpec,
    pub tools: ToolPaths,
}

impl Default for RecompressConfig {
    fn default() -> Self {
        Self {
            brightness: Brightness::default(),
            min_image_bytes: DEFAULT_MIN_IMAGE_BYTES,
            extensions: default_extensions(),
            compression: Compression::default(),
            temp_root: None,
            extraction: ExtractionSpec::default(),
            tools: ToolPaths::default(),
        }
    }
}

impl RecompressConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read profile: {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: RecompressConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse profile YAML: {}", path.display()))?;
        Ok(config)
    }

    /// Whether `path` has one of the allow-listed raster extensions.
    pub fn accepts_extension(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
            return false;
        };
        self.extensions
            .iter()
            .any(|allowed| normalize_extension(allowed).eq_ignore_ascii_case(ext))
    }
}

/// Profile extensions may carry a leading dot or stray whitespace.
pub(crate) fn normalize_extension(ext: &str) -> &str {
    ext.trim().trim_start_matches('.')
}

fn default_extensions() -> Vec<String> {
    ["ppm", "pbm", "jpg"].iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractionSpec {
    /// Keep DCT-encoded images as JPEG files instead of decoding them to PPM.
    pub preserve_jpeg: bool,
}

impl Default for ExtractionSpec {
    fn default() -> Self {
        Self {
            preserve_jpeg: true,
        }
    }
}

/// Program names or paths for the external tools.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolPaths {
    pub pdfimages: String,
    pub econvert: String,
    pub tiffcp: String,
    pub tiff2pdf: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            pdfimages: "pdfimages".into(),
            econvert: "econvert".into(),
            tiffcp: "tiffcp".into(),
            tiff2pdf: "tiff2pdf".into(),
        }
    }
}

impl ToolPaths {
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("pdfimages", self.pdfimages.as_str()),
            ("econvert", self.econvert.as_str()),
            ("tiffcp", self.tiffcp.as_str()),
            ("tiff2pdf", self.tiff2pdf.as_str()),
        ]
        .into_iter()
    }
}

/// Compression requested from `tiffcp` for the combined TIFF.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    G4,
    None,
}

impl Compression {
    pub fn tiffcp_args(self) -> &'static [&'static str] {
        match self {
            Compression::G4 => &["-c", "g4"],
            Compression::None => &[],
        }
    }
}

/// Brightness offset handed verbatim to the conversion tool.
///
/// Kept in its textual form so `"0"` and `"0.0"` reach the tool exactly as the
/// user wrote them; parsing only checks that it is a finite number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BrightnessRepr", into = "String")]
pub struct Brightness(String);

/// Profiles may spell the offset as a YAML number or a string.
#[derive(Deserialize)]
#[serde(untagged)]
enum BrightnessRepr {
    Number(f64),
    Text(String),
}

impl Brightness {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn value(&self) -> f64 {
        self.0.parse().unwrap_or(0.0)
    }

    pub fn is_neutral(&self) -> bool {
        self.value() == 0.0
    }
}

impl Default for Brightness {
    fn default() -> Self {
        Self("0".into())
    }
}

impl FromStr for Brightness {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(Self(trimmed.to_string())),
            _ => Err(format!("brightness must be a finite number, got '{s}'")),
        }
    }
}

impl TryFrom<BrightnessRepr> for Brightness {
    type Error = String;

    fn try_from(value: BrightnessRepr) -> std::result::Result<Self, Self::Error> {
        match value {
            BrightnessRepr::Number(number) => number.to_string().parse(),
            BrightnessRepr::Text(text) => text.parse(),
        }
    }
}

impl From<Brightness> for String {
    fn from(value: Brightness) -> Self {
        value.0
    }
}

impl fmt::Display for Brightness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

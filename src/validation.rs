use serde::Serialize;

use crate::config::{RecompressConfig, normalize_extension};

#[derive(Debug, Default, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

pub fn validate_config(config: &RecompressConfig) -> ValidationReport {
    let mut report = ValidationReport::default();

    if config.extensions.is_empty() {
        report
            .errors
            .push("At least one image extension must be allowed".into());
    }

    for (idx, ext) in config.extensions.iter().enumerate() {
        let normalized = normalize_extension(ext);
        if normalized.is_empty() {
            report
                .errors
                .push(format!("Extension {} is empty", idx + 1));
        } else if normalized.eq_ignore_ascii_case("tiff") {
            // Converted pages are written as .tiff next to the extracted images.
            report.errors.push(format!(
                "Extension {} ('{}') collides with the converted page format",
                idx + 1,
                ext
            ));
        }
    }

    if config.min_image_bytes == 0 {
        report.warnings.push(
            "Size filter disabled; small incidental images will become pages".into(),
        );
    }

    if !config.brightness.is_neutral() {
        report.warnings.push(format!(
            "Brightness offset {} will alter every page",
            config.brightness
        ));
    }

    report.merge(validate_tools(config));

    if let Some(root) = &config.temp_root
        && !root.is_dir()
    {
        report.errors.push(format!(
            "Temporary root '{}' is not a directory",
            root.display()
        ));
    }

    report
}

fn validate_tools(config: &RecompressConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    for (name, program) in config.tools.iter() {
        if program.trim().is_empty() {
            report
                .errors
                .push(format!("Tool '{name}' has an empty program path"));
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_pass_without_warnings() {
        let report = validate_config(&RecompressConfig::default());
        assert!(report.is_ok(), "{:?}", report.errors);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn tiff_extension_and_empty_tool_are_errors() {
        let mut config = RecompressConfig::default();
        config.extensions.push(".TIFF".into());
        config.tools.tiffcp = "  ".into();

        let report = validate_config(&config);
        assert_eq!(report.errors.len(), 2, "{:?}", report.errors);
        assert!(report.errors.iter().any(|e| e.contains("tiffcp")));
    }

    #[test]
    fn disabled_size_filter_warns() {
        let mut config = RecompressConfig::default();
        config.min_image_bytes = 0;
        config.brightness = "0.3".parse().unwrap();

        let report = validate_config(&config);
        assert!(report.is_ok());
        assert_eq!(report.warnings.len(), 2);
    }

    #[test]
    fn missing_temp_root_is_an_error() {
        let temp = tempdir().unwrap();
        let mut config = RecompressConfig::default();
        config.temp_root = Some(temp.path().join("missing"));
        assert!(!validate_config(&config).is_ok());

        config.temp_root = Some(temp.path().to_path_buf());
        assert!(validate_config(&config).is_ok());
    }
}

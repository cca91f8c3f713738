//! Settings shared between the CLI flags and an optional JSON file.

use std::{fs, path::Path, path::PathBuf};

use anyhow::{Context, Result};
use boxconv_core::DEFAULT_OPSET;
use serde::{Deserialize, Serialize};

/// Export parameters for one run.
///
/// Defaults reproduce the reference script: `Conv.onnx` in the current
/// directory, opset 10, an unseeded 5x5 single-channel input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// Path the artifact is written to.
    pub output: PathBuf,
    /// ONNX opset revision to target.
    pub opset: i64,
    /// Seed for the random input tensor; `None` draws from entropy.
    pub seed: Option<u64>,
    /// Input height in pixels.
    pub height: usize,
    /// Input width in pixels.
    pub width: usize,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            output: PathBuf::from("Conv.onnx"),
            opset: DEFAULT_OPSET,
            seed: None,
            height: 5,
            width: 5,
        }
    }
}

impl ExportSettings {
    /// Load settings from a JSON file.
    ///
    /// Missing fields fall back to their defaults via `#[serde(default)]`.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        let settings: ExportSettings = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse settings JSON at {}", path.display()))?;
        Ok(settings)
    }

    /// Serialize settings to disk in pretty-printed JSON.
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let payload =
            serde_json::to_string_pretty(self).context("failed to serialize settings JSON")?;
        fs::write(path, payload)
            .with_context(|| format!("failed to write settings file {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_reference_run() {
        let settings = ExportSettings::default();
        assert_eq!(settings.output, PathBuf::from("Conv.onnx"));
        assert_eq!(settings.opset, 10);
        assert_eq!(settings.seed, None);
        assert_eq!((settings.height, settings.width), (5, 5));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let settings: ExportSettings = serde_json::from_str(r#"{ "opset": 11 }"#).unwrap();
        assert_eq!(settings.opset, 11);
        assert_eq!(settings.output, PathBuf::from("Conv.onnx"));
        assert_eq!((settings.height, settings.width), (5, 5));
    }

    #[test]
    fn settings_roundtrip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = ExportSettings {
            seed: Some(99),
            ..Default::default()
        };
        settings.save_to_path(&path).unwrap();

        let loaded = ExportSettings::load_from_path(&path).unwrap();
        assert_eq!(loaded.seed, Some(99));
        assert_eq!(loaded.opset, settings.opset);
    }
}

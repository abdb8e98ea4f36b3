//! Layered CLI configuration (EXPANSION → "Configuration & Mnemonic
//! Maps"): a `dmtk.toml` sidecar file, overridable by CLI flags, in the
//! shape the corpus's CLI tools commonly use for user-editable settings.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DmtkConfig {
    /// Archive container version assumed when `--version`/detection
    /// heuristics are inconclusive.
    pub default_archive_version: Option<u32>,
    /// Script family version assumed when not given explicitly.
    pub default_script_version: Option<u32>,
    /// Path to an eclmap file loaded automatically unless `--map`
    /// overrides it.
    pub default_eclmap: Option<PathBuf>,
    /// Whether filenames and script string literals are transcoded
    /// through CP932 on the way in/out.
    pub cp932: bool,
    /// Treat cp932 transcoding errors as warnings instead of failures.
    pub lossy_text: bool,
}

impl Default for DmtkConfig {
    fn default() -> Self {
        Self {
            default_archive_version: None,
            default_script_version: None,
            default_eclmap: None,
            cp932: false,
            lossy_text: true,
        }
    }
}

impl DmtkConfig {
    /// Loads `dmtk.toml` from `path`, falling back to defaults if the
    /// file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => toml::from_str(&text).map_err(|e| Error::format(format!("dmtk.toml: {e}"))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Merges CLI-supplied overrides on top of the loaded config; `Some`
    /// values from `overrides` always win.
    pub fn merged_with(mut self, archive_version: Option<u32>, script_version: Option<u32>, eclmap: Option<PathBuf>) -> Self {
        if archive_version.is_some() {
            self.default_archive_version = archive_version;
        }
        if script_version.is_some() {
            self.default_script_version = script_version;
        }
        if eclmap.is_some() {
            self.default_eclmap = eclmap;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        let config = DmtkConfig::load(Path::new("/nonexistent/dmtk.toml")).unwrap();
        assert_eq!(config.default_archive_version, None);
        assert!(!config.cp932);
    }

    #[test]
    fn parses_a_toml_config() {
        let dir = std::env::temp_dir().join("dmtk_config_test_parses_a_toml_config");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("dmtk.toml");
        std::fs::write(&path, "default_archive_version = 95\ncp932 = true\n").unwrap();
        let config = DmtkConfig::load(&path).unwrap();
        assert_eq!(config.default_archive_version, Some(95));
        assert!(config.cp932);
    }

    #[test]
    fn cli_overrides_win_over_the_loaded_file() {
        let config = DmtkConfig {
            default_archive_version: Some(2),
            ..Default::default()
        }
        .merged_with(Some(95), None, None);
        assert_eq!(config.default_archive_version, Some(95));
    }
}

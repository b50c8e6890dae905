use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dsl::typeck::AnalyzeOptions;
use crate::dsl::CompileOptions;
use crate::error::AppError;
use crate::output::{read_json, write_json};

const SETTINGS_VERSION: u32 = 1;

/// Compiler configuration read from `blockc.json`. Every field is optional in
/// the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub version: u32,
    /// Macros defined before the first line, as `NAME` or `NAME=VALUE`.
    pub defines: Vec<String>,
    /// Warn about variables, lists, constants, functions and events never used.
    pub warn_unused: bool,
    /// Warn about statements after `loop:` or a stop block.
    pub warn_unreachable: bool,
    pub warnings_as_errors: bool,
    /// Directory image paths resolve against. Defaults to the source file's directory.
    pub image_root: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            defines: Vec::new(),
            warn_unused: true,
            warn_unreachable: true,
            warnings_as_errors: false,
            image_root: None,
        }
    }
}

impl Settings {
    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            defines: self.defines.clone(),
            analyze: AnalyzeOptions {
                warn_unused: self.warn_unused,
                warn_unreachable: self.warn_unreachable,
            },
            warnings_as_errors: self.warnings_as_errors,
        }
    }

    /// Command-line definitions come after the configured ones, so they win.
    pub fn with_defines(mut self, defines: &[String]) -> Self {
        self.defines.extend_from_slice(defines);
        self
    }

    /// Image root for `source`; a relative configured root is taken from the
    /// source's directory.
    pub fn image_root_for(&self, source: &Path) -> PathBuf {
        let dir = crate::paths::source_dir(source);
        match &self.image_root {
            Some(root) => dir.join(root),
            None => dir.to_path_buf(),
        }
    }
}

/// Load `blockc.json` from `dir`. A missing file yields the defaults.
pub fn load_settings(dir: &Path) -> Result<Settings, AppError> {
    let path = crate::paths::config_path(dir);
    if !path.exists() {
        debug!(dir = %dir.display(), "no config file, using defaults");
        return Ok(Settings::default());
    }
    load_settings_file(&path)
}

/// Load an explicitly named config file, which must exist.
pub fn load_settings_file(path: &Path) -> Result<Settings, AppError> {
    read_json::<Settings>(path).map_err(|e| match e {
        AppError::Json(json) => AppError::Config { path: path.to_path_buf(), message: json.to_string() },
        other => other,
    })
}

/// Save settings into `dir` as `blockc.json`.
pub fn save_settings(dir: &Path, settings: &Settings) -> Result<(), AppError> {
    std::fs::create_dir_all(dir)?;
    write_json(&crate::paths::config_path(dir), settings)
}

/// JSON schema of the config file.
pub fn settings_schema() -> schemars::schema::RootSchema {
    schemars::schema_for!(Settings)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(name);
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_settings_round_trip() {
        let dir = temp_dir("blockc_test_settings");
        let settings = Settings {
            defines: vec!["DEBUG".into(), "SPEED=40".into()],
            warn_unused: false,
            image_root: Some(PathBuf::from("assets")),
            ..Settings::default()
        };
        save_settings(&dir, &settings).unwrap();
        assert_eq!(load_settings(&dir).unwrap(), settings);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_load_missing_returns_defaults() {
        let dir = std::env::temp_dir().join("blockc_test_no_settings");
        let _ = std::fs::remove_dir_all(&dir);
        assert_eq!(load_settings(&dir).unwrap(), Settings::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = temp_dir("blockc_test_partial_settings");
        std::fs::write(crate::paths::config_path(&dir), r#"{ "warningsAsErrors": true }"#).unwrap();
        let loaded = load_settings(&dir).unwrap();
        assert!(loaded.warnings_as_errors);
        assert!(loaded.warn_unused && loaded.warn_unreachable);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_malformed_file_is_a_config_error() {
        let dir = temp_dir("blockc_test_bad_settings");
        let path = crate::paths::config_path(&dir);
        std::fs::write(&path, "{ \"defines\": 3 }").unwrap();
        let err = load_settings(&dir).unwrap_err();
        assert!(matches!(err, AppError::Config { .. }), "{err}");
        assert!(load_settings_file(&dir.join("missing.json")).is_err());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_compile_options_follow_settings() {
        let settings = Settings { warn_unreachable: false, ..Settings::default() }.with_defines(&["X=1".into()]);
        let options = settings.compile_options();
        assert_eq!(options.defines, ["X=1"]);
        assert!(options.analyze.warn_unused);
        assert!(!options.analyze.warn_unreachable);
    }

    #[test]
    fn test_image_root_is_relative_to_source() {
        let settings = Settings { image_root: Some(PathBuf::from("img")), ..Settings::default() };
        assert_eq!(settings.image_root_for(Path::new("bots/a.bot")), PathBuf::from("bots/img"));
        assert_eq!(Settings::default().image_root_for(Path::new("bots/a.bot")), PathBuf::from("bots"));
    }

    #[test]
    fn test_schema_lists_fields() {
        let schema = serde_json::to_value(settings_schema()).unwrap();
        let properties = &schema["properties"];
        assert!(properties.get("defines").is_some());
        assert!(properties.get("warningsAsErrors").is_some());
    }
}

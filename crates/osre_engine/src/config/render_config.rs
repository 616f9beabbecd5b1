//! Render core configuration
//!
//! Settings consumed while setting up the scene graph and the render
//! pipeline. Window size and renderer choice belong to the platform layer
//! and are not part of this struct.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::{Config, ConfigError};
use crate::foundation::math::Color4;
use crate::render::PassId;

/// Configuration for the render core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderCoreConfig {
    /// Directory `#include` directives and shader paths resolve against
    pub shader_include_root: PathBuf,
    /// First id handed out by the stage's id allocator
    pub id_base: u32,
    /// Exclusive upper bound for pass ids accepted by pipelines
    pub max_pass_count: u32,
    /// Clear color used by passes that clear the color buffer
    pub clear_color: Color4,
    /// Skip nodes whose bounds lie outside the view frustum
    pub enable_culling: bool,
    /// Log filter handed to `env_logger` when `RUST_LOG` is unset
    pub log_filter: String,
    /// Pipeline built when the application does not supply one
    pub default_pipeline: String,
}

impl RenderCoreConfig {
    /// Set the shader include root
    pub fn with_shader_include_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.shader_include_root = root.into();
        self
    }

    /// Set the pass id ceiling
    pub fn with_max_pass_count(mut self, count: u32) -> Self {
        self.max_pass_count = count;
        self
    }

    /// Set the background clear color [R, G, B, A] (0.0-1.0 range)
    pub fn with_clear_color(mut self, color: Color4) -> Self {
        self.clear_color = color;
        self
    }

    /// Enable or disable frustum culling
    pub fn with_culling(mut self, enabled: bool) -> Self {
        self.enable_culling = enabled;
        self
    }
}

impl Default for RenderCoreConfig {
    fn default() -> Self {
        Self {
            shader_include_root: PathBuf::from("assets/shaders"),
            id_base: 0,
            max_pass_count: 16,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            enable_culling: true,
            log_filter: "info".to_string(),
            default_pipeline: "default3d".to_string(),
        }
    }
}

impl Config for RenderCoreConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_pass_count < PassId::BUILTIN_COUNT {
            return Err(ConfigError::Invalid(format!(
                "max_pass_count {} is below the {} built-in passes",
                self.max_pass_count,
                PassId::BUILTIN_COUNT
            )));
        }

        if self.clear_color.iter().any(|c| !(0.0..=1.0).contains(c)) {
            return Err(ConfigError::Invalid(format!(
                "clear color {:?} outside the 0.0-1.0 range",
                self.clear_color
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(RenderCoreConfig::default().validate().is_ok());
    }

    #[test]
    fn test_pass_ceiling_below_builtin_passes_is_rejected() {
        let config = RenderCoreConfig::default().with_max_pass_count(2);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let config = RenderCoreConfig::from_toml_str(
            r#"
            shader_include_root = "data/shaders"
            enable_culling = false
            "#,
        )
        .unwrap();

        assert_eq!(config.shader_include_root, PathBuf::from("data/shaders"));
        assert!(!config.enable_culling);
        assert_eq!(config.max_pass_count, 16);
    }

    #[test]
    fn test_ron_config_parses() {
        let config = RenderCoreConfig::from_ron_str(
            "(max_pass_count: 8, clear_color: (0.1, 0.2, 0.3, 1.0))",
        )
        .unwrap();

        assert_eq!(config.max_pass_count, 8);
        assert_eq!(config.clear_color, [0.1, 0.2, 0.3, 1.0]);
    }

    #[test]
    fn test_unsupported_extension() {
        let config = RenderCoreConfig::default();
        assert!(matches!(
            config.save_to_file("render.ini"),
            Err(ConfigError::UnsupportedFormat(path)) if path == "render.ini"
        ));

        let path = std::env::temp_dir().join(format!("osre_render_{}.ini", std::process::id()));
        std::fs::write(&path, "max_pass_count = 8").unwrap();
        let result = RenderCoreConfig::load_from_file(&path.to_string_lossy());
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_loading_rejects_invalid_values() {
        let result = RenderCoreConfig::from_toml_str("max_pass_count = 0");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        let result = RenderCoreConfig::from_ron_str("(clear_color: (2.0, 0.0, 0.0, 1.0))");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_toml_round_trip_through_file() {
        let path = std::env::temp_dir().join(format!("osre_render_{}.toml", std::process::id()));
        let path = path.to_string_lossy().to_string();
        let config = RenderCoreConfig::default().with_max_pass_count(8).with_culling(false);

        config.save_to_file(&path).unwrap();
        let loaded = RenderCoreConfig::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded, config);
    }
}

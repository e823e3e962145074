//! YAML configuration for backend selection and shader lookup.

use crate::backend::{UploadCaps, INLINE_UPLOAD_LIMIT};
use crate::shader::{GlslDialect, ShaderBundle};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

/// Which backend builds the filter pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Modern,
    Legacy,
}

/// Transform upload settings of the modern backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub inline: bool,
    pub inline_limit: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            inline: true,
            inline_limit: INLINE_UPLOAD_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub backend: BackendKind,
    /// GLSL dialect for the legacy backend; negotiated from the context when absent.
    pub dialect: Option<GlslDialect>,
    /// Extra directories searched for `<library>.wgsl`.
    pub shader_dirs: Vec<PathBuf>,
    pub upload: UploadConfig,
}

impl FilterConfig {
    /// Reads a config file. Relative shader directories are resolved against
    /// the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let mut config: FilterConfig = content
            .parse()
            .with_context(|| format!("failed to parse config {}", path.display()))?;

        if let Some(base) = path.parent() {
            for dir in &mut config.shader_dirs {
                if dir.is_relative() {
                    *dir = base.join(&*dir);
                }
            }
        }

        info!("Loaded config from {:?} ({:?} backend)", path, config.backend);
        Ok(config)
    }

    pub fn bundle(&self) -> ShaderBundle {
        ShaderBundle::new(self.shader_dirs.iter().cloned())
    }

    pub fn upload_caps(&self) -> UploadCaps {
        UploadCaps {
            inline: self.upload.inline,
            inline_limit: self.upload.inline_limit,
        }
    }
}

impl FromStr for FilterConfig {
    type Err = serde_yaml::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        serde_yaml::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TransformUpload;
    use std::fs;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: FilterConfig = "{}".parse().unwrap();
        assert_eq!(config, FilterConfig::default());
        assert_eq!(config.backend, BackendKind::Modern);
        assert_eq!(config.upload_caps(), UploadCaps::default());
    }

    #[test]
    fn test_parse_legacy_config() {
        let yaml = r#"
backend: legacy
dialect: gl2
upload:
  inline: false
"#;
        let config: FilterConfig = yaml.parse().unwrap();
        assert_eq!(config.backend, BackendKind::Legacy);
        assert_eq!(config.dialect, Some(GlslDialect::Gl2));
        assert_eq!(config.upload.inline_limit, INLINE_UPLOAD_LIMIT);
        assert_eq!(config.upload_caps().select(64), TransformUpload::Allocated);
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        assert!("backend: metal".parse::<FilterConfig>().is_err());
    }

    #[test]
    fn test_load_resolves_relative_dirs() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("filters.yaml");
        fs::write(&path, "shader_dirs: [shaders, /opt/shaders]\n").unwrap();

        let config = FilterConfig::load(&path).unwrap();
        assert_eq!(config.shader_dirs[0], temp.path().join("shaders"));
        assert_eq!(config.shader_dirs[1], PathBuf::from("/opt/shaders"));
        assert_eq!(config.bundle().search_dirs(), config.shader_dirs.as_slice());
    }
}

//! GLSL dialects understood by the legacy backend.

use glow::HasContext;
use serde::{Deserialize, Serialize};

/// Shading-language variant a GL program is compiled against.
///
/// Kernels are authored once in the GLES2 subset and prepared for the
/// negotiated dialect before compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlslDialect {
    /// GLSL ES 1.00, also accepted by GLES3 contexts.
    Es2Es3,
    /// Desktop GLSL 1.20.
    Gl2,
    /// Desktop GLSL 1.30+ core. Not built by the legacy backend.
    Gl3,
}

impl GlslDialect {
    /// Picks the dialect for a context version.
    pub fn negotiate(major: u32, minor: u32, is_embedded: bool) -> Self {
        if is_embedded {
            GlslDialect::Es2Es3
        } else if (major, minor) >= (3, 0) {
            GlslDialect::Gl3
        } else {
            GlslDialect::Gl2
        }
    }

    pub fn from_context(gl: &impl HasContext) -> Self {
        let version = gl.version();
        Self::negotiate(version.major, version.minor, version.is_embedded)
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, GlslDialect::Gl3)
    }

    /// Prepares a GLES2-subset kernel for this dialect.
    ///
    /// Returns `None` for [`GlslDialect::Gl3`].
    pub fn prepare(&self, kernel: &str) -> Option<String> {
        match self {
            GlslDialect::Es2Es3 => Some(format!("#version 100\n{}", kernel.trim_start())),
            GlslDialect::Gl2 => {
                // 1.20 has no precision statements; qualifiers become empty macros.
                let body: Vec<&str> = kernel
                    .trim_start()
                    .lines()
                    .filter(|line| !line.trim_start().starts_with("precision "))
                    .collect();
                Some(format!(
                    "#version 120\n#define lowp\n#define mediump\n#define highp\n{}\n",
                    body.join("\n")
                ))
            }
            GlslDialect::Gl3 => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::BASIC_FRAGMENT_KERNEL;

    #[test]
    fn test_negotiate() {
        assert_eq!(GlslDialect::negotiate(3, 0, true), GlslDialect::Es2Es3);
        assert_eq!(GlslDialect::negotiate(2, 0, true), GlslDialect::Es2Es3);
        assert_eq!(GlslDialect::negotiate(2, 1, false), GlslDialect::Gl2);
        assert_eq!(GlslDialect::negotiate(3, 3, false), GlslDialect::Gl3);
    }

    #[test]
    fn test_prepare_es_prepends_version() {
        let src = GlslDialect::Es2Es3.prepare(BASIC_FRAGMENT_KERNEL).unwrap();
        assert!(src.starts_with("#version 100\n"));
        assert!(src.contains("precision mediump float;"));
    }

    #[test]
    fn test_prepare_gl2_strips_precision() {
        let src = GlslDialect::Gl2.prepare(BASIC_FRAGMENT_KERNEL).unwrap();
        assert!(src.starts_with("#version 120\n"));
        assert!(!src.contains("precision "));
        assert!(src.contains("texture2D(uTex0, vCoord)"));
    }

    #[test]
    fn test_gl3_is_unsupported() {
        assert!(!GlslDialect::Gl3.is_supported());
        assert_eq!(GlslDialect::Gl3.prepare(BASIC_FRAGMENT_KERNEL), None);
    }

    #[test]
    fn test_dialect_names_in_yaml() {
        let d: GlslDialect = serde_yaml::from_str("es2_es3").unwrap();
        assert_eq!(d, GlslDialect::Es2Es3);
        let d: GlslDialect = serde_yaml::from_str("gl2").unwrap();
        assert_eq!(d, GlslDialect::Gl2);
    }
}

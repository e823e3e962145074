//! Shader sources, dialects and libraries.

mod dialect;
pub mod gpu_context;
mod library;

pub use dialect::GlslDialect;
pub use gpu_context::GpuContext;
pub use library::{ShaderBundle, ShaderLibrary, Stage, DEFAULT_LIBRARY};

use crate::math::{Mat4, Size};

/// Vertex kernel of the basic filter, written in the GLES2 subset.
pub const BASIC_VERTEX_KERNEL: &str = r#"
attribute vec2 aPos;
attribute vec2 aCoord;
varying vec2   vCoord;
uniform mat4   uMat;
void main(void) {
    gl_Position = uMat * vec4(aPos, 0.0, 1.0);
    vCoord = aCoord;
}
"#;

/// Passthrough fragment kernel of the basic filter.
pub const BASIC_FRAGMENT_KERNEL: &str = r#"
precision mediump float;
varying vec2      vCoord;
uniform sampler2D uTex0;
void main(void) {
    gl_FragData[0] = texture2D(uTex0, vCoord);
}
"#;

/// What a concrete filter supplies to the pipeline builders.
///
/// Every method has a default describing the basic passthrough filter, so an
/// implementation only overrides what it changes. The legacy backend reads
/// [`vertex_source`](Self::vertex_source) and
/// [`fragment_source`](Self::fragment_source); the modern backend reads the
/// library and function names.
pub trait ShaderSource {
    /// Identity of the filter, used in logs.
    fn name(&self) -> &str {
        ""
    }

    /// Vertex stage source for `dialect`. `None` means there is nothing to build.
    fn vertex_source(&self, dialect: GlslDialect) -> Option<String> {
        dialect.prepare(BASIC_VERTEX_KERNEL)
    }

    /// Fragment stage source for `dialect`. `None` means there is nothing to build.
    fn fragment_source(&self, dialect: GlslDialect) -> Option<String> {
        dialect.prepare(BASIC_FRAGMENT_KERNEL)
    }

    /// Shader library holding the vertex and fragment functions.
    fn library(&self) -> &str {
        DEFAULT_LIBRARY
    }

    fn vertex_function(&self) -> &str {
        "basic_vertex"
    }

    fn fragment_function(&self) -> &str {
        "bgra_fragment"
    }

    /// Debug label attached to the compiled pipeline.
    fn pipeline_label(&self) -> Option<&str> {
        None
    }

    fn initial_transform(&self) -> Mat4 {
        Mat4::IDENTITY
    }

    fn initial_dimensions(&self) -> Size {
        Size::ZERO
    }
}

/// Passthrough filter: samples the frame texture unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicVideoFilter;

impl ShaderSource for BasicVideoFilter {}

/// Basic filter mirrored vertically, for frames delivered bottom-up.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlipVideoFilter;

impl ShaderSource for FlipVideoFilter {
    fn name(&self) -> &str {
        "flip"
    }

    fn pipeline_label(&self) -> Option<&str> {
        Some("Flip Filter Pipeline")
    }

    fn initial_transform(&self) -> Mat4 {
        Mat4::scale(1.0, -1.0, 1.0)
    }
}

//! framefilter: GPU pipeline lifecycle for real-time video frame filters.
//!
//! A [`VideoFilter`] owns one shader pipeline, a transform and a
//! bind/render/unbind state machine. The GPU work is delegated to a
//! [`FilterBackend`]: [`GlBackend`] for GL/GLES contexts through `glow`,
//! [`WgpuBackend`] for explicit pipeline-state rendering through `wgpu`.

pub mod backend;
pub mod config;
pub mod error;
pub mod filter;
pub mod frame;
pub mod math;
pub mod shader;
pub mod utils;

pub use backend::{FilterBackend, GlBackend, TransformUpload, UploadCaps, WgpuBackend};
pub use config::FilterConfig;
pub use error::FilterError;
pub use filter::{BindState, LifecycleState, VideoFilter};
pub use math::{Mat4, Size};
pub use shader::{BasicVideoFilter, GlslDialect, ShaderBundle, ShaderLibrary, ShaderSource};

//! GPU backends that build and drive filter pipelines.

mod gl;
#[cfg(test)]
pub(crate) mod mock;
mod wgpu_backend;

pub use gl::{GlBackend, GlPipeline};
pub use wgpu_backend::{
    TransformUpload, UploadCaps, WgpuBackend, WgpuPipeline, FRAME_SLOT, INLINE_RING_SLOTS,
    INLINE_UPLOAD_LIMIT, TARGET_FORMAT, TRANSFORM_SLOT,
};

use crate::error::FilterError;
use crate::math::Mat4;
use crate::shader::ShaderSource;

/// Backend capability a [`VideoFilter`](crate::VideoFilter) drives.
///
/// Implementations borrow the host's device; they never own it. All calls
/// must happen on the thread that owns the GPU context.
pub trait FilterBackend {
    /// Compiled pipeline together with every resource sharing its lifetime.
    type Pipeline;

    /// Per-frame command encoding context supplied by the compositor.
    type Encoder<'e>;

    /// Compiles the pipeline described by `source`.
    ///
    /// `Ok(None)` means there was nothing to build (absent source text or an
    /// unsupported dialect). `Err` is an unrecoverable configuration error.
    fn build(&mut self, source: &dyn ShaderSource) -> Result<Option<Self::Pipeline>, FilterError>;

    /// Makes `pipeline` current for subsequent draws.
    fn activate(&mut self, pipeline: &Self::Pipeline);

    /// Uploads `transform` to a pipeline made current by [`activate`](Self::activate).
    fn push_transform(&mut self, pipeline: &Self::Pipeline, transform: &Mat4);

    /// Records `pipeline` and `transform` into `encoder`.
    fn encode(
        &mut self,
        pipeline: &Self::Pipeline,
        encoder: &mut Self::Encoder<'_>,
        transform: &Mat4,
    );

    /// Destroys `pipeline` and its resources.
    fn release(&mut self, pipeline: Self::Pipeline);
}

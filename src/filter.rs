//! The filter lifecycle: lazy pipeline construction and bind/render/unbind.

use crate::backend::FilterBackend;
use crate::error::FilterError;
use crate::math::{Mat4, Size};
use crate::shader::{BasicVideoFilter, ShaderSource};
use tracing::{debug, error};

/// Whether the pipeline has been built. Never goes back to `Uninitialized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Initialized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindState {
    Unbound,
    Bound,
}

/// A single GPU filter: one pipeline, one transform, one backend.
///
/// The pipeline is built at most once, on the first [`bind`](Self::bind) or
/// an explicit [`initialize`](Self::initialize), and released when the filter
/// is dropped.
pub struct VideoFilter<B: FilterBackend, S: ShaderSource = BasicVideoFilter> {
    backend: B,
    source: S,
    transform: Mat4,
    dimensions: Size,
    lifecycle: LifecycleState,
    bind_state: BindState,
    pipeline: Option<B::Pipeline>,
}

impl<B: FilterBackend, S: ShaderSource> VideoFilter<B, S> {
    /// Creates an uninitialized, unbound filter.
    pub fn new(backend: B, source: S) -> Self {
        Self {
            transform: source.initial_transform(),
            dimensions: source.initial_dimensions(),
            backend,
            source,
            lifecycle: LifecycleState::Uninitialized,
            bind_state: BindState::Unbound,
            pipeline: None,
        }
    }

    /// Creates a filter and builds its pipeline immediately.
    ///
    /// # Panics
    ///
    /// Panics on the configuration errors listed by [`FilterError`].
    pub fn build(backend: B, source: S) -> Self {
        let mut filter = Self::new(backend, source);
        filter.initialize();
        filter
    }

    /// Builds the pipeline if that has not happened yet.
    ///
    /// A source with nothing to build leaves the filter uninitialized.
    ///
    /// # Panics
    ///
    /// Panics on the configuration errors listed by [`FilterError`]; a filter
    /// without its pipeline would render wrong frames.
    pub fn initialize(&mut self) {
        if let Err(err) = self.try_initialize() {
            error!("Filter `{}` cannot build its pipeline: {}", self.source.name(), err);
            panic!("filter `{}` cannot build its pipeline: {}", self.source.name(), err);
        }
    }

    /// Same as [`initialize`](Self::initialize), returning configuration
    /// errors instead of panicking.
    pub fn try_initialize(&mut self) -> Result<(), FilterError> {
        if self.lifecycle == LifecycleState::Initialized {
            return Ok(());
        }

        match self.backend.build(&self.source)? {
            Some(pipeline) => {
                self.pipeline = Some(pipeline);
                self.lifecycle = LifecycleState::Initialized;
                debug!("Filter `{}` initialized", self.source.name());
            }
            None => debug!("Filter `{}` has nothing to build", self.source.name()),
        }
        Ok(())
    }

    /// Activates the pipeline and uploads the current transform.
    ///
    /// Binding an already bound filter only refreshes the transform.
    pub fn bind(&mut self) {
        if self.bind_state == BindState::Unbound {
            if self.lifecycle == LifecycleState::Uninitialized {
                self.initialize();
            }
            if let Some(pipeline) = &self.pipeline {
                self.backend.activate(pipeline);
            }
            self.bind_state = BindState::Bound;
        }

        if let Some(pipeline) = &self.pipeline {
            self.backend.push_transform(pipeline, &self.transform);
        }
    }

    /// Marks the filter inactive. Resources stay alive for the next bind.
    pub fn unbind(&mut self) {
        self.bind_state = BindState::Unbound;
    }

    /// Records the pipeline and current transform into `encoder`.
    /// Does nothing while no pipeline exists.
    pub fn render(&mut self, encoder: &mut B::Encoder<'_>) {
        if let Some(pipeline) = &self.pipeline {
            self.backend.encode(pipeline, encoder, &self.transform);
        }
    }

    pub fn transform(&self) -> &Mat4 {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: Mat4) {
        self.transform = transform;
    }

    pub fn dimensions(&self) -> Size {
        self.dimensions
    }

    pub fn set_dimensions(&mut self, dimensions: Size) {
        self.dimensions = dimensions;
    }

    pub fn lifecycle(&self) -> LifecycleState {
        self.lifecycle
    }

    pub fn bind_state(&self) -> BindState {
        self.bind_state
    }

    pub fn is_initialized(&self) -> bool {
        self.lifecycle == LifecycleState::Initialized
    }

    pub fn is_bound(&self) -> bool {
        self.bind_state == BindState::Bound
    }

    pub fn name(&self) -> &str {
        self.source.name()
    }

    pub fn pipeline(&self) -> Option<&B::Pipeline> {
        self.pipeline.as_ref()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

impl<B: FilterBackend, S: ShaderSource> Drop for VideoFilter<B, S> {
    fn drop(&mut self) {
        if let Some(pipeline) = self.pipeline.take() {
            self.backend.release(pipeline);
            debug!("Filter `{}` released its pipeline", self.source.name());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{MockBackend, Mode};
    use crate::shader::{FlipVideoFilter, GlslDialect};

    /// Legacy source whose fragment text is not available.
    struct NoFragment;

    impl ShaderSource for NoFragment {
        fn name(&self) -> &str {
            "no-fragment"
        }

        fn fragment_source(&self, _dialect: GlslDialect) -> Option<String> {
            None
        }
    }

    /// Legacy source with text for every dialect, including ones the backend rejects.
    struct AnyDialect;

    impl ShaderSource for AnyDialect {
        fn name(&self) -> &str {
            "any-dialect"
        }

        fn vertex_source(&self, _dialect: GlslDialect) -> Option<String> {
            Some(crate::shader::BASIC_VERTEX_KERNEL.to_string())
        }

        fn fragment_source(&self, _dialect: GlslDialect) -> Option<String> {
            Some(crate::shader::BASIC_FRAGMENT_KERNEL.to_string())
        }
    }

    /// Modern source naming a function the library does not have.
    struct Misnamed;

    impl ShaderSource for Misnamed {
        fn name(&self) -> &str {
            "misnamed"
        }

        fn fragment_function(&self) -> &str {
            "sepia_fragment"
        }
    }

    #[test]
    fn test_new_filter_defaults() {
        let (backend, record) = MockBackend::legacy();
        let filter = VideoFilter::new(backend, BasicVideoFilter);

        assert_eq!(filter.lifecycle(), LifecycleState::Uninitialized);
        assert_eq!(filter.bind_state(), BindState::Unbound);
        assert_eq!(*filter.transform(), Mat4::IDENTITY);
        assert_eq!(filter.dimensions(), Size::ZERO);
        assert_eq!(filter.name(), "");
        assert_eq!(record.borrow().build_calls, 0);
    }

    #[test]
    fn test_bind_with_identity_initializes() {
        let (backend, record) = MockBackend::legacy();
        let mut filter = VideoFilter::new(backend, BasicVideoFilter);

        filter.bind();

        assert_eq!(filter.lifecycle(), LifecycleState::Initialized);
        assert!(filter.is_bound());
        let record = record.borrow();
        assert_eq!(record.transforms, vec![Mat4::IDENTITY]);
        assert_eq!(record.activations, 1);
    }

    #[test]
    fn test_repeated_bind_builds_once() {
        let (backend, record) = MockBackend::legacy();
        let mut filter = VideoFilter::new(backend, BasicVideoFilter);
        let t = Mat4::translation(0.25, -0.5, 0.0);
        filter.set_transform(t);

        filter.bind();
        filter.bind();

        let record = record.borrow();
        assert_eq!(record.build_calls, 1);
        assert_eq!(record.pipelines_built, 1);
        // re-bind refreshes the transform without re-activating
        assert_eq!(record.activations, 1);
        assert_eq!(record.transforms, vec![t, t]);
    }

    #[test]
    fn test_rebind_after_unbind_reuses_pipeline() {
        let (backend, record) = MockBackend::modern();
        let mut filter = VideoFilter::new(backend, BasicVideoFilter);

        filter.bind();
        filter.unbind();
        assert_eq!(filter.bind_state(), BindState::Unbound);
        assert!(filter.is_initialized());

        let scaled = Mat4::scale(2.0, 2.0, 1.0);
        filter.set_transform(scaled);
        filter.bind();

        let record = record.borrow();
        assert_eq!(record.build_calls, 1);
        assert_eq!(record.activations, 2);
        assert_eq!(record.transforms, vec![Mat4::IDENTITY, scaled]);
    }

    #[test]
    fn test_unbind_without_bind_is_harmless() {
        let (backend, record) = MockBackend::legacy();
        let mut filter = VideoFilter::new(backend, BasicVideoFilter);
        filter.unbind();
        filter.unbind();

        assert_eq!(filter.bind_state(), BindState::Unbound);
        assert_eq!(record.borrow().build_calls, 0);
    }

    #[test]
    fn test_missing_source_is_skipped() {
        let (backend, record) = MockBackend::legacy();
        let mut filter = VideoFilter::new(backend, NoFragment);

        filter.initialize();
        filter.bind();

        assert_eq!(filter.lifecycle(), LifecycleState::Uninitialized);
        assert!(filter.pipeline().is_none());
        let record = record.borrow();
        assert_eq!(record.pipelines_built, 0);
        assert_eq!(record.activations, 0);
        assert!(record.transforms.is_empty());
    }

    #[test]
    fn test_gl3_dialect_builds_nothing() {
        let (backend, record) = MockBackend::new(Mode::Legacy(GlslDialect::Gl3));
        let mut filter = VideoFilter::new(backend, AnyDialect);

        filter.initialize();
        filter.bind();

        assert_eq!(filter.lifecycle(), LifecycleState::Uninitialized);
        assert!(filter.pipeline().is_none());
        let record = record.borrow();
        assert_eq!(record.pipelines_built, 0);
        assert_eq!(record.activations, 0);
    }

    #[test]
    fn test_supported_dialect_builds_any_source() {
        let (backend, record) = MockBackend::new(Mode::Legacy(GlslDialect::Gl2));
        let mut filter = VideoFilter::new(backend, AnyDialect);

        filter.initialize();

        assert_eq!(filter.lifecycle(), LifecycleState::Initialized);
        assert_eq!(record.borrow().pipelines_built, 1);
    }

    #[test]
    fn test_unresolved_function_is_reported() {
        let (backend, _record) = MockBackend::modern();
        let mut filter = VideoFilter::new(backend, Misnamed);

        let err = filter.try_initialize().unwrap_err();
        assert!(matches!(err, FilterError::FunctionNotFound { stage: "fragment", .. }));
        assert_eq!(filter.lifecycle(), LifecycleState::Uninitialized);
    }

    #[test]
    #[should_panic(expected = "cannot build its pipeline")]
    fn test_unresolved_function_halts_construction() {
        let (backend, _record) = MockBackend::modern();
        let _filter = VideoFilter::build(backend, Misnamed);
    }

    #[test]
    #[should_panic(expected = "not found")]
    fn test_missing_library_halts_bind() {
        struct Elsewhere;
        impl ShaderSource for Elsewhere {
            fn library(&self) -> &str {
                "effects"
            }
        }

        let (backend, _record) = MockBackend::modern();
        let mut filter = VideoFilter::new(backend, Elsewhere);
        filter.bind();
    }

    #[test]
    fn test_render_encodes_current_transform() {
        let (backend, record) = MockBackend::modern();
        let mut filter = VideoFilter::build(backend, BasicVideoFilter);
        let t = Mat4::translation(1.0, 2.0, 3.0);
        filter.set_transform(t);

        let mut encoder = Vec::new();
        filter.bind();
        filter.render(&mut encoder);
        filter.render(&mut encoder);

        assert_eq!(encoder, vec![1, 1]);
        assert_eq!(record.borrow().encoded, vec![(1, t), (1, t)]);
    }

    #[test]
    fn test_render_without_pipeline_is_noop() {
        let (backend, record) = MockBackend::legacy();
        let mut filter = VideoFilter::new(backend, NoFragment);

        let mut encoder = Vec::new();
        filter.render(&mut encoder);

        assert!(encoder.is_empty());
        assert!(record.borrow().encoded.is_empty());
    }

    #[test]
    fn test_drop_releases_once() {
        let (backend, record) = MockBackend::legacy();
        {
            let mut filter = VideoFilter::new(backend, BasicVideoFilter);
            filter.bind();
            filter.unbind();
            filter.bind();
            assert_eq!(record.borrow().live_pipelines(), 1);
        }

        let record = record.borrow();
        assert_eq!(record.released, vec![1]);
        assert_eq!(record.live_pipelines(), 0);
    }

    #[test]
    fn test_drop_uninitialized_releases_nothing() {
        let (backend, record) = MockBackend::legacy();
        drop(VideoFilter::new(backend, BasicVideoFilter));
        assert!(record.borrow().released.is_empty());
    }

    #[test]
    fn test_source_defaults_seed_filter_state() {
        let (backend, record) = MockBackend::modern();
        let mut filter = VideoFilter::new(backend, FlipVideoFilter);
        assert_eq!(filter.name(), "flip");

        filter.bind();
        assert_eq!(record.borrow().transforms, vec![Mat4::scale(1.0, -1.0, 1.0)]);

        filter.set_dimensions(Size::new(1280.0, 720.0));
        assert_eq!(filter.dimensions(), Size::new(1280.0, 720.0));
    }
}

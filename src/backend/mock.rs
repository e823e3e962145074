//! Recording backend for lifecycle tests.

use super::FilterBackend;
use crate::error::FilterError;
use crate::math::Mat4;
use crate::shader::{GlslDialect, ShaderBundle, ShaderSource, Stage};
use std::cell::RefCell;
use std::rc::Rc;

/// Everything the backend was asked to do, shared with the test after the
/// filter is gone.
#[derive(Debug, Default)]
pub struct Record {
    pub build_calls: u32,
    pub pipelines_built: u32,
    pub activations: u32,
    pub transforms: Vec<Mat4>,
    pub encoded: Vec<(u32, Mat4)>,
    pub released: Vec<u32>,
}

impl Record {
    pub fn live_pipelines(&self) -> u32 {
        self.pipelines_built - self.released.len() as u32
    }
}

pub enum Mode {
    /// Builds from source text, like the GL backend.
    Legacy(GlslDialect),
    /// Resolves library functions, like the wgpu backend.
    Modern(ShaderBundle),
}

pub struct MockBackend {
    mode: Mode,
    record: Rc<RefCell<Record>>,
}

/// Pipeline handle carrying the build number.
#[derive(Debug)]
pub struct MockPipeline(pub u32);

impl MockBackend {
    pub fn new(mode: Mode) -> (Self, Rc<RefCell<Record>>) {
        let record = Rc::new(RefCell::new(Record::default()));
        (
            Self {
                mode,
                record: record.clone(),
            },
            record,
        )
    }

    pub fn legacy() -> (Self, Rc<RefCell<Record>>) {
        Self::new(Mode::Legacy(GlslDialect::Es2Es3))
    }

    pub fn modern() -> (Self, Rc<RefCell<Record>>) {
        Self::new(Mode::Modern(ShaderBundle::embedded()))
    }
}

impl FilterBackend for MockBackend {
    type Pipeline = MockPipeline;
    type Encoder<'e> = Vec<u32>;

    fn build(&mut self, source: &dyn ShaderSource) -> Result<Option<MockPipeline>, FilterError> {
        let mut record = self.record.borrow_mut();
        record.build_calls += 1;

        match &self.mode {
            Mode::Legacy(dialect) => {
                if !dialect.is_supported() {
                    return Ok(None);
                }
                let vertex = source.vertex_source(*dialect);
                let fragment = source.fragment_source(*dialect);
                if vertex.is_none() || fragment.is_none() {
                    return Ok(None);
                }
            }
            Mode::Modern(bundle) => {
                let library = bundle.load(source.library())?;
                library.resolve(source.vertex_function(), Stage::Vertex)?;
                library.resolve(source.fragment_function(), Stage::Fragment)?;
            }
        }

        record.pipelines_built += 1;
        Ok(Some(MockPipeline(record.pipelines_built)))
    }

    fn activate(&mut self, _pipeline: &MockPipeline) {
        self.record.borrow_mut().activations += 1;
    }

    fn push_transform(&mut self, _pipeline: &MockPipeline, transform: &Mat4) {
        self.record.borrow_mut().transforms.push(*transform);
    }

    fn encode(&mut self, pipeline: &MockPipeline, encoder: &mut Vec<u32>, transform: &Mat4) {
        encoder.push(pipeline.0);
        self.record.borrow_mut().encoded.push((pipeline.0, *transform));
    }

    fn release(&mut self, pipeline: MockPipeline) {
        self.record.borrow_mut().released.push(pipeline.0);
    }
}

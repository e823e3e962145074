//! Legacy backend: GL/GLES shader programs through `glow`.
//!
//! The host must keep its GL context current on the calling thread, and have
//! the shared quad vertex buffer bound to `ARRAY_BUFFER` when a filter is
//! first bound, since the vertex array captures the attribute pointers then.
//!
//! Vertex arrays are core from GL 3.0 and GLES 3.0. Older contexts need
//! `GL_ARB_vertex_array_object` (desktop) or `GL_OES_vertex_array_object` (ES).

use super::FilterBackend;
use crate::config::FilterConfig;
use crate::error::FilterError;
use crate::frame::QuadVertex;
use crate::math::Mat4;
use crate::shader::{GlslDialect, ShaderSource};
use glow::HasContext;
use tracing::{debug, warn};

const ATTR_POSITION: &str = "aPos";
const ATTR_TEX_COORDS: &str = "aCoord";
const UNIFORM_TRANSFORM: &str = "uMat";
const UNIFORM_TEXTURE: &str = "uTex0";

/// Extension a context of this version needs for vertex arrays, if any.
fn vertex_array_extension(major: u32, is_embedded: bool) -> Option<&'static str> {
    match (major >= 3, is_embedded) {
        (true, _) => None,
        (false, false) => Some("GL_ARB_vertex_array_object"),
        (false, true) => Some("GL_OES_vertex_array_object"),
    }
}

pub struct GlBackend<'gl, C: HasContext> {
    gl: &'gl C,
    dialect: GlslDialect,
}

/// Linked program and the vertex array configured for it.
pub struct GlPipeline<C: HasContext> {
    program: C::Program,
    vertex_array: C::VertexArray,
    u_transform: Option<C::UniformLocation>,
}

impl<C: HasContext> GlPipeline<C> {
    pub fn program(&self) -> C::Program {
        self.program
    }

    pub fn vertex_array(&self) -> C::VertexArray {
        self.vertex_array
    }
}

impl<'gl, C: HasContext> GlBackend<'gl, C> {
    pub fn new(gl: &'gl C, dialect: GlslDialect) -> Self {
        Self { gl, dialect }
    }

    /// Uses the dialect matching the context version.
    pub fn negotiated(gl: &'gl C) -> Self {
        let dialect = GlslDialect::from_context(gl);
        debug!("Negotiated GLSL dialect {:?}", dialect);
        Self::new(gl, dialect)
    }

    pub fn from_config(gl: &'gl C, config: &FilterConfig) -> Self {
        match config.dialect {
            Some(dialect) => Self::new(gl, dialect),
            None => Self::negotiated(gl),
        }
    }

    pub fn dialect(&self) -> GlslDialect {
        self.dialect
    }
}

impl<'gl, C: HasContext> FilterBackend for GlBackend<'gl, C> {
    type Pipeline = GlPipeline<C>;
    type Encoder<'e> = ();

    fn build(&mut self, source: &dyn ShaderSource) -> Result<Option<GlPipeline<C>>, FilterError> {
        if !self.dialect.is_supported() {
            debug!("Skipping `{}`: {:?} programs are not built", source.name(), self.dialect);
            return Ok(None);
        }

        let (Some(vertex), Some(fragment)) =
            (source.vertex_source(self.dialect), source.fragment_source(self.dialect))
        else {
            debug!("Skipping `{}`: shader source unavailable", source.name());
            return Ok(None);
        };

        let gl = self.gl;
        let version = gl.version();
        if let Some(extension) = vertex_array_extension(version.major, version.is_embedded) {
            if !gl.supported_extensions().contains(extension) {
                return Err(FilterError::MissingExtension(extension));
            }
        }

        let mut pending = PendingProgram::create(gl)?;
        pending.compile(glow::VERTEX_SHADER, "vertex", &vertex)?;
        pending.compile(glow::FRAGMENT_SHADER, "fragment", &fragment)?;
        pending.link()?;
        let program = pending.program;

        unsafe {
            let vertex_array = gl.create_vertex_array().map_err(FilterError::Allocation)?;
            gl.use_program(Some(program));
            gl.bind_vertex_array(Some(vertex_array));

            let u_transform = gl.get_uniform_location(program, UNIFORM_TRANSFORM);
            if u_transform.is_none() {
                warn!(
                    "`{}` has no `{}` uniform; transforms are ignored",
                    source.name(),
                    UNIFORM_TRANSFORM
                );
            }
            let u_texture = gl.get_uniform_location(program, UNIFORM_TEXTURE);
            gl.uniform_1_i32(u_texture.as_ref(), 0);

            for (attribute, offset) in [
                (ATTR_POSITION, QuadVertex::POSITION_OFFSET),
                (ATTR_TEX_COORDS, QuadVertex::TEX_COORDS_OFFSET),
            ] {
                match gl.get_attrib_location(program, attribute) {
                    Some(index) => {
                        gl.enable_vertex_attrib_array(index);
                        gl.vertex_attrib_pointer_f32(
                            index,
                            QuadVertex::COMPONENTS,
                            glow::FLOAT,
                            false,
                            QuadVertex::STRIDE,
                            offset,
                        );
                    }
                    None => warn!("`{}` has no `{}` attribute", source.name(), attribute),
                }
            }

            pending.keep();
            debug!("Built GL program for `{}` ({:?})", source.name(), self.dialect);
            Ok(Some(GlPipeline {
                program,
                vertex_array,
                u_transform,
            }))
        }
    }

    fn activate(&mut self, pipeline: &GlPipeline<C>) {
        unsafe {
            self.gl.use_program(Some(pipeline.program));
            self.gl.bind_vertex_array(Some(pipeline.vertex_array));
        }
    }

    fn push_transform(&mut self, pipeline: &GlPipeline<C>, transform: &Mat4) {
        unsafe {
            self.gl.uniform_matrix_4_f32_slice(
                pipeline.u_transform.as_ref(),
                false,
                transform.as_slice(),
            );
        }
    }

    // Draws are issued by the compositor against the bound program.
    fn encode(&mut self, _pipeline: &GlPipeline<C>, _encoder: &mut (), _transform: &Mat4) {}

    fn release(&mut self, pipeline: GlPipeline<C>) {
        unsafe {
            self.gl.delete_program(pipeline.program);
            self.gl.delete_vertex_array(pipeline.vertex_array);
        }
    }
}

/// Program and shader object calls made while a program is assembled.
///
/// The context must be current on the calling thread.
trait ProgramObjects {
    type Program: Copy;
    type Shader: Copy;

    fn new_program(&self) -> Result<Self::Program, String>;
    fn new_shader(&self, shader_type: u32) -> Result<Self::Shader, String>;
    /// Compiles `source` into `shader`, returning the info log on failure.
    fn compile_source(&self, shader: Self::Shader, source: &str) -> Result<(), String>;
    fn attach(&self, program: Self::Program, shader: Self::Shader);
    fn detach(&self, program: Self::Program, shader: Self::Shader);
    /// Links `program`, returning the info log on failure.
    fn link(&self, program: Self::Program) -> Result<(), String>;
    fn remove_shader(&self, shader: Self::Shader);
    fn remove_program(&self, program: Self::Program);
}

impl<C: HasContext> ProgramObjects for C {
    type Program = C::Program;
    type Shader = C::Shader;

    fn new_program(&self) -> Result<C::Program, String> {
        unsafe { self.create_program() }
    }

    fn new_shader(&self, shader_type: u32) -> Result<C::Shader, String> {
        unsafe { self.create_shader(shader_type) }
    }

    fn compile_source(&self, shader: C::Shader, source: &str) -> Result<(), String> {
        unsafe {
            self.shader_source(shader, source);
            self.compile_shader(shader);
            if self.get_shader_compile_status(shader) {
                Ok(())
            } else {
                Err(self.get_shader_info_log(shader))
            }
        }
    }

    fn attach(&self, program: C::Program, shader: C::Shader) {
        unsafe { self.attach_shader(program, shader) }
    }

    fn detach(&self, program: C::Program, shader: C::Shader) {
        unsafe { self.detach_shader(program, shader) }
    }

    fn link(&self, program: C::Program) -> Result<(), String> {
        unsafe {
            self.link_program(program);
            if self.get_program_link_status(program) {
                Ok(())
            } else {
                Err(self.get_program_info_log(program))
            }
        }
    }

    fn remove_shader(&self, shader: C::Shader) {
        unsafe { self.delete_shader(shader) }
    }

    fn remove_program(&self, program: C::Program) {
        unsafe { self.delete_program(program) }
    }
}

/// Program under construction. Shader objects are always detached and
/// deleted on drop; the program too unless [`keep`](Self::keep) was called.
struct PendingProgram<'gl, G: ProgramObjects> {
    gl: &'gl G,
    program: G::Program,
    shaders: Vec<G::Shader>,
    keep: bool,
}

impl<'gl, G: ProgramObjects> PendingProgram<'gl, G> {
    fn create(gl: &'gl G) -> Result<Self, FilterError> {
        let program = gl.new_program().map_err(FilterError::Allocation)?;
        Ok(Self {
            gl,
            program,
            shaders: Vec::with_capacity(2),
            keep: false,
        })
    }

    fn compile(
        &mut self,
        shader_type: u32,
        stage: &'static str,
        source: &str,
    ) -> Result<(), FilterError> {
        let shader = self.gl.new_shader(shader_type).map_err(FilterError::Allocation)?;
        if let Err(log) = self.gl.compile_source(shader, source) {
            self.gl.remove_shader(shader);
            return Err(FilterError::ShaderCompile { stage, log });
        }

        self.gl.attach(self.program, shader);
        self.shaders.push(shader);
        Ok(())
    }

    fn link(&mut self) -> Result<(), FilterError> {
        self.gl.link(self.program).map_err(FilterError::ProgramLink)
    }

    fn keep(&mut self) {
        self.keep = true;
    }
}

impl<G: ProgramObjects> Drop for PendingProgram<'_, G> {
    fn drop(&mut self) {
        for shader in self.shaders.drain(..) {
            self.gl.detach(self.program, shader);
            self.gl.remove_shader(shader);
        }
        if !self.keep {
            self.gl.remove_program(self.program);
        }
    }
}

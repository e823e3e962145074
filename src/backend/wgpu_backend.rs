//! Modern backend: explicit pipeline-state objects through `wgpu`.

use super::FilterBackend;
use crate::config::FilterConfig;
use crate::error::FilterError;
use crate::frame::QuadVertex;
use crate::math::Mat4;
use crate::shader::{ShaderBundle, ShaderSource, Stage};
use std::borrow::Cow;
use std::cell::Cell;
use tracing::debug;
use wgpu::util::DeviceExt;

/// Color attachment format of every filter pipeline.
pub const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Bgra8Unorm;

/// Bind group slot of the frame texture and sampler, set by the compositor.
pub const FRAME_SLOT: u32 = 0;

/// Bind group slot of the transform, set by the filter.
pub const TRANSFORM_SLOT: u32 = 1;

/// Payloads uploaded inline by default are strictly smaller than this many bytes.
pub const INLINE_UPLOAD_LIMIT: usize = 4096;

/// Transform slots in a pipeline's inline ring.
///
/// Every inline draw takes the next slot, so one submission can hold this
/// many draws of a filter before a slot is reused.
pub const INLINE_RING_SLOTS: u64 = 256;

const TRANSFORM_SIZE: wgpu::BufferAddress = std::mem::size_of::<Mat4>() as wgpu::BufferAddress;

/// How the transform reaches the shader on each render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformUpload {
    /// Written into the next slot of the pipeline's ring buffer and bound
    /// at that slot's dynamic offset.
    Inline,
    /// Copied into a uniform buffer allocated for the draw.
    Allocated,
}

/// Upload capabilities of the host device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadCaps {
    pub inline: bool,
    pub inline_limit: usize,
}

impl Default for UploadCaps {
    fn default() -> Self {
        Self {
            inline: true,
            inline_limit: INLINE_UPLOAD_LIMIT,
        }
    }
}

impl UploadCaps {
    pub fn select(&self, payload: usize) -> TransformUpload {
        if self.inline && payload < self.inline_limit {
            TransformUpload::Inline
        } else {
            TransformUpload::Allocated
        }
    }
}

pub struct WgpuBackend<'d> {
    device: &'d wgpu::Device,
    queue: &'d wgpu::Queue,
    bundle: ShaderBundle,
    caps: UploadCaps,
}

/// Render pipeline plus the layouts and transform storage it was built with.
pub struct WgpuPipeline {
    pipeline: wgpu::RenderPipeline,
    frame_layout: wgpu::BindGroupLayout,
    transform_layout: wgpu::BindGroupLayout,
    ring_buffer: wgpu::Buffer,
    ring_bind_group: wgpu::BindGroup,
    ring_stride: wgpu::BufferAddress,
    ring_cursor: Cell<u64>,
    upload: TransformUpload,
}

impl WgpuPipeline {
    pub fn render_pipeline(&self) -> &wgpu::RenderPipeline {
        &self.pipeline
    }

    /// Layout the compositor's frame bind group must match.
    pub fn frame_layout(&self) -> &wgpu::BindGroupLayout {
        &self.frame_layout
    }

    pub fn upload(&self) -> TransformUpload {
        self.upload
    }

    /// Byte offset of the next inline transform; advances the ring.
    fn next_ring_offset(&self) -> wgpu::BufferAddress {
        let slot = self.ring_cursor.get();
        self.ring_cursor.set((slot + 1) % INLINE_RING_SLOTS);
        slot * self.ring_stride
    }
}

impl<'d> WgpuBackend<'d> {
    pub fn new(device: &'d wgpu::Device, queue: &'d wgpu::Queue, bundle: ShaderBundle) -> Self {
        Self {
            device,
            queue,
            bundle,
            caps: UploadCaps::default(),
        }
    }

    pub fn from_config(
        device: &'d wgpu::Device,
        queue: &'d wgpu::Queue,
        config: &FilterConfig,
    ) -> Self {
        Self::new(device, queue, config.bundle()).with_upload_caps(config.upload_caps())
    }

    pub fn with_upload_caps(mut self, caps: UploadCaps) -> Self {
        self.caps = caps;
        self
    }

    pub fn bundle(&self) -> &ShaderBundle {
        &self.bundle
    }

    fn transform_bind_group(
        &self,
        layout: &wgpu::BindGroupLayout,
        buffer: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Transform Bind Group"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(TRANSFORM_SIZE),
                }),
            }],
        })
    }
}

impl<'d> FilterBackend for WgpuBackend<'d> {
    type Pipeline = WgpuPipeline;
    type Encoder<'e> = wgpu::RenderPass<'e>;

    fn build(&mut self, source: &dyn ShaderSource) -> Result<Option<WgpuPipeline>, FilterError> {
        let library = self.bundle.load(source.library())?;
        let vertex_entry = library.resolve(source.vertex_function(), Stage::Vertex)?;
        let fragment_entry = library.resolve(source.fragment_function(), Stage::Fragment)?;

        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(library.name()),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(library.source())),
        });

        let frame_layout = self.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Frame Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let transform_layout =
            self.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Transform Bind Group Layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: wgpu::BufferSize::new(TRANSFORM_SIZE),
                    },
                    count: None,
                }],
            });

        let pipeline_layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Filter Pipeline Layout"),
            bind_group_layouts: &[&frame_layout, &transform_layout],
            immediate_size: 0,
        });

        let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: source.pipeline_label(),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &module,
                entry_point: Some(vertex_entry),
                buffers: &[QuadVertex::layout()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &module,
                entry_point: Some(fragment_entry),
                targets: &[Some(wgpu::ColorTargetState {
                    format: TARGET_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        let alignment = self.device.limits().min_uniform_buffer_offset_alignment;
        let ring_stride = wgpu::util::align_to(TRANSFORM_SIZE, alignment as wgpu::BufferAddress);
        let ring_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Transform Ring Buffer"),
            size: ring_stride * INLINE_RING_SLOTS,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let ring_bind_group = self.transform_bind_group(&transform_layout, &ring_buffer);

        let upload = self.caps.select(std::mem::size_of::<Mat4>());
        debug!(
            "Built pipeline for `{}` ({}::{} / {}, transform upload {:?})",
            source.name(),
            library.name(),
            vertex_entry,
            fragment_entry,
            upload
        );

        Ok(Some(WgpuPipeline {
            pipeline,
            frame_layout,
            transform_layout,
            ring_buffer,
            ring_bind_group,
            ring_stride,
            ring_cursor: Cell::new(0),
            upload,
        }))
    }

    // Pipeline state is set on the pass at render time.
    fn activate(&mut self, _pipeline: &WgpuPipeline) {}

    fn push_transform(&mut self, _pipeline: &WgpuPipeline, _transform: &Mat4) {}

    fn encode(
        &mut self,
        pipeline: &WgpuPipeline,
        pass: &mut wgpu::RenderPass<'_>,
        transform: &Mat4,
    ) {
        pass.set_pipeline(&pipeline.pipeline);

        match pipeline.upload {
            TransformUpload::Inline => {
                // Queue writes land before the submission runs; one slot per draw.
                let offset = pipeline.next_ring_offset();
                self.queue.write_buffer(&pipeline.ring_buffer, offset, transform.as_bytes());
                let dynamic_offset = offset as wgpu::DynamicOffset;
                pass.set_bind_group(TRANSFORM_SLOT, &pipeline.ring_bind_group, &[dynamic_offset]);
            }
            TransformUpload::Allocated => {
                let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Transform Upload Buffer"),
                    contents: transform.as_bytes(),
                    usage: wgpu::BufferUsages::UNIFORM,
                });
                let bind_group = self.transform_bind_group(&pipeline.transform_layout, &buffer);
                pass.set_bind_group(TRANSFORM_SLOT, &bind_group, &[0]);
            }
        }
    }

    fn release(&mut self, pipeline: WgpuPipeline) {
        pipeline.ring_buffer.destroy();
        drop(pipeline);
    }
}

//! framefilter: renders a synthetic frame through a filter on a headless device.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, ValueEnum};
use framefilter::backend::{WgpuBackend, FRAME_SLOT, TARGET_FORMAT};
use framefilter::config::BackendKind;
use framefilter::frame::{PixelFormat, QuadVertex, VideoFrame};
use framefilter::shader::{BasicVideoFilter, FlipVideoFilter, GpuContext, ShaderSource};
use framefilter::utils::FpsCounter;
use framefilter::{FilterConfig, Size, VideoFilter};
use std::path::PathBuf;
use tracing::info;
use wgpu::util::DeviceExt;

/// Filters available from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FilterKind {
    /// Passthrough
    Basic,
    /// Vertical mirror
    Flip,
}

/// Render a test frame through a GPU filter.
#[derive(Parser, Debug)]
#[command(name = "framefilter")]
#[command(about = "Render a synthetic video frame through a GPU filter pipeline")]
struct Args {
    /// Path to a YAML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Filter to apply
    #[arg(short, long, value_enum, default_value = "basic")]
    filter: FilterKind,

    /// Frame width
    #[arg(long, default_value = "640")]
    width: u32,

    /// Frame height
    #[arg(long, default_value = "360")]
    height: u32,

    /// Number of frames to render
    #[arg(long, default_value = "120")]
    frames: u32,

    /// Write the last rendered frame to this image file
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => FilterConfig::load(path)?,
        None => FilterConfig::default(),
    };

    if config.backend == BackendKind::Legacy {
        bail!("the legacy backend needs a host GL context; use it through the library");
    }
    if args.width == 0 || args.height == 0 || args.frames == 0 {
        bail!("width, height and frames must be non-zero");
    }

    let ctx = GpuContext::headless()?;
    info!("Using adapter {:?}", ctx.adapter.get_info().name);

    let frame = match args.filter {
        FilterKind::Basic => run(&ctx, &config, &args, BasicVideoFilter)?,
        FilterKind::Flip => run(&ctx, &config, &args, FlipVideoFilter)?,
    };

    if let Some(path) = &args.output {
        let rgba = frame.to_rgba();
        let image = image::RgbaImage::from_raw(rgba.width, rgba.height, rgba.data)
            .ok_or_else(|| anyhow!("rendered frame has the wrong size"))?;
        image
            .save(path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!("Wrote {}", path.display());
    }

    Ok(())
}

/// Channel value `pos` of the way along `extent`.
fn ramp(pos: usize, extent: usize) -> u8 {
    (pos as u64 * 255 / extent as u64) as u8
}

/// Synthetic BGRA gradient.
fn test_pattern(width: u32, height: u32) -> VideoFrame {
    let mut frame = VideoFrame::new(width, height, PixelFormat::Bgra);
    let (w, h) = (width as usize, height as usize);
    for (i, pixel) in frame.data.chunks_exact_mut(4).enumerate() {
        pixel[0] = ramp(i % w, w);
        pixel[1] = ramp(i / w, h);
        pixel[2] = 128;
        pixel[3] = 255;
    }
    frame
}

fn run<S: ShaderSource>(
    ctx: &GpuContext,
    config: &FilterConfig,
    args: &Args,
    source: S,
) -> Result<VideoFrame> {
    let (width, height) = (args.width, args.height);
    let device = &ctx.device;
    let queue = &ctx.queue;

    let backend = WgpuBackend::from_config(device, queue, config);
    let mut filter = VideoFilter::new(backend, source);
    filter.try_initialize()?;
    filter.set_dimensions(Size::new(width as f32, height as f32));
    let pipeline = filter
        .pipeline()
        .ok_or_else(|| anyhow!("filter `{}` has nothing to build", filter.name()))?;

    let extent = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let unpadded_row = width
        .checked_mul(4)
        .ok_or_else(|| anyhow!("width {} is too large", width))?;
    let input = test_pattern(width, height);
    let input_texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Input Texture"),
        size: extent,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Bgra8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &input_texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &input.data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(unpadded_row),
            rows_per_image: Some(height),
        },
        extent,
    );

    let output_texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Output Texture"),
        size: extent,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: TARGET_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });

    let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("Frame Sampler"),
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    });
    let input_view = input_texture.create_view(&wgpu::TextureViewDescriptor::default());
    let output_view = output_texture.create_view(&wgpu::TextureViewDescriptor::default());
    let frame_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Frame Bind Group"),
        layout: pipeline.frame_layout(),
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&input_view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&sampler),
            },
        ],
    });

    let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Vertex Buffer"),
        contents: bytemuck::cast_slice(QuadVertex::VERTICES),
        usage: wgpu::BufferUsages::VERTEX,
    });
    let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Index Buffer"),
        contents: bytemuck::cast_slice(QuadVertex::INDICES),
        usage: wgpu::BufferUsages::INDEX,
    });

    // Copies need 256-byte aligned rows.
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded_row = unpadded_row.div_ceil(align) * align;
    let readback_buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Readback Buffer"),
        size: padded_row as wgpu::BufferAddress * height as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut fps = FpsCounter::new();
    for frame_index in 0..args.frames {
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Filter Encoder"),
        });

        filter.bind();
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Filter Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &output_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            filter.render(&mut render_pass);
            render_pass.set_bind_group(FRAME_SLOT, &frame_bind_group, &[]);
            render_pass.set_vertex_buffer(0, vertex_buffer.slice(..));
            render_pass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint16);
            render_pass.draw_indexed(0..QuadVertex::INDICES.len() as u32, 0, 0..1);
        }
        filter.unbind();

        if frame_index + 1 == args.frames {
            encoder.copy_texture_to_buffer(
                wgpu::TexelCopyTextureInfo {
                    texture: &output_texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                wgpu::TexelCopyBufferInfo {
                    buffer: &readback_buffer,
                    layout: wgpu::TexelCopyBufferLayout {
                        offset: 0,
                        bytes_per_row: Some(padded_row),
                        rows_per_image: Some(height),
                    },
                },
                extent,
            );
        }

        queue.submit(std::iter::once(encoder.finish()));
        if let Some(rate) = fps.update() {
            info!("[Perf] `{}` at {:.2} FPS ({}x{})", filter.name(), rate, width, height);
        }
    }

    let buffer_slice = readback_buffer.slice(..);
    let (sender, receiver) = std::sync::mpsc::channel();
    buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    device.poll(wgpu::PollType::Wait {
        submission_index: None,
        timeout: None,
    })?;
    receiver.recv()??;

    let mut data = Vec::with_capacity(unpadded_row as usize * height as usize);
    {
        let mapped = buffer_slice.get_mapped_range();
        for row in mapped.chunks_exact(padded_row as usize) {
            data.extend_from_slice(&row[..unpadded_row as usize]);
        }
    }
    readback_buffer.unmap();

    info!("Rendered {} frames through `{}`", fps.total_frames(), filter.name());
    Ok(VideoFrame::from_data(width, height, PixelFormat::Bgra, data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ramp_spans_extent() {
        assert_eq!(ramp(0, 640), 0);
        assert_eq!(ramp(639, 640), 254);
        // Positions past u32 range once scaled by 255.
        assert_eq!(ramp(20_000_000, 20_000_001), 254);
        assert_eq!(ramp(10_000_000, 20_000_000), 127);
    }

    #[test]
    fn test_pattern_layout() {
        let frame = test_pattern(4, 2);
        assert_eq!(frame.data.len(), 4 * 2 * 4);
        assert_eq!(&frame.data[..4], &[0, 0, 128, 255]);
        // Last pixel: x = 3 of 4, y = 1 of 2.
        assert_eq!(&frame.data[28..], &[191, 127, 128, 255]);
    }
}

//! Frame and vertex layout types.

use bytemuck::{Pod, Zeroable};

/// Pixel formats the filters read and write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// RGBA with 8 bits per channel
    Rgba,
    /// BGRA with 8 bits per channel, the color attachment format of every filter pipeline
    Bgra,
}

impl PixelFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        4
    }
}

/// A video frame containing image data.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Pixel format of the frame data
    pub format: PixelFormat,
    /// Raw pixel data, tightly packed rows
    pub data: Vec<u8>,
}

impl VideoFrame {
    /// Creates a new zeroed video frame with the given dimensions and format.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        let size = (width as usize) * (height as usize) * format.bytes_per_pixel();
        Self {
            width,
            height,
            format,
            data: vec![0; size],
        }
    }

    /// Creates a video frame from existing data.
    pub fn from_data(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            format,
            data,
        }
    }

    /// Converts this frame to RGBA format.
    pub fn to_rgba(&self) -> VideoFrame {
        match self.format {
            PixelFormat::Rgba => self.clone(),
            PixelFormat::Bgra => {
                let mut data = self.data.clone();
                for px in data.chunks_exact_mut(4) {
                    px.swap(0, 2);
                }
                VideoFrame::from_data(self.width, self.height, PixelFormat::Rgba, data)
            }
        }
    }
}

/// Vertex of the full-frame quad every filter draws.
///
/// The legacy backend configures its attribute pointers from the constants
/// below, the modern backend from [`QuadVertex::layout`]; both describe the
/// same buffer.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 2],
    pub tex_coords: [f32; 2],
}

impl QuadVertex {
    /// Components per attribute (both attributes are vec2).
    pub const COMPONENTS: i32 = 2;
    /// Byte distance between consecutive vertices.
    pub const STRIDE: i32 = std::mem::size_of::<QuadVertex>() as i32;
    pub const POSITION_OFFSET: i32 = 0;
    pub const TEX_COORDS_OFFSET: i32 = std::mem::size_of::<[f32; 2]>() as i32;

    /// Vertices for a full-screen quad.
    pub const VERTICES: &'static [QuadVertex] = &[
        QuadVertex { position: [-1.0, -1.0], tex_coords: [0.0, 1.0] },
        QuadVertex { position: [1.0, -1.0], tex_coords: [1.0, 1.0] },
        QuadVertex { position: [1.0, 1.0], tex_coords: [1.0, 0.0] },
        QuadVertex { position: [-1.0, 1.0], tex_coords: [0.0, 0.0] },
    ];

    /// Indices for the quad (two triangles).
    pub const INDICES: &'static [u16] = &[0, 1, 2, 2, 3, 0];

    /// Returns the vertex buffer layout.
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: Self::STRIDE as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: Self::POSITION_OFFSET as wgpu::BufferAddress,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: Self::TEX_COORDS_OFFSET as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

//! Renderer: wgpu device setup and the GPU texture backend.
//! wgpu = 29.x

use std::collections::HashMap;

use asset::{
    CubeFace, ImageBuffer, PixelFormat, SamplerDesc, TextureBackend,
    texture::{FilterMode, WrapMode, mip_level_count},
};
use corelib::{AssetError, AssetResult};
use parking_lot::Mutex;
use thiserror::Error;
use wgpu::{
    Backends, Device, DeviceDescriptor, Extent3d, Features, Instance, InstanceDescriptor, Limits,
    Origin3d, PowerPreference, Queue, Sampler, SamplerDescriptor, TexelCopyBufferLayout,
    TexelCopyTextureInfo, Texture, TextureAspect, TextureDescriptor, TextureDimension,
    TextureFormat, TextureUsages, TextureView, TextureViewDescriptor, TextureViewDimension,
};

pub mod pixels;

use pixels::{MipLevel, build_levels, expand_to_rgba, texture_format};

/// Cube maps are always stored as RGBA8; faces may arrive in any format.
const CUBE_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;

#[derive(Debug, Error)]
pub enum GpuInitError {
    #[error("No suitable GPU adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),
    #[error("request_device failed: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
}

/// A sampleable texture with its view and sampler.
#[derive(Debug)]
pub struct GpuTexture {
    pub texture: Texture,
    pub view: TextureView,
    pub sampler: Sampler,
    pub format: TextureFormat,
    pub width: u32,
    pub height: u32,
    pub mip_level_count: u32,
}

/// Cube map whose faces are still being uploaded.
#[derive(Debug)]
pub struct GpuCubeBuilder {
    texture: Texture,
    label: String,
    face_size: u32,
}

pub struct WgpuBackend {
    device: Device,
    queue: Queue,
    adapter_name: String,
    samplers: Mutex<HashMap<SamplerDesc, Sampler>>,
}

impl WgpuBackend {
    /// Open a device without a surface; textures can be created before (or
    /// without) any window.
    pub async fn new(backends: Backends) -> Result<Self, GpuInitError> {
        let instance = Instance::new(InstanceDescriptor {
            backends,
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: Default::default(),
            backend_options: Default::default(),
            display: None,
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await?;
        let info = adapter.get_info();
        log::info!("Using adapter \"{}\" ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(&DeviceDescriptor {
                label: Some("Kiln Device"),
                required_features: Features::empty(),
                required_limits: Limits::downlevel_webgl2_defaults().using_resolution(adapter.limits()),
                memory_hints: Default::default(),
                trace: Default::default(),
                experimental_features: Default::default(),
            })
            .await?;

        Ok(Self::from_parts(device, queue, info.name))
    }

    pub fn new_blocking(backends: Backends) -> Result<Self, GpuInitError> {
        pollster::block_on(Self::new(backends))
    }

    /// Wrap a device owned by an existing renderer.
    pub fn from_parts(device: Device, queue: Queue, adapter_name: impl Into<String>) -> Self {
        Self {
            device,
            queue,
            adapter_name: adapter_name.into(),
            samplers: Mutex::new(HashMap::new()),
        }
    }

    #[inline]
    pub fn device(&self) -> &Device {
        &self.device
    }

    #[inline]
    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    fn check_size(&self, label: &str, width: u32, height: u32) -> AssetResult<()> {
        let max = self.device.limits().max_texture_dimension_2d;
        if width > max || height > max {
            return Err(AssetError::Backend(format!(
                "texture \"{label}\" is {width}x{height}, device limit is {max}"
            )));
        }
        Ok(())
    }

    fn write_level(&self, texture: &Texture, mip_level: u32, layer: u32, level: &MipLevel) {
        self.queue.write_texture(
            TexelCopyTextureInfo {
                texture,
                mip_level,
                origin: Origin3d { x: 0, y: 0, z: layer },
                aspect: TextureAspect::All,
            },
            &level.data,
            TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(level.bytes_per_row()),
                rows_per_image: Some(level.height),
            },
            Extent3d {
                width: level.width,
                height: level.height,
                depth_or_array_layers: 1,
            },
        );
    }

    fn sampler(&self, desc: SamplerDesc) -> Sampler {
        let mut samplers = self.samplers.lock();
        samplers
            .entry(desc)
            .or_insert_with(|| self.device.create_sampler(&sampler_descriptor(desc)))
            .clone()
    }
}

impl TextureBackend for WgpuBackend {
    type Texture = GpuTexture;
    type CubeBuilder = GpuCubeBuilder;

    fn create_texture_2d(
        &self,
        label: &str,
        image: ImageBuffer,
        format: PixelFormat,
        sampler: SamplerDesc,
    ) -> AssetResult<GpuTexture> {
        let (width, height) = (image.width, image.height);
        self.check_size(label, width, height)?;
        let mip_level_count = if sampler.has_mipmaps() {
            mip_level_count(width, height)
        } else {
            1
        };
        let levels = build_levels(label, image, format, mip_level_count)?;
        let format = texture_format(format);

        let texture = self.device.create_texture(&TextureDescriptor {
            label: Some(label),
            size: Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format,
            usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
            view_formats: &[],
        });
        for (mip, level) in levels.iter().enumerate() {
            self.write_level(&texture, mip as u32, 0, level);
        }
        // `levels` is dropped here; pixel data is never kept CPU-side.

        let view = texture.create_view(&TextureViewDescriptor::default());
        Ok(GpuTexture {
            texture,
            view,
            sampler: self.sampler(sampler),
            format,
            width,
            height,
            mip_level_count,
        })
    }

    fn begin_cube_map(&self, label: &str, face_size: u32) -> AssetResult<GpuCubeBuilder> {
        self.check_size(label, face_size, face_size)?;
        let texture = self.device.create_texture(&TextureDescriptor {
            label: Some(label),
            size: Extent3d {
                width: face_size,
                height: face_size,
                depth_or_array_layers: 6,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: CUBE_FORMAT,
            usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
            view_formats: &[],
        });
        Ok(GpuCubeBuilder {
            texture,
            label: label.to_owned(),
            face_size,
        })
    }

    fn write_cube_face(
        &self,
        cube: &mut GpuCubeBuilder,
        face: CubeFace,
        image: ImageBuffer,
        format: PixelFormat,
    ) -> AssetResult<()> {
        let label = format!("{} ({})", cube.label, face);
        let rgba = expand_to_rgba(&label, image, format)?;
        let level = MipLevel {
            width: cube.face_size,
            height: cube.face_size,
            bytes_per_pixel: 4,
            data: rgba.into_raw(),
        };
        self.write_level(&cube.texture, 0, face.index() as u32, &level);
        Ok(())
    }

    fn finish_cube_map(&self, cube: GpuCubeBuilder, sampler: SamplerDesc) -> GpuTexture {
        let view = cube.texture.create_view(&TextureViewDescriptor {
            label: Some(&cube.label),
            dimension: Some(TextureViewDimension::Cube),
            ..Default::default()
        });
        GpuTexture {
            view,
            sampler: self.sampler(sampler),
            format: CUBE_FORMAT,
            width: cube.face_size,
            height: cube.face_size,
            mip_level_count: 1,
            texture: cube.texture,
        }
    }

    fn discard_cube_map(&self, cube: GpuCubeBuilder) {
        log::debug!("Discarding partial cube map \"{}\"", cube.label);
        cube.texture.destroy();
    }
}

fn filter_mode(filter: FilterMode) -> wgpu::FilterMode {
    match filter {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    }
}

fn address_mode(wrap: WrapMode) -> wgpu::AddressMode {
    match wrap {
        WrapMode::Repeat => wgpu::AddressMode::Repeat,
        WrapMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
    }
}

fn sampler_descriptor(desc: SamplerDesc) -> SamplerDescriptor<'static> {
    let address = address_mode(desc.wrap);
    let mipmap_filter = match desc.mipmap_filter {
        Some(FilterMode::Linear) => wgpu::MipmapFilterMode::Linear,
        Some(FilterMode::Nearest) | None => wgpu::MipmapFilterMode::Nearest,
    };
    SamplerDescriptor {
        label: Some("Kiln sampler"),
        address_mode_u: address,
        address_mode_v: address,
        address_mode_w: address,
        mag_filter: filter_mode(desc.mag_filter),
        min_filter: filter_mode(desc.min_filter),
        mipmap_filter,
        ..Default::default()
    }
}

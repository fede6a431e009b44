//! [`Gpu`] implementation on wgpu.
//!
//! Commands for one frame accumulate in a single encoder between
//! `begin_frame` and `end_frame`. The swapchain texture is acquired lazily on
//! the first screen draw, so frames that only render offscreen never present.
//! Each draw gets its own small uniform buffer and bind group; queue writes to
//! a shared buffer would all land before the submit.

use wgpu::util::DeviceExt;

use crate::error::{Result, StageError};
use crate::gpu::{ColorFormat, DrawCall, Gpu, ProgramDesc, RenderTarget, TextureDesc};

pub struct WgpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

pub struct WgpuFramebuffer {
    view: wgpu::TextureView,
}

pub struct WgpuProgram {
    label: String,
    layout: wgpu::BindGroupLayout,
    offscreen: wgpu::RenderPipeline,
    screen: wgpu::RenderPipeline,
    texture_count: u32,
    uniform_size: u64,
}

struct FrameState {
    encoder: wgpu::CommandEncoder,
    screen: Option<(wgpu::SurfaceTexture, wgpu::TextureView)>,
}

pub struct WgpuGpu {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    float_color: bool,
    sampler: wgpu::Sampler,
    frame: Option<FrameState>,
    lost: bool,
}

/// Parses and validates WGSL, returning the diagnostic text on failure.
pub fn validate_wgsl(label: &str, source: &str) -> Result<naga::Module> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| StageError::ShaderCompile {
        label: label.to_string(),
        log: e.emit_to_string(source),
    })?;
    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::default(),
    )
    .validate(&module)
    .map_err(|e| StageError::ShaderCompile {
        label: label.to_string(),
        log: e.emit_to_string(source),
    })?;
    Ok(module)
}

impl WgpuGpu {
    pub async fn new(
        instance: &wgpu::Instance,
        surface: wgpu::Surface<'static>,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| StageError::GpuUnavailable("no compatible adapter".into()))?;
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::Performance,
                    label: Some("stage_device"),
                },
                None,
            )
            .await
            .map_err(|e| StageError::GpuUnavailable(format!("request_device error: {e:?}")))?;

        let half = adapter.get_texture_format_features(wgpu::TextureFormat::Rgba16Float);
        let float_color = half
            .allowed_usages
            .contains(wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING)
            && half
                .flags
                .contains(wgpu::TextureFormatFeatureFlags::FILTERABLE);

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| {
                matches!(
                    f,
                    wgpu::TextureFormat::Bgra8UnormSrgb | wgpu::TextureFormat::Rgba8UnormSrgb
                )
            })
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| StageError::GpuUnavailable("surface reports no formats".into()))?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("linear_clamp"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        log::info!(
            "[gpu] adapter={:?} surface={:?} float_color={}",
            adapter.get_info().name,
            format,
            float_color
        );

        Ok(Self {
            surface,
            device,
            queue,
            config,
            float_color,
            sampler,
            frame: None,
            lost: false,
        })
    }

    fn offscreen_format(&self) -> wgpu::TextureFormat {
        if self.float_color {
            wgpu::TextureFormat::Rgba16Float
        } else {
            wgpu::TextureFormat::Rgba8Unorm
        }
    }

    fn ensure_live(&self) -> Result<()> {
        if self.lost {
            Err(StageError::Disposed)
        } else {
            Ok(())
        }
    }

    fn make_pipeline(
        &self,
        label: &str,
        layout: &wgpu::PipelineLayout,
        shader: &wgpu::ShaderModule,
        format: wgpu::TextureFormat,
    ) -> wgpu::RenderPipeline {
        self.device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(layout),
                vertex: wgpu::VertexState {
                    module: shader,
                    entry_point: Some("vs_fullscreen"),
                    buffers: &[],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: shader,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                cache: None,
                multiview: None,
            })
    }
}

fn acquire_screen<'f>(
    surface: &wgpu::Surface<'static>,
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
    slot: &'f mut Option<(wgpu::SurfaceTexture, wgpu::TextureView)>,
) -> Result<&'f wgpu::TextureView> {
    if slot.is_none() {
        let frame = match surface.get_current_texture() {
            Ok(f) => f,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                surface.configure(device, config);
                surface
                    .get_current_texture()
                    .map_err(|e| StageError::Surface(e.to_string()))?
            }
            Err(e) => return Err(StageError::Surface(e.to_string())),
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        *slot = Some((frame, view));
    }
    match slot {
        Some((_, view)) => Ok(view),
        None => Err(StageError::Surface("no swapchain texture".into())),
    }
}

fn to_color(c: [f32; 4]) -> wgpu::Color {
    wgpu::Color {
        r: c[0] as f64,
        g: c[1] as f64,
        b: c[2] as f64,
        a: c[3] as f64,
    }
}

impl Gpu for WgpuGpu {
    type Texture = WgpuTexture;
    type Framebuffer = WgpuFramebuffer;
    type Program = WgpuProgram;

    fn supports_float_color(&self) -> bool {
        self.float_color
    }

    fn create_texture(&mut self, desc: &TextureDesc<'_>) -> Result<WgpuTexture> {
        self.ensure_live()?;
        let max = self.device.limits().max_texture_dimension_2d;
        if desc.width == 0 || desc.height == 0 || desc.width > max || desc.height > max {
            return Err(StageError::allocation(
                desc.label,
                format!("{}x{} outside 1..={max}", desc.width, desc.height),
            ));
        }
        let format = match desc.format {
            ColorFormat::Rgba16Float if self.float_color => wgpu::TextureFormat::Rgba16Float,
            _ => wgpu::TextureFormat::Rgba8Unorm,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(WgpuTexture { texture, view })
    }

    fn create_framebuffer(
        &mut self,
        label: &str,
        texture: &WgpuTexture,
    ) -> Result<WgpuFramebuffer> {
        self.ensure_live()?;
        let view = texture.texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(label),
            ..Default::default()
        });
        Ok(WgpuFramebuffer { view })
    }

    fn delete_texture(&mut self, texture: WgpuTexture) -> Result<()> {
        drop(texture.view);
        texture.texture.destroy();
        Ok(())
    }

    fn delete_framebuffer(&mut self, framebuffer: WgpuFramebuffer) -> Result<()> {
        drop(framebuffer);
        Ok(())
    }

    fn create_program(&mut self, desc: &ProgramDesc<'_>) -> Result<WgpuProgram> {
        self.ensure_live()?;
        validate_wgsl(desc.label, desc.source)?;
        let shader = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(desc.label),
                source: wgpu::ShaderSource::Wgsl(desc.source.into()),
            });

        let mut entries = vec![
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ];
        for i in 0..desc.texture_count {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: 2 + i,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                },
                count: None,
            });
        }
        let layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(desc.label),
                entries: &entries,
            });
        let pl = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(desc.label),
                bind_group_layouts: &[&layout],
                push_constant_ranges: &[],
            });
        let offscreen = self.make_pipeline(desc.label, &pl, &shader, self.offscreen_format());
        let screen = self.make_pipeline(desc.label, &pl, &shader, self.config.format);
        log::debug!("[gpu] program `{}` ready", desc.label);

        Ok(WgpuProgram {
            label: desc.label.to_string(),
            layout,
            offscreen,
            screen,
            texture_count: desc.texture_count,
            uniform_size: desc.uniform_size.max(16).next_multiple_of(16),
        })
    }

    fn delete_program(&mut self, program: WgpuProgram) -> Result<()> {
        log::debug!("[gpu] program `{}` released", program.label);
        Ok(())
    }

    fn surface_size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    fn resize_surface(&mut self, width: u32, height: u32) {
        let max = self.device.limits().max_texture_dimension_2d;
        let (w, h) = (width.clamp(1, max), height.clamp(1, max));
        if self.lost || (w, h) == (self.config.width, self.config.height) {
            return;
        }
        self.config.width = w;
        self.config.height = h;
        self.surface.configure(&self.device, &self.config);
    }

    fn begin_frame(&mut self) -> Result<()> {
        self.ensure_live()?;
        if self.frame.is_some() {
            // a frame that errored mid-way; drop its commands
            self.frame = None;
        }
        let encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("stage_frame"),
            });
        self.frame = Some(FrameState {
            encoder,
            screen: None,
        });
        Ok(())
    }

    fn clear(&mut self, target: RenderTarget<'_, Self>, color: [f32; 4]) -> Result<()> {
        self.ensure_live()?;
        let Self {
            surface,
            device,
            config,
            frame,
            ..
        } = self;
        let frame = frame
            .as_mut()
            .ok_or_else(|| StageError::Surface("clear outside of a frame".into()))?;
        let view = match target {
            RenderTarget::Screen => acquire_screen(surface, device, config, &mut frame.screen)?,
            RenderTarget::Offscreen(fb) => &fb.view,
        };
        let _pass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("clear"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(to_color(color)),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        Ok(())
    }

    fn draw(&mut self, call: &DrawCall<'_, Self>) -> Result<()> {
        self.ensure_live()?;
        let program = call.program;
        if call.textures.len() != program.texture_count as usize {
            return Err(StageError::allocation(
                call.label,
                format!(
                    "program `{}` expects {} textures, got {}",
                    program.label,
                    program.texture_count,
                    call.textures.len()
                ),
            ));
        }

        let mut bytes = call.uniforms.to_vec();
        bytes.resize(program.uniform_size.max(bytes.len() as u64) as usize, 0);
        bytes.resize(bytes.len().next_multiple_of(16), 0);
        let uniforms = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(call.label),
                contents: &bytes,
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let mut entries = vec![
            wgpu::BindGroupEntry {
                binding: 0,
                resource: uniforms.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(&self.sampler),
            },
        ];
        for (i, tex) in call.textures.iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: 2 + i as u32,
                resource: wgpu::BindingResource::TextureView(&tex.view),
            });
        }
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(call.label),
            layout: &program.layout,
            entries: &entries,
        });

        let Self {
            surface,
            device,
            config,
            frame,
            ..
        } = self;
        let frame = frame
            .as_mut()
            .ok_or_else(|| StageError::Surface("draw outside of a frame".into()))?;
        let (view, pipeline) = match call.target {
            RenderTarget::Screen => (
                acquire_screen(surface, device, config, &mut frame.screen)?,
                &program.screen,
            ),
            RenderTarget::Offscreen(fb) => (&fb.view, &program.offscreen),
        };
        let mut pass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(call.label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..3, 0..1);
        Ok(())
    }

    fn end_frame(&mut self) -> Result<()> {
        self.ensure_live()?;
        let Some(frame) = self.frame.take() else {
            return Ok(());
        };
        self.queue.submit(Some(frame.encoder.finish()));
        if let Some((texture, _view)) = frame.screen {
            texture.present();
        }
        Ok(())
    }

    fn lose_context(&mut self) {
        if self.lost {
            return;
        }
        self.frame = None;
        self.lost = true;
        self.device.destroy();
        log::info!("[gpu] context released");
    }
}

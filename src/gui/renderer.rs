//! Shows RGBA8 images in `winit` windows using `wgpu`.

use std::rc::Rc;

use anyhow::anyhow;
use wgpu::*;
use winit::{
    dpi::PhysicalSize,
    event_loop::EventLoopWindowTarget,
    window::{Window, WindowBuilder, WindowId},
};

use crate::image::Resolution;

const BACKGROUND: Color = Color::BLACK;

/// The graphics adapter and device shared by all windows.
pub struct Gpu {
    instance: Instance,
    adapter: Adapter,
    device: Device,
    queue: Queue,
}

impl Gpu {
    pub async fn open() -> anyhow::Result<Self> {
        // The OpenGL backend panics spuriously, so don't enable it.
        let backends = Backends::PRIMARY;
        let instance = Instance::new(InstanceDescriptor {
            backends,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&Default::default())
            .await
            .ok_or_else(|| anyhow!("no graphics adapter found"))?;
        let info = adapter.get_info();
        log::info!(
            "using graphics adapter {} ({:?}, {:?})",
            info.name,
            info.device_type,
            info.backend,
        );

        let (device, queue) = adapter
            .request_device(
                &DeviceDescriptor {
                    label: None,
                    features: Features::empty(),
                    // Camera frames can exceed the downlevel texture size limits.
                    limits: Limits::downlevel_defaults().using_resolution(adapter.limits()),
                },
                None,
            )
            .await?;

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
        })
    }
}

struct Texture {
    inner: wgpu::Texture,
    size: Extent3d,
}

impl Texture {
    const FORMAT: TextureFormat = TextureFormat::Rgba8UnormSrgb;

    fn new(gpu: &Gpu, size: Extent3d) -> Self {
        let inner = gpu.device.create_texture(&TextureDescriptor {
            label: Some("image"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: Self::FORMAT,
            usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
            view_formats: &[],
        });
        Self { inner, size }
    }

    fn write(&self, gpu: &Gpu, data: &[u8]) {
        gpu.queue.write_texture(
            ImageCopyTexture {
                texture: &self.inner,
                mip_level: 0,
                origin: Origin3d::default(),
                aspect: TextureAspect::All,
            },
            data,
            ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(self.size.width * 4),
                rows_per_image: None,
            },
            self.size,
        );
    }
}

/// A window displaying one image.
pub struct Renderer {
    gpu: Rc<Gpu>,
    pipeline: RenderPipeline,
    bind_group_layout: BindGroupLayout,
    sampler: Sampler,
    texture: Texture,
    bind_group: BindGroup,
    title: String,
    resolution: Resolution,
    // Dropped after `surface`, which refers to it.
    surface: Surface,
    window: Window,
}

impl Renderer {
    /// Opens a non-resizable window of size `resolution`.
    pub fn open<T>(
        target: &EventLoopWindowTarget<T>,
        title: &str,
        resolution: Resolution,
        gpu: Rc<Gpu>,
    ) -> anyhow::Result<Self> {
        let window = WindowBuilder::new()
            .with_resizable(false)
            .with_inner_size(PhysicalSize::new(resolution.width(), resolution.height()))
            .with_title(title)
            .build(target)?;
        // SAFETY: `window` is stored next to `surface` and outlives it.
        let surface = unsafe { gpu.instance.create_surface(&window)? };
        let surface_format = *surface
            .get_capabilities(&gpu.adapter)
            .formats
            .first()
            .ok_or_else(|| anyhow!("adapter cannot render to window surface"))?;

        let shader = gpu.device.create_shader_module(ShaderModuleDescriptor {
            label: Some("fullscreen texture shader"),
            source: ShaderSource::Wgsl(include_str!("shader.wgsl").into()),
        });
        let bind_group_layout = gpu
            .device
            .create_bind_group_layout(&BindGroupLayoutDescriptor {
                label: Some("image"),
                entries: &[
                    BindGroupLayoutEntry {
                        binding: 0,
                        visibility: ShaderStages::FRAGMENT,
                        ty: BindingType::Texture {
                            sample_type: TextureSampleType::Float { filterable: false },
                            view_dimension: TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    BindGroupLayoutEntry {
                        binding: 1,
                        visibility: ShaderStages::FRAGMENT,
                        ty: BindingType::Sampler(SamplerBindingType::NonFiltering),
                        count: None,
                    },
                ],
            });
        let pipeline = gpu.device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("textured_quad"),
            layout: Some(
                &gpu.device
                    .create_pipeline_layout(&PipelineLayoutDescriptor {
                        label: None,
                        bind_group_layouts: &[&bind_group_layout],
                        push_constant_ranges: &[],
                    }),
            ),
            vertex: VertexState {
                module: &shader,
                entry_point: "vert",
                buffers: &[],
            },
            fragment: Some(FragmentState {
                module: &shader,
                entry_point: "frag",
                targets: &[Some(ColorTargetState {
                    format: surface_format,
                    write_mask: ColorWrites::ALL,
                    blend: None,
                })],
            }),
            primitive: PrimitiveState::default(),
            depth_stencil: None,
            multisample: MultisampleState::default(),
            multiview: None,
        });

        let sampler = gpu.device.create_sampler(&SamplerDescriptor::default());
        let texture = Texture::new(&gpu, extent(resolution));
        let bind_group = create_bind_group(&gpu, &bind_group_layout, &texture, &sampler);

        let this = Self {
            gpu,
            pipeline,
            bind_group_layout,
            sampler,
            texture,
            bind_group,
            title: title.to_string(),
            resolution,
            surface,
            window,
        };
        this.configure_surface(surface_format);
        Ok(this)
    }

    pub fn window_id(&self) -> WindowId {
        self.window.id()
    }

    /// Uploads a new image and schedules a redraw.
    pub fn show(&mut self, res: Resolution, data: &[u8]) {
        assert_eq!(res.num_pixels() * 4, data.len() as u64);

        let size = extent(res);
        if self.texture.size != size {
            log::debug!(
                "reallocating texture for '{}' ({} -> {})",
                self.title,
                self.resolution,
                res,
            );
            self.texture = Texture::new(&self.gpu, size);
            self.bind_group = create_bind_group(
                &self.gpu,
                &self.bind_group_layout,
                &self.texture,
                &self.sampler,
            );
        }
        self.texture.write(&self.gpu, data);
        self.window.request_redraw();
    }

    pub fn redraw(&mut self) {
        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(err @ (SurfaceError::Outdated | SurfaceError::Lost)) => {
                log::debug!("surface error: {}", err);
                self.reconfigure_surface();
                match self.surface.get_current_texture() {
                    Ok(frame) => frame,
                    Err(err) => {
                        log::error!("failed to acquire frame after reconfiguring: {}", err);
                        return;
                    }
                }
            }
            Err(err) => {
                log::warn!("failed to acquire frame: {}", err);
                return;
            }
        };

        let view = frame.texture.create_view(&TextureViewDescriptor::default());
        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&CommandEncoderDescriptor { label: None });
        {
            let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: None,
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(BACKGROUND),
                        store: true,
                    },
                })],
                depth_stencil_attachment: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.bind_group, &[]);
            pass.draw(0..3, 0..1);
        }

        self.gpu.queue.submit([encoder.finish()]);
        frame.present();
    }

    fn reconfigure_surface(&self) {
        match self.surface.get_capabilities(&self.gpu.adapter).formats.first() {
            Some(format) => self.configure_surface(*format),
            None => log::error!("adapter cannot render to window surface"),
        }
    }

    fn configure_surface(&self, format: TextureFormat) {
        let size = self.window.inner_size();
        if size.width != self.resolution.width() || size.height != self.resolution.height() {
            // The window is not resizable, but window managers may still pick a different size.
            log::warn!(
                "window size {}x{} does not match image resolution {}",
                size.width,
                size.height,
                self.resolution,
            );
        }
        log::debug!("configuring surface at {} ({:?})", self.resolution, format);

        self.surface.configure(
            &self.gpu.device,
            &SurfaceConfiguration {
                usage: TextureUsages::RENDER_ATTACHMENT,
                format,
                width: self.resolution.width(),
                height: self.resolution.height(),
                present_mode: PresentMode::Fifo,
                alpha_mode: CompositeAlphaMode::Auto,
                view_formats: Vec::new(),
            },
        );
    }
}

fn extent(res: Resolution) -> Extent3d {
    Extent3d {
        width: res.width(),
        height: res.height(),
        depth_or_array_layers: 1,
    }
}

fn create_bind_group(
    gpu: &Gpu,
    layout: &BindGroupLayout,
    texture: &Texture,
    sampler: &Sampler,
) -> BindGroup {
    gpu.device.create_bind_group(&BindGroupDescriptor {
        label: Some("image"),
        layout,
        entries: &[
            BindGroupEntry {
                binding: 0,
                resource: BindingResource::TextureView(
                    &texture.inner.create_view(&Default::default()),
                ),
            },
            BindGroupEntry {
                binding: 1,
                resource: BindingResource::Sampler(sampler),
            },
        ],
    })
}

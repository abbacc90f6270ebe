//! wgpu implementation of [`GraphicsBackend`].
//!
//! The context is an adapter, device and queue; a surface is a configured
//! `wgpu::Surface` bound to a window handle the host hands over.

mod init;
mod surface;

use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context as _;

use crate::device::{GraphicsBackend, PresentError, SurfaceError, SurfaceExtent};
use crate::logging::target;

pub use init::GpuInit;
pub use surface::{WgpuFrame, WgpuSurface};

/// What a context was created with.
#[derive(Debug, Clone)]
pub struct WgpuConfig {
    pub adapter_info: wgpu::AdapterInfo,
    pub init: GpuInit,
}

pub struct WgpuContext {
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    lost: Arc<AtomicBool>,
    config: WgpuConfig,
}

impl WgpuContext {
    pub fn adapter(&self) -> &wgpu::Adapter {
        &self.adapter
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }
}

/// Backend for any window type wgpu can build a surface from, e.g.
/// `Arc<winit::window::Window>`.
pub struct WgpuBackend<W> {
    init: GpuInit,
    instance: wgpu::Instance,
    _window: PhantomData<fn() -> W>,
}

impl<W> WgpuBackend<W> {
    pub fn new(init: GpuInit) -> Self {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        Self {
            init,
            instance,
            _window: PhantomData,
        }
    }
}

impl<W> Default for WgpuBackend<W> {
    fn default() -> Self {
        Self::new(GpuInit::default())
    }
}

impl<W> GraphicsBackend for WgpuBackend<W>
where
    W: wgpu::WindowHandle + Clone + 'static,
{
    type Config = WgpuConfig;
    type Context = WgpuContext;
    type Surface = WgpuSurface;
    type NativeWindow = W;

    fn acquire_context(&mut self) -> anyhow::Result<WgpuContext> {
        let adapter = pollster::block_on(self.instance.request_adapter(
            &wgpu::RequestAdapterOptions {
                power_preference: self.init.power_preference,
                compatible_surface: None,
                force_fallback_adapter: false,
            },
        ))
        .context("failed to find a suitable GPU adapter")?;

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("kiln-engine device"),
            required_features: self.init.required_features,
            required_limits: self.init.required_limits.clone(),
            experimental_features: wgpu::ExperimentalFeatures::disabled(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        }))
        .context("failed to create wgpu device/queue")?;

        let lost = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&lost);
        device.set_device_lost_callback(move |reason, message| {
            log::warn!(target: target::BACKEND, "device lost ({reason:?}): {message}");
            flag.store(true, Ordering::Release);
        });

        let adapter_info = adapter.get_info();
        log::info!(
            target: target::BACKEND,
            "using adapter {} ({:?})",
            adapter_info.name,
            adapter_info.backend
        );

        Ok(WgpuContext {
            adapter,
            device,
            queue,
            lost,
            config: WgpuConfig {
                adapter_info,
                init: self.init.clone(),
            },
        })
    }

    fn context_config(context: &WgpuContext) -> &WgpuConfig {
        &context.config
    }

    fn create_surface(
        &mut self,
        context: &WgpuContext,
        window: &W,
        extent: SurfaceExtent,
    ) -> Result<WgpuSurface, SurfaceError> {
        let surface = self
            .instance
            .create_surface(window.clone())
            .map_err(|err| SurfaceError::BadWindow {
                reason: err.to_string(),
            })?;

        let caps = surface.get_capabilities(&context.adapter);
        let format = surface::choose_surface_format(&caps, self.init.prefer_srgb).ok_or_else(
            || SurfaceError::BadWindow {
                reason: "no supported surface formats".to_string(),
            },
        )?;
        let alpha_mode = surface::choose_alpha_mode(&caps, self.init.alpha_mode);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: extent.width.max(1),
            height: extent.height.max(1),
            present_mode: self.init.present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: self.init.desired_maximum_frame_latency,
        };
        surface.configure(&context.device, &config);

        Ok(WgpuSurface::new(surface, config))
    }

    fn present_frame(
        &mut self,
        context: &WgpuContext,
        surface: &mut WgpuSurface,
    ) -> Result<(), PresentError> {
        if context.lost.load(Ordering::Acquire) {
            return Err(PresentError::ContextLost);
        }
        surface.present(&context.device)
    }

    fn destroy_surface(&mut self, _context: &WgpuContext, surface: WgpuSurface) {
        drop(surface);
    }

    fn release_context(&mut self, context: WgpuContext) {
        log::debug!(
            target: target::BACKEND,
            "releasing device on {}",
            context.config.adapter_info.name
        );
        drop(context);
    }
}

//! Kiln studio: a winit window driven by a kiln render loop.
//!
//! Space toggles between continuous and on-demand rendering, `R` requests a
//! single frame, `P` toggles pause and `C` asks the loop to drop its context.

use std::sync::Arc;

use anyhow::{Context, Result};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use kiln_engine::device::wgpu::{GpuInit, WgpuBackend};
use kiln_engine::logging::{LoggingConfig, init_logging};
use kiln_engine::{FrameRenderer, RenderCtx, RenderLoop, RenderMode, SurfaceHost};

type Backend = WgpuBackend<Arc<Window>>;

struct WindowHost {
    window: Arc<Window>,
}

impl SurfaceHost for WindowHost {
    type Window = Arc<Window>;

    fn native_window(&self) -> Option<Arc<Window>> {
        Some(Arc::clone(&self.window))
    }
}

/// Clears the window to a slowly cycling colour.
#[derive(Default)]
struct ClearRenderer {
    frames: u64,
}

impl FrameRenderer<Backend> for ClearRenderer {
    fn on_context_ready(&mut self, ctx: &mut RenderCtx<'_, Backend>) {
        log::info!("context ready on {}", ctx.config().adapter_info.name);
    }

    fn on_size_changed(&mut self, _ctx: &mut RenderCtx<'_, Backend>, width: u32, height: u32) {
        log::info!("drawing at {width}x{height}");
    }

    fn on_draw_frame(&mut self, ctx: &mut RenderCtx<'_, Backend>) {
        let gpu = ctx.context();
        let t = ctx.time().elapsed.as_secs_f64();
        let Some(frame) = ctx.surface_mut().acquire(gpu.device()) else {
            return;
        };

        let color = wgpu::Color {
            r: 0.5 + 0.5 * t.sin(),
            g: 0.5 + 0.5 * (t * 0.7).sin(),
            b: 0.5 + 0.5 * (t * 0.3).sin(),
            a: 1.0,
        };

        let mut encoder = gpu
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("kiln clear encoder"),
            });
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("kiln clear pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(color),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
        }
        gpu.queue().submit(std::iter::once(encoder.finish()));
        self.frames += 1;
    }

    fn on_surface_lost(&mut self, _ctx: &mut RenderCtx<'_, Backend>) {
        log::info!("surface lost after {} frames", self.frames);
    }

    fn on_fatal_error(&mut self, error: &kiln_engine::FatalError) {
        log::error!("render loop failed: {error}");
    }
}

struct Active {
    host: Arc<WindowHost>,
    render: RenderLoop,
    paused: bool,
}

#[derive(Default)]
struct Studio {
    active: Option<Active>,
}

impl Studio {
    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title("kiln studio")
            .with_inner_size(LogicalSize::new(960.0, 600.0));
        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .context("failed to create window")?,
        );

        let host = Arc::new(WindowHost { window });
        let render = RenderLoop::builder(Backend::new(GpuInit::default()), ClearRenderer::default())
            .thread_name("kiln-studio-render")
            .spawn(&host)
            .context("failed to spawn render loop")?;

        let size = host.window.inner_size();
        render.surface_available();
        render.resize(size.width, size.height);

        self.active = Some(Active {
            host,
            render,
            paused: false,
        });
        Ok(())
    }

    fn on_key(&mut self, code: KeyCode) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        match code {
            KeyCode::Space => {
                let mode = match active.render.render_mode() {
                    RenderMode::Continuous => RenderMode::WhenDirty,
                    RenderMode::WhenDirty => RenderMode::Continuous,
                };
                log::info!("render mode -> {mode:?}");
                active.render.set_render_mode(mode);
            }
            KeyCode::KeyR => active.render.request_redraw(),
            KeyCode::KeyP => {
                if active.paused {
                    active.render.resume();
                } else {
                    active.render.pause();
                }
                active.paused = !active.paused;
            }
            KeyCode::KeyC => active.render.request_context_release(),
            _ => {}
        }
    }
}

impl ApplicationHandler for Studio {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Wait);
        if let Some(active) = self.active.as_mut() {
            active.render.surface_available();
            active.render.resume();
            active.paused = false;
            return;
        }
        if let Err(err) = self.start(event_loop) {
            log::error!("{err:#}");
            event_loop.exit();
        }
    }

    fn suspended(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(active) = self.active.as_mut() {
            active.render.pause();
            active.render.surface_unavailable();
            active.paused = true;
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                if let Some(active) = self.active.take() {
                    log::info!("final status: {:?}", active.render.status());
                    if let Err(err) = active.render.join() {
                        log::error!("render loop ended with error: {err}");
                    }
                    drop(active.host);
                }
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(active) = &self.active {
                    active.render.resize(size.width, size.height);
                }
            }
            WindowEvent::Occluded(occluded) => {
                if let Some(active) = self.active.as_mut() {
                    if occluded && !active.paused {
                        active.render.pause();
                    } else if !occluded && !active.paused {
                        active.render.resume();
                    }
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed && !event.repeat {
                    if let PhysicalKey::Code(code) = event.physical_key {
                        self.on_key(code);
                    }
                }
            }
            _ => {}
        }
    }
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
    let mut studio = Studio::default();
    event_loop
        .run_app(&mut studio)
        .context("winit event loop terminated with error")?;
    Ok(())
}

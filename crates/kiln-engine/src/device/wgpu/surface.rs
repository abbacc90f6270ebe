use crate::device::PresentError;
use crate::logging::target;

/// A configured wgpu surface plus the frame currently being drawn.
pub struct WgpuSurface {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    frame: Option<WgpuFrame>,
}

/// An acquired surface texture.
///
/// Holding it prevents acquisition of the next frame; the loop presents it
/// after `on_draw_frame` returns.
pub struct WgpuFrame {
    pub texture: wgpu::SurfaceTexture,
    pub view: wgpu::TextureView,
}

impl WgpuSurface {
    pub(super) fn new(surface: wgpu::Surface<'static>, config: wgpu::SurfaceConfiguration) -> Self {
        Self {
            surface,
            config,
            frame: None,
        }
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    /// Acquires the next texture, or returns the one already acquired this
    /// frame. `None` means the frame should be skipped.
    pub fn acquire(&mut self, device: &wgpu::Device) -> Option<&WgpuFrame> {
        if self.frame.is_none() {
            match self.surface.get_current_texture() {
                Ok(texture) => {
                    let view = texture
                        .texture
                        .create_view(&wgpu::TextureViewDescriptor::default());
                    self.frame = Some(WgpuFrame { texture, view });
                }
                Err(err) => {
                    log::debug!(target: target::BACKEND, "texture acquisition failed: {err}");
                    if matches!(err, wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) {
                        self.surface.configure(device, &self.config);
                    }
                    return None;
                }
            }
        }
        self.frame.as_ref()
    }

    /// Presents the acquired frame, if any.
    pub(super) fn present(&mut self, device: &wgpu::Device) -> Result<(), PresentError> {
        if self.frame.is_none() {
            match self.surface.get_current_texture() {
                // Nothing was drawn; drop the texture unpresented.
                Ok(_) => return Ok(()),
                Err(err) => return map_surface_error(&self.surface, device, &self.config, err),
            }
        }
        if let Some(frame) = self.frame.take() {
            drop(frame.view);
            frame.texture.present();
        }
        Ok(())
    }
}

pub(super) fn choose_surface_format(
    caps: &wgpu::SurfaceCapabilities,
    prefer_srgb: bool,
) -> Option<wgpu::TextureFormat> {
    if prefer_srgb {
        let preferred = [
            wgpu::TextureFormat::Bgra8UnormSrgb,
            wgpu::TextureFormat::Rgba8UnormSrgb,
        ];
        if let Some(f) = preferred.into_iter().find(|f| caps.formats.contains(f)) {
            return Some(f);
        }
    }
    caps.formats.first().copied()
}

pub(super) fn choose_alpha_mode(
    caps: &wgpu::SurfaceCapabilities,
    requested: Option<wgpu::CompositeAlphaMode>,
) -> wgpu::CompositeAlphaMode {
    requested
        .filter(|m| caps.alpha_modes.contains(m))
        .or_else(|| caps.alpha_modes.first().copied())
        .unwrap_or(wgpu::CompositeAlphaMode::Auto)
}

/// Lost and outdated surfaces are reconfigured in place. Out of memory is
/// reported as a lost context so the loop rebuilds everything.
fn map_surface_error(
    surface: &wgpu::Surface<'_>,
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
    err: wgpu::SurfaceError,
) -> Result<(), PresentError> {
    match err {
        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
            surface.configure(device, config);
            Ok(())
        }
        wgpu::SurfaceError::OutOfMemory => Err(PresentError::ContextLost),
        wgpu::SurfaceError::Timeout | wgpu::SurfaceError::Other => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(formats: Vec<wgpu::TextureFormat>) -> wgpu::SurfaceCapabilities {
        wgpu::SurfaceCapabilities {
            formats,
            alpha_modes: vec![wgpu::CompositeAlphaMode::Opaque],
            ..Default::default()
        }
    }

    #[test]
    fn srgb_format_preferred_when_supported() {
        let c = caps(vec![
            wgpu::TextureFormat::Bgra8Unorm,
            wgpu::TextureFormat::Bgra8UnormSrgb,
        ]);
        assert_eq!(
            choose_surface_format(&c, true),
            Some(wgpu::TextureFormat::Bgra8UnormSrgb)
        );
        assert_eq!(
            choose_surface_format(&c, false),
            Some(wgpu::TextureFormat::Bgra8Unorm)
        );
        assert_eq!(choose_surface_format(&caps(vec![]), true), None);
    }

    #[test]
    fn unsupported_alpha_mode_falls_back() {
        let c = caps(vec![wgpu::TextureFormat::Bgra8Unorm]);
        assert_eq!(
            choose_alpha_mode(&c, Some(wgpu::CompositeAlphaMode::PreMultiplied)),
            wgpu::CompositeAlphaMode::Opaque
        );
        assert_eq!(choose_alpha_mode(&c, None), wgpu::CompositeAlphaMode::Opaque);
    }
}

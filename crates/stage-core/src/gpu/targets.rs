use super::{preferred_format, ColorFormat, Gpu, RenderTarget, TextureDesc};
use crate::error::Result;

/// A texture with exactly one framebuffer bound to it.
pub struct FboTex<G: Gpu + ?Sized> {
    label: String,
    texture: G::Texture,
    framebuffer: G::Framebuffer,
    width: u32,
    height: u32,
    format: ColorFormat,
}

impl<G: Gpu + ?Sized> FboTex<G> {
    /// Allocates a `width`×`height` target, half-float when the backend
    /// supports it.
    pub fn new(gpu: &mut G, label: &str, width: u32, height: u32) -> Result<Self> {
        let format = preferred_format(gpu);
        let (width, height) = (width.max(1), height.max(1));
        let texture = gpu.create_texture(&TextureDesc {
            label,
            width,
            height,
            format,
        })?;
        let framebuffer = match gpu.create_framebuffer(label, &texture) {
            Ok(fb) => fb,
            Err(e) => {
                if let Err(del) = gpu.delete_texture(texture) {
                    log::warn!("[gpu] {label}: texture cleanup failed: {del}");
                }
                return Err(e);
            }
        };
        Ok(Self {
            label: label.to_string(),
            texture,
            framebuffer,
            width,
            height,
            format,
        })
    }

    pub fn texture(&self) -> &G::Texture {
        &self.texture
    }

    pub fn framebuffer(&self) -> &G::Framebuffer {
        &self.framebuffer
    }

    pub fn target(&self) -> RenderTarget<'_, G> {
        RenderTarget::Offscreen(&self.framebuffer)
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn format(&self) -> ColorFormat {
        self.format
    }

    /// Recreates both handles when the size changes and returns whether it
    /// did. Handles borrowed before a resize are gone afterwards.
    pub fn resize(&mut self, gpu: &mut G, width: u32, height: u32) -> Result<bool> {
        let (width, height) = (width.max(1), height.max(1));
        if (width, height) == (self.width, self.height) {
            return Ok(false);
        }
        let fresh = Self::new(gpu, &self.label, width, height)?;
        let old = std::mem::replace(self, fresh);
        if let Err(e) = old.dispose(gpu) {
            log::warn!("[gpu] {}: release after resize failed: {e}", self.label);
        }
        Ok(true)
    }

    /// Deletes the framebuffer and the texture. Both deletions are attempted
    /// even if the first fails.
    pub fn dispose(self, gpu: &mut G) -> Result<()> {
        let fb = gpu.delete_framebuffer(self.framebuffer);
        let tex = gpu.delete_texture(self.texture);
        fb.and(tex)
    }
}

/// Two [`FboTex`] halves for feedback passes: read `src_tex`, write `dst`,
/// then `swap`.
pub struct PingPong<G: Gpu + ?Sized> {
    a: FboTex<G>,
    b: FboTex<G>,
    flip: bool,
}

impl<G: Gpu + ?Sized> PingPong<G> {
    pub fn new(gpu: &mut G, label: &str, width: u32, height: u32) -> Result<Self> {
        let a = FboTex::new(gpu, &format!("{label}.a"), width, height)?;
        let b = match FboTex::new(gpu, &format!("{label}.b"), width, height) {
            Ok(b) => b,
            Err(e) => {
                if let Err(del) = a.dispose(gpu) {
                    log::warn!("[gpu] {label}: cleanup failed: {del}");
                }
                return Err(e);
            }
        };
        Ok(Self { a, b, flip: false })
    }

    pub fn src(&self) -> &FboTex<G> {
        if self.flip {
            &self.b
        } else {
            &self.a
        }
    }

    pub fn dst(&self) -> &FboTex<G> {
        if self.flip {
            &self.a
        } else {
            &self.b
        }
    }

    pub fn src_tex(&self) -> &G::Texture {
        self.src().texture()
    }

    pub fn dst_fbo(&self) -> &G::Framebuffer {
        self.dst().framebuffer()
    }

    pub fn swap(&mut self) {
        self.flip = !self.flip;
    }

    pub fn size(&self) -> (u32, u32) {
        self.a.size()
    }

    /// Resizes both halves. Returns whether anything was recreated.
    pub fn resize(&mut self, gpu: &mut G, width: u32, height: u32) -> Result<bool> {
        let a = self.a.resize(gpu, width, height)?;
        let b = self.b.resize(gpu, width, height)?;
        Ok(a || b)
    }

    pub fn dispose(self, gpu: &mut G) -> Result<()> {
        let a = self.a.dispose(gpu);
        let b = self.b.dispose(gpu);
        a.and(b)
    }
}

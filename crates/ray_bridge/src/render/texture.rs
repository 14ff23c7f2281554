//! RGBA8 textures bound as diffuse maps

use crate::backend::{ObjectHandle, ObjectKind, Param, RayBackend};
use crate::foundation::collections::Revision;

use super::{RenderError, RenderResult};

/// Host texture; uploaded once per revision by the owning actor
#[derive(Debug, Clone)]
pub struct Texture {
    width: u32,
    height: u32,
    texels: Vec<u8>,
    interpolate: bool,
    revision: Revision,
}

impl Texture {
    /// Wrap tightly packed RGBA8 texels
    pub fn from_rgba(width: u32, height: u32, texels: Vec<u8>) -> RenderResult<Self> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || texels.len() != expected {
            return Err(RenderError::ResourceCreationFailed(format!(
                "texture {width}x{height} needs {expected} bytes, got {}",
                texels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            texels,
            interpolate: true,
            revision: Revision::new(),
        })
    }

    /// Take ownership of a decoded image
    pub fn from_image(image: image::RgbaImage) -> RenderResult<Self> {
        let (width, height) = image.dimensions();
        Self::from_rgba(width, height, image.into_raw())
    }

    /// Texture size in texels
    pub const fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Revision bumped whenever the texels or sampling mode change
    pub const fn revision(&self) -> Revision {
        self.revision
    }

    /// Replace the texels, keeping the size
    pub fn set_texels(&mut self, texels: Vec<u8>) -> RenderResult<()> {
        if texels.len() != self.texels.len() {
            return Err(RenderError::ResourceCreationFailed(format!(
                "texel update of {} bytes for a {}-byte texture",
                texels.len(),
                self.texels.len()
            )));
        }
        self.texels = texels;
        self.revision.bump();
        Ok(())
    }

    /// Toggle bilinear filtering
    pub fn set_interpolate(&mut self, interpolate: bool) {
        self.interpolate = interpolate;
        self.revision.bump();
    }

    /// Create and commit a backend texture
    pub fn upload(&self, backend: &mut dyn RayBackend) -> RenderResult<ObjectHandle> {
        let size = [self.width, self.height, 1].map(|v| i32::try_from(v).unwrap_or(i32::MAX));
        let texture = backend.create(ObjectKind::Texture)?;
        backend.set_param(texture, "size", Param::Int3(size))?;
        backend.set_param(texture, "format", Param::Str("rgba8".to_string()))?;
        backend.set_param(texture, "filter", Param::Bool(self.interpolate))?;
        backend.set_param(texture, "data", Param::Bytes(self.texels.clone()))?;
        backend.commit(texture)?;
        log::debug!("Uploaded {}x{} texture", self.width, self.height);
        Ok(texture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RecordingBackend;

    #[test]
    fn test_rejects_wrong_texel_count() {
        assert!(Texture::from_rgba(2, 2, vec![0; 15]).is_err());
        assert!(Texture::from_rgba(0, 2, Vec::new()).is_err());
        assert!(Texture::from_rgba(2, 2, vec![0; 16]).is_ok());
    }

    #[test]
    fn test_from_image_and_upload() {
        let image = image::RgbaImage::from_pixel(3, 2, image::Rgba([10, 20, 30, 255]));
        let texture = Texture::from_image(image).expect("texture");
        assert_eq!(texture.size(), (3, 2));

        let mut backend = RecordingBackend::new();
        backend.initialize(0).expect("init");
        let handle = texture.upload(&mut backend).expect("upload");
        assert_eq!(backend.param(handle, "size"), Some(&Param::Int3([3, 2, 1])));
        match backend.param(handle, "data") {
            Some(Param::Bytes(bytes)) => assert_eq!(&bytes[..4], &[10, 20, 30, 255]),
            other => panic!("unexpected texel param {other:?}"),
        }
    }

    #[test]
    fn test_texel_update_bumps_revision() {
        let mut texture = Texture::from_rgba(1, 1, vec![0; 4]).expect("texture");
        let before = texture.revision();
        texture.set_texels(vec![255; 4]).expect("update");
        assert!(texture.revision() > before);
        assert!(texture.set_texels(vec![0; 8]).is_err());
    }
}

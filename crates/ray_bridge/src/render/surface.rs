//! Host display surface and viewport
//!
//! The synchronizer copies backend pixels here after every rendered frame.
//! Color is RGBA8, depth is linearized into `[0, 1]`.

use std::path::Path;

use super::{RenderError, RenderResult};

/// Size of the host window region being rendered into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Viewport {
    /// Viewport of the given size
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width over height; `None` for a zero-height viewport
    pub fn aspect(&self) -> Option<f32> {
        (self.height > 0).then(|| self.width as f32 / self.height as f32)
    }

    /// Whether there are no pixels to render
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// `(width, height)`
    pub const fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Pixels presented by the host
#[derive(Debug, Clone, Default)]
pub struct DisplaySurface {
    width: u32,
    height: u32,
    color: Vec<[u8; 4]>,
    depth: Vec<f32>,
}

impl DisplaySurface {
    /// Empty surface; sized by the first frame copied into it
    pub fn new() -> Self {
        Self::default()
    }

    /// `(width, height)`
    pub const fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Resize, clearing color to transparent black and depth to the far plane
    pub fn resize(&mut self, width: u32, height: u32) {
        let pixels = width as usize * height as usize;
        self.width = width;
        self.height = height;
        self.color = vec![[0; 4]; pixels];
        self.depth = vec![1.0; pixels];
    }

    /// Per-pixel RGBA
    pub fn pixels(&self) -> &[[u8; 4]] {
        &self.color
    }

    /// Color channel as tightly packed bytes
    pub fn color_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.color.as_slice())
    }

    /// Linear depth, one value per pixel
    pub fn depth(&self) -> &[f32] {
        &self.depth
    }

    /// RGBA of one pixel
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        self.index(x, y).map(|i| self.color[i])
    }

    /// Depth of one pixel
    pub fn depth_at(&self, x: u32, y: u32) -> Option<f32> {
        self.index(x, y).map(|i| self.depth[i])
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        (x < self.width && y < self.height).then(|| y as usize * self.width as usize + x as usize)
    }

    /// Copy a full frame of RGBA8 bytes
    pub fn write_color(&mut self, bytes: &[u8]) -> RenderResult<()> {
        let texels: &[[u8; 4]] = bytemuck::try_cast_slice(bytes)
            .map_err(|e| RenderError::RenderingFailed(format!("color readback: {e}")))?;
        if texels.len() != self.color.len() {
            return Err(RenderError::RenderingFailed(format!(
                "color readback of {} pixels into a {}x{} surface",
                texels.len(),
                self.width,
                self.height
            )));
        }
        self.color.copy_from_slice(texels);
        Ok(())
    }

    /// Copy a full frame of depth values through `map`
    pub fn write_depth(&mut self, distances: &[f32], map: impl Fn(f32) -> f32) -> RenderResult<()> {
        if distances.len() != self.depth.len() {
            return Err(RenderError::RenderingFailed(format!(
                "depth readback of {} pixels into a {}x{} surface",
                distances.len(),
                self.width,
                self.height
            )));
        }
        for (out, &distance) in self.depth.iter_mut().zip(distances) {
            *out = map(distance);
        }
        Ok(())
    }

    /// Copy the color channel into an image
    pub fn to_image(&self) -> Option<image::RgbaImage> {
        image::RgbaImage::from_raw(self.width, self.height, self.color_bytes().to_vec())
    }

    /// Write the color channel as a PNG
    pub fn save_png(&self, path: impl AsRef<Path>) -> RenderResult<()> {
        let image = self.to_image().ok_or_else(|| {
            RenderError::RenderingFailed(format!("surface {}x{} has no image", self.width, self.height))
        })?;
        image.save_with_format(path.as_ref(), image::ImageFormat::Png)?;
        log::info!("Saved {}x{} surface to {}", self.width, self.height, path.as_ref().display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_viewport_aspect() {
        assert_relative_eq!(Viewport::new(800, 400).aspect().expect("aspect"), 2.0);
        assert!(Viewport::new(800, 0).aspect().is_none());
        assert!(Viewport::new(0, 10).is_empty());
    }

    #[test]
    fn test_write_color_checks_size() {
        let mut surface = DisplaySurface::new();
        surface.resize(2, 1);
        assert!(surface.write_color(&[0; 4]).is_err());
        surface.write_color(&[1, 2, 3, 4, 5, 6, 7, 8]).expect("write");
        assert_eq!(surface.pixel(1, 0), Some([5, 6, 7, 8]));
        assert_eq!(surface.pixel(2, 0), None);
        assert_eq!(surface.color_bytes().len(), 8);
    }

    #[test]
    fn test_write_depth_maps_values() {
        let mut surface = DisplaySurface::new();
        surface.resize(1, 2);
        surface.write_depth(&[2.0, 4.0], |d| d / 4.0).expect("depth");
        assert_relative_eq!(surface.depth_at(0, 0).expect("depth"), 0.5);
        assert_relative_eq!(surface.depth_at(0, 1).expect("depth"), 1.0);
    }

    #[test]
    fn test_to_image_matches_surface() {
        let mut surface = DisplaySurface::new();
        surface.resize(2, 2);
        surface.write_color(&[9; 16]).expect("write");
        let image = surface.to_image().expect("image");
        assert_eq!(image.dimensions(), (2, 2));
        assert_eq!(image.get_pixel(1, 1).0, [9, 9, 9, 9]);
    }
}

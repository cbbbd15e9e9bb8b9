// SPDX-License-Identifier: CEPL-1.0
use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use ash::vk;
use scop_render::{RenderError, SamplerFilter, Texture};
use tracing::{debug, info};

use crate::upload;
use crate::utils::GpuImage;
use crate::CommandPool;

/// Texel format of every uploaded texture.
pub const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_SRGB;

/// A device image with the sampler the shader reads it through.
#[derive(Debug)]
pub struct SampledImage {
    pub image: GpuImage,
    pub sampler: vk::Sampler,
}

impl SampledImage {
    pub unsafe fn destroy(self, device: &ash::Device) {
        device.destroy_sampler(self.sampler, None);
        self.image.destroy(device);
    }
}

fn vk_filter(filter: SamplerFilter) -> vk::Filter {
    match filter {
        SamplerFilter::Nearest => vk::Filter::NEAREST,
        SamplerFilter::Linear => vk::Filter::LINEAR,
    }
}

/// Registry of CPU textures and the GPU images made from them, both keyed by
/// caller-chosen ids.
pub struct TextureManager {
    textures: HashMap<String, Texture>,
    images: HashMap<String, SampledImage>,
    filter: SamplerFilter,
    max_anisotropy: f32,
}

impl TextureManager {
    pub fn new(filter: SamplerFilter, max_anisotropy: f32) -> Self {
        Self {
            textures: HashMap::new(),
            images: HashMap::new(),
            filter,
            max_anisotropy,
        }
    }

    pub fn filter(&self) -> SamplerFilter {
        self.filter
    }

    /// Decodes `path` and registers it as `id`. The id is checked before the
    /// file is touched.
    pub fn add_texture(&mut self, id: &str, path: impl AsRef<Path>) -> Result<(), RenderError> {
        if self.textures.contains_key(id) {
            return Err(RenderError::DuplicateTexture(id.to_owned()));
        }
        let path = path.as_ref();
        let texture = Texture::from_file(path)?;
        info!(
            "texture `{id}` loaded from {} ({}x{})",
            path.display(),
            texture.width(),
            texture.height()
        );
        self.textures.insert(id.to_owned(), texture);
        Ok(())
    }

    /// Registers already decoded pixels.
    pub fn insert_texture(&mut self, id: &str, texture: Texture) -> Result<(), RenderError> {
        if self.textures.contains_key(id) {
            return Err(RenderError::DuplicateTexture(id.to_owned()));
        }
        self.textures.insert(id.to_owned(), texture);
        Ok(())
    }

    pub fn texture(&self, id: &str) -> Option<&Texture> {
        self.textures.get(id)
    }

    fn check_new_image(&self, image_id: &str, texture_id: &str) -> Result<&Texture, RenderError> {
        if self.images.contains_key(image_id) {
            return Err(RenderError::DuplicateImage(image_id.to_owned()));
        }
        self.textures
            .get(texture_id)
            .ok_or_else(|| RenderError::UnknownTexture(texture_id.to_owned()))
    }

    /// Uploads texture `texture_id` and registers the result as `image_id`.
    pub fn create_image(&mut self, image_id: &str, texture_id: &str, pool: &CommandPool) -> Result<()> {
        let texture = self.check_new_image(image_id, texture_id)?;
        let image = upload::upload_texture(pool, texture, TEXTURE_FORMAT)
            .with_context(|| format!("upload texture `{texture_id}`"))?;

        let filter = vk_filter(self.filter);
        let sampler_ci = vk::SamplerCreateInfo {
            s_type: vk::StructureType::SAMPLER_CREATE_INFO,
            mag_filter: filter,
            min_filter: filter,
            mipmap_mode: vk::SamplerMipmapMode::LINEAR,
            address_mode_u: vk::SamplerAddressMode::REPEAT,
            address_mode_v: vk::SamplerAddressMode::REPEAT,
            address_mode_w: vk::SamplerAddressMode::REPEAT,
            anisotropy_enable: vk::TRUE,
            max_anisotropy: self.max_anisotropy,
            compare_op: vk::CompareOp::ALWAYS,
            border_color: vk::BorderColor::INT_OPAQUE_BLACK,
            unnormalized_coordinates: vk::FALSE,
            ..Default::default()
        };
        let device = pool.device();
        let sampler = match unsafe { device.create_sampler(&sampler_ci, None) } {
            Ok(s) => s,
            Err(e) => {
                unsafe { image.destroy(device) };
                return Err(e).context("create_sampler");
            }
        };

        debug!("image `{image_id}` created from texture `{texture_id}` ({:?})", self.filter);
        self.images
            .insert(image_id.to_owned(), SampledImage { image, sampler });
        Ok(())
    }

    /// Creates an image under the same id for every registered texture that
    /// has none yet.
    pub fn create_all_images(&mut self, pool: &CommandPool) -> Result<()> {
        let mut pending: Vec<String> = self
            .textures
            .keys()
            .filter(|id| !self.images.contains_key(*id))
            .cloned()
            .collect();
        pending.sort();
        for id in pending {
            self.create_image(&id, &id, pool)?;
        }
        Ok(())
    }

    /// Drops the CPU pixel buffers; images stay alive.
    pub fn release_textures(&mut self) {
        if !self.textures.is_empty() {
            debug!("released {} CPU texture(s)", self.textures.len());
        }
        self.textures.clear();
    }

    pub fn image(&self, id: &str) -> Option<&SampledImage> {
        self.images.get(id)
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn destroy_images(&mut self, device: &ash::Device) {
        for (_, image) in self.images.drain() {
            unsafe { image.destroy(device) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_png(dir: &Path, name: &str, w: u32, h: u32) -> std::path::PathBuf {
        let path = dir.join(name);
        let img = image::RgbaImage::from_fn(w, h, |x, y| {
            image::Rgba([(x % 256) as u8, (y % 256) as u8, 0, 255])
        });
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn registered_texture_is_found_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "duck.png", 512, 512);
        let mut tm = TextureManager::new(SamplerFilter::default(), 16.0);
        tm.add_texture("duckSpaceship", &path).unwrap();

        let tex = tm.texture("duckSpaceship").unwrap();
        assert_eq!((tex.width(), tex.height()), (512, 512));
        assert_eq!(tex.pixels().len(), 512 * 512 * 4);
        assert!(tm.texture("missing").is_none());
    }

    #[test]
    fn duplicate_texture_id_is_rejected_before_decoding() {
        let mut tm = TextureManager::new(SamplerFilter::Nearest, 1.0);
        let tex = Texture::from_rgba8(1, 1, vec![0; 4]).unwrap();
        tm.insert_texture("a", tex).unwrap();

        // path does not exist: a decode attempt would fail differently
        let err = tm.add_texture("a", "/definitely/not/here.png").unwrap_err();
        assert!(matches!(err, RenderError::DuplicateTexture(id) if id == "a"));
    }

    #[test]
    fn missing_file_is_a_decode_error() {
        let mut tm = TextureManager::new(SamplerFilter::Nearest, 1.0);
        let err = tm.add_texture("x", "/definitely/not/here.png").unwrap_err();
        assert!(matches!(err, RenderError::TextureDecode { .. }));
        assert!(tm.texture("x").is_none());
    }

    #[test]
    fn image_needs_registered_texture() {
        let tm = TextureManager::new(SamplerFilter::Nearest, 1.0);
        let err = tm.check_new_image("img", "nope").unwrap_err();
        assert!(matches!(err, RenderError::UnknownTexture(id) if id == "nope"));
    }

    #[test]
    fn unknown_image_is_none() {
        let tm = TextureManager::new(SamplerFilter::Nearest, 1.0);
        assert!(tm.image("missing").is_none());
        assert_eq!(tm.image_count(), 0);
    }

    #[test]
    fn released_textures_are_gone() {
        let mut tm = TextureManager::new(SamplerFilter::Nearest, 1.0);
        tm.insert_texture("a", Texture::from_rgba8(1, 1, vec![0; 4]).unwrap())
            .unwrap();
        tm.release_textures();
        assert!(tm.texture("a").is_none());
    }

    #[test]
    fn filter_maps_to_vulkan() {
        assert_eq!(vk_filter(SamplerFilter::Nearest), vk::Filter::NEAREST);
        assert_eq!(vk_filter(SamplerFilter::Linear), vk::Filter::LINEAR);
    }
}

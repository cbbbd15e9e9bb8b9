// SPDX-License-Identifier: CEPL-1.0
use anyhow::{Context, Result};
use ash::khr::swapchain;
use ash::vk;
use scop_render::{PresentPreference, RenderSize};
use tracing::debug;

use crate::context::Surface;
use crate::utils::{self, GpuImage};

pub const PREFERRED_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_SRGB,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// Preferred sRGB BGRA format, else whatever the surface lists first.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .copied()
        .find(|f| {
            f.format == PREFERRED_SURFACE_FORMAT.format
                && f.color_space == PREFERRED_SURFACE_FORMAT.color_space
        })
        .or_else(|| formats.first().copied())
}

/// Preferred mode when offered, else FIFO (always available).
pub fn choose_present_mode(
    modes: &[vk::PresentModeKHR],
    preference: PresentPreference,
) -> vk::PresentModeKHR {
    let wanted = match preference {
        PresentPreference::Mailbox => vk::PresentModeKHR::MAILBOX,
        PresentPreference::Fifo => vk::PresentModeKHR::FIFO,
        PresentPreference::Immediate => vk::PresentModeKHR::IMMEDIATE,
    };
    if modes.contains(&wanted) {
        wanted
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// The surface's fixed extent if it has one, else `want` clamped to its limits.
pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, want: RenderSize) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: want
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: want
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

/// One more than the minimum, capped when the surface has a maximum.
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let want = caps.min_image_count + 1;
    if caps.max_image_count == 0 {
        want
    } else {
        want.min(caps.max_image_count)
    }
}

/// Tracks whether the swapchain has to be rebuilt and whether a rebuild is
/// parked until the window has a drawable size again.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ResizeGate {
    pending: bool,
    deferred: bool,
}

impl ResizeGate {
    /// Marks the swapchain as stale (window resized, out of date, suboptimal).
    pub fn request(&mut self) {
        self.pending = true;
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// True while a rebuild waits for a non-zero framebuffer.
    pub fn is_deferred(&self) -> bool {
        self.deferred
    }

    /// Decides whether a rebuild can run at `size`. A zero-sized window parks
    /// the rebuild; any other size releases it.
    pub fn poll(&mut self, size: RenderSize) -> Option<RenderSize> {
        if size.is_zero() {
            self.pending = true;
            self.deferred = true;
            return None;
        }
        self.pending = false;
        self.deferred = false;
        Some(size)
    }
}

/// Capabilities, formats and present modes of a surface on a device.
pub struct SwapchainSupport {
    pub caps: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupport {
    pub unsafe fn query(surface: &Surface, phys: vk::PhysicalDevice) -> Result<Self> {
        Ok(Self {
            caps: surface
                .loader
                .get_physical_device_surface_capabilities(phys, surface.handle)
                .context("get_physical_device_surface_capabilities")?,
            formats: surface
                .loader
                .get_physical_device_surface_formats(phys, surface.handle)
                .context("get_physical_device_surface_formats")?,
            modes: surface
                .loader
                .get_physical_device_surface_present_modes(phys, surface.handle)
                .context("get_physical_device_surface_present_modes")?,
        })
    }
}

/// Everything needed to build a [`SwapchainState`].
pub struct SwapchainParams<'a> {
    pub device: &'a ash::Device,
    pub loader: &'a swapchain::Device,
    pub surface: &'a Surface,
    pub phys: vk::PhysicalDevice,
    pub memory: &'a vk::PhysicalDeviceMemoryProperties,
    pub surface_format: vk::SurfaceFormatKHR,
    pub depth_format: vk::Format,
    pub preference: PresentPreference,
    pub render_pass: vk::RenderPass,
    pub families: (u32, u32),
    pub size: RenderSize,
}

/// One generation of presentable images and their render targets.
pub struct SwapchainState {
    pub swapchain: vk::SwapchainKHR,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    pub images: Vec<vk::Image>,
    pub views: Vec<vk::ImageView>,
    pub depth: Option<GpuImage>,
    pub framebuffers: Vec<vk::Framebuffer>,
}

impl SwapchainState {
    /// Builds swapchain, image views, depth image, framebuffers. If any step
    /// fails, the steps before it are undone.
    pub unsafe fn create(p: &SwapchainParams<'_>) -> Result<Self> {
        let support = SwapchainSupport::query(p.surface, p.phys)?;
        let present_mode = choose_present_mode(&support.modes, p.preference);
        let extent = choose_extent(&support.caps, p.size);
        let image_count = choose_image_count(&support.caps);

        let family_list = [p.families.0, p.families.1];
        let (sharing_mode, family_count) = if p.families.0 != p.families.1 {
            (vk::SharingMode::CONCURRENT, 2)
        } else {
            (vk::SharingMode::EXCLUSIVE, 0)
        };

        let swap_info = vk::SwapchainCreateInfoKHR {
            s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
            surface: p.surface.handle,
            min_image_count: image_count,
            image_format: p.surface_format.format,
            image_color_space: p.surface_format.color_space,
            image_extent: extent,
            image_array_layers: 1,
            image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            image_sharing_mode: sharing_mode,
            queue_family_index_count: family_count,
            p_queue_family_indices: family_list.as_ptr(),
            pre_transform: support.caps.current_transform,
            composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            present_mode,
            clipped: vk::TRUE,
            ..Default::default()
        };

        let swapchain = p
            .loader
            .create_swapchain(&swap_info, None)
            .context("create_swapchain")?;

        let mut state = Self {
            swapchain,
            format: p.surface_format.format,
            extent,
            images: Vec::new(),
            views: Vec::new(),
            depth: None,
            framebuffers: Vec::new(),
        };

        if let Err(e) = state.build_targets(p) {
            state.destroy(p.device, p.loader);
            return Err(e);
        }

        debug!(
            "swapchain {}x{}, {} images, {:?}",
            extent.width,
            extent.height,
            state.images.len(),
            present_mode
        );
        Ok(state)
    }

    unsafe fn build_targets(&mut self, p: &SwapchainParams<'_>) -> Result<()> {
        self.images = p
            .loader
            .get_swapchain_images(self.swapchain)
            .context("get_swapchain_images")?;

        for &img in &self.images {
            let view = utils::create_image_view(p.device, img, self.format, vk::ImageAspectFlags::COLOR)
                .context("create_image_view(swapchain)")?;
            self.views.push(view);
        }

        self.depth = Some(
            utils::create_image(
                p.device,
                p.memory,
                self.extent,
                p.depth_format,
                vk::ImageTiling::OPTIMAL,
                vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
                vk::MemoryPropertyFlags::DEVICE_LOCAL,
                vk::ImageAspectFlags::DEPTH,
            )
            .context("create depth image")?,
        );
        let depth_view = self.depth.as_ref().map(|d| d.view).unwrap_or_default();

        for &view in &self.views {
            let attachments = [view, depth_view];
            let fb_info = vk::FramebufferCreateInfo {
                s_type: vk::StructureType::FRAMEBUFFER_CREATE_INFO,
                render_pass: p.render_pass,
                attachment_count: attachments.len() as u32,
                p_attachments: attachments.as_ptr(),
                width: self.extent.width,
                height: self.extent.height,
                layers: 1,
                ..Default::default()
            };
            let fb = p
                .device
                .create_framebuffer(&fb_info, None)
                .context("create_framebuffer")?;
            self.framebuffers.push(fb);
        }
        Ok(())
    }

    pub fn depth_image(&self) -> Option<&GpuImage> {
        self.depth.as_ref()
    }

    /// STRICT TEARDOWN ORDER: depth -> framebuffers -> image views -> swapchain.
    pub unsafe fn destroy(mut self, device: &ash::Device, loader: &swapchain::Device) {
        if let Some(depth) = self.depth.take() {
            depth.destroy(device);
        }
        for fb in self.framebuffers.drain(..) {
            device.destroy_framebuffer(fb, None);
        }
        for view in self.views.drain(..) {
            device.destroy_image_view(view, None);
        }
        loader.destroy_swapchain(self.swapchain, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps_free_extent(min: (u32, u32), max: (u32, u32)) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: min.0,
                height: min.1,
            },
            max_image_extent: vk::Extent2D {
                width: max.0,
                height: max.1,
            },
            min_image_count: 2,
            max_image_count: 0,
            ..Default::default()
        }
    }

    #[test]
    fn surface_format_prefers_srgb_bgra() {
        let unorm = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        let picked = choose_surface_format(&[unorm, PREFERRED_SURFACE_FORMAT]).unwrap();
        assert_eq!(picked.format, vk::Format::B8G8R8A8_SRGB);

        let picked = choose_surface_format(&[unorm]).unwrap();
        assert_eq!(picked.format, vk::Format::B8G8R8A8_UNORM);

        assert!(choose_surface_format(&[]).is_none());
    }

    #[test]
    fn present_mode_falls_back_to_fifo() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(
            choose_present_mode(&modes, PresentPreference::Mailbox),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::FIFO], PresentPreference::Mailbox),
            vk::PresentModeKHR::FIFO
        );
        assert_eq!(
            choose_present_mode(&modes, PresentPreference::Immediate),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn extent_uses_fixed_surface_extent() {
        let mut caps = caps_free_extent((1, 1), (4096, 4096));
        caps.current_extent = vk::Extent2D {
            width: 1280,
            height: 720,
        };
        let e = choose_extent(&caps, RenderSize::new(800, 600));
        assert_eq!((e.width, e.height), (1280, 720));
    }

    #[test]
    fn extent_is_clamped_to_limits() {
        let caps = caps_free_extent((200, 200), (640, 480));
        let e = choose_extent(&caps, RenderSize::new(800, 100));
        assert_eq!((e.width, e.height), (640, 200));
    }

    #[test]
    fn image_count_respects_maximum() {
        let mut caps = caps_free_extent((1, 1), (1, 1));
        assert_eq!(choose_image_count(&caps), 3);
        caps.max_image_count = 2;
        assert_eq!(choose_image_count(&caps), 2);
    }

    #[test]
    fn minimize_then_restore_defers_rebuild() {
        let caps = caps_free_extent((1, 1), (4096, 4096));
        let mut gate = ResizeGate::default();

        // 1600x900 -> minimized
        gate.request();
        assert_eq!(gate.poll(RenderSize::new(0, 0)), None);
        assert!(gate.is_deferred());
        assert!(gate.is_pending());
        // still minimized on the next tick
        assert_eq!(gate.poll(RenderSize::new(0, 900)), None);

        // restored at 800x600
        let size = gate.poll(RenderSize::new(800, 600)).unwrap();
        assert!(!gate.is_deferred());
        assert!(!gate.is_pending());
        let e = choose_extent(&caps, size);
        assert_eq!((e.width, e.height), (800, 600));
    }
}

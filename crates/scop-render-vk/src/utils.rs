// SPDX-License-Identifier: CEPL-1.0
//! Stateless helpers shared by every other Vulkan component.
use anyhow::{Context, Result};
use ash::vk;

use crate::VkError;

/// Depth formats in order of preference.
pub const DEPTH_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// Buffer plus its bound memory. Move-only; release with [`GpuBuffer::destroy`].
#[derive(Debug)]
pub struct GpuBuffer {
    pub buffer: vk::Buffer,
    pub memory: vk::DeviceMemory,
    pub size: vk::DeviceSize,
}

impl GpuBuffer {
    pub unsafe fn destroy(self, device: &ash::Device) {
        device.destroy_buffer(self.buffer, None);
        device.free_memory(self.memory, None);
    }
}

/// 2D image, its memory and a full-range view.
#[derive(Debug)]
pub struct GpuImage {
    pub image: vk::Image,
    pub memory: vk::DeviceMemory,
    pub view: vk::ImageView,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
}

impl GpuImage {
    pub unsafe fn destroy(self, device: &ash::Device) {
        device.destroy_image_view(self.view, None);
        device.destroy_image(self.image, None);
        device.free_memory(self.memory, None);
    }
}

/// First memory type allowed by `type_bits` that has every `required` flag.
pub fn find_memory_type(
    props: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    required: vk::MemoryPropertyFlags,
) -> Result<u32, VkError> {
    (0..props.memory_type_count)
        .find(|&i| {
            (type_bits & (1 << i)) != 0
                && props.memory_types[i as usize]
                    .property_flags
                    .contains(required)
        })
        .ok_or(VkError::NoMemoryType {
            type_bits,
            required,
        })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
}

impl QueueFamilyIndices {
    /// Scans queue families, preferring one family that can do both jobs.
    pub fn find(
        families: &[vk::QueueFamilyProperties],
        mut supports_present: impl FnMut(u32) -> bool,
    ) -> Self {
        let mut found = Self::default();
        for (i, family) in families.iter().enumerate() {
            let i = i as u32;
            let graphics = family.queue_count > 0
                && family.queue_flags.contains(vk::QueueFlags::GRAPHICS);
            let present = family.queue_count > 0 && supports_present(i);

            if graphics && present {
                return Self {
                    graphics: Some(i),
                    present: Some(i),
                };
            }
            if graphics && found.graphics.is_none() {
                found.graphics = Some(i);
            }
            if present && found.present.is_none() {
                found.present = Some(i);
            }
        }
        found
    }

    /// (graphics, present) once both are known.
    pub fn complete(&self) -> Option<(u32, u32)> {
        Some((self.graphics?, self.present?))
    }

    pub fn unique(&self) -> Vec<u32> {
        let mut out: Vec<u32> = self.graphics.into_iter().chain(self.present).collect();
        out.dedup();
        out
    }
}

/// First candidate whose tiling features include `features`.
pub fn find_supported_format(
    candidates: &[vk::Format],
    tiling: vk::ImageTiling,
    features: vk::FormatFeatureFlags,
    mut properties_of: impl FnMut(vk::Format) -> vk::FormatProperties,
) -> Option<vk::Format> {
    candidates.iter().copied().find(|&fmt| {
        let props = properties_of(fmt);
        match tiling {
            vk::ImageTiling::LINEAR => props.linear_tiling_features.contains(features),
            _ => props.optimal_tiling_features.contains(features),
        }
    })
}

pub unsafe fn pick_depth_format(
    instance: &ash::Instance,
    phys: vk::PhysicalDevice,
) -> Result<vk::Format, VkError> {
    find_supported_format(
        &DEPTH_CANDIDATES,
        vk::ImageTiling::OPTIMAL,
        vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
        |fmt| instance.get_physical_device_format_properties(phys, fmt),
    )
    .ok_or(VkError::NoDepthFormat)
}

pub fn has_stencil(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::D32_SFLOAT_S8_UINT | vk::Format::D24_UNORM_S8_UINT | vk::Format::D16_UNORM_S8_UINT
    )
}

pub fn aspect_for(format: vk::Format, layout: vk::ImageLayout) -> vk::ImageAspectFlags {
    if layout == vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL {
        if has_stencil(format) {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        } else {
            vk::ImageAspectFlags::DEPTH
        }
    } else {
        vk::ImageAspectFlags::COLOR
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionMasks {
    pub src_access: vk::AccessFlags,
    pub dst_access: vk::AccessFlags,
    pub src_stage: vk::PipelineStageFlags,
    pub dst_stage: vk::PipelineStageFlags,
}

/// Barrier masks for the three layout transitions the renderer performs.
pub fn transition_masks(
    from: vk::ImageLayout,
    to: vk::ImageLayout,
) -> Result<TransitionMasks, VkError> {
    use vk::ImageLayout as L;
    let masks = match (from, to) {
        (L::UNDEFINED, L::TRANSFER_DST_OPTIMAL) => TransitionMasks {
            src_access: vk::AccessFlags::empty(),
            dst_access: vk::AccessFlags::TRANSFER_WRITE,
            src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
            dst_stage: vk::PipelineStageFlags::TRANSFER,
        },
        (L::TRANSFER_DST_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL) => TransitionMasks {
            src_access: vk::AccessFlags::TRANSFER_WRITE,
            dst_access: vk::AccessFlags::SHADER_READ,
            src_stage: vk::PipelineStageFlags::TRANSFER,
            dst_stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
        },
        (L::UNDEFINED, L::DEPTH_STENCIL_ATTACHMENT_OPTIMAL) => TransitionMasks {
            src_access: vk::AccessFlags::empty(),
            dst_access: vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
            dst_stage: vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        },
        _ => return Err(VkError::UnsupportedTransition { from, to }),
    };
    Ok(masks)
}

/// Records a full-image layout barrier into `cmd`.
pub unsafe fn record_transition(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    image: vk::Image,
    format: vk::Format,
    from: vk::ImageLayout,
    to: vk::ImageLayout,
) -> Result<(), VkError> {
    let masks = transition_masks(from, to)?;
    let barrier = vk::ImageMemoryBarrier {
        s_type: vk::StructureType::IMAGE_MEMORY_BARRIER,
        src_access_mask: masks.src_access,
        dst_access_mask: masks.dst_access,
        old_layout: from,
        new_layout: to,
        src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
        dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
        image,
        subresource_range: vk::ImageSubresourceRange {
            aspect_mask: aspect_for(format, to),
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        },
        ..Default::default()
    };
    device.cmd_pipeline_barrier(
        cmd,
        masks.src_stage,
        masks.dst_stage,
        vk::DependencyFlags::empty(),
        &[],
        &[],
        std::slice::from_ref(&barrier),
    );
    Ok(())
}

pub unsafe fn create_buffer(
    device: &ash::Device,
    mem_props: &vk::PhysicalDeviceMemoryProperties,
    size: vk::DeviceSize,
    usage: vk::BufferUsageFlags,
    props: vk::MemoryPropertyFlags,
) -> Result<GpuBuffer> {
    let bci = vk::BufferCreateInfo {
        s_type: vk::StructureType::BUFFER_CREATE_INFO,
        size,
        usage,
        sharing_mode: vk::SharingMode::EXCLUSIVE,
        ..Default::default()
    };
    let buffer = device.create_buffer(&bci, None).context("create_buffer")?;
    let req = device.get_buffer_memory_requirements(buffer);

    let memory = match find_memory_type(mem_props, req.memory_type_bits, props)
        .map_err(anyhow::Error::from)
        .and_then(|idx| {
            let mai = vk::MemoryAllocateInfo {
                s_type: vk::StructureType::MEMORY_ALLOCATE_INFO,
                allocation_size: req.size,
                memory_type_index: idx,
                ..Default::default()
            };
            device
                .allocate_memory(&mai, None)
                .context("allocate_memory(buffer)")
        }) {
        Ok(m) => m,
        Err(e) => {
            device.destroy_buffer(buffer, None);
            return Err(e);
        }
    };

    if let Err(e) = device.bind_buffer_memory(buffer, memory, 0) {
        device.destroy_buffer(buffer, None);
        device.free_memory(memory, None);
        return Err(e).context("bind_buffer_memory");
    }
    Ok(GpuBuffer {
        buffer,
        memory,
        size,
    })
}

/// Copies `data` into host-visible `memory` through a temporary mapping.
pub unsafe fn write_mapped(device: &ash::Device, memory: vk::DeviceMemory, data: &[u8]) -> Result<()> {
    let ptr = device
        .map_memory(memory, 0, data.len() as vk::DeviceSize, vk::MemoryMapFlags::empty())
        .context("map_memory")?;
    std::ptr::copy_nonoverlapping(data.as_ptr(), ptr as *mut u8, data.len());
    device.unmap_memory(memory);
    Ok(())
}

pub unsafe fn create_image_view(
    device: &ash::Device,
    image: vk::Image,
    format: vk::Format,
    aspect: vk::ImageAspectFlags,
) -> Result<vk::ImageView> {
    let view_ci = vk::ImageViewCreateInfo {
        s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
        image,
        view_type: vk::ImageViewType::TYPE_2D,
        format,
        subresource_range: vk::ImageSubresourceRange {
            aspect_mask: aspect,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        },
        ..Default::default()
    };
    Ok(device.create_image_view(&view_ci, None)?)
}

/// Single-mip 2D image with device memory and a view over `aspect`.
#[allow(clippy::too_many_arguments)]
pub unsafe fn create_image(
    device: &ash::Device,
    mem_props: &vk::PhysicalDeviceMemoryProperties,
    extent: vk::Extent2D,
    format: vk::Format,
    tiling: vk::ImageTiling,
    usage: vk::ImageUsageFlags,
    props: vk::MemoryPropertyFlags,
    aspect: vk::ImageAspectFlags,
) -> Result<GpuImage> {
    let img_ci = vk::ImageCreateInfo {
        s_type: vk::StructureType::IMAGE_CREATE_INFO,
        image_type: vk::ImageType::TYPE_2D,
        format,
        extent: vk::Extent3D {
            width: extent.width,
            height: extent.height,
            depth: 1,
        },
        mip_levels: 1,
        array_layers: 1,
        samples: vk::SampleCountFlags::TYPE_1,
        tiling,
        usage,
        sharing_mode: vk::SharingMode::EXCLUSIVE,
        initial_layout: vk::ImageLayout::UNDEFINED,
        ..Default::default()
    };
    let image = device.create_image(&img_ci, None).context("create_image")?;
    let req = device.get_image_memory_requirements(image);

    let memory = match find_memory_type(mem_props, req.memory_type_bits, props)
        .map_err(anyhow::Error::from)
        .and_then(|idx| {
            let mai = vk::MemoryAllocateInfo {
                s_type: vk::StructureType::MEMORY_ALLOCATE_INFO,
                allocation_size: req.size,
                memory_type_index: idx,
                ..Default::default()
            };
            device
                .allocate_memory(&mai, None)
                .context("allocate_memory(image)")
        }) {
        Ok(m) => m,
        Err(e) => {
            device.destroy_image(image, None);
            return Err(e);
        }
    };

    let view = match device
        .bind_image_memory(image, memory, 0)
        .context("bind_image_memory")
        .and_then(|_| create_image_view(device, image, format, aspect))
    {
        Ok(v) => v,
        Err(e) => {
            device.destroy_image(image, None);
            device.free_memory(memory, None);
            return Err(e);
        }
    };

    Ok(GpuImage {
        image,
        memory,
        view,
        format,
        extent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_props(flags: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties::default();
        props.memory_type_count = flags.len() as u32;
        for (i, &f) in flags.iter().enumerate() {
            props.memory_types[i].property_flags = f;
        }
        props
    }

    #[test]
    fn memory_type_respects_type_bits_and_flags() {
        let host = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        let props = memory_props(&[vk::MemoryPropertyFlags::DEVICE_LOCAL, host, host]);

        assert_eq!(
            find_memory_type(&props, 0b111, vk::MemoryPropertyFlags::DEVICE_LOCAL).unwrap(),
            0
        );
        assert_eq!(find_memory_type(&props, 0b111, host).unwrap(), 1);
        // type 1 is masked out by the resource
        assert_eq!(find_memory_type(&props, 0b101, host).unwrap(), 2);
    }

    #[test]
    fn memory_type_missing_is_error() {
        let props = memory_props(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);
        let err = find_memory_type(&props, 0b1, vk::MemoryPropertyFlags::HOST_VISIBLE).unwrap_err();
        assert!(matches!(err, VkError::NoMemoryType { type_bits: 1, .. }));
    }

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    #[test]
    fn queue_families_prefer_shared_family() {
        let families = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
        ];
        let idx = QueueFamilyIndices::find(&families, |i| i != 0);
        assert_eq!(idx.complete(), Some((2, 2)));
        assert_eq!(idx.unique(), vec![2]);
    }

    #[test]
    fn queue_families_may_differ() {
        let families = [family(vk::QueueFlags::GRAPHICS), family(vk::QueueFlags::TRANSFER)];
        let idx = QueueFamilyIndices::find(&families, |i| i == 1);
        assert_eq!(idx.complete(), Some((0, 1)));
        assert_eq!(idx.unique(), vec![0, 1]);
    }

    #[test]
    fn queue_families_incomplete_without_present() {
        let families = [family(vk::QueueFlags::GRAPHICS)];
        let idx = QueueFamilyIndices::find(&families, |_| false);
        assert_eq!(idx.graphics, Some(0));
        assert_eq!(idx.complete(), None);
    }

    #[test]
    fn depth_format_takes_first_supported_candidate() {
        let pick = find_supported_format(
            &DEPTH_CANDIDATES,
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            |fmt| vk::FormatProperties {
                optimal_tiling_features: if fmt == vk::Format::D32_SFLOAT {
                    vk::FormatFeatureFlags::empty()
                } else {
                    vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT
                },
                ..Default::default()
            },
        );
        assert_eq!(pick, Some(vk::Format::D32_SFLOAT_S8_UINT));
    }

    #[test]
    fn depth_format_none_supported() {
        let pick = find_supported_format(
            &DEPTH_CANDIDATES,
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            |_| vk::FormatProperties {
                // linear support does not count for optimal tiling
                linear_tiling_features: vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
                ..Default::default()
            },
        );
        assert_eq!(pick, None);
    }

    #[test]
    fn supported_transitions() {
        use vk::ImageLayout as L;
        let up = transition_masks(L::UNDEFINED, L::TRANSFER_DST_OPTIMAL).unwrap();
        assert_eq!(up.dst_access, vk::AccessFlags::TRANSFER_WRITE);
        let ro = transition_masks(L::TRANSFER_DST_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL).unwrap();
        assert_eq!(ro.dst_stage, vk::PipelineStageFlags::FRAGMENT_SHADER);
        let depth = transition_masks(L::UNDEFINED, L::DEPTH_STENCIL_ATTACHMENT_OPTIMAL).unwrap();
        assert_eq!(depth.dst_stage, vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS);
    }

    #[test]
    fn other_transitions_are_rejected() {
        use vk::ImageLayout as L;
        let err = transition_masks(L::SHADER_READ_ONLY_OPTIMAL, L::TRANSFER_DST_OPTIMAL).unwrap_err();
        assert!(matches!(err, VkError::UnsupportedTransition { .. }));
    }

    #[test]
    fn depth_aspect_includes_stencil_when_present() {
        let layout = vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL;
        assert_eq!(aspect_for(vk::Format::D32_SFLOAT, layout), vk::ImageAspectFlags::DEPTH);
        assert_eq!(
            aspect_for(vk::Format::D24_UNORM_S8_UINT, layout),
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        );
        assert_eq!(
            aspect_for(vk::Format::R8G8B8A8_SRGB, vk::ImageLayout::TRANSFER_DST_OPTIMAL),
            vk::ImageAspectFlags::COLOR
        );
    }
}

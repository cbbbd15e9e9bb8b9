// SPDX-License-Identifier: CEPL-1.0
//! Staging uploads: host-visible staging buffer -> one-shot copy -> device-local.
use anyhow::{Context, Result};
use ash::vk;
use scop_render::Texture;
use tracing::debug;

use crate::utils::{self, GpuBuffer, GpuImage};
use crate::{CommandPool, VkError};

const STAGING_PROPS: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::from_raw(
    vk::MemoryPropertyFlags::HOST_VISIBLE.as_raw() | vk::MemoryPropertyFlags::HOST_COHERENT.as_raw(),
);

/// Destination usage for an uploaded buffer: copy target, and source for read-back.
fn destination_usage(usage: vk::BufferUsageFlags) -> vk::BufferUsageFlags {
    usage | vk::BufferUsageFlags::TRANSFER_DST | vk::BufferUsageFlags::TRANSFER_SRC
}

unsafe fn staging_with(pool: &CommandPool, data: &[u8]) -> Result<GpuBuffer> {
    let device = pool.device();
    let staging = utils::create_buffer(
        device,
        pool.memory_properties(),
        data.len() as vk::DeviceSize,
        vk::BufferUsageFlags::TRANSFER_SRC,
        STAGING_PROPS,
    )
    .context("create staging buffer")?;
    if let Err(e) = utils::write_mapped(device, staging.memory, data) {
        staging.destroy(device);
        return Err(e);
    }
    Ok(staging)
}

/// Uploads `data` into a new device-local buffer with `usage`.
///
/// The buffer is also a transfer source so it can be read back.
pub fn upload_buffer(
    pool: &CommandPool,
    data: &[u8],
    usage: vk::BufferUsageFlags,
) -> Result<GpuBuffer> {
    if data.is_empty() {
        return Err(VkError::EmptyUpload.into());
    }
    let device = pool.device();
    unsafe {
        // 1) staging buffer (HOST_VISIBLE|COHERENT), filled
        let staging = staging_with(pool, data)?;

        let result = (|| -> Result<GpuBuffer> {
            // 2) device-local destination
            let dst = utils::create_buffer(
                device,
                pool.memory_properties(),
                staging.size,
                destination_usage(usage),
                vk::MemoryPropertyFlags::DEVICE_LOCAL,
            )
            .context("create device-local buffer")?;

            // 3) one-shot copy, blocks until done
            let region = vk::BufferCopy {
                src_offset: 0,
                dst_offset: 0,
                size: staging.size,
            };
            let copied = pool.run_single_time(|d, cmd| {
                d.cmd_copy_buffer(cmd, staging.buffer, dst.buffer, std::slice::from_ref(&region));
                Ok(())
            });
            if let Err(e) = copied {
                dst.destroy(device);
                return Err(e);
            }
            Ok(dst)
        })();

        // 4) staging is done either way
        staging.destroy(device);
        if let Ok(buf) = &result {
            debug!("uploaded {} bytes ({:?})", buf.size, usage);
        }
        result
    }
}

/// Copies a device-local buffer back to host memory.
pub fn download_buffer(pool: &CommandPool, src: &GpuBuffer) -> Result<Vec<u8>> {
    if src.size == 0 {
        return Err(VkError::EmptyUpload.into());
    }
    let device = pool.device();
    unsafe {
        let readback = utils::create_buffer(
            device,
            pool.memory_properties(),
            src.size,
            vk::BufferUsageFlags::TRANSFER_DST,
            STAGING_PROPS,
        )
        .context("create readback buffer")?;

        let result = (|| -> Result<Vec<u8>> {
            let region = vk::BufferCopy {
                src_offset: 0,
                dst_offset: 0,
                size: src.size,
            };
            pool.run_single_time(|d, cmd| {
                d.cmd_copy_buffer(cmd, src.buffer, readback.buffer, std::slice::from_ref(&region));
                Ok(())
            })?;

            let ptr = device
                .map_memory(readback.memory, 0, src.size, vk::MemoryMapFlags::empty())
                .context("map_memory(readback)")?;
            let bytes = std::slice::from_raw_parts(ptr as *const u8, src.size as usize).to_vec();
            device.unmap_memory(readback.memory);
            Ok(bytes)
        })();

        readback.destroy(device);
        result
    }
}

/// Uploads RGBA8 pixels into a sampled image left in SHADER_READ_ONLY_OPTIMAL.
pub fn upload_texture(pool: &CommandPool, texture: &Texture, format: vk::Format) -> Result<GpuImage> {
    let pixels = texture.pixels();
    if pixels.is_empty() {
        return Err(VkError::EmptyUpload.into());
    }
    let device = pool.device();
    let extent = vk::Extent2D {
        width: texture.width(),
        height: texture.height(),
    };
    unsafe {
        let staging = staging_with(pool, pixels)?;

        let result = (|| -> Result<GpuImage> {
            let image = utils::create_image(
                device,
                pool.memory_properties(),
                extent,
                format,
                vk::ImageTiling::OPTIMAL,
                vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
                vk::MemoryPropertyFlags::DEVICE_LOCAL,
                vk::ImageAspectFlags::COLOR,
            )
            .context("create texture image")?;

            // undefined -> transfer dst, copy, transfer dst -> shader read
            let recorded = pool.run_single_time(|d, cmd| {
                utils::record_transition(
                    d,
                    cmd,
                    image.image,
                    format,
                    vk::ImageLayout::UNDEFINED,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                )?;
                let region = vk::BufferImageCopy {
                    buffer_offset: 0,
                    buffer_row_length: 0,
                    buffer_image_height: 0,
                    image_subresource: vk::ImageSubresourceLayers {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        mip_level: 0,
                        base_array_layer: 0,
                        layer_count: 1,
                    },
                    image_offset: vk::Offset3D { x: 0, y: 0, z: 0 },
                    image_extent: vk::Extent3D {
                        width: extent.width,
                        height: extent.height,
                        depth: 1,
                    },
                };
                d.cmd_copy_buffer_to_image(
                    cmd,
                    staging.buffer,
                    image.image,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    std::slice::from_ref(&region),
                );
                utils::record_transition(
                    d,
                    cmd,
                    image.image,
                    format,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                )?;
                Ok(())
            });
            if let Err(e) = recorded {
                image.destroy(device);
                return Err(e);
            }
            Ok(image)
        })();

        staging.destroy(device);
        if result.is_ok() {
            debug!("uploaded texture {}x{}", extent.width, extent.height);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uploaded_buffers_keep_their_usage() {
        let usage = destination_usage(vk::BufferUsageFlags::VERTEX_BUFFER);
        assert!(usage.contains(vk::BufferUsageFlags::VERTEX_BUFFER));
        assert!(usage.contains(vk::BufferUsageFlags::TRANSFER_DST));
        assert!(usage.contains(vk::BufferUsageFlags::TRANSFER_SRC));
        assert!(!usage.contains(vk::BufferUsageFlags::INDEX_BUFFER));
    }

    #[test]
    fn staging_is_host_coherent() {
        assert!(STAGING_PROPS.contains(vk::MemoryPropertyFlags::HOST_VISIBLE));
        assert!(STAGING_PROPS.contains(vk::MemoryPropertyFlags::HOST_COHERENT));
        assert!(!STAGING_PROPS.contains(vk::MemoryPropertyFlags::DEVICE_LOCAL));
    }
}

// SPDX-License-Identifier: CEPL-1.0
use anyhow::{Context, Result};
use ash::vk;
use scop_render::{Lifecycle, MAX_FRAMES_IN_FLIGHT};
use tracing::debug;

use crate::{DeviceContext, VkError};

/// Graphics-queue command pool: one persistent buffer per frame slot, plus
/// blocking one-shot buffers for load-time transfers.
pub struct CommandPool {
    device: ash::Device,
    memory: vk::PhysicalDeviceMemoryProperties,
    queue: vk::Queue,
    family: u32,

    pool: Lifecycle<vk::CommandPool>,
    frame_buffers: Vec<vk::CommandBuffer>,
}

impl CommandPool {
    pub fn new(ctx: &DeviceContext) -> Result<Self> {
        let mut pool = Self {
            device: ctx.device().clone(),
            memory: *ctx.memory_properties(),
            queue: ctx.graphics_queue(),
            family: ctx.graphics_family(),
            pool: Lifecycle::Uninitialized,
            frame_buffers: Vec::new(),
        };
        pool.create()?;
        Ok(pool)
    }

    /// (Re)creates the pool and its frame buffers, releasing any previous pool.
    pub fn create(&mut self) -> Result<()> {
        self.destroy();
        unsafe {
            let pool_info = vk::CommandPoolCreateInfo {
                s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
                queue_family_index: self.family,
                flags: vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
                ..Default::default()
            };
            let pool = self
                .device
                .create_command_pool(&pool_info, None)
                .context("create_command_pool")?;

            let alloc_info = vk::CommandBufferAllocateInfo {
                s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
                command_pool: pool,
                level: vk::CommandBufferLevel::PRIMARY,
                command_buffer_count: MAX_FRAMES_IN_FLIGHT as u32,
                ..Default::default()
            };
            let buffers = match self.device.allocate_command_buffers(&alloc_info) {
                Ok(b) => b,
                Err(e) => {
                    self.device.destroy_command_pool(pool, None);
                    return Err(e).context("allocate_command_buffers(frames)");
                }
            };
            let device = &self.device;
            self.pool
                .replace_with(pool, |old| device.destroy_command_pool(old, None));
            self.frame_buffers = buffers;
        }
        debug!("command pool created ({MAX_FRAMES_IN_FLIGHT} frame buffers)");
        Ok(())
    }

    fn handle(&self) -> Result<vk::CommandPool, VkError> {
        self.pool.live().copied().ok_or(VkError::PoolNotCreated)
    }

    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory
    }

    pub fn is_created(&self) -> bool {
        self.pool.is_live()
    }

    /// Persistent command buffer for frame slot `slot`.
    pub fn frame_buffer(&self, slot: usize) -> Result<vk::CommandBuffer, VkError> {
        self.handle()?;
        Ok(self.frame_buffers[slot])
    }

    pub fn begin_single_time_commands(&self) -> Result<vk::CommandBuffer> {
        let pool = self.handle()?;
        unsafe {
            let ai = vk::CommandBufferAllocateInfo {
                s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
                command_pool: pool,
                level: vk::CommandBufferLevel::PRIMARY,
                command_buffer_count: 1,
                ..Default::default()
            };
            let cmd = self
                .device
                .allocate_command_buffers(&ai)
                .context("allocate_command_buffers(one-shot)")?[0];
            let bi = vk::CommandBufferBeginInfo {
                s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
                flags: vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
                ..Default::default()
            };
            if let Err(e) = self.device.begin_command_buffer(cmd, &bi) {
                self.device.free_command_buffers(pool, &[cmd]);
                return Err(e).context("begin_command_buffer(one-shot)");
            }
            Ok(cmd)
        }
    }

    /// Submits `cmd`, blocks until the queue is idle, then frees it.
    pub fn end_single_time_commands(&self, cmd: vk::CommandBuffer) -> Result<()> {
        let pool = self.handle()?;
        unsafe {
            let result = (|| -> Result<()> {
                self.device
                    .end_command_buffer(cmd)
                    .context("end_command_buffer(one-shot)")?;
                let si = vk::SubmitInfo {
                    s_type: vk::StructureType::SUBMIT_INFO,
                    command_buffer_count: 1,
                    p_command_buffers: &cmd,
                    ..Default::default()
                };
                self.device
                    .queue_submit(self.queue, std::slice::from_ref(&si), vk::Fence::null())
                    .context("queue_submit(one-shot)")?;
                self.device
                    .queue_wait_idle(self.queue)
                    .context("queue_wait_idle(one-shot)")
            })();
            self.device.free_command_buffers(pool, &[cmd]);
            result
        }
    }

    /// Records `record` into a one-shot buffer and runs it to completion.
    pub fn run_single_time<F>(&self, record: F) -> Result<()>
    where
        F: FnOnce(&ash::Device, vk::CommandBuffer) -> Result<()>,
    {
        let cmd = self.begin_single_time_commands()?;
        if let Err(e) = record(&self.device, cmd) {
            self.discard(cmd);
            return Err(e);
        }
        self.end_single_time_commands(cmd)
    }

    /// Ends and frees a one-shot buffer without submitting it.
    fn discard(&self, cmd: vk::CommandBuffer) {
        let Ok(pool) = self.handle() else { return };
        unsafe {
            let _ = self.device.end_command_buffer(cmd);
            self.device.free_command_buffers(pool, &[cmd]);
        }
    }

    pub fn destroy(&mut self) {
        if let Some(pool) = self.pool.take_live() {
            unsafe { self.device.destroy_command_pool(pool, None) };
            self.frame_buffers.clear();
            debug!("command pool destroyed");
        }
    }
}

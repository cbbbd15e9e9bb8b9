// SPDX-License-Identifier: CEPL-1.0
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use ash::khr::swapchain;
use ash::vk;
use scop_render::{Lifecycle, PresentPreference, WindowSurface, MAX_FRAMES_IN_FLIGHT};
use tracing::{debug, info, warn};

use crate::context::Surface;
use crate::mesh::Mesh;
use crate::shader::Shader;
use crate::swapchain::{
    choose_surface_format, ResizeGate, SwapchainParams, SwapchainState, SwapchainSupport,
};
use crate::sync::{FrameCursor, FramePhase, FrameSync};
use crate::utils;
use crate::{CommandPool, DeviceContext, VkError};

/// The frame being recorded: which slot, which swapchain image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameToken {
    pub slot: usize,
    pub image_index: u32,
}

/// Owns the surface, swapchain, render pass and per-slot sync objects, and
/// runs the acquire -> record -> submit -> present protocol.
pub struct Presenter {
    window: Arc<dyn WindowSurface>,
    device: ash::Device,
    swapchain_loader: swapchain::Device,
    surface: Lifecycle<Surface>,

    phys: vk::PhysicalDevice,
    memory: vk::PhysicalDeviceMemoryProperties,
    families: (u32, u32),
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,

    preference: PresentPreference,
    clear_color: [f32; 4],
    surface_format: vk::SurfaceFormatKHR,
    depth_format: vk::Format,

    render_pass: Lifecycle<vk::RenderPass>,
    state: Lifecycle<SwapchainState>,
    sync: Vec<FrameSync>,
    cursor: FrameCursor,
    current: Option<FrameToken>,
    resize: ResizeGate,
    generation: u64,
}

impl Presenter {
    /// Takes ownership of `surface`. On failure everything including the
    /// surface is released.
    pub fn new(
        ctx: &DeviceContext,
        surface: Surface,
        window: Arc<dyn WindowSurface>,
        preference: PresentPreference,
        clear_color: [f32; 4],
        pool: &CommandPool,
    ) -> Result<Self> {
        let phys = ctx.physical_device();
        let picked = unsafe {
            SwapchainSupport::query(&surface, phys).and_then(|support| {
                let format = choose_surface_format(&support.formats).ok_or(VkError::NoSurfaceFormat)?;
                let depth = utils::pick_depth_format(ctx.instance(), phys)?;
                Ok((format, depth))
            })
        };
        let (surface_format, depth_format) = match picked {
            Ok(p) => p,
            Err(e) => {
                unsafe { surface.destroy() };
                return Err(e);
            }
        };

        let mut presenter = Self {
            window,
            device: ctx.device().clone(),
            swapchain_loader: swapchain::Device::new(ctx.instance(), ctx.device()),
            surface: Lifecycle::Uninitialized,
            phys,
            memory: *ctx.memory_properties(),
            families: (ctx.graphics_family(), ctx.present_family()),
            graphics_queue: ctx.graphics_queue(),
            present_queue: ctx.present_queue(),
            preference,
            clear_color,
            surface_format,
            depth_format,
            render_pass: Lifecycle::Uninitialized,
            state: Lifecycle::Uninitialized,
            sync: Vec::with_capacity(MAX_FRAMES_IN_FLIGHT),
            cursor: FrameCursor::new(MAX_FRAMES_IN_FLIGHT),
            current: None,
            resize: ResizeGate::default(),
            generation: 0,
        };
        presenter
            .surface
            .replace_with(surface, |old| unsafe { old.destroy() });

        if let Err(e) = presenter.init(pool) {
            presenter.destroy();
            return Err(e);
        }
        info!(
            "presenter ready: color {:?}/{:?}, depth {:?}",
            surface_format.format, surface_format.color_space, depth_format
        );
        Ok(presenter)
    }

    fn init(&mut self, pool: &CommandPool) -> Result<()> {
        let render_pass =
            unsafe { create_render_pass(&self.device, self.surface_format.format, self.depth_format)? };
        let device = &self.device;
        self.render_pass
            .replace_with(render_pass, |old| unsafe { device.destroy_render_pass(old, None) });

        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            let sync = unsafe { FrameSync::new(&self.device)? };
            self.sync.push(sync);
        }

        // a zero-sized window at startup parks the first build
        self.resize.request();
        self.recreate_swapchain(pool)?;
        Ok(())
    }

    pub fn notify_resized(&mut self) {
        self.resize.request();
    }

    /// Rebuilds the swapchain at the window's current size. Returns false if
    /// the window is zero-sized; the rebuild then stays pending.
    pub fn recreate_swapchain(&mut self, pool: &CommandPool) -> Result<bool> {
        let Some(size) = self.resize.poll(self.window.framebuffer_size()) else {
            debug!("swapchain rebuild deferred: window has no drawable area");
            return Ok(false);
        };

        unsafe {
            self.device
                .device_wait_idle()
                .context("device_wait_idle(recreate)")?;
            if let Some(old) = self.state.take_live() {
                old.destroy(&self.device, &self.swapchain_loader);
            }
        }

        let surface = self.surface.live().ok_or_else(|| anyhow!("surface destroyed"))?;
        let render_pass = self
            .render_pass
            .live()
            .copied()
            .ok_or_else(|| anyhow!("render pass destroyed"))?;
        let params = SwapchainParams {
            device: &self.device,
            loader: &self.swapchain_loader,
            surface,
            phys: self.phys,
            memory: &self.memory,
            surface_format: self.surface_format,
            depth_format: self.depth_format,
            preference: self.preference,
            render_pass,
            families: self.families,
            size,
        };
        let state = unsafe { SwapchainState::create(&params)? };

        if let Some(depth) = state.depth_image() {
            let (image, format) = (depth.image, depth.format);
            let moved = pool.run_single_time(|d, cmd| {
                unsafe {
                    utils::record_transition(
                        d,
                        cmd,
                        image,
                        format,
                        vk::ImageLayout::UNDEFINED,
                        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
                    )?
                };
                Ok(())
            });
            if let Err(e) = moved {
                unsafe { state.destroy(&self.device, &self.swapchain_loader) };
                return Err(e).context("depth layout transition");
            }
        }

        debug_assert_eq!(state.framebuffers.len(), state.images.len());
        self.generation += 1;
        info!(
            "swapchain #{}: {}x{}, {} images",
            self.generation,
            state.extent.width,
            state.extent.height,
            state.images.len()
        );
        let (device, loader) = (&self.device, &self.swapchain_loader);
        self.state
            .replace_with(state, |old| unsafe { old.destroy(device, loader) });
        Ok(true)
    }

    /// Waits for the current slot, acquires an image and opens the render
    /// pass. `Ok(None)` means no image this tick; try again on the next one.
    pub fn start_draw(&mut self, pool: &CommandPool) -> Result<Option<FrameToken>> {
        // a second start_draw would wait on a fence nothing will signal
        self.cursor.ensure_idle()?;
        if (self.resize.is_deferred() || !self.state.is_live()) && !self.recreate_swapchain(pool)? {
            return Ok(None);
        }

        let slot = self.cursor.slot();
        let (image_available, in_flight) = {
            let sync = &self.sync[slot];
            (sync.image_available, sync.in_flight)
        };
        let (swapchain, extent) = {
            let state = self.state.live().ok_or(VkError::NoSwapchain)?;
            (state.swapchain, state.extent)
        };

        unsafe {
            // covers the last submission that used this slot
            self.device
                .wait_for_fences(&[in_flight], true, u64::MAX)
                .context("wait_for_fences")?;

            let image_index = match self.swapchain_loader.acquire_next_image(
                swapchain,
                u64::MAX,
                image_available,
                vk::Fence::null(),
            ) {
                Ok((index, _suboptimal)) => index,
                Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                    // nothing recorded, fence untouched
                    self.resize.request();
                    self.recreate_swapchain(pool)?;
                    return Ok(None);
                }
                Err(e) => return Err(e).context("acquire_next_image"),
            };

            let framebuffer = self
                .state
                .live()
                .and_then(|s| s.framebuffers.get(image_index as usize).copied())
                .ok_or(VkError::NoSwapchain)?;
            let render_pass = self.render_pass.live().copied().ok_or(VkError::NoSwapchain)?;

            self.device
                .reset_fences(&[in_flight])
                .context("reset_fences")?;
            self.cursor.begin()?;
            let recorded = (|| -> Result<()> {
                let cmd = pool.frame_buffer(slot)?;
                self.device
                    .reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())
                    .context("reset_command_buffer")?;
                let begin = vk::CommandBufferBeginInfo {
                    s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
                    flags: vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
                    ..Default::default()
                };
                self.device
                    .begin_command_buffer(cmd, &begin)
                    .context("begin_command_buffer")?;

                let clears = [
                    vk::ClearValue {
                        color: vk::ClearColorValue {
                            float32: self.clear_color,
                        },
                    },
                    vk::ClearValue {
                        depth_stencil: vk::ClearDepthStencilValue {
                            depth: 1.0,
                            stencil: 0,
                        },
                    },
                ];
                let rp_begin = vk::RenderPassBeginInfo {
                    s_type: vk::StructureType::RENDER_PASS_BEGIN_INFO,
                    render_pass,
                    framebuffer,
                    render_area: vk::Rect2D {
                        offset: vk::Offset2D { x: 0, y: 0 },
                        extent,
                    },
                    clear_value_count: clears.len() as u32,
                    p_clear_values: clears.as_ptr(),
                    ..Default::default()
                };
                self.device
                    .cmd_begin_render_pass(cmd, &rp_begin, vk::SubpassContents::INLINE);
                Ok(())
            })();
            if let Err(e) = recorded {
                // the fence is already reset; hand it back signaled
                self.abandon_frame(image_available, in_flight);
                return Err(e);
            }

            let token = FrameToken { slot, image_index };
            self.current = Some(token);
            Ok(Some(token))
        }
    }

    /// Records one indexed draw of `mesh` with `shader` into the open frame.
    pub fn draw_mesh(&self, pool: &CommandPool, mesh: &Mesh, shader: &Shader) -> Result<()> {
        let token = self.recording()?;
        let cmd = pool.frame_buffer(token.slot)?;
        let extent = self.state.live().ok_or(VkError::NoSwapchain)?.extent;
        let pipeline = shader.pipeline().ok_or_else(|| anyhow!("shader has no pipeline"))?;
        let layout = shader
            .pipeline_layout()
            .ok_or_else(|| anyhow!("shader has no pipeline layout"))?;
        let (vertex_buffer, index_buffer) = mesh.buffers()?;

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        unsafe {
            let d = &self.device;
            d.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, pipeline);
            d.cmd_set_viewport(cmd, 0, &[viewport]);
            d.cmd_set_scissor(cmd, 0, &[scissor]);
            d.cmd_bind_vertex_buffers(cmd, 0, &[vertex_buffer], &[0]);
            d.cmd_bind_index_buffer(cmd, index_buffer, 0, vk::IndexType::UINT32);
            if let Some(set) = shader.descriptor_set(token.slot) {
                d.cmd_bind_descriptor_sets(
                    cmd,
                    vk::PipelineBindPoint::GRAPHICS,
                    layout,
                    0,
                    &[set],
                    &[],
                );
            }
            d.cmd_draw_indexed(cmd, mesh.index_count(), 1, 0, 0, 0);
        }
        Ok(())
    }

    /// Closes and submits the frame, presents it, and advances the slot.
    /// A stale swapchain or a pending resize triggers a rebuild afterwards.
    pub fn end_draw(&mut self, pool: &CommandPool) -> Result<()> {
        let token = self.recording()?;
        let cmd = pool.frame_buffer(token.slot)?;
        let (image_available, render_finished, in_flight) = {
            let s = &self.sync[token.slot];
            (s.image_available, s.render_finished, s.in_flight)
        };
        let swapchain = self.state.live().ok_or(VkError::NoSwapchain)?.swapchain;

        let submitted = unsafe {
            self.device.cmd_end_render_pass(cmd);
            self.device
                .end_command_buffer(cmd)
                .context("end_command_buffer")
                .and_then(|()| {
                    let wait_stage = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT;
                    let submit = vk::SubmitInfo {
                        s_type: vk::StructureType::SUBMIT_INFO,
                        wait_semaphore_count: 1,
                        p_wait_semaphores: &image_available,
                        p_wait_dst_stage_mask: &wait_stage,
                        command_buffer_count: 1,
                        p_command_buffers: &cmd,
                        signal_semaphore_count: 1,
                        p_signal_semaphores: &render_finished,
                        ..Default::default()
                    };
                    self.device
                        .queue_submit(self.graphics_queue, std::slice::from_ref(&submit), in_flight)
                        .context("queue_submit")
                })
        };
        if let Err(e) = submitted {
            self.abandon_frame(image_available, in_flight);
            return Err(e);
        }
        self.current = None;
        self.cursor.submit()?;

        let presented = unsafe {
            let present = vk::PresentInfoKHR {
                s_type: vk::StructureType::PRESENT_INFO_KHR,
                wait_semaphore_count: 1,
                p_wait_semaphores: &render_finished,
                swapchain_count: 1,
                p_swapchains: &swapchain,
                p_image_indices: &token.image_index,
                ..Default::default()
            };
            self.swapchain_loader.queue_present(self.present_queue, &present)
        };
        self.cursor.advance()?;
        let stale = match presented {
            Ok(suboptimal) => suboptimal,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => true,
            Err(e) => return Err(e).context("queue_present"),
        };

        if stale || self.resize.is_pending() {
            self.resize.request();
            self.recreate_swapchain(pool)?;
        }
        Ok(())
    }

    /// Returns the slot to Idle after its submission failed. An empty batch
    /// consumes the acquire semaphore and signals the fence, so the next
    /// wait on this slot returns.
    fn abandon_frame(&mut self, image_available: vk::Semaphore, in_flight: vk::Fence) {
        let wait_stage = vk::PipelineStageFlags::ALL_COMMANDS;
        let release = vk::SubmitInfo {
            s_type: vk::StructureType::SUBMIT_INFO,
            wait_semaphore_count: 1,
            p_wait_semaphores: &image_available,
            p_wait_dst_stage_mask: &wait_stage,
            ..Default::default()
        };
        let signaled = unsafe {
            self.device
                .queue_submit(self.graphics_queue, std::slice::from_ref(&release), in_flight)
        };
        if let Err(e) = signaled {
            warn!("frame slot {} left unsignaled: {e}", self.cursor.slot());
        }
        if let Err(e) = self.cursor.abort() {
            warn!("abandon frame: {e}");
        }
        self.current = None;
    }

    fn recording(&self) -> Result<FrameToken, VkError> {
        match self.current {
            Some(token) if self.cursor.phase() == FramePhase::Recording => Ok(token),
            _ => Err(VkError::FrameOrder {
                expected: "recording",
                actual: match self.cursor.phase() {
                    FramePhase::Idle => "idle",
                    FramePhase::Recording => "recording",
                    FramePhase::Submitted => "submitted",
                },
            }),
        }
    }

    pub fn render_pass(&self) -> Option<vk::RenderPass> {
        self.render_pass.live().copied()
    }

    pub fn extent(&self) -> Option<vk::Extent2D> {
        self.state.live().map(|s| s.extent)
    }

    pub fn image_count(&self) -> usize {
        self.state.live().map_or(0, |s| s.images.len())
    }

    pub fn frame_slot(&self) -> usize {
        self.cursor.slot()
    }

    /// Number of swapchains built so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_paused(&self) -> bool {
        self.resize.is_deferred()
    }

    pub fn surface_format(&self) -> vk::SurfaceFormatKHR {
        self.surface_format
    }

    pub fn depth_format(&self) -> vk::Format {
        self.depth_format
    }

    /// STRICT TEARDOWN ORDER: sync objects -> swapchain state -> render pass
    /// -> surface. The device must be idle. Idempotent.
    pub fn destroy(&mut self) {
        unsafe {
            for sync in self.sync.drain(..) {
                sync.destroy(&self.device);
            }
            if let Some(state) = self.state.take_live() {
                state.destroy(&self.device, &self.swapchain_loader);
            }
            if let Some(rp) = self.render_pass.take_live() {
                self.device.destroy_render_pass(rp, None);
            }
            if let Some(surface) = self.surface.take_live() {
                surface.destroy();
                debug!("presenter destroyed");
            }
        }
        self.current = None;
    }
}

/// Color (cleared, presented) + depth (cleared, discarded), one subpass.
unsafe fn create_render_pass(
    device: &ash::Device,
    color_format: vk::Format,
    depth_format: vk::Format,
) -> Result<vk::RenderPass> {
    let attachments = [
        vk::AttachmentDescription {
            format: color_format,
            samples: vk::SampleCountFlags::TYPE_1,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
            stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            final_layout: vk::ImageLayout::PRESENT_SRC_KHR,
            ..Default::default()
        },
        vk::AttachmentDescription {
            format: depth_format,
            samples: vk::SampleCountFlags::TYPE_1,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::DONT_CARE,
            stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
            stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            final_layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            ..Default::default()
        },
    ];
    let color_ref = vk::AttachmentReference {
        attachment: 0,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    };
    let depth_ref = vk::AttachmentReference {
        attachment: 1,
        layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    };
    let subpass = vk::SubpassDescription {
        pipeline_bind_point: vk::PipelineBindPoint::GRAPHICS,
        color_attachment_count: 1,
        p_color_attachments: &color_ref,
        p_depth_stencil_attachment: &depth_ref,
        ..Default::default()
    };
    let stages = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
        | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS;
    let dependency = vk::SubpassDependency {
        src_subpass: vk::SUBPASS_EXTERNAL,
        dst_subpass: 0,
        src_stage_mask: stages,
        dst_stage_mask: stages,
        src_access_mask: vk::AccessFlags::empty(),
        dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE
            | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        ..Default::default()
    };
    let rp_info = vk::RenderPassCreateInfo {
        s_type: vk::StructureType::RENDER_PASS_CREATE_INFO,
        attachment_count: attachments.len() as u32,
        p_attachments: attachments.as_ptr(),
        subpass_count: 1,
        p_subpasses: &subpass,
        dependency_count: 1,
        p_dependencies: &dependency,
        ..Default::default()
    };
    device
        .create_render_pass(&rp_info, None)
        .context("create_render_pass")
}

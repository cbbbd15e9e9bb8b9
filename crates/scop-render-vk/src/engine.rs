// SPDX-License-Identifier: CEPL-1.0
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use ash::vk;
use scop_render::{MeshData, PolygonMode, PresentPreference, RenderError, SamplerFilter, WindowSurface};
use tracing::{info, warn};

use crate::mesh::Mesh;
use crate::presenter::{FrameToken, Presenter};
use crate::shader::{Shader, ShaderDesc};
use crate::texture::TextureManager;
use crate::{CommandPool, DeviceContext, DeviceOptions};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub app_name: String,
    pub validation: bool,
    pub present: PresentPreference,
    pub clear_color: [f32; 4],
    pub sampler_filter: SamplerFilter,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            app_name: "scop".to_owned(),
            validation: cfg!(debug_assertions),
            present: PresentPreference::default(),
            clear_color: [0.02, 0.02, 0.03, 1.0],
            sampler_filter: SamplerFilter::default(),
        }
    }
}

/// Device, command pool, presenter and texture registry behind one handle.
pub struct Engine {
    context: DeviceContext,
    pool: CommandPool,
    presenter: Presenter,
    textures: TextureManager,
}

impl Engine {
    /// Brings the whole stack up. A failing step tears down the ones before
    /// it, in reverse order.
    pub fn new(window: Arc<dyn WindowSurface>, config: &EngineConfig) -> Result<Self> {
        let options = DeviceOptions {
            app_name: config.app_name.clone(),
            validation: config.validation,
        };
        let (mut context, surface) =
            DeviceContext::new(window.as_ref(), &options).context("device context")?;

        let mut pool = match CommandPool::new(&context) {
            Ok(p) => p,
            Err(e) => {
                unsafe { surface.destroy() };
                context.destroy();
                return Err(e.context("command pool"));
            }
        };

        let presenter = match Presenter::new(
            &context,
            surface,
            window,
            config.present,
            config.clear_color,
            &pool,
        ) {
            Ok(p) => p,
            Err(e) => {
                pool.destroy();
                context.destroy();
                return Err(e.context("presenter"));
            }
        };

        let textures = TextureManager::new(config.sampler_filter, context.max_sampler_anisotropy());
        info!("engine ready");
        Ok(Self {
            context,
            pool,
            presenter,
            textures,
        })
    }

    pub fn context(&self) -> &DeviceContext {
        &self.context
    }

    pub fn device(&self) -> &ash::Device {
        self.context.device()
    }

    pub fn command_pool(&self) -> &CommandPool {
        &self.pool
    }

    pub fn textures(&self) -> &TextureManager {
        &self.textures
    }

    pub fn textures_mut(&mut self) -> &mut TextureManager {
        &mut self.textures
    }

    pub fn render_pass(&self) -> Option<vk::RenderPass> {
        self.presenter.render_pass()
    }

    pub fn add_texture(&mut self, id: &str, path: impl AsRef<Path>) -> Result<(), RenderError> {
        self.textures.add_texture(id, path)
    }

    pub fn create_image(&mut self, image_id: &str, texture_id: &str) -> Result<()> {
        self.textures.create_image(image_id, texture_id, &self.pool)
    }

    /// Uploads every pending texture, then drops the CPU copies.
    pub fn create_all_images(&mut self) -> Result<()> {
        self.textures.create_all_images(&self.pool)?;
        self.textures.release_textures();
        Ok(())
    }

    /// Builds a pipeline against the engine's render pass. Wireframe and
    /// point modes fall back to fill on devices without non-solid fill.
    pub fn create_shader(&self, desc: &ShaderDesc) -> Result<Shader> {
        let render_pass = self
            .presenter
            .render_pass()
            .context("render pass not available")?;
        let mut desc = desc.clone();
        if desc.polygon_mode != PolygonMode::Fill && !self.context.supports_non_solid_fill() {
            warn!(
                "{:?} polygon mode unsupported by this device, using fill",
                desc.polygon_mode
            );
            desc.polygon_mode = PolygonMode::Fill;
        }
        Shader::new(
            self.context.device(),
            self.context.memory_properties(),
            render_pass,
            &self.textures,
            &desc,
        )
    }

    pub fn upload_mesh(&self, data: MeshData) -> Result<Mesh> {
        let mut mesh = Mesh::new(data);
        mesh.create_buffers(&self.pool)?;
        Ok(mesh)
    }

    pub fn start_draw(&mut self) -> Result<Option<FrameToken>> {
        self.presenter.start_draw(&self.pool)
    }

    pub fn draw_mesh(&self, mesh: &Mesh, shader: &Shader) -> Result<()> {
        self.presenter.draw_mesh(&self.pool, mesh, shader)
    }

    pub fn end_draw(&mut self) -> Result<()> {
        self.presenter.end_draw(&self.pool)
    }

    pub fn notify_resized(&mut self) {
        self.presenter.notify_resized();
    }

    /// True while the window is zero-sized and drawing is suspended.
    pub fn is_paused(&self) -> bool {
        self.presenter.is_paused()
    }

    pub fn frame_slot(&self) -> usize {
        self.presenter.frame_slot()
    }

    pub fn swapchain_extent(&self) -> Option<vk::Extent2D> {
        self.presenter.extent()
    }

    pub fn wait_idle(&self) -> Result<()> {
        self.context.wait_idle()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        // STRICT TEARDOWN ORDER:
        // idle -> images -> command pool -> presenter -> device context.
        if let Err(e) = self.context.wait_idle() {
            warn!("wait_idle on shutdown: {e:#}");
        }
        self.textures.destroy_images(self.context.device());
        self.pool.destroy();
        self.presenter.destroy();
        self.context.destroy();
        info!("engine shut down");
    }
}

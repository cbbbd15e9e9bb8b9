// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]

mod config;
mod controls;
mod scene;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use scop_core::{init_tracing, FpsCounter, FpsStats, FrameClock};
use scop_math::{glam::Vec3, Camera};
use scop_platform::winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::WindowId,
};
use scop_platform::{InputManager, PlatformWindow};
use scop_render::{DescriptorSchema, MeshUbo, RenderSize, ShaderStages, Vertex, VertexType};
use scop_render_vk::{Engine, EngineConfig, Mesh, Shader, ShaderDesc, ShaderSource};
use tracing::{error, info, warn};

use config::{AppConfig, Overrides};

const TEXTURE_ID: &str = "duckSpaceship";

#[derive(Parser, Debug)]
#[command(author, version, about = "Textured mesh viewer on Vulkan", long_about = None)]
struct Args {
    /// TOML config file; defaults are used when it does not exist
    #[arg(long, default_value = "scop.toml")]
    config: PathBuf,
    /// Texture mapped onto the model
    #[arg(long)]
    texture: Option<PathBuf>,
    /// Draw edges only
    #[arg(long)]
    wireframe: bool,
    /// Force the Khronos validation layer on
    #[arg(long, overrides_with = "no_validation")]
    validation: bool,
    /// Force the validation layer off
    #[arg(long, overrides_with = "validation")]
    no_validation: bool,
    /// Read mesh buffers back after upload and compare
    #[arg(long)]
    verify_uploads: bool,
    /// Log filter directive, e.g. `debug` or `scop_render_vk=trace`
    #[arg(long, default_value = "info")]
    log: String,
}

impl Args {
    fn overrides(&self) -> Overrides {
        let validation = if self.validation {
            Some(true)
        } else if self.no_validation {
            Some(false)
        } else {
            None
        };
        Overrides {
            texture: self.texture.clone(),
            wireframe: self.wireframe,
            validation,
        }
    }
}

/// GPU objects owned by the app. Mesh and shader go before the engine.
struct Gpu {
    engine: Engine,
    mesh: Mesh,
    shader: Shader,
}

impl Drop for Gpu {
    fn drop(&mut self) {
        // nothing may be in flight when buffers are released
        if let Err(e) = self.engine.wait_idle() {
            warn!("wait_idle before release: {e:#}");
        }
        self.mesh.destroy_buffers(self.engine.device());
        self.shader.destroy(self.engine.device());
    }
}

struct App {
    cfg: AppConfig,
    verify_uploads: bool,

    window: Option<Arc<PlatformWindow>>,
    gpu: Option<Gpu>,

    input: InputManager,
    camera: Camera,
    clock: FrameClock,
    fps: FpsCounter,

    cursor_visible: bool,
    paused: bool,
    exiting: bool,
    failed: bool,
}

impl App {
    fn new(cfg: AppConfig, verify_uploads: bool) -> Self {
        let c = &cfg.camera;
        let camera = Camera::new(Vec3::from(c.position), c.pitch, c.yaw).with_clip(c.fov, c.near, c.far);
        Self {
            cfg,
            verify_uploads,
            window: None,
            gpu: None,
            input: InputManager::new(),
            camera,
            clock: FrameClock::new(),
            fps: FpsCounter::new(Duration::from_secs(1)),
            cursor_visible: true,
            paused: false,
            exiting: false,
            failed: false,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let w = &self.cfg.window;
        let window = Arc::new(PlatformWindow::create(
            event_loop,
            &w.title,
            RenderSize::new(w.width, w.height),
        )?);
        self.window = Some(window.clone());

        let r = &self.cfg.render;
        let engine_cfg = EngineConfig {
            app_name: w.title.clone(),
            validation: r.validation(),
            present: r.present_mode,
            clear_color: r.clear_color,
            sampler_filter: r.sampler_filter,
        };
        let mut engine = Engine::new(window.clone(), &engine_cfg)?;

        let texture = &self.cfg.assets.texture;
        engine
            .add_texture(TEXTURE_ID, texture)
            .with_context(|| format!("texture {}", texture.display()))?;
        engine.create_all_images()?;

        let mut mesh = engine.upload_mesh(scene::cube()?)?;
        let shader = match self.verified(&engine, &mesh).and_then(|_| self.build_shader(&engine)) {
            Ok(s) => s,
            Err(e) => {
                mesh.destroy_buffers(engine.device());
                return Err(e);
            }
        };

        let size = window.inner_size();
        self.camera.update_from_window(size.width, size.height);
        self.paused = size.width == 0 || size.height == 0;
        self.gpu = Some(Gpu {
            engine,
            mesh,
            shader,
        });
        self.clock.reset();
        info!("scene ready; {}", self.camera.status());
        window.request_redraw();
        Ok(())
    }

    fn verified(&self, engine: &Engine, mesh: &Mesh) -> Result<()> {
        if !self.verify_uploads {
            return Ok(());
        }
        if !mesh.verify_upload(engine.command_pool())? {
            bail!("mesh read-back differs from the uploaded data");
        }
        info!("mesh upload verified");
        Ok(())
    }

    fn build_shader(&self, engine: &Engine) -> Result<Shader> {
        let assets = &self.cfg.assets;
        let source = |path: &Option<PathBuf>, built_in: &'static [u8]| match path {
            Some(p) => ShaderSource::Path(p.clone()),
            None => ShaderSource::Bytes(built_in),
        };
        let desc = ShaderDesc {
            layout: Vertex::layout(),
            culling: self.cfg.render.face_culling,
            polygon_mode: self.cfg.render.polygon_mode,
            vertex: source(&assets.vertex_shader, scop_render_vk::MESH_VERT_SPV),
            fragment: source(&assets.fragment_shader, scop_render_vk::MESH_FRAG_SPV),
            schema: DescriptorSchema::new()
                .with_ubo(
                    std::mem::size_of::<MeshUbo>() as u64,
                    ShaderStages::VERTEX | ShaderStages::FRAGMENT,
                )
                .with_image(TEXTURE_ID),
        };
        engine.create_shader(&desc).context("mesh shader")
    }

    /// One frame: input -> camera and model -> record -> present.
    fn tick(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let dt = self.clock.tick();
        self.input.update();

        let actions = controls::apply(&mut self.camera, &self.input, &self.cfg.camera, dt);
        if actions.exit {
            info!("escape pressed");
            self.shutdown(event_loop);
            return Ok(());
        }
        if actions.print_status {
            info!("{}", self.camera.status());
        }
        if actions.toggle_cursor {
            self.cursor_visible = !self.cursor_visible;
            if let Some(w) = &self.window {
                w.set_cursor_visible(self.cursor_visible);
            }
        }

        let Some(gpu) = self.gpu.as_mut() else {
            return Ok(());
        };
        scene::spin(gpu.mesh.transform_mut(), self.cfg.scene.spin_speed, dt);

        let Some(frame) = gpu.engine.start_draw()? else {
            return Ok(());
        };
        let ubo = scene::mesh_ubo(gpu.mesh.transform(), &self.camera);
        gpu.shader.update_ubo_pod(frame.slot, 0, &ubo)?;
        gpu.engine.draw_mesh(&gpu.mesh, &gpu.shader)?;
        gpu.engine.end_draw()?;

        if let Some(stats) = self.fps.record(Duration::from_secs_f32(dt)) {
            let title = perf_title(&self.cfg.window.title, &stats);
            info!("{title}");
            if let Some(w) = &self.window {
                w.set_title(&title);
            }
        }
        Ok(())
    }

    /// Device idle, then GPU objects, then the window.
    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        self.exiting = true;
        self.gpu = None;
        self.window = None;
        event_loop.exit();
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, what: &str, e: anyhow::Error) {
        error!("{what}: {e:#}");
        self.failed = true;
        self.shutdown(event_loop);
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() || self.exiting {
            return;
        }
        if let Err(e) = self.init(event_loop) {
            self.fail(event_loop, "initialization failed", e);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        match &self.window {
            Some(window) if window.id() == window_id => {}
            _ => return,
        }
        self.input.handle_window_event(&event);

        match event {
            WindowEvent::CloseRequested => {
                info!("close requested");
                self.shutdown(event_loop);
            }
            WindowEvent::Resized(size) => {
                let paused = size.width == 0 || size.height == 0;
                if paused != self.paused {
                    info!("{}x{} (paused={paused})", size.width, size.height);
                }
                if self.paused && !paused {
                    // time spent minimized is not frame time
                    self.clock.reset();
                    self.fps.clear();
                }
                self.paused = paused;
                self.camera.update_from_window(size.width, size.height);
                if let Some(gpu) = self.gpu.as_mut() {
                    gpu.engine.notify_resized();
                }
            }
            WindowEvent::RedrawRequested => {
                if self.exiting || self.paused {
                    return;
                }
                if let Err(e) = self.tick(event_loop) {
                    self.fail(event_loop, "frame failed", e);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exiting {
            return;
        }
        if self.paused {
            // minimized: sleep until the next event
            event_loop.set_control_flow(ControlFlow::Wait);
            return;
        }
        event_loop.set_control_flow(ControlFlow::Poll);
        if let Some(w) = &self.window {
            w.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.gpu = None;
        self.window = None;
    }
}

fn perf_title(title: &str, stats: &FpsStats) -> String {
    format!(
        "{title} | fps : {:.0} | {:.0} | {:.0}",
        stats.avg, stats.min, stats.max
    )
}

fn run(args: Args) -> Result<bool> {
    let mut cfg = AppConfig::load(&args.config)?;
    cfg.apply(&args.overrides());

    let event_loop: EventLoop<()> = EventLoop::new().context("event loop")?;
    let mut app = App::new(cfg, args.verify_uploads);
    event_loop.run_app(&mut app)?;
    Ok(!app.failed)
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(&args.log);
    match run(args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_carries_fps_stats() {
        let stats = FpsStats {
            avg: 59.6,
            min: 30.2,
            max: 144.0,
            frames: 60,
        };
        assert_eq!(perf_title("scop", &stats), "scop | fps : 60 | 30 | 144");
    }

    #[test]
    fn validation_flags_map_to_override() {
        let args = Args::parse_from(["scop", "--no-validation", "--wireframe"]);
        let o = args.overrides();
        assert_eq!(o.validation, Some(false));
        assert!(o.wireframe);

        let args = Args::parse_from(["scop", "--no-validation", "--validation"]);
        assert_eq!(args.overrides().validation, Some(true));

        let args = Args::parse_from(["scop"]);
        assert_eq!(args.overrides().validation, None);
        assert_eq!(args.config, PathBuf::from("scop.toml"));
    }
}

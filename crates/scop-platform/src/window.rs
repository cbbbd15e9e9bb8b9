// SPDX-License-Identifier: CEPL-1.0
use std::ops::Deref;

use anyhow::{Context, Result};
use scop_render::{RenderSize, WindowSurface};
use tracing::{debug, warn};
use winit::{
    dpi::PhysicalSize,
    event_loop::ActiveEventLoop,
    raw_window_handle::{
        DisplayHandle, HandleError, HasDisplayHandle, HasWindowHandle, WindowHandle,
    },
    window::{CursorGrabMode, Window},
};

/// The winit window as seen by the renderer.
#[derive(Debug)]
pub struct PlatformWindow {
    window: Window,
}

impl PlatformWindow {
    pub fn create(event_loop: &ActiveEventLoop, title: &str, size: RenderSize) -> Result<Self> {
        let attrs = Window::default_attributes()
            .with_title(title)
            .with_inner_size(PhysicalSize::new(size.width.max(1), size.height.max(1)))
            .with_resizable(true);
        let window = event_loop.create_window(attrs).context("create_window")?;
        Ok(Self { window })
    }

    /// Shows the cursor, or hides and captures it.
    pub fn set_cursor_visible(&self, visible: bool) {
        if visible {
            if let Err(e) = self.window.set_cursor_grab(CursorGrabMode::None) {
                debug!("cursor release failed: {e}");
            }
        } else if let Err(e) = self
            .window
            .set_cursor_grab(CursorGrabMode::Locked)
            .or_else(|_| self.window.set_cursor_grab(CursorGrabMode::Confined))
        {
            warn!("cursor grab unsupported: {e}");
        }
        self.window.set_cursor_visible(visible);
    }
}

impl Deref for PlatformWindow {
    type Target = Window;

    fn deref(&self) -> &Window {
        &self.window
    }
}

impl HasWindowHandle for PlatformWindow {
    fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
        self.window.window_handle()
    }
}

impl HasDisplayHandle for PlatformWindow {
    fn display_handle(&self) -> Result<DisplayHandle<'_>, HandleError> {
        self.window.display_handle()
    }
}

impl WindowSurface for PlatformWindow {
    fn framebuffer_size(&self) -> RenderSize {
        let size = self.window.inner_size();
        RenderSize::new(size.width, size.height)
    }
}

use winit::window::Window;

use crate::config::RendererConfig;
use crate::error::EngineError;
use crate::vulkan::scheduler::{CancellationToken, FrameOutcome};
use crate::vulkan::VulkanRenderer;

#[derive(Debug)]
pub struct Renderer {
    pub vk_renderer: VulkanRenderer,
}

impl Renderer {
    /// Brings up the whole GPU stack for `window`.
    pub unsafe fn create(
        window: &Window,
        config: &RendererConfig,
        cancel: CancellationToken,
    ) -> Result<Self, EngineError> {
        let vk_renderer = VulkanRenderer::new(window, config, cancel)?;

        Ok(Self { vk_renderer })
    }

    /// Renders one frame, or rebuilds the swapchain if it went stale.
    pub fn render(&mut self) -> Result<FrameOutcome, EngineError> {
        self.vk_renderer.render()
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.vk_renderer.resize(width, height);
    }

    /// Destroys every renderer resource.
    pub unsafe fn destroy(&mut self) {
        self.vk_renderer.destroy();
    }
}

use log::*;
use winit::window::Window;

use crate::config::RendererConfig;
use crate::error::EngineError;
use context::VulkanContext;
use scheduler::{CancellationToken, FrameOutcome, FrameScheduler};

mod command_buffer;
pub mod constants;
mod context;
mod device;
mod framebuffer;
mod instance;
pub mod physical_device;
mod pipeline;
mod render_pass;
pub mod scheduler;
mod shader;
pub mod swapchain;
mod sync;
pub mod teardown;

#[derive(Debug)]
pub struct VulkanRenderer {
    context: VulkanContext,
    scheduler: FrameScheduler,
    destroyed: bool,
}

impl VulkanRenderer {
    pub unsafe fn new(
        window: &Window,
        config: &RendererConfig,
        cancel: CancellationToken,
    ) -> Result<VulkanRenderer, EngineError> {
        let context = VulkanContext::new(window, config)?;
        let scheduler = FrameScheduler::new(
            context.swapchain.image_count(),
            config.frame_timeout_ns(),
            cancel,
        );

        Ok(VulkanRenderer {
            context,
            scheduler,
            destroyed: false,
        })
    }

    pub fn render(&mut self) -> Result<FrameOutcome, EngineError> {
        if self.destroyed {
            return Ok(FrameOutcome::ShutDown);
        }
        self.scheduler.render_frame(&mut self.context)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        debug!("Window resized to {}x{}.", width, height);
        self.context.set_requested_extent(width, height);
        self.scheduler.request_rebuild();
    }

    /// Releases every Vulkan object. Later calls do nothing.
    pub unsafe fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.scheduler.shutdown();
        teardown::run(&mut self.context);
        self.destroyed = true;
    }
}

//! Shutdown ordering.
//!
//! Every object is released after everything created from it. The list below
//! is the only place that order is written down; [`run`] walks it.

use log::*;

use crate::error::EngineError;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TeardownStep {
    CommandPool,
    Pipeline,
    PipelineLayout,
    RenderPass,
    SyncObjects,
    Framebuffers,
    ImageViews,
    Swapchain,
    Device,
    Surface,
    DebugMessenger,
    Instance,
}

pub const SHUTDOWN_ORDER: [TeardownStep; 12] = [
    TeardownStep::CommandPool,
    TeardownStep::Pipeline,
    TeardownStep::PipelineLayout,
    TeardownStep::RenderPass,
    TeardownStep::SyncObjects,
    TeardownStep::Framebuffers,
    TeardownStep::ImageViews,
    TeardownStep::Swapchain,
    TeardownStep::Device,
    TeardownStep::Surface,
    TeardownStep::DebugMessenger,
    TeardownStep::Instance,
];

pub trait Teardown {
    /// Blocks until the GPU has finished all submitted work.
    fn wait_idle(&mut self) -> Result<(), EngineError>;

    /// Destroys the objects named by `step`.
    ///
    /// # Safety
    ///
    /// Nothing released by an earlier step may still be in use, and the GPU
    /// must be idle.
    unsafe fn release(&mut self, step: TeardownStep);
}

/// Idles the device, then releases everything in [`SHUTDOWN_ORDER`].
///
/// # Safety
///
/// `target` must not be used for rendering afterwards.
pub unsafe fn run<T: Teardown>(target: &mut T) {
    // A lost device has nothing left in flight, so the teardown still proceeds.
    if let Err(err) = target.wait_idle() {
        error!("Device did not go idle before teardown: {}", err);
    }

    for step in SHUTDOWN_ORDER {
        trace!("Releasing {:?}.", step);
        target.release(step);
    }

    info!("Renderer resources released.");
}

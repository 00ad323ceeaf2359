use vulkanalia::prelude::v1_0::*;

use super::device::VulkanDevice;
use crate::error::{CreateContext, EngineError};

/// The semaphores and fence guarding one frame-in-flight slot.
#[derive(Copy, Clone, Debug, Default)]
pub struct FrameSync {
    pub image_available: vk::Semaphore,
    pub render_finished: vk::Semaphore,
    pub in_flight: vk::Fence,
}

impl FrameSync {
    /// The fence starts signaled so the first wait on a fresh slot returns
    /// immediately.
    pub unsafe fn create(device: &VulkanDevice) -> Result<Self, EngineError> {
        let mut sync = FrameSync::default();
        match sync.create_handles(device) {
            Ok(()) => Ok(sync),
            Err(err) => {
                sync.destroy(device);
                Err(err)
            }
        }
    }

    unsafe fn create_handles(&mut self, device: &VulkanDevice) -> Result<(), EngineError> {
        let semaphore_info = vk::SemaphoreCreateInfo::builder();
        let fence_info = vk::FenceCreateInfo::builder().flags(vk::FenceCreateFlags::SIGNALED);

        self.image_available = device
            .vk_device
            .create_semaphore(&semaphore_info, None)
            .creating("image-available semaphore")?;
        self.render_finished = device
            .vk_device
            .create_semaphore(&semaphore_info, None)
            .creating("render-finished semaphore")?;
        self.in_flight = device
            .vk_device
            .create_fence(&fence_info, None)
            .creating("in-flight fence")?;

        Ok(())
    }

    pub unsafe fn destroy(&mut self, device: &VulkanDevice) {
        if !self.in_flight.is_null() {
            device.vk_device.destroy_fence(self.in_flight, None);
        }
        if !self.render_finished.is_null() {
            device.vk_device.destroy_semaphore(self.render_finished, None);
        }
        if !self.image_available.is_null() {
            device.vk_device.destroy_semaphore(self.image_available, None);
        }
        *self = FrameSync::default();
    }
}

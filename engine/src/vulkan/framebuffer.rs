use super::device::VulkanDevice;
use crate::error::{CreateContext, EngineError};
use vulkanalia::vk::{self, DeviceV1_0, HasBuilder};

pub struct VulkanFramebuffer;

impl VulkanFramebuffer {
    pub unsafe fn create(
        device: &VulkanDevice,
        render_pass: vk::RenderPass,
        image_view: vk::ImageView,
        extent: vk::Extent2D,
    ) -> Result<vk::Framebuffer, EngineError> {
        let attachments = &[image_view];
        let create_info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass)
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        device
            .vk_device
            .create_framebuffer(&create_info, None)
            .creating("framebuffer")
    }
}

use super::device::VulkanDevice;
use crate::error::{CreateContext, EngineError};
use vulkanalia::vk::{self, DeviceV1_0, HasBuilder};

/// What one frame's command buffer draws.
#[derive(Copy, Clone, Debug)]
pub struct DrawTarget {
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    pub pipeline: vk::Pipeline,
    pub extent: vk::Extent2D,
    pub clear_color: [f32; 4],
}

#[derive(Debug)]
pub struct VulkanCommandBuffer;

impl VulkanCommandBuffer {
    /// Buffers from this pool are reset and re-recorded individually every frame.
    pub unsafe fn create_command_pool(
        device: &VulkanDevice,
    ) -> Result<vk::CommandPool, EngineError> {
        let info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(device.indices.graphics);

        device
            .vk_device
            .create_command_pool(&info, None)
            .creating("command pool")
    }

    pub unsafe fn allocate(
        device: &VulkanDevice,
        command_pool: vk::CommandPool,
        count: u32,
    ) -> Result<Vec<vk::CommandBuffer>, EngineError> {
        let allocate_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        device
            .vk_device
            .allocate_command_buffers(&allocate_info)
            .creating("command buffers")
    }

    pub unsafe fn record(
        device: &VulkanDevice,
        command_buffer: vk::CommandBuffer,
        target: &DrawTarget,
    ) -> Result<(), vk::ErrorCode> {
        device
            .vk_device
            .reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty())?;

        let info = vk::CommandBufferBeginInfo::builder();
        device.vk_device.begin_command_buffer(command_buffer, &info)?;

        let render_area = vk::Rect2D::builder()
            .offset(vk::Offset2D::default())
            .extent(target.extent);

        let color_clear_value = vk::ClearValue {
            color: vk::ClearColorValue {
                float32: target.clear_color,
            },
        };

        let clear_values = &[color_clear_value];
        let info = vk::RenderPassBeginInfo::builder()
            .render_pass(target.render_pass)
            .framebuffer(target.framebuffer)
            .render_area(render_area)
            .clear_values(clear_values);

        device
            .vk_device
            .cmd_begin_render_pass(command_buffer, &info, vk::SubpassContents::INLINE);

        device.vk_device.cmd_bind_pipeline(
            command_buffer,
            vk::PipelineBindPoint::GRAPHICS,
            target.pipeline,
        );

        let viewport = vk::Viewport::builder()
            .x(0.0)
            .y(0.0)
            .width(target.extent.width as f32)
            .height(target.extent.height as f32)
            .min_depth(0.0)
            .max_depth(1.0);
        let scissor = vk::Rect2D::builder()
            .offset(vk::Offset2D { x: 0, y: 0 })
            .extent(target.extent);

        device.vk_device.cmd_set_viewport(command_buffer, 0, &[viewport]);
        device.vk_device.cmd_set_scissor(command_buffer, 0, &[scissor]);

        device.vk_device.cmd_draw(command_buffer, 3, 1, 0, 0);
        device.vk_device.cmd_end_render_pass(command_buffer);

        device.vk_device.end_command_buffer(command_buffer)?;

        Ok(())
    }
}

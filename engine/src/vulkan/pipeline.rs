use log::*;
use vulkanalia::prelude::v1_0::*;

use super::constants;
use super::device::VulkanDevice;
use super::render_pass;
use super::shader;
use crate::config::RendererConfig;
use crate::error::{CreateContext, EngineError};

/// Pipeline layout, render pass and the graphics pipeline built against them.
#[derive(Copy, Clone, Debug, Default)]
pub struct VulkanPipeline {
    pub layout: vk::PipelineLayout,
    pub render_pass: vk::RenderPass,
    pub pipeline: vk::Pipeline,
    /// Color format the render pass was built for.
    pub format: vk::Format,
}

impl VulkanPipeline {
    pub unsafe fn create(
        device: &VulkanDevice,
        format: vk::Format,
        config: &RendererConfig,
    ) -> Result<VulkanPipeline, EngineError> {
        let mut bundle = VulkanPipeline {
            format,
            ..Default::default()
        };

        match bundle.build(device, config) {
            Ok(()) => {
                info!("Created graphics pipeline for {:?}.", format);
                Ok(bundle)
            }
            Err(err) => {
                bundle.destroy(device);
                Err(err)
            }
        }
    }

    unsafe fn build(
        &mut self,
        device: &VulkanDevice,
        config: &RendererConfig,
    ) -> Result<(), EngineError> {
        // Layout: no descriptor sets, no push constants.
        let layout_info = vk::PipelineLayoutCreateInfo::builder();
        self.layout = device
            .vk_device
            .create_pipeline_layout(&layout_info, None)
            .creating("pipeline layout")?;

        self.render_pass = render_pass::create_render_pass(device, self.format)?;

        let vertex_shader_module = shader::create_shader_module(device, &config.vertex_shader)?;
        let fragment_shader_module =
            match shader::create_shader_module(device, &config.fragment_shader) {
                Ok(module) => module,
                Err(err) => {
                    device
                        .vk_device
                        .destroy_shader_module(vertex_shader_module, None);
                    return Err(err);
                }
            };

        let pipeline = self.create_pipeline(device, vertex_shader_module, fragment_shader_module);

        // Linked into the pipeline (or useless after a failure) either way.
        device
            .vk_device
            .destroy_shader_module(vertex_shader_module, None);
        device
            .vk_device
            .destroy_shader_module(fragment_shader_module, None);

        self.pipeline = pipeline?;
        Ok(())
    }

    unsafe fn create_pipeline(
        &self,
        device: &VulkanDevice,
        vertex_shader_module: vk::ShaderModule,
        fragment_shader_module: vk::ShaderModule,
    ) -> Result<vk::Pipeline, EngineError> {
        let vert_stage = vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(vertex_shader_module)
            .name(constants::SHADER_ENTRY_POINT);

        let frag_stage = vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::FRAGMENT)
            .module(fragment_shader_module)
            .name(constants::SHADER_ENTRY_POINT);

        // Geometry comes from the vertex shader itself.
        let vertex_input_state = vk::PipelineVertexInputStateCreateInfo::builder();
        let input_assembly_state = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        // Viewport and scissor are dynamic; these only fix the counts.
        let viewport = vk::Viewport::builder()
            .x(0.0)
            .y(0.0)
            .width(1.0)
            .height(1.0)
            .min_depth(0.0)
            .max_depth(1.0);

        let scissor = vk::Rect2D::builder()
            .offset(vk::Offset2D { x: 0, y: 0 })
            .extent(vk::Extent2D { width: 1, height: 1 });

        let viewports = &[viewport];
        let scissors = &[scissor];
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewports(viewports)
            .scissors(scissors);

        let dynamic_states = &[vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state =
            vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(dynamic_states);

        // rasterizer
        let rasterization_state = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::BACK)
            .front_face(vk::FrontFace::CLOCKWISE)
            .depth_bias_enable(false);

        // multisampling
        let multisample_state = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::_1);

        // color blending
        let attachment = vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::all())
            .blend_enable(false);

        let attachments = &[attachment];
        let color_blend_state = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .logic_op(vk::LogicOp::COPY)
            .attachments(attachments)
            .blend_constants([0.0, 0.0, 0.0, 0.0]);

        let stages = &[vert_stage, frag_stage];
        let info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(stages)
            .vertex_input_state(&vertex_input_state)
            .input_assembly_state(&input_assembly_state)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterization_state)
            .multisample_state(&multisample_state)
            .color_blend_state(&color_blend_state)
            .dynamic_state(&dynamic_state)
            .layout(self.layout)
            .render_pass(self.render_pass)
            .subpass(0);

        Ok(device
            .vk_device
            .create_graphics_pipelines(vk::PipelineCache::null(), &[info], None)
            .creating("graphics pipeline")?
            .0[0])
    }

    pub unsafe fn destroy_pipeline(&mut self, device: &VulkanDevice) {
        if !self.pipeline.is_null() {
            device.vk_device.destroy_pipeline(self.pipeline, None);
            self.pipeline = vk::Pipeline::null();
        }
    }

    pub unsafe fn destroy_layout(&mut self, device: &VulkanDevice) {
        if !self.layout.is_null() {
            device.vk_device.destroy_pipeline_layout(self.layout, None);
            self.layout = vk::PipelineLayout::null();
        }
    }

    pub unsafe fn destroy_render_pass(&mut self, device: &VulkanDevice) {
        if !self.render_pass.is_null() {
            device.vk_device.destroy_render_pass(self.render_pass, None);
            self.render_pass = vk::RenderPass::null();
        }
    }

    pub unsafe fn destroy(&mut self, device: &VulkanDevice) {
        self.destroy_pipeline(device);
        self.destroy_layout(device);
        self.destroy_render_pass(device);
    }
}

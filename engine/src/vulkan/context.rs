use log::*;
use vulkanalia::loader::{LibloadingLoader, LIBRARY};
use vulkanalia::prelude::v1_0::*;
use vulkanalia::vk::KhrSwapchainExtension;
use winit::window::Window;

use super::command_buffer::{DrawTarget, VulkanCommandBuffer};
use super::device::VulkanDevice;
use super::instance::VulkanInstance;
use super::pipeline::VulkanPipeline;
use super::scheduler::{AcquireStatus, FrameBackend, PresentStatus, WaitStatus};
use super::swapchain::VulkanSwapchain;
use super::teardown::{self, Teardown, TeardownStep};
use crate::config::RendererConfig;
use crate::error::EngineError;

/// Owns every Vulkan object the renderer creates, from the instance down to
/// the per-frame sync objects.
#[derive(Debug)]
pub struct VulkanContext {
    /// Keeps the Vulkan library loaded for as long as the instance lives.
    _entry: Entry,
    pub instance: VulkanInstance,
    pub device: VulkanDevice,
    pub swapchain: VulkanSwapchain,
    pub pipeline: VulkanPipeline,
    pub command_pool: vk::CommandPool,
    config: RendererConfig,
    requested_extent: vk::Extent2D,
}

impl VulkanContext {
    pub unsafe fn new(window: &Window, config: &RendererConfig) -> Result<Self, EngineError> {
        let loader =
            LibloadingLoader::new(LIBRARY).map_err(|e| EngineError::Loader(e.to_string()))?;
        let entry = Entry::new(loader).map_err(|b| EngineError::Loader(b.to_string()))?;

        let mut instance = VulkanInstance::new(window, &entry, config.validation)?;

        let device = match VulkanDevice::new(
            &entry,
            &instance,
            config.validation,
            config.require_geometry_shader,
        ) {
            Ok(device) => device,
            Err(err) => {
                instance.destroy_surface();
                instance.destroy_messenger();
                instance.destroy_instance();
                return Err(err);
            }
        };

        let size = window.inner_size();
        let mut context = VulkanContext {
            _entry: entry,
            instance,
            device,
            swapchain: VulkanSwapchain::default(),
            pipeline: VulkanPipeline::default(),
            command_pool: vk::CommandPool::null(),
            config: config.clone(),
            requested_extent: vk::Extent2D {
                width: size.width,
                height: size.height,
            },
        };

        // From here on every handle lives in `context`, so a failure can
        // unwind through the regular teardown.
        if let Err(err) = context.create_render_targets() {
            teardown::run(&mut context);
            return Err(err);
        }

        Ok(context)
    }

    unsafe fn create_render_targets(&mut self) -> Result<(), EngineError> {
        self.command_pool = VulkanCommandBuffer::create_command_pool(&self.device)?;
        self.swapchain =
            VulkanSwapchain::create(self.requested_extent, &self.instance, &self.device)?;
        self.pipeline = VulkanPipeline::create(&self.device, self.swapchain.format, &self.config)?;
        self.swapchain
            .create_frame_resources(&self.device, self.pipeline.render_pass, self.command_pool)
    }

    /// Size the next swapchain rebuild should aim for.
    pub fn set_requested_extent(&mut self, width: u32, height: u32) {
        self.requested_extent = vk::Extent2D { width, height };
    }

    fn frame_error(stage: &'static str) -> impl FnOnce(vk::ErrorCode) -> EngineError {
        move |source| EngineError::Frame { stage, source }
    }
}

impl FrameBackend for VulkanContext {
    fn frames_in_flight(&self) -> usize {
        self.swapchain.image_count()
    }

    fn wait_for_fence(&mut self, slot: usize, timeout_ns: u64) -> Result<WaitStatus, EngineError> {
        let fence = self.swapchain.frames[slot].sync.in_flight;
        let status = unsafe {
            self.device
                .vk_device
                .wait_for_fences(&[fence], true, timeout_ns)
                .map_err(Self::frame_error("fence wait"))?
        };

        Ok(match status {
            vk::SuccessCode::TIMEOUT => WaitStatus::TimedOut,
            _ => WaitStatus::Signaled,
        })
    }

    fn reset_fence(&mut self, slot: usize) -> Result<(), EngineError> {
        let fence = self.swapchain.frames[slot].sync.in_flight;
        unsafe {
            self.device
                .vk_device
                .reset_fences(&[fence])
                .map_err(Self::frame_error("fence reset"))
        }
    }

    fn acquire_image(
        &mut self,
        slot: usize,
        timeout_ns: u64,
    ) -> Result<AcquireStatus, EngineError> {
        let semaphore = self.swapchain.frames[slot].sync.image_available;
        let result = unsafe {
            self.device.vk_device.acquire_next_image_khr(
                self.swapchain.swapchain,
                timeout_ns,
                semaphore,
                vk::Fence::null(),
            )
        };

        match result {
            Ok((_, vk::SuccessCode::TIMEOUT | vk::SuccessCode::NOT_READY)) => {
                Ok(AcquireStatus::TimedOut)
            }
            Ok((index, vk::SuccessCode::SUBOPTIMAL_KHR)) => Ok(AcquireStatus::Suboptimal(index)),
            Ok((index, _)) => Ok(AcquireStatus::Acquired(index)),
            Err(vk::ErrorCode::OUT_OF_DATE_KHR) => Ok(AcquireStatus::OutOfDate),
            Err(source) => Err(EngineError::Frame {
                stage: "image acquisition",
                source,
            }),
        }
    }

    fn record(&mut self, slot: usize, image_index: u32) -> Result<(), EngineError> {
        let command_buffer = self.swapchain.frames[slot].command_buffer;
        let target = DrawTarget {
            render_pass: self.pipeline.render_pass,
            framebuffer: self.swapchain.frames[image_index as usize].framebuffer,
            pipeline: self.pipeline.pipeline,
            extent: self.swapchain.extent,
            clear_color: self.config.clear_color,
        };

        unsafe {
            VulkanCommandBuffer::record(&self.device, command_buffer, &target)
                .map_err(Self::frame_error("command recording"))
        }
    }

    fn submit(&mut self, slot: usize) -> Result<(), EngineError> {
        let frame = &self.swapchain.frames[slot];

        let wait_semaphores = &[frame.sync.image_available];
        let wait_stages = &[vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = &[frame.command_buffer];
        let signal_semaphores = &[frame.sync.render_finished];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(wait_semaphores)
            .wait_dst_stage_mask(wait_stages)
            .command_buffers(command_buffers)
            .signal_semaphores(signal_semaphores);

        unsafe {
            self.device
                .vk_device
                .queue_submit(self.device.graphics_queue, &[submit_info], frame.sync.in_flight)
                .map_err(Self::frame_error("queue submit"))
        }
    }

    fn present(&mut self, slot: usize, image_index: u32) -> Result<PresentStatus, EngineError> {
        let wait_semaphores = &[self.swapchain.frames[slot].sync.render_finished];
        let swapchains = &[self.swapchain.swapchain];
        let image_indices = &[image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(wait_semaphores)
            .swapchains(swapchains)
            .image_indices(image_indices);

        let result = unsafe {
            self.device
                .vk_device
                .queue_present_khr(self.device.present_queue, &present_info)
        };

        match result {
            Ok(vk::SuccessCode::SUBOPTIMAL_KHR) => Ok(PresentStatus::Suboptimal),
            Ok(_) => Ok(PresentStatus::Presented),
            Err(vk::ErrorCode::OUT_OF_DATE_KHR) => Ok(PresentStatus::OutOfDate),
            Err(source) => Err(EngineError::Frame {
                stage: "present",
                source,
            }),
        }
    }

    fn rebuild_swapchain(&mut self) -> Result<(), EngineError> {
        unsafe {
            self.device.wait_idle()?;
            self.swapchain.destroy(&self.device, self.command_pool);

            self.swapchain =
                VulkanSwapchain::create(self.requested_extent, &self.instance, &self.device)?;

            // Viewport and scissor are dynamic, so only a format change
            // invalidates the pipeline.
            if self.swapchain.format != self.pipeline.format {
                info!(
                    "Surface format changed ({:?} -> {:?}), rebuilding pipeline.",
                    self.pipeline.format, self.swapchain.format
                );
                self.pipeline.destroy(&self.device);
                self.pipeline =
                    VulkanPipeline::create(&self.device, self.swapchain.format, &self.config)?;
            }

            self.swapchain
                .create_frame_resources(&self.device, self.pipeline.render_pass, self.command_pool)
        }
    }
}

impl Teardown for VulkanContext {
    fn wait_idle(&mut self) -> Result<(), EngineError> {
        unsafe { self.device.wait_idle() }
    }

    unsafe fn release(&mut self, step: TeardownStep) {
        match step {
            TeardownStep::CommandPool => {
                if !self.command_pool.is_null() {
                    self.device
                        .vk_device
                        .destroy_command_pool(self.command_pool, None);
                    self.command_pool = vk::CommandPool::null();
                }
                self.swapchain.forget_command_buffers();
            }
            TeardownStep::Pipeline => self.pipeline.destroy_pipeline(&self.device),
            TeardownStep::PipelineLayout => self.pipeline.destroy_layout(&self.device),
            TeardownStep::RenderPass => self.pipeline.destroy_render_pass(&self.device),
            TeardownStep::SyncObjects => self.swapchain.destroy_sync_objects(&self.device),
            TeardownStep::Framebuffers => self.swapchain.destroy_framebuffers(&self.device),
            TeardownStep::ImageViews => self.swapchain.destroy_image_views(&self.device),
            TeardownStep::Swapchain => self.swapchain.destroy_swapchain(&self.device),
            TeardownStep::Device => self.device.destroy(),
            TeardownStep::Surface => self.instance.destroy_surface(),
            TeardownStep::DebugMessenger => self.instance.destroy_messenger(),
            TeardownStep::Instance => self.instance.destroy_instance(),
        }
    }
}

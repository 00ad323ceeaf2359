use log::*;
use vulkanalia::prelude::v1_0::*;
use vulkanalia::vk::{KhrSurfaceExtension, KhrSwapchainExtension};

use super::command_buffer::VulkanCommandBuffer;
use super::device::VulkanDevice;
use super::framebuffer::VulkanFramebuffer;
use super::instance::VulkanInstance;
use super::sync::FrameSync;
use crate::error::{CreateContext, EngineError};

/// Everything tied to one swapchain image.
#[derive(Copy, Clone, Debug, Default)]
pub struct FrameResources {
    /// Owned by the swapchain, never destroyed on its own.
    pub image: vk::Image,
    pub image_view: vk::ImageView,
    pub framebuffer: vk::Framebuffer,
    pub command_buffer: vk::CommandBuffer,
    pub sync: FrameSync,
}

/// The presentable image chain and its per-image resources. Rebuilt as a
/// whole whenever the surface changes.
#[derive(Clone, Debug, Default)]
pub struct VulkanSwapchain {
    pub swapchain: vk::SwapchainKHR,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    pub frames: Vec<FrameResources>,
}

#[derive(Clone, Debug)]
pub struct SwapchainSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupport {
    pub unsafe fn get(
        instance: &VulkanInstance,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Self, EngineError> {
        let vk_instance = &instance.vk_instance;
        Ok(Self {
            capabilities: vk_instance
                .get_physical_device_surface_capabilities_khr(physical_device, instance.surface)
                .creating("surface capability query")?,
            formats: vk_instance
                .get_physical_device_surface_formats_khr(physical_device, instance.surface)
                .creating("surface format query")?,
            present_modes: vk_instance
                .get_physical_device_surface_present_modes_khr(physical_device, instance.surface)
                .creating("present mode query")?,
        })
    }
}

impl VulkanSwapchain {
    /// Creates the swapchain and one image view per image. Framebuffers,
    /// command buffers and sync objects come later from
    /// [`VulkanSwapchain::create_frame_resources`], once a render pass exists.
    pub unsafe fn create(
        requested: vk::Extent2D,
        instance: &VulkanInstance,
        device: &VulkanDevice,
    ) -> Result<VulkanSwapchain, EngineError> {
        let support = SwapchainSupport::get(instance, device.physical_device)?;

        let surface_format = choose_surface_format(&support.formats).ok_or_else(|| {
            EngineError::unsupported("surface reports no supported formats")
        })?;
        let present_mode = choose_present_mode(&support.present_modes);
        let extent = choose_extent(&support.capabilities, requested);
        let image_count = choose_image_count(&support.capabilities);

        let queue_family_indices = device.indices.unique();
        let sharing_mode = device.indices.sharing_mode();

        let mut info = vk::SwapchainCreateInfoKHR::builder()
            .surface(instance.surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());

        if sharing_mode == vk::SharingMode::CONCURRENT {
            info = info.queue_family_indices(&queue_family_indices);
        }

        let swapchain = device
            .vk_device
            .create_swapchain_khr(&info, None)
            .creating("swapchain")?;

        let mut bundle = VulkanSwapchain {
            swapchain,
            format: surface_format.format,
            extent,
            frames: Vec::new(),
        };

        let images = match device.vk_device.get_swapchain_images_khr(swapchain) {
            Ok(images) => images,
            Err(source) => {
                bundle.destroy_swapchain(device);
                return Err(EngineError::Creation {
                    what: "swapchain image list",
                    source,
                });
            }
        };

        bundle.frames = images
            .into_iter()
            .map(|image| FrameResources {
                image,
                ..Default::default()
            })
            .collect();

        if let Err(err) = bundle.create_image_views(device) {
            bundle.destroy_image_views(device);
            bundle.destroy_swapchain(device);
            return Err(err);
        }

        info!(
            "Created swapchain ({} images, {:?}, {}x{}, {:?}).",
            bundle.frames.len(),
            bundle.format,
            extent.width,
            extent.height,
            present_mode
        );

        Ok(bundle)
    }

    unsafe fn create_image_views(&mut self, device: &VulkanDevice) -> Result<(), EngineError> {
        let components = vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        };

        let subresource_range = vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        };

        for frame in &mut self.frames {
            let info = vk::ImageViewCreateInfo::builder()
                .image(frame.image)
                .view_type(vk::ImageViewType::_2D)
                .format(self.format)
                .components(components)
                .subresource_range(subresource_range);

            frame.image_view = device
                .vk_device
                .create_image_view(&info, None)
                .creating("swapchain image view")?;
        }

        Ok(())
    }

    /// Fills in the framebuffer, command buffer and sync objects of every
    /// frame. On failure whatever was created stays recorded in `frames`, so
    /// the caller can release it with [`VulkanSwapchain::destroy`].
    pub unsafe fn create_frame_resources(
        &mut self,
        device: &VulkanDevice,
        render_pass: vk::RenderPass,
        command_pool: vk::CommandPool,
    ) -> Result<(), EngineError> {
        for frame in &mut self.frames {
            frame.framebuffer =
                VulkanFramebuffer::create(device, render_pass, frame.image_view, self.extent)?;
        }

        let command_buffers =
            VulkanCommandBuffer::allocate(device, command_pool, self.frames.len() as u32)?;
        for (frame, command_buffer) in self.frames.iter_mut().zip(command_buffers) {
            frame.command_buffer = command_buffer;
        }

        for frame in &mut self.frames {
            frame.sync = FrameSync::create(device)?;
        }

        Ok(())
    }

    pub fn image_count(&self) -> usize {
        self.frames.len()
    }

    /// Full release used on rebuild: command buffers go back to the pool,
    /// then sync objects, framebuffers, views and the swapchain itself.
    pub unsafe fn destroy(&mut self, device: &VulkanDevice, command_pool: vk::CommandPool) {
        self.free_command_buffers(device, command_pool);
        self.destroy_sync_objects(device);
        self.destroy_framebuffers(device);
        self.destroy_image_views(device);
        self.destroy_swapchain(device);
    }

    pub unsafe fn free_command_buffers(
        &mut self,
        device: &VulkanDevice,
        command_pool: vk::CommandPool,
    ) {
        let command_buffers = self
            .frames
            .iter()
            .map(|f| f.command_buffer)
            .filter(|c| !c.is_null())
            .collect::<Vec<_>>();

        if !command_buffers.is_empty() {
            device
                .vk_device
                .free_command_buffers(command_pool, &command_buffers);
        }
        self.forget_command_buffers();
    }

    /// Drops command buffer handles already freed along with their pool.
    pub fn forget_command_buffers(&mut self) {
        self.frames
            .iter_mut()
            .for_each(|f| f.command_buffer = vk::CommandBuffer::null());
    }

    pub unsafe fn destroy_sync_objects(&mut self, device: &VulkanDevice) {
        self.frames
            .iter_mut()
            .for_each(|f| f.sync.destroy(device));
    }

    pub unsafe fn destroy_framebuffers(&mut self, device: &VulkanDevice) {
        for frame in &mut self.frames {
            if !frame.framebuffer.is_null() {
                device.vk_device.destroy_framebuffer(frame.framebuffer, None);
                frame.framebuffer = vk::Framebuffer::null();
            }
        }
    }

    pub unsafe fn destroy_image_views(&mut self, device: &VulkanDevice) {
        for frame in &mut self.frames {
            if !frame.image_view.is_null() {
                device.vk_device.destroy_image_view(frame.image_view, None);
                frame.image_view = vk::ImageView::null();
            }
        }
    }

    pub unsafe fn destroy_swapchain(&mut self, device: &VulkanDevice) {
        if !self.swapchain.is_null() {
            device.vk_device.destroy_swapchain_khr(self.swapchain, None);
            self.swapchain = vk::SwapchainKHR::null();
        }
        self.frames.clear();
    }
}

/// BGRA8 with sRGB non-linear color space if offered, else the first format.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .copied()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_UNORM
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| formats.first().copied())
}

pub fn choose_present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    present_modes
        .iter()
        .copied()
        .find(|m| *m == vk::PresentModeKHR::MAILBOX)
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    requested: vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D {
            width: requested.width.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ),
            height: requested.height.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ),
        }
    }
}

/// One image beyond the minimum; a zero maximum means unbounded.
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let image_count = capabilities.min_image_count.saturating_add(1);
    if capabilities.max_image_count > 0 {
        image_count.min(capabilities.max_image_count)
    } else {
        image_count
    }
}

use log::*;
use vulkanalia::prelude::v1_0::*;
use vulkanalia::vk::KhrSurfaceExtension;

use super::constants;
use super::instance::VulkanInstance;
use super::physical_device::{self, SuitabilityError};
use crate::error::{CreateContext, EngineError};

/// The logical device and the queues the renderer submits and presents on.
#[derive(Debug)]
pub struct VulkanDevice {
    pub vk_device: Device,
    pub physical_device: vk::PhysicalDevice,
    pub indices: QueueFamilyIndices,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
}

impl VulkanDevice {
    pub unsafe fn new(
        entry: &Entry,
        instance: &VulkanInstance,
        validation: bool,
        require_geometry_shader: bool,
    ) -> Result<VulkanDevice, EngineError> {
        let physical_device =
            physical_device::pick_physical_device(instance, require_geometry_shader)?;

        let indices = QueueFamilyIndices::get(instance, physical_device)?;

        let queue_priorities = &[1.0];
        let queue_infos = indices
            .unique()
            .iter()
            .map(|i| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(*i)
                    .queue_priorities(queue_priorities)
            })
            .collect::<Vec<_>>();

        let layers = if validation {
            vec![constants::VALIDATION_LAYER.as_ptr()]
        } else {
            vec![]
        };

        let mut extensions = constants::DEVICE_EXTENSIONS
            .iter()
            .map(|n| n.as_ptr())
            .collect::<Vec<_>>();

        // Required by Vulkan SDK on macOS since 1.3.216.
        if cfg!(target_os = "macos")
            && entry
                .version()
                .map_or(false, |v| v >= constants::PORTABILITY_MACOS_VERSION)
        {
            extensions.push(vk::KHR_PORTABILITY_SUBSET_EXTENSION.name.as_ptr());
        }

        let features = vk::PhysicalDeviceFeatures::builder();

        let info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_layer_names(&layers)
            .enabled_extension_names(&extensions)
            .enabled_features(&features);

        let device = instance
            .vk_instance
            .create_device(physical_device, &info, None)
            .creating("logical device")?;

        let graphics_queue = device.get_device_queue(indices.graphics, 0);
        let present_queue = device.get_device_queue(indices.present, 0);

        debug!(
            "Queue families: graphics {}, present {} ({:?} sharing).",
            indices.graphics,
            indices.present,
            indices.sharing_mode()
        );

        Ok(VulkanDevice {
            vk_device: device,
            physical_device,
            indices,
            graphics_queue,
            present_queue,
        })
    }

    pub unsafe fn wait_idle(&self) -> Result<(), EngineError> {
        self.vk_device
            .device_wait_idle()
            .map_err(|source| EngineError::Frame {
                stage: "device idle wait",
                source,
            })
    }

    pub unsafe fn destroy(&mut self) {
        self.vk_device.destroy_device(None);
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilyIndices {
    pub unsafe fn get(
        instance: &VulkanInstance,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Self, SuitabilityError> {
        let properties = instance
            .vk_instance
            .get_physical_device_queue_family_properties(physical_device);

        QueueFamilyIndices::resolve(&properties, |index| {
            instance
                .vk_instance
                .get_physical_device_surface_support_khr(physical_device, index, instance.surface)
                .map_err(|_| SuitabilityError("surface support query"))
        })
    }

    /// Takes the first graphics family and the first family able to present,
    /// stopping once both are known.
    pub fn resolve<F>(
        properties: &[vk::QueueFamilyProperties],
        mut supports_present: F,
    ) -> Result<Self, SuitabilityError>
    where
        F: FnMut(u32) -> Result<bool, SuitabilityError>,
    {
        let mut graphics = None;
        let mut present = None;

        for (index, family) in properties.iter().enumerate() {
            let index = index as u32;

            if graphics.is_none() && family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
                graphics = Some(index);
            }

            if present.is_none() && supports_present(index)? {
                present = Some(index);
            }

            if graphics.is_some() && present.is_some() {
                break;
            }
        }

        if let (Some(graphics), Some(present)) = (graphics, present) {
            Ok(Self { graphics, present })
        } else {
            Err(SuitabilityError("required queue families"))
        }
    }

    pub fn unique(&self) -> Vec<u32> {
        if self.graphics == self.present {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }

    pub fn sharing_mode(&self) -> vk::SharingMode {
        if self.graphics == self.present {
            vk::SharingMode::EXCLUSIVE
        } else {
            vk::SharingMode::CONCURRENT
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    #[test]
    fn same_family_for_both_roles_is_exclusive() {
        let families = [family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)];
        let indices = QueueFamilyIndices::resolve(&families, |_| Ok(true)).unwrap();

        assert_eq!(indices, QueueFamilyIndices { graphics: 0, present: 0 });
        assert_eq!(indices.unique(), vec![0]);
        assert_eq!(indices.sharing_mode(), vk::SharingMode::EXCLUSIVE);
    }

    #[test]
    fn distinct_families_share_concurrently() {
        let families = [
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::COMPUTE),
        ];
        let indices = QueueFamilyIndices::resolve(&families, |i| Ok(i == 2)).unwrap();

        assert_eq!(indices, QueueFamilyIndices { graphics: 1, present: 2 });
        assert_eq!(indices.unique(), vec![1, 2]);
        assert_eq!(indices.sharing_mode(), vk::SharingMode::CONCURRENT);
    }

    #[test]
    fn stops_scanning_once_complete() {
        let families = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::GRAPHICS),
        ];
        let mut queried = Vec::new();
        QueueFamilyIndices::resolve(&families, |i| {
            queried.push(i);
            Ok(true)
        })
        .unwrap();

        assert_eq!(queried, vec![0]);
    }

    #[test]
    fn incomplete_families_are_rejected() {
        let families = [family(vk::QueueFlags::COMPUTE)];
        assert!(QueueFamilyIndices::resolve(&families, |_| Ok(true)).is_err());

        let families = [family(vk::QueueFlags::GRAPHICS)];
        assert!(QueueFamilyIndices::resolve(&families, |_| Ok(false)).is_err());
    }
}

use log::*;
use std::collections::HashSet;
use thiserror::Error;
use vulkanalia::prelude::v1_0::*;

use super::constants;
use super::device::QueueFamilyIndices;
use super::instance::VulkanInstance;
use crate::error::{CreateContext, EngineError};

#[derive(Debug, Error)]
#[error("Missing {0}.")]
pub struct SuitabilityError(pub &'static str);

impl From<SuitabilityError> for EngineError {
    fn from(error: SuitabilityError) -> Self {
        EngineError::unsupported(error.to_string())
    }
}

/// What the selector knows about one enumerated GPU.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceCandidate {
    pub name: String,
    pub device_type: vk::PhysicalDeviceType,
    pub max_image_dimension_2d: u32,
    pub geometry_shader: bool,
}

impl DeviceCandidate {
    /// Higher is better. Zero means the device must not be picked.
    pub fn score(&self, require_geometry_shader: bool) -> u64 {
        if require_geometry_shader && !self.geometry_shader {
            return 0;
        }

        let mut score = 0;
        if self.device_type == vk::PhysicalDeviceType::DISCRETE_GPU {
            score += constants::DISCRETE_GPU_SCORE;
        }
        score + u64::from(self.max_image_dimension_2d)
    }
}

/// Returns the index of the best suitable candidate, earliest on ties.
///
/// `candidates` pairs each device with its suitability verdict; unsuitable
/// devices and devices scoring zero are never chosen.
pub fn select_best<T>(
    candidates: &[(T, DeviceCandidate, Result<(), SuitabilityError>)],
    require_geometry_shader: bool,
) -> Option<usize> {
    let mut best: Option<(usize, u64)> = None;

    for (index, (_, candidate, suitability)) in candidates.iter().enumerate() {
        if suitability.is_err() {
            continue;
        }

        let score = candidate.score(require_geometry_shader);
        if score == 0 {
            continue;
        }

        if best.map_or(true, |(_, s)| score > s) {
            best = Some((index, score));
        }
    }

    best.map(|(index, _)| index)
}

pub unsafe fn pick_physical_device(
    instance: &VulkanInstance,
    require_geometry_shader: bool,
) -> Result<vk::PhysicalDevice, EngineError> {
    let physical_devices = instance
        .vk_instance
        .enumerate_physical_devices()
        .creating("physical device list")?;

    if physical_devices.is_empty() {
        return Err(EngineError::unsupported("no Vulkan physical devices found"));
    }

    let mut candidates = Vec::with_capacity(physical_devices.len());
    for physical_device in physical_devices {
        let candidate = describe(instance, physical_device);
        let suitability = check_physical_device(instance, physical_device);

        match &suitability {
            Err(error) => warn!("Skipping physical device (`{}`): {}", candidate.name, error),
            Ok(()) => debug!(
                "Physical device (`{}`) scored {}.",
                candidate.name,
                candidate.score(require_geometry_shader)
            ),
        }

        candidates.push((physical_device, candidate, suitability));
    }

    match select_best(&candidates, require_geometry_shader) {
        Some(index) => {
            let (physical_device, candidate, _) = &candidates[index];
            info!("Selected physical device (`{}`).", candidate.name);
            Ok(*physical_device)
        }
        None => Err(EngineError::unsupported(
            "failed to find a suitable physical device",
        )),
    }
}

unsafe fn describe(
    instance: &VulkanInstance,
    physical_device: vk::PhysicalDevice,
) -> DeviceCandidate {
    let properties = instance
        .vk_instance
        .get_physical_device_properties(physical_device);
    let features = instance
        .vk_instance
        .get_physical_device_features(physical_device);

    DeviceCandidate {
        name: properties.device_name.to_string(),
        device_type: properties.device_type,
        max_image_dimension_2d: properties.limits.max_image_dimension_2d,
        geometry_shader: features.geometry_shader == vk::TRUE,
    }
}

unsafe fn check_physical_device(
    instance: &VulkanInstance,
    physical_device: vk::PhysicalDevice,
) -> Result<(), SuitabilityError> {
    check_physical_device_extensions(instance, physical_device)?;
    QueueFamilyIndices::get(instance, physical_device)?;
    Ok(())
}

unsafe fn check_physical_device_extensions(
    instance: &VulkanInstance,
    physical_device: vk::PhysicalDevice,
) -> Result<(), SuitabilityError> {
    let extensions = instance
        .vk_instance
        .enumerate_device_extension_properties(physical_device, None)
        .map_err(|_| SuitabilityError("device extension list"))?
        .iter()
        .map(|e| e.extension_name)
        .collect::<HashSet<_>>();

    if constants::DEVICE_EXTENSIONS
        .iter()
        .all(|e| extensions.contains(e))
    {
        Ok(())
    } else {
        Err(SuitabilityError("required device extensions"))
    }
}

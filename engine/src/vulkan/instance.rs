use log::*;
use std::collections::HashSet;
use std::ffi::CStr;
use std::os::raw::c_void;
use vulkanalia::prelude::v1_0::*;
use vulkanalia::vk::ExtDebugUtilsExtension;
use vulkanalia::vk::KhrSurfaceExtension;
use vulkanalia::window as vk_window;
use winit::window::Window;

use super::constants;
use crate::error::{CreateContext, EngineError};

/// The graphics context: API instance, optional validation messenger and the
/// presentation surface bound to the engine's window.
#[derive(Debug)]
pub struct VulkanInstance {
    pub vk_instance: Instance,
    pub surface: vk::SurfaceKHR,
    messenger: Option<vk::DebugUtilsMessengerEXT>,
}

impl VulkanInstance {
    pub unsafe fn new(
        window: &Window,
        entry: &Entry,
        validation: bool,
    ) -> Result<Self, EngineError> {
        match entry.version() {
            Ok(version) => info!("Using Vulkan {}.", version),
            Err(err) => warn!("Could not query the Vulkan loader version: {}", err),
        }

        // Application Info
        let application_info = vk::ApplicationInfo::builder()
            .application_name(b"DOOM Engine\0")
            .application_version(vk::make_version(0, 1, 0))
            .engine_name(b"DEngine\0")
            .engine_version(vk::make_version(0, 1, 0))
            .api_version(vk::make_version(1, 0, 0));

        // Layers
        let available_layers = entry
            .enumerate_instance_layer_properties()
            .creating("instance layer list")?
            .iter()
            .map(|l| l.layer_name)
            .collect::<HashSet<_>>();

        if validation && !available_layers.contains(&constants::VALIDATION_LAYER) {
            return Err(EngineError::unsupported(format!(
                "validation layer `{}` requested but not available",
                constants::VALIDATION_LAYER
            )));
        }

        let layers = if validation {
            vec![constants::VALIDATION_LAYER.as_ptr()]
        } else {
            Vec::new()
        };

        // Extensions
        let mut required = vk_window::get_required_instance_extensions(window)
            .iter()
            .map(|e| **e)
            .collect::<Vec<_>>();

        // Required by Vulkan SDK on macOS since 1.3.216.
        let portability = cfg!(target_os = "macos")
            && entry
                .version()
                .map_or(false, |v| v >= constants::PORTABILITY_MACOS_VERSION);
        let flags = if portability {
            info!("Enabling extensions for macOS portability.");
            required.push(vk::KHR_GET_PHYSICAL_DEVICE_PROPERTIES2_EXTENSION.name);
            required.push(vk::KHR_PORTABILITY_ENUMERATION_EXTENSION.name);
            vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR
        } else {
            vk::InstanceCreateFlags::empty()
        };

        if validation {
            required.push(vk::EXT_DEBUG_UTILS_EXTENSION.name);
        }

        check_instance_extensions(entry, &required)?;

        let extensions = required.iter().map(|e| e.as_ptr()).collect::<Vec<_>>();

        // Create
        let mut info = vk::InstanceCreateInfo::builder()
            .application_info(&application_info)
            .enabled_layer_names(&layers)
            .enabled_extension_names(&extensions)
            .flags(flags);

        let mut debug_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(vk::DebugUtilsMessageSeverityFlagsEXT::all())
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .user_callback(Some(debug_callback));

        if validation {
            info = info.push_next(&mut debug_info);
        }

        let instance = entry.create_instance(&info, None).creating("instance")?;

        // Messenger
        let messenger = if validation {
            match instance.create_debug_utils_messenger_ext(&debug_info, None) {
                Ok(messenger) => Some(messenger),
                Err(source) => {
                    instance.destroy_instance(None);
                    return Err(EngineError::Creation {
                        what: "debug messenger",
                        source,
                    });
                }
            }
        } else {
            None
        };

        // Surface
        let surface = match vk_window::create_surface(&instance, window, window) {
            Ok(surface) => surface,
            Err(source) => {
                if let Some(messenger) = messenger {
                    instance.destroy_debug_utils_messenger_ext(messenger, None);
                }
                instance.destroy_instance(None);
                return Err(EngineError::Creation {
                    what: "window surface",
                    source,
                });
            }
        };

        Ok(VulkanInstance {
            vk_instance: instance,
            surface,
            messenger,
        })
    }

    pub unsafe fn destroy_surface(&mut self) {
        if !self.surface.is_null() {
            self.vk_instance.destroy_surface_khr(self.surface, None);
            self.surface = vk::SurfaceKHR::null();
        }
    }

    pub unsafe fn destroy_messenger(&mut self) {
        if let Some(messenger) = self.messenger.take() {
            self.vk_instance
                .destroy_debug_utils_messenger_ext(messenger, None);
        }
    }

    pub unsafe fn destroy_instance(&mut self) {
        self.vk_instance.destroy_instance(None);
    }
}

unsafe fn check_instance_extensions(
    entry: &Entry,
    required: &[vk::ExtensionName],
) -> Result<(), EngineError> {
    let available = entry
        .enumerate_instance_extension_properties(None)
        .creating("instance extension list")?
        .iter()
        .map(|e| e.extension_name)
        .collect::<HashSet<_>>();

    for extension in required {
        trace!("Required instance extension `{}`.", extension);
    }

    match missing_extension(&available, required) {
        Some(name) => Err(EngineError::unsupported(format!(
            "instance extension `{}` is not available",
            name
        ))),
        None => Ok(()),
    }
}

/// First entry of `required` that `available` lacks.
pub(crate) fn missing_extension(
    available: &HashSet<vk::ExtensionName>,
    required: &[vk::ExtensionName],
) -> Option<vk::ExtensionName> {
    required.iter().find(|e| !available.contains(*e)).copied()
}

extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    type_: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _: *mut c_void,
) -> vk::Bool32 {
    let data = unsafe { *data };
    let message = unsafe { CStr::from_ptr(data.message) }.to_string_lossy();

    if severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        error!("({:?}) {}", type_, message);
    } else if severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        warn!("({:?}) {}", type_, message);
    } else if severity >= vk::DebugUtilsMessageSeverityFlagsEXT::INFO {
        debug!("({:?}) {}", type_, message);
    } else {
        trace!("({:?}) {}", type_, message);
    }

    vk::FALSE
}

use vulkanalia::{vk, Version};

pub const PORTABILITY_MACOS_VERSION: Version = Version::new(1, 3, 216);
pub const VALIDATION_ENABLED: bool = cfg!(debug_assertions);
pub const VALIDATION_LAYER: vk::ExtensionName =
    vk::ExtensionName::from_bytes(b"VK_LAYER_KHRONOS_validation");

pub const DEVICE_EXTENSIONS: &[vk::ExtensionName] = &[vk::KHR_SWAPCHAIN_EXTENSION.name];

pub const VERTEX_SHADER_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../shaders/vert.spv");
pub const FRAGMENT_SHADER_PATH: &str =
    concat!(env!("CARGO_MANIFEST_DIR"), "/../shaders/frag.spv");

pub const SHADER_ENTRY_POINT: &[u8] = b"main\0";

/// Score bonus for discrete GPUs during physical device selection.
pub const DISCRETE_GPU_SCORE: u64 = 1000;

use std::path::PathBuf;
use std::time::Duration;

use crate::vulkan::constants;

/// Everything the engine needs to start, owned by a single `Engine`.
#[derive(Clone, Debug, Default)]
pub struct EngineConfig {
    pub window: WindowConfig,
    pub renderer: RendererConfig,
}

#[derive(Clone, Debug)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
    pub resizable: bool,
    pub fullscreen: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 768,
            title: String::from("DOOM Engine"),
            resizable: true,
            fullscreen: false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RendererConfig {
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
    /// Upper bound on a single fence wait or image acquisition.
    pub frame_timeout: Duration,
    pub require_geometry_shader: bool,
    pub clear_color: [f32; 4],
    pub validation: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            vertex_shader: PathBuf::from(constants::VERTEX_SHADER_PATH),
            fragment_shader: PathBuf::from(constants::FRAGMENT_SHADER_PATH),
            frame_timeout: Duration::from_secs(1),
            require_geometry_shader: true,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            validation: constants::VALIDATION_ENABLED,
        }
    }
}

impl RendererConfig {
    /// Timeout in the nanosecond form Vulkan expects, saturating at "forever".
    pub fn frame_timeout_ns(&self) -> u64 {
        u64::try_from(self.frame_timeout.as_nanos()).unwrap_or(u64::MAX)
    }
}

impl EngineConfig {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.window.title = title.into();
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.window.width = width;
        self.window.height = height;
        self
    }

    pub fn with_fullscreen(mut self, fullscreen: bool) -> Self {
        self.window.fullscreen = fullscreen;
        self
    }

    pub fn with_shaders(
        mut self,
        vertex: impl Into<PathBuf>,
        fragment: impl Into<PathBuf>,
    ) -> Self {
        self.renderer.vertex_shader = vertex.into();
        self.renderer.fragment_shader = fragment.into();
        self
    }

    pub fn with_frame_timeout(mut self, timeout: Duration) -> Self {
        self.renderer.frame_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_compiled_shaders() {
        let config = EngineConfig::default();
        assert!(config.renderer.vertex_shader.ends_with("vert.spv"));
        assert!(config.renderer.fragment_shader.ends_with("frag.spv"));
        assert_eq!(config.renderer.validation, cfg!(debug_assertions));
    }

    #[test]
    fn builders_override_window_values() {
        let config = EngineConfig::default()
            .with_title("Test")
            .with_size(640, 480);
        assert_eq!(config.window.title, "Test");
        assert_eq!((config.window.width, config.window.height), (640, 480));
    }

    #[test]
    fn builders_override_renderer_values() {
        let config = EngineConfig::default()
            .with_fullscreen(true)
            .with_shaders("a.spv", "b.spv");
        assert!(config.window.fullscreen);
        assert_eq!(config.renderer.vertex_shader, PathBuf::from("a.spv"));
        assert_eq!(config.renderer.fragment_shader, PathBuf::from("b.spv"));
    }

    #[test]
    fn huge_timeouts_saturate() {
        let config = EngineConfig::default().with_frame_timeout(Duration::MAX);
        assert_eq!(config.renderer.frame_timeout_ns(), u64::MAX);

        let config = EngineConfig::default().with_frame_timeout(Duration::from_millis(5));
        assert_eq!(config.renderer.frame_timeout_ns(), 5_000_000);
    }
}

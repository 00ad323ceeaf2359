use std::io;
use std::path::PathBuf;

use thiserror::Error;
use vulkanalia::vk;

/// Coarse failure category, used by the binary to pick an exit code.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Unsupported,
    Creation,
    ShaderLoad,
    Frame,
    Platform,
}

impl ErrorKind {
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorKind::Unsupported => 2,
            ErrorKind::Creation => 3,
            ErrorKind::ShaderLoad => 4,
            ErrorKind::Frame => 5,
            ErrorKind::Platform => 6,
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Failed to create {what}: {source}")]
    Creation {
        what: &'static str,
        #[source]
        source: vk::ErrorCode,
    },

    #[error("Failed to read shader `{}`: {source}", .path.display())]
    ShaderRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid shader bytecode in `{}`: {reason}", .path.display())]
    ShaderBytecode { path: PathBuf, reason: String },

    #[error("Frame {stage} failed: {source}")]
    Frame {
        stage: &'static str,
        #[source]
        source: vk::ErrorCode,
    },

    #[error("Failed to load the Vulkan library: {0}")]
    Loader(String),

    #[error("Window system error: {0}")]
    Window(#[from] anyhow::Error),
}

impl EngineError {
    pub fn unsupported(message: impl Into<String>) -> Self {
        EngineError::Unsupported(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Unsupported(_) => ErrorKind::Unsupported,
            EngineError::Creation { .. } => ErrorKind::Creation,
            EngineError::ShaderRead { .. } | EngineError::ShaderBytecode { .. } => {
                ErrorKind::ShaderLoad
            }
            EngineError::Frame { .. } => ErrorKind::Frame,
            EngineError::Loader(_) | EngineError::Window(_) => ErrorKind::Platform,
        }
    }
}

/// Attaches the name of the object being created to a raw Vulkan error.
pub(crate) trait CreateContext<T> {
    fn creating(self, what: &'static str) -> Result<T, EngineError>;
}

impl<T> CreateContext<T> for Result<T, vk::ErrorCode> {
    fn creating(self, what: &'static str) -> Result<T, EngineError> {
        self.map_err(|source| EngineError::Creation { what, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct_per_kind() {
        let kinds = [
            ErrorKind::Unsupported,
            ErrorKind::Creation,
            ErrorKind::ShaderLoad,
            ErrorKind::Frame,
            ErrorKind::Platform,
        ];
        let mut codes = kinds.iter().map(|k| k.exit_code()).collect::<Vec<_>>();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), kinds.len());
        assert!(codes.iter().all(|c| *c != 0));
    }

    #[test]
    fn creation_context_names_the_object() {
        let result: Result<(), vk::ErrorCode> = Err(vk::ErrorCode::OUT_OF_HOST_MEMORY);
        let err = result.creating("render pass").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Creation);
        assert!(err.to_string().contains("render pass"));
    }
}

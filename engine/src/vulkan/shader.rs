use log::*;
use std::fs;
use std::path::Path;
use vulkanalia::bytecode::Bytecode;
use vulkanalia::prelude::v1_0::*;

use super::device::VulkanDevice;
use crate::error::{CreateContext, EngineError};

/// Reads a precompiled SPIR-V blob from disk.
pub fn load_bytecode(path: &Path) -> Result<Vec<u8>, EngineError> {
    let bytes = fs::read(path).map_err(|source| EngineError::ShaderRead {
        path: path.to_path_buf(),
        source,
    })?;

    debug!("Loaded shader `{}` ({} bytes).", path.display(), bytes.len());
    Ok(bytes)
}

pub unsafe fn create_shader_module(
    device: &VulkanDevice,
    path: &Path,
) -> Result<vk::ShaderModule, EngineError> {
    let bytes = load_bytecode(path)?;
    let bytecode = Bytecode::new(&bytes).map_err(|e| EngineError::ShaderBytecode {
        path: path.to_path_buf(),
        reason: format!("{:?}", e),
    })?;

    let info = vk::ShaderModuleCreateInfo::builder()
        .code_size(bytecode.code_size())
        .code(bytecode.code());

    device
        .vk_device
        .create_shader_module(&info, None)
        .creating("shader module")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn missing_file_is_a_shader_load_error() {
        let path = Path::new("definitely/not/here.spv");
        let err = load_bytecode(path).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ShaderLoad);
        assert!(err.to_string().contains("here.spv"));
    }

    #[test]
    fn reads_bytes_verbatim() {
        let path = std::env::temp_dir().join(format!("dengine-shader-{}.spv", std::process::id()));
        fs::write(&path, [0x03, 0x02, 0x23, 0x07]).unwrap();

        let bytes = load_bytecode(&path).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(bytes, vec![0x03, 0x02, 0x23, 0x07]);
    }
}

//! Declaration of the copy/blit compute task

use std::path::PathBuf;

use crate::{config::AppConfig, error::CrateResult, graphics::error::GraphicsError};

/// Entry point of the blit shader
pub const BLIT_ENTRY_POINT: &str = "blit";

/// Binding signature of the blit shader, by binding slot
pub const BLIT_BINDINGS: [BindingKind; 3] = [
    BindingKind::UniformBuffer,
    BindingKind::StorageBuffer,
    BindingKind::StorageImage,
];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BindingKind {
    UniformBuffer,
    StorageBuffer,
    StorageImage,
}

/// A compute task: which shader, which entry point, what it binds
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CopyTaskDesc {
    pub spirv_path: PathBuf,
    pub entry_point: String,
    /// Binding `i` of descriptor set 0 has kind `bindings[i]`
    pub bindings: Vec<BindingKind>,
    pub local_size: [u32; 3],
}

impl CopyTaskDesc {
    /// The blit from the fractal canvas into the swapchain image
    pub fn blit(config: &AppConfig) -> Self {
        Self {
            spirv_path: config.blit_shader_path(),
            entry_point: BLIT_ENTRY_POINT.to_string(),
            bindings: BLIT_BINDINGS.to_vec(),
            local_size: shared::BLIT_LOCAL_SIZE,
        }
    }

    /// Check that the task binds exactly `expected`
    pub fn expect_bindings(&self, expected: &[BindingKind]) -> CrateResult<()> {
        if self.bindings != expected {
            return Err(GraphicsError::BindingSignature {
                entry_point: self.entry_point.clone(),
                expected: format!("{expected:?}"),
                got: format!("{:?}", self.bindings),
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EntryStyle;

    #[test]
    fn blit_task_signature() {
        let desc = CopyTaskDesc::blit(&AppConfig::new("mods", EntryStyle::Graph));
        assert_eq!(desc.entry_point, "blit");
        assert_eq!(desc.local_size, [8, 8, 1]);
        assert_eq!(desc.spirv_path, PathBuf::from("mods/blit.spv"));
        assert!(desc.expect_bindings(&BLIT_BINDINGS).is_ok());
        assert!(desc
            .expect_bindings(&[BindingKind::StorageBuffer, BindingKind::StorageImage])
            .is_err());
    }
}

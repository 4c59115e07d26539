//! Overall high-level error type for the launcher
use crate::vm::error::VmError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("please provide main lua file")]
    Usage,
    #[error("can't load {} err:{message}", .path.display())]
    Load { path: PathBuf, message: String },
    #[error("lua file {} launch err:{message}", .path.display())]
    Launch { path: PathBuf, message: String },
    #[error(transparent)]
    Vm(#[from] VmError),
}

impl From<mlua::Error> for LaunchError {
    fn from(e: mlua::Error) -> Self {
        LaunchError::Vm(VmError::Lua(e))
    }
}

impl LaunchError {
    /// Process exit status for this failure
    pub fn exit_code(&self) -> i32 {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(LaunchError::Usage.to_string(), "please provide main lua file");
        assert_eq!(
            LaunchError::Load {
                path: "a.lua".into(),
                message: "a.lua:1: unexpected symbol".into()
            }
            .to_string(),
            "can't load a.lua err:a.lua:1: unexpected symbol"
        );
        assert_eq!(
            LaunchError::Launch {
                path: "b.lua".into(),
                message: "boom".into()
            }
            .to_string(),
            "lua file b.lua launch err:boom"
        );
    }

    #[test]
    fn test_all_failures_exit_nonzero() {
        assert_ne!(LaunchError::Usage.exit_code(), 0);
        assert_ne!(LaunchError::Vm(VmError::StateCreation).exit_code(), 0);
    }
}

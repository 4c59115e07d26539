//! VM and host binding errors
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VmError {
    #[error("cannot create lua state")]
    StateCreation,
    #[error("memory band size must be greater than zero")]
    ZeroBand,
    #[error(transparent)]
    Lua(#[from] mlua::Error),
}

/// Errors surfaced to scripts by the `sendfile` binding
#[derive(Debug, Error)]
pub enum TransmitError {
    #[error("attempt to use a closed file")]
    ResourceClosed,
    #[error("not support sendfile at this system")]
    Unsupported,
    #[error("bad argument #1 to 'sendfile' (FILE* expected, got {0})")]
    NotAFile(String),
    #[error("bad argument #3 to 'sendfile' (count must not be negative, got {0})")]
    NegativeCount(i64),
}

impl From<TransmitError> for mlua::Error {
    fn from(e: TransmitError) -> Self {
        mlua::Error::external(e)
    }
}

//! Hosting the LuaJIT runtime
pub mod console;
pub mod error;
pub mod host;
pub mod memory;
pub mod state;

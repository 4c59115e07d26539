//! Allocation tracking for the VM
pub mod alloc;
pub mod tracker;

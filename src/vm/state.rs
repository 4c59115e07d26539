//! VM instance ownership
//!
//! The raw state is created with the tracking allocation hook so that
//! every allocation the runtime makes is accounted for, then handed to
//! `mlua` for everything else.

use std::{ffi::c_void, mem::ManuallyDrop, ptr::NonNull};

use mlua::{ffi, Lua};

use super::{
    error::VmError,
    memory::{
        alloc::tracked_alloc,
        tracker::{AllocationStats, Tracker, Usage},
    },
};

/// A LuaJIT VM with the standard libraries open and all allocation
/// routed through its own [`Tracker`].
///
/// The VM is single threaded: neither it nor its tracker may be used
/// from any thread other than the one that created it.
pub struct Vm {
    lua: ManuallyDrop<Lua>,
    /// Owned; released after the runtime is torn down
    tracker: NonNull<Tracker>,
}

impl Vm {
    /// Create a VM that allocates through `tracker`
    pub fn new(tracker: Tracker) -> Result<Self, VmError> {
        let tracker = NonNull::from(Box::leak(Box::new(tracker)));

        let state = unsafe { ffi::lua_newstate(tracked_alloc, tracker.as_ptr() as *mut c_void) };
        if state.is_null() {
            unsafe { drop(Box::from_raw(tracker.as_ptr())) };
            return Err(VmError::StateCreation);
        }

        let lua = unsafe {
            ffi::luaL_openlibs(state);
            Lua::init_from_ptr(state)
        };

        let vm = Vm {
            lua: ManuallyDrop::new(lua),
            tracker,
        };
        tracing::debug!(usage = ?vm.usage(), "created vm");
        Ok(vm)
    }

    pub fn lua(&self) -> &Lua {
        &self.lua
    }

    /// Current position of the tracker
    pub fn usage(&self) -> Usage {
        self.tracker().usage()
    }

    pub fn stats(&self) -> AllocationStats {
        self.tracker().stats()
    }

    fn tracker(&self) -> &Tracker {
        // the hook only borrows the tracker for the duration of an
        // allocation call, never across a return to Rust
        unsafe { self.tracker.as_ref() }
    }
}

impl Drop for Vm {
    fn drop(&mut self) {
        unsafe {
            (*self.tracker.as_ptr()).silence();
            ManuallyDrop::drop(&mut self.lua);
            drop(Box::from_raw(self.tracker.as_ptr()));
        }
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::vm::memory::tracker::DEFAULT_BAND_BYTES;

    fn quiet(band: usize) -> Tracker {
        let mut tracker = Tracker::new(band).unwrap();
        tracker.silence();
        tracker
    }

    #[test]
    pub fn test_runtime_allocates_through_tracker() {
        let vm = Vm::new(Tracker::default()).unwrap();
        let usage = vm.usage();
        assert!(usage.live_bytes > 0);
        assert_eq!(usage.band, DEFAULT_BAND_BYTES);
        assert!(vm.stats().allocations > 0);
    }

    #[test]
    pub fn test_usage_follows_script_allocation() {
        let vm = Vm::new(quiet(64 * 1024)).unwrap();
        let before = vm.usage().live_bytes;

        vm.lua()
            .load("big = {} for i = 1, 100000 do big[i] = i end")
            .exec()
            .unwrap();
        let grown = vm.usage();
        assert!(grown.live_bytes > before + 100_000);
        assert!(vm.stats().raised > 0);
        assert!(grown.live_bytes <= grown.level);

        vm.lua()
            .load("big = nil collectgarbage() collectgarbage()")
            .exec()
            .unwrap();
        assert!(vm.usage().live_bytes < grown.live_bytes);
        assert!(vm.stats().lowered > 0);
    }

    #[test]
    pub fn test_standard_libraries_open() {
        let vm = Vm::new(Tracker::default()).unwrap();
        let kinds: (String, String, String) = vm
            .lua()
            .load("return type(io.open), type(string.format), type(debug.traceback)")
            .eval()
            .unwrap();
        assert_eq!(
            kinds,
            (
                "function".to_string(),
                "function".to_string(),
                "function".to_string()
            )
        );
    }
}

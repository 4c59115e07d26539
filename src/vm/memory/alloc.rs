//! The VM allocation hook
//!
//! LuaJIT routes every allocate / grow / shrink / free through a single
//! `lua_Alloc` callback. The callback here recovers the owning
//! [`Tracker`] from the user data pointer and delegates to
//! [`Tracker::reallocate`], which uses the C allocator for the memory
//! itself and the tracker for accounting.

use std::{ffi::c_void, ptr};

use super::tracker::Tracker;

impl Tracker {
    /// Standard reallocate semantics over the system allocator.
    ///
    /// A zero `new_size` releases `block` (if any) and returns null.
    /// Otherwise a block of `new_size` bytes is returned, preserving
    /// the contents of `block` up to the smaller of the two sizes. On
    /// allocator failure null is returned, `block` is untouched and the
    /// accounting is unchanged.
    ///
    /// # Safety
    ///
    /// `block` must be null or a pointer previously returned by this
    /// method and not yet released.
    pub unsafe fn reallocate(
        &mut self,
        block: *mut c_void,
        old_size: usize,
        new_size: usize,
    ) -> *mut c_void {
        let had_block = !block.is_null();

        if new_size == 0 {
            if had_block {
                libc::free(block);
            }
            self.record(had_block, old_size, 0);
            return ptr::null_mut();
        }

        let resized = libc::realloc(block, new_size);
        if resized.is_null() {
            self.record_failure();
            tracing::error!(
                old_size,
                new_size,
                live_bytes = self.live_bytes(),
                "system allocator refused request"
            );
            return ptr::null_mut();
        }

        self.record(had_block, old_size, new_size);
        resized
    }
}

/// `lua_Alloc` callback; `ud` must point at the tracker owned by the
/// VM whose state was created with this hook.
pub(crate) unsafe extern "C-unwind" fn tracked_alloc(
    ud: *mut c_void,
    block: *mut c_void,
    old_size: usize,
    new_size: usize,
) -> *mut c_void {
    let tracker = &mut *(ud as *mut Tracker);
    tracker.reallocate(block, old_size, new_size)
}

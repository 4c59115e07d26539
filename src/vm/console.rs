//! Diagnostic lines on the process stdout
//!
//! Scripts print through the C runtime's buffered `stdout`, so host
//! diagnostics go through the same stream to keep their relative order
//! when output is redirected. Writes are best effort: a failing stdout
//! never surfaces as an error to the caller.

use std::{ffi::CString, fmt::Display};

/// Write `line` followed by a newline to the C `stdout` stream
pub fn write_line(line: impl Display) {
    if let Ok(text) = CString::new(line.to_string()) {
        unsafe {
            libc::puts(text.as_ptr());
        }
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    pub fn test_interior_nul_is_dropped_quietly() {
        write_line("bad\0line");
    }
}

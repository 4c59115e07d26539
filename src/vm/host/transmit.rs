//! Zero-copy file to descriptor transmission
//!
//! Only Linux provides the kernel primitive. Elsewhere the operation
//! exists but always fails with [`TransmitError::Unsupported`].
//!
//! Each transmission starts at offset 0 of the source file; the file's
//! own read position is neither consulted nor advanced. Scripts rely
//! on this, surprising as it is.

use std::{fmt::Display, os::raw::c_int};

use crate::vm::{console, error::TransmitError};

/// Platform features the host bindings depend on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub zero_copy_send: bool,
}

impl Capabilities {
    /// Capabilities of the running platform
    pub fn detect() -> Self {
        Capabilities {
            zero_copy_send: cfg!(target_os = "linux"),
        }
    }

    /// No optional capabilities at all
    pub fn none() -> Self {
        Capabilities {
            zero_copy_send: false,
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::detect()
    }
}

/// The source side of a transmission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceHandle {
    Open(c_int),
    Closed,
}

/// Outcome of one transmission attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transmission {
    pub fd: c_int,
    pub outfd: c_int,
    pub count: usize,
    /// Bytes transmitted, or -1 if the OS call failed
    pub sent: isize,
}

impl Display for Transmission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "sendfile fd:{} outfd:{} count:{} n:{}",
            self.fd, self.outfd, self.count, self.sent
        )
    }
}

/// Transmit up to `count` bytes from the start of `source` to `outfd`.
///
/// A short or empty transmission is a normal result. If the OS call
/// itself fails the transmission reports `sent == -1`. The diagnostic
/// line is written regardless and its own failure is ignored.
pub fn send(
    caps: Capabilities,
    source: SourceHandle,
    outfd: c_int,
    count: usize,
) -> Result<Transmission, TransmitError> {
    if !caps.zero_copy_send {
        return Err(TransmitError::Unsupported);
    }

    let fd = match source {
        SourceHandle::Open(fd) => fd,
        SourceHandle::Closed => return Err(TransmitError::ResourceClosed),
    };

    let sent = if count == 0 {
        0
    } else {
        match sys::sendfile(outfd, fd, count) {
            Ok(n) => n as isize,
            Err(e) => {
                tracing::debug!(fd, outfd, count, error = %e, "sendfile failed");
                -1
            }
        }
    };

    let transmission = Transmission {
        fd,
        outfd,
        count,
        sent,
    };
    console::write_line(transmission);
    Ok(transmission)
}

#[cfg(target_os = "linux")]
mod sys {
    use std::{io, os::raw::c_int};

    pub fn sendfile(outfd: c_int, fd: c_int, count: usize) -> io::Result<usize> {
        let mut offset: libc::off_t = 0;
        let n = unsafe { libc::sendfile(outfd, fd, &mut offset, count) };
        if n < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(n as usize)
        }
    }
}

#[cfg(not(target_os = "linux"))]
mod sys {
    use std::{io, os::raw::c_int};

    pub fn sendfile(_outfd: c_int, _fd: c_int, _count: usize) -> io::Result<usize> {
        Err(io::ErrorKind::Unsupported.into())
    }
}

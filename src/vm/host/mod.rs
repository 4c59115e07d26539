//! Host functions installed into the VM globals before any script runs
pub mod transmit;

use std::{os::raw::c_int, ptr};

use mlua::{Function, LightUserData, Lua, RegistryKey, Value};

use self::transmit::{Capabilities, SourceHandle};
use crate::vm::error::TransmitError;

/// Global name of the null sentinel
pub const NULL: &str = "null";

/// Global name of the transmission function
pub const SENDFILE: &str = "sendfile";

/// The fixed set of host bindings.
///
/// Installing consumes the registry so a set of bindings is only ever
/// installed once.
#[derive(Debug, Clone, Copy)]
pub struct HostRegistry {
    capabilities: Capabilities,
}

impl HostRegistry {
    pub fn new(capabilities: Capabilities) -> Self {
        HostRegistry { capabilities }
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Install `null` and `sendfile` into the globals of `lua`.
    ///
    /// `sendfile` is always installed so scripts can probe it; without
    /// the platform capability every call fails.
    pub fn install(self, lua: &Lua) -> mlua::Result<()> {
        let globals = lua.globals();

        globals.set(NULL, Value::LightUserData(LightUserData(ptr::null_mut())))?;

        let io_type = lua.create_registry_value(
            globals
                .get::<_, mlua::Table>("io")?
                .get::<_, Function>("type")?,
        )?;
        let caps = self.capabilities;
        let sendfile = lua.create_function(move |lua, args: (Value, c_int, i64)| {
            lua_sendfile(lua, caps, &io_type, args)
        })?;
        globals.set(SENDFILE, sendfile)?;

        tracing::debug!(capabilities = ?caps, "installed host api");
        Ok(())
    }
}

/// `sendfile(file, outfd, count) -> n`
fn lua_sendfile<'lua>(
    lua: &'lua Lua,
    caps: Capabilities,
    io_type: &RegistryKey,
    (file, outfd, count): (Value<'lua>, c_int, i64),
) -> mlua::Result<i64> {
    if !caps.zero_copy_send {
        return Err(TransmitError::Unsupported.into());
    }

    let source = source_handle(lua, io_type, &file)?;
    let count = usize::try_from(count).map_err(|_| TransmitError::NegativeCount(count))?;
    let transmission = transmit::send(caps, source, outfd, count)?;
    Ok(transmission.sent as i64)
}

/// Recover the descriptor behind an io library file handle
fn source_handle<'lua>(
    lua: &'lua Lua,
    io_type: &RegistryKey,
    file: &Value<'lua>,
) -> mlua::Result<SourceHandle> {
    let io_type: Function = lua.registry_value(io_type)?;
    let kind: Option<String> = io_type.call(file.clone())?;

    match kind.as_deref() {
        Some("file") => {
            // io handles begin with the FILE* they wrap, null once closed
            let stream = unsafe { *(file.to_pointer() as *const *mut libc::FILE) };
            if stream.is_null() {
                Ok(SourceHandle::Closed)
            } else {
                Ok(SourceHandle::Open(unsafe { libc::fileno(stream) }))
            }
        }
        Some(_) => Ok(SourceHandle::Closed),
        None => Err(TransmitError::NotAFile(file.type_name().to_string()).into()),
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::vm::{memory::tracker::Tracker, state::Vm};

    fn vm(caps: Capabilities) -> Vm {
        let mut tracker = Tracker::default();
        tracker.silence();
        let vm = Vm::new(tracker).unwrap();
        HostRegistry::new(caps).install(vm.lua()).unwrap();
        vm
    }

    fn failure(vm: &Vm, script: &str) -> String {
        let (ok, err): (bool, Value) = vm.lua().load(script).eval().unwrap();
        assert!(!ok);
        match err {
            Value::Error(e) => e.to_string(),
            Value::String(s) => s.to_string_lossy().into_owned(),
            other => panic!("unexpected error value {other:?}"),
        }
    }

    #[test]
    pub fn test_null_is_distinct_from_nil() {
        let vm = vm(Capabilities::detect());
        let (kind, is_nil): (String, bool) = vm
            .lua()
            .load("return type(null), null == nil")
            .eval()
            .unwrap();
        assert_eq!(kind, "userdata");
        assert!(!is_nil);
    }

    #[test]
    pub fn test_sendfile_always_installed() {
        let vm = vm(Capabilities::none());
        let kind: String = vm.lua().load("return type(sendfile)").eval().unwrap();
        assert_eq!(kind, "function");
    }

    #[test]
    pub fn test_unsupported_platform_raises() {
        let vm = vm(Capabilities::none());
        let msg = failure(&vm, "return pcall(sendfile, io.tmpfile(), 1, 10)");
        assert!(msg.contains("not support sendfile at this system"));
    }

    #[test]
    pub fn test_closed_file_raises() {
        let vm = vm(Capabilities {
            zero_copy_send: true,
        });
        let msg = failure(
            &vm,
            "local f = io.tmpfile() f:close() return pcall(sendfile, f, 1, 10)",
        );
        assert!(msg.contains("attempt to use a closed file"));
    }

    #[test]
    pub fn test_non_file_argument_raises() {
        let vm = vm(Capabilities {
            zero_copy_send: true,
        });
        let msg = failure(&vm, "return pcall(sendfile, {}, 1, 10)");
        assert!(msg.contains("FILE* expected"));
    }

    #[test]
    pub fn test_negative_count_raises() {
        let vm = vm(Capabilities {
            zero_copy_send: true,
        });
        let msg = failure(&vm, "return pcall(sendfile, io.tmpfile(), 1, -5)");
        assert!(msg.contains("must not be negative"));
    }

    #[test]
    pub fn test_replacing_io_does_not_break_binding() {
        let vm = vm(Capabilities {
            zero_copy_send: true,
        });
        let n: i64 = vm
            .lua()
            .load("local f = io.tmpfile() io = nil return sendfile(f, 1, 0)")
            .eval()
            .unwrap();
        assert_eq!(n, 0);
    }
}

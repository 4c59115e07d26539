//! Load and run the main script
//!
//! The script is compiled as a single chunk and executed under
//! `xpcall` with a handler that extends the error message with a stack
//! traceback.
use crate::{
    driver::{error::LaunchError, options::LaunchOptions, statistics::Statistics},
    vm::{
        host::{transmit::Capabilities, HostRegistry},
        memory::tracker::Tracker,
        state::Vm,
    },
};
use mlua::{Function, Lua, MultiValue, Table, Value};
use std::{ffi::CStr, fs, io, path::Path, time::Instant};

/// Reported when a failure carries no usable message
pub const NO_ERROR_MESSAGE: &str = "no error message";

/// Registry slot holding `debug.traceback` as it was before any script ran
const TRACEBACK: &str = "zvnet.traceback";

/// Run the script named in the options, recording statistics as we go
pub fn run(opt: &LaunchOptions, stats: &mut Statistics) -> Result<(), LaunchError> {
    let path = opt.script().ok_or(LaunchError::Usage)?;

    let launcher = Launcher::new(Tracker::new(opt.band())?, Capabilities::detect())?;
    launcher.set_args(path, opt.args())?;

    let result = {
        let t = Instant::now();
        let chunk = launcher.load(path);
        stats.timings_mut().record("load", t.elapsed());

        chunk.and_then(|chunk| {
            let t = Instant::now();
            let ret = launcher.execute(path, chunk);
            stats.timings_mut().record("execute", t.elapsed());
            ret
        })
    };

    stats.set_allocs(launcher.vm().stats());
    stats.set_usage(launcher.vm().usage());
    result
}

/// A VM with the host api installed, ready to run scripts
pub struct Launcher {
    vm: Vm,
}

impl Launcher {
    pub fn new(tracker: Tracker, capabilities: Capabilities) -> Result<Self, LaunchError> {
        let vm = Vm::new(tracker)?;
        HostRegistry::new(capabilities).install(vm.lua())?;

        {
            let lua = vm.lua();
            let debug: Table = lua.globals().get("debug")?;
            lua.set_named_registry_value(TRACEBACK, debug.get::<_, Function>("traceback")?)?;
        }

        Ok(Launcher { vm })
    }

    pub fn vm(&self) -> &Vm {
        &self.vm
    }

    /// Expose the script path and its arguments as the global `arg`
    pub fn set_args(&self, script: &Path, args: &[String]) -> Result<(), LaunchError> {
        let lua = self.vm.lua();
        let arg = lua.create_table()?;
        arg.raw_set(0, script.to_string_lossy().into_owned())?;
        for (i, a) in args.iter().enumerate() {
            arg.raw_set(i + 1, a.as_str())?;
        }
        lua.globals().set("arg", arg)?;
        Ok(())
    }

    /// Read and compile the file at `path`
    pub fn load(&self, path: &Path) -> Result<Function<'_>, LaunchError> {
        let load_error = |message| LaunchError::Load {
            path: path.to_path_buf(),
            message,
        };

        let source = fs::read(path).map_err(|e| {
            load_error(format!("cannot open {}: {}", path.display(), describe(&e)))
        })?;

        tracing::debug!(path = %path.display(), bytes = source.len(), "compiling");
        self.vm
            .lua()
            .load(source.as_slice())
            .set_name(format!("@{}", path.display()))
            .into_function()
            .map_err(|e| match e {
                mlua::Error::SyntaxError { message, .. } => load_error(message),
                e => load_error(e.to_string()),
            })
    }

    /// Call a compiled chunk, discarding anything it returns
    pub fn execute(&self, path: &Path, chunk: Function<'_>) -> Result<(), LaunchError> {
        let lua = self.vm.lua();
        let handler = lua.create_function(with_traceback)?;

        tracing::debug!(path = %path.display(), "executing");
        let xpcall: Function = lua.globals().get("xpcall")?;
        let mut results = xpcall.call::<_, MultiValue>((chunk, handler))?.into_iter();

        match results.next() {
            Some(Value::Boolean(true)) => Ok(()),
            _ => Err(LaunchError::Launch {
                path: path.to_path_buf(),
                message: match results.next() {
                    Some(Value::String(s)) => s.to_string_lossy().into_owned(),
                    _ => NO_ERROR_MESSAGE.to_string(),
                },
            }),
        }
    }
}

/// The C library's text for an OS error, without Rust's `(os error N)`
fn describe(e: &io::Error) -> String {
    match e.raw_os_error() {
        Some(code) => unsafe { CStr::from_ptr(libc::strerror(code)) }
            .to_string_lossy()
            .into_owned(),
        None => e.to_string(),
    }
}

/// Error handler: append a traceback to anything with a message
fn with_traceback<'lua>(lua: &'lua Lua, err: Value<'lua>) -> mlua::Result<Value<'lua>> {
    let message = match err {
        Value::String(s) => s.to_string_lossy().into_owned(),
        Value::Integer(i) => i.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Error(e) => e.to_string(),
        _ => return lua.create_string(NO_ERROR_MESSAGE).map(Value::String),
    };
    let traceback: Function = lua.named_registry_value(TRACEBACK)?;
    traceback.call((message, 2))
}

extern crate zvnet;

use std::process;

use tracing_subscriber::EnvFilter;
use zvnet::driver::launch;
use zvnet::driver::options::LaunchOptions;
use zvnet::driver::statistics::Statistics;

pub fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let opt = LaunchOptions::from_args();

    let mut statistics = Statistics::default();
    match launch::run(&opt, &mut statistics) {
        Ok(()) => exit(&opt, 0, &statistics),
        Err(e) => {
            eprintln!("{e}");
            exit(&opt, e.exit_code(), &statistics)
        }
    }
}

/// Optionally dump stats to stderr then exit
pub fn exit(opts: &LaunchOptions, code: i32, stats: &Statistics) -> ! {
    if opts.statistics() {
        eprintln!();
        eprintln!("~~~~~~~~~~");
        eprintln!("STATISTICS");
        eprintln!("~~~~~~~~~~");
        eprintln!();
        eprintln!("{stats}");
    }
    process::exit(code)
}

//! Command line argument handling with clap v4

use crate::vm::memory::tracker::DEFAULT_BAND_BYTES;
use clap::Parser;
use std::path::PathBuf;

/// zvnet - run a Lua script in a memory-tracked LuaJIT VM
#[derive(Parser, Debug, Clone)]
#[command(name = "zvnet")]
#[command(about = "Run a Lua script in a memory-tracked LuaJIT VM")]
#[command(version)]
pub struct LaunchCli {
    /// Width in bytes of the memory bands between usage reports
    #[arg(
        short = 'b',
        long = "band",
        default_value_t = DEFAULT_BAND_BYTES,
        value_parser = parse_band
    )]
    pub band: usize,

    /// Print allocation statistics to stderr before exiting
    #[arg(short = 'S', long = "statistics")]
    pub statistics: bool,

    /// Main Lua file to run
    #[arg(value_name = "FILE")]
    pub script: Option<PathBuf>,

    /// Arguments passed to the script in the `arg` table
    #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

fn parse_band(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("band must be greater than zero".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

/// Resolved launch configuration
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    script: Option<PathBuf>,
    args: Vec<String>,
    band: usize,
    statistics: bool,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        LaunchOptions {
            script: None,
            args: vec![],
            band: DEFAULT_BAND_BYTES,
            statistics: false,
        }
    }
}

impl From<LaunchCli> for LaunchOptions {
    fn from(cli: LaunchCli) -> Self {
        LaunchOptions {
            script: cli.script,
            args: cli.args,
            band: cli.band,
            statistics: cli.statistics,
        }
    }
}

impl LaunchOptions {
    /// Parse command line arguments
    pub fn from_args() -> Self {
        LaunchOptions::from(LaunchCli::parse())
    }

    pub fn script(&self) -> Option<&PathBuf> {
        self.script.as_ref()
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn band(&self) -> usize {
        self.band
    }

    pub fn statistics(&self) -> bool {
        self.statistics
    }

    pub fn with_script<P: Into<PathBuf>>(mut self, script: P) -> Self {
        self.script = Some(script.into());
        self
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_band(mut self, band: usize) -> Self {
        self.band = band;
        self
    }

    pub fn with_statistics(mut self) -> Self {
        self.statistics = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> LaunchOptions {
        LaunchOptions::from(LaunchCli::try_parse_from(args).unwrap())
    }

    #[test]
    fn test_defaults() {
        let opt = parse(&["zvnet", "main.lua"]);
        assert_eq!(opt.script(), Some(&PathBuf::from("main.lua")));
        assert_eq!(opt.band(), DEFAULT_BAND_BYTES);
        assert!(!opt.statistics());
        assert!(opt.args().is_empty());
    }

    #[test]
    fn test_no_script() {
        let opt = parse(&["zvnet"]);
        assert_eq!(opt.script(), None);
    }

    #[test]
    fn test_band_and_statistics() {
        let opt = parse(&["zvnet", "-S", "--band", "4096", "main.lua"]);
        assert_eq!(opt.band(), 4096);
        assert!(opt.statistics());
    }

    #[test]
    fn test_zero_band_rejected() {
        assert!(LaunchCli::try_parse_from(["zvnet", "-b", "0", "main.lua"]).is_err());
    }

    #[test]
    fn test_script_args_pass_through() {
        let opt = parse(&["zvnet", "main.lua", "one", "--two", "-3"]);
        assert_eq!(opt.script(), Some(&PathBuf::from("main.lua")));
        assert_eq!(opt.args(), &["one", "--two", "-3"]);
    }
}

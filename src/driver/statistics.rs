//! Capture and report statistics for a run

use std::{fmt::Display, time::Duration};

use indexmap::IndexMap;

use crate::vm::memory::tracker::{AllocationStats, Usage};

#[derive(Default, Debug)]
pub struct Timings {
    timings: IndexMap<String, Duration>,
}

impl Timings {
    pub fn record<T: AsRef<str>>(&mut self, name: T, elapsed: Duration) {
        self.timings.insert(name.as_ref().to_string(), elapsed);
    }

    pub fn get<T: AsRef<str>>(&self, name: T) -> Option<Duration> {
        self.timings.get(name.as_ref()).copied()
    }
}

impl Display for Timings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let width = self.timings.keys().map(|k| k.len()).max().unwrap_or(0) + 1;

        for (k, v) in &self.timings {
            writeln!(f, "{:width$}: {:14.9}s", k, v.as_secs_f64(), width = width)?;
        }
        Ok(())
    }
}

/// The statistics captured during a run
#[derive(Default, Debug)]
pub struct Statistics {
    allocs: AllocationStats,
    live_bytes: usize,
    timings: Timings,
}

impl Statistics {
    pub fn set_allocs(&mut self, allocs: AllocationStats) {
        self.allocs = allocs;
    }

    pub fn set_usage(&mut self, usage: Usage) {
        self.live_bytes = usage.live_bytes;
    }

    pub fn allocs(&self) -> &AllocationStats {
        &self.allocs
    }

    pub fn live_bytes(&self) -> usize {
        self.live_bytes
    }

    pub fn timings(&self) -> &Timings {
        &self.timings
    }

    pub fn timings_mut(&mut self) -> &mut Timings {
        &mut self.timings
    }
}

impl Display for Statistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Allocations    : {:10}", self.allocs.allocations)?;
        writeln!(f, "Reallocations  : {:10}", self.allocs.reallocations)?;
        writeln!(f, "Frees          : {:10}", self.allocs.frees)?;
        writeln!(f, "Failures       : {:10}", self.allocs.failures)?;
        writeln!(f, "Peak Bytes     : {:10}", self.allocs.peak_bytes)?;
        writeln!(f, "Live Bytes     : {:10}", self.live_bytes)?;
        writeln!(f, "Levels Raised  : {:10}", self.allocs.raised)?;
        writeln!(f, "Levels Lowered : {:10}", self.allocs.lowered)?;
        writeln!(f)?;
        writeln!(f, "{}", self.timings)
    }
}

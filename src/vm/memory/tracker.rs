//! Live allocation accounting with banded usage notifications
//!
//! The VM issues a constant stream of small allocate / resize / free
//! requests. The tracker keeps a running total of live bytes and
//! reports only when that total moves out of the current band. A band
//! is re-armed one full band below the current level so usage
//! hovering around a boundary stays quiet.
//!
//! A tracker belongs to exactly one VM and is driven from the thread
//! running that VM. It is neither `Send` nor `Sync`.

use std::{fmt::Display, io::Write};

use crate::vm::{console, error::VmError};

/// Default band width: 2M
pub const DEFAULT_BAND_BYTES: usize = 2_097_152;

/// Divisor for reporting usage in megabytes
pub const BYTES_PER_MB: usize = 1_048_576;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}

/// A level crossing reported after an allocation event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crossing {
    pub direction: Direction,
    /// Live bytes after the event
    pub live_bytes: usize,
    /// Level after adjustment
    pub level: usize,
    /// Number of band boundaries moved in this event
    pub bands: usize,
}

impl Crossing {
    /// Live usage in megabytes
    pub fn megabytes(&self) -> f64 {
        self.live_bytes as f64 / BYTES_PER_MB as f64
    }
}

impl Display for Crossing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "luajit vm now use {:.2} M's memory {}",
            self.megabytes(),
            self.direction
        )
    }
}

/// Snapshot of the tracker position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    pub live_bytes: usize,
    pub level: usize,
    pub band: usize,
}

/// Counters accumulated over the tracker lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocationStats {
    /// Fresh blocks handed out
    pub allocations: u64,
    /// Existing blocks resized
    pub reallocations: u64,
    /// Blocks released
    pub frees: u64,
    /// Requests the system allocator could not satisfy
    pub failures: u64,
    /// Highest live byte count observed
    pub peak_bytes: usize,
    /// Upward level crossings reported
    pub raised: u64,
    /// Downward level crossings reported
    pub lowered: u64,
}

/// Where crossing notifications go
enum Sink {
    Stdout,
    Captured(Box<dyn Write>),
    Silent,
}

pub struct Tracker {
    /// Sum of outstanding block sizes
    live: usize,
    /// Current band boundary, always a multiple of `band`
    level: usize,
    /// Band width
    band: usize,
    stats: AllocationStats,
    sink: Sink,
}

impl Default for Tracker {
    fn default() -> Self {
        Tracker {
            live: 0,
            level: DEFAULT_BAND_BYTES,
            band: DEFAULT_BAND_BYTES,
            stats: AllocationStats::default(),
            sink: Sink::Stdout,
        }
    }
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tracker")
            .field("live", &self.live)
            .field("level", &self.level)
            .field("band", &self.band)
            .field("stats", &self.stats)
            .finish()
    }
}

impl Tracker {
    /// Create a tracker with the specified band width in bytes
    pub fn new(band: usize) -> Result<Self, VmError> {
        if band == 0 {
            return Err(VmError::ZeroBand);
        }
        Ok(Tracker {
            level: band,
            band,
            ..Default::default()
        })
    }

    pub fn live_bytes(&self) -> usize {
        self.live
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn band(&self) -> usize {
        self.band
    }

    pub fn usage(&self) -> Usage {
        Usage {
            live_bytes: self.live,
            level: self.level,
            band: self.band,
        }
    }

    pub fn stats(&self) -> AllocationStats {
        self.stats
    }

    /// Send notifications to the supplied writer instead of stdout
    pub fn capture_output(&mut self, out: Box<dyn Write>) {
        self.sink = Sink::Captured(out);
    }

    /// Stop reporting crossings (accounting continues)
    pub fn silence(&mut self) {
        self.sink = Sink::Silent;
    }

    /// Account for an allocation event and report any crossing.
    ///
    /// `had_block` says whether an existing block was supplied; its
    /// `old_size` is only subtracted in that case, and never below zero,
    /// before `new_size` is added.
    pub fn record(&mut self, had_block: bool, old_size: usize, new_size: usize) -> Option<Crossing> {
        match (had_block, new_size) {
            (false, 0) => {}
            (false, _) => self.stats.allocations += 1,
            (true, 0) => self.stats.frees += 1,
            (true, _) => self.stats.reallocations += 1,
        }

        let released = if had_block { old_size } else { 0 };
        self.live = self.live.saturating_sub(released).saturating_add(new_size);
        self.stats.peak_bytes = self.stats.peak_bytes.max(self.live);

        let crossing = self.rebalance();
        if let Some(c) = crossing {
            match c.direction {
                Direction::Up => self.stats.raised += 1,
                Direction::Down => self.stats.lowered += 1,
            }
            self.notify(&c);
        }
        crossing
    }

    /// Note a request the system allocator refused
    pub(crate) fn record_failure(&mut self) {
        self.stats.failures += 1;
    }

    /// Move the level until live usage sits within its band
    fn rebalance(&mut self) -> Option<Crossing> {
        let mut bands = 0;

        if self.live > self.level {
            while self.live > self.level {
                match self.level.checked_add(self.band) {
                    Some(level) => self.level = level,
                    None => break,
                }
                bands += 1;
            }
            (bands > 0).then_some(self.crossing(Direction::Up, bands))
        } else if self.live < self.level - self.band {
            while self.live < self.level - self.band {
                self.level -= self.band;
                bands += 1;
            }
            Some(self.crossing(Direction::Down, bands))
        } else {
            None
        }
    }

    fn crossing(&self, direction: Direction, bands: usize) -> Crossing {
        Crossing {
            direction,
            live_bytes: self.live,
            level: self.level,
            bands,
        }
    }

    fn notify(&mut self, crossing: &Crossing) {
        match &mut self.sink {
            Sink::Stdout => {
                console::write_line(crossing);
            }
            Sink::Captured(out) => {
                let _ = writeln!(out, "{crossing}");
            }
            Sink::Silent => {}
        }
    }
}

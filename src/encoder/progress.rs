//! Parsing of ffmpeg `-progress` output.
//!
//! ffmpeg writes blocks of `key=value` lines, each block closed by
//! `progress=continue` (or `progress=end` for the last one). Only a few keys
//! matter here: the cumulative output time and the bytes written so far.

/// Fraction at which an update is always sent, regardless of the delta
const NEAR_COMPLETE: f64 = 0.99;
/// Absorbs float error when comparing fraction deltas
const DELTA_EPSILON: f64 = 1e-9;

/// One fractional progress update for a running job
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressEvent {
    /// Completion in `[0, 1]`, never decreasing within a job
    pub fraction: f64,
    /// Seconds of output produced so far
    pub elapsed_secs: f64,
    /// Bytes written to the output so far
    pub produced_bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressState {
    Continue,
    End,
}

/// A typed `-progress` line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressField {
    /// Cumulative output time in microseconds
    OutTimeUs(i64),
    /// Bytes written so far
    TotalSize(u64),
    /// Block terminator
    Progress(ProgressState),
    /// Any other well-formed key
    Other,
}

/// Parse one line of `-progress` output. Returns `None` for blank or
/// malformed lines and for values ffmpeg reports as `N/A`.
pub fn parse_line(line: &str) -> Option<ProgressField> {
    let (key, value) = line.trim().split_once('=')?;
    let value = value.trim();

    match key.trim() {
        // ffmpeg reports microseconds under both names
        "out_time_us" | "out_time_ms" => value.parse().ok().map(ProgressField::OutTimeUs),
        "total_size" => value.parse().ok().map(ProgressField::TotalSize),
        "progress" => match value {
            "continue" => Some(ProgressField::Progress(ProgressState::Continue)),
            "end" => Some(ProgressField::Progress(ProgressState::End)),
            _ => None,
        },
        "" => None,
        _ => Some(ProgressField::Other),
    }
}

/// Turns parsed fields into throttled, monotonic [`ProgressEvent`]s
#[derive(Debug)]
pub struct ProgressTracker {
    duration_secs: f64,
    min_delta: f64,
    last_fraction: f64,
    emitted_any: bool,
    out_time_secs: f64,
    produced_bytes: u64,
}

impl ProgressTracker {
    /// `duration_secs` must be positive; callers fall back to 1 second
    pub fn new(duration_secs: f64, min_delta: f64) -> Self {
        Self {
            duration_secs,
            min_delta,
            last_fraction: 0.0,
            emitted_any: false,
            out_time_secs: 0.0,
            produced_bytes: 0,
        }
    }

    pub fn last_fraction(&self) -> f64 {
        self.last_fraction
    }

    /// Feed one field; returns an event when progress advanced enough
    pub fn feed(&mut self, field: ProgressField) -> Option<ProgressEvent> {
        match field {
            ProgressField::TotalSize(bytes) => {
                self.produced_bytes = bytes;
                None
            }
            ProgressField::OutTimeUs(us) => {
                self.out_time_secs = us.max(0) as f64 / 1_000_000.0;
                let fraction = (self.out_time_secs / self.duration_secs).clamp(0.0, 1.0);

                let advanced = fraction - self.last_fraction + DELTA_EPSILON >= self.min_delta;
                let near_complete = fraction >= NEAR_COMPLETE && fraction > self.last_fraction;
                if advanced || near_complete {
                    Some(self.emit(fraction))
                } else {
                    None
                }
            }
            ProgressField::Progress(_) | ProgressField::Other => None,
        }
    }

    /// Final 100% event after a successful encode, unless already sent
    pub fn finish(&mut self) -> Option<ProgressEvent> {
        if self.emitted_any && self.last_fraction >= 1.0 {
            return None;
        }
        Some(self.emit(1.0))
    }

    fn emit(&mut self, fraction: f64) -> ProgressEvent {
        self.last_fraction = fraction;
        self.emitted_any = true;
        ProgressEvent {
            fraction,
            elapsed_secs: self.out_time_secs,
            produced_bytes: self.produced_bytes,
        }
    }
}

use std::fmt::{Display, Formatter};

use time::{Duration, OffsetDateTime};

use super::timestamp::format_wire;

/// Time range requested from the vendor. `start <= end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollWindow {
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
}

impl PollWindow {
    /// Starts at the checkpoint when there is one, else `look_back_hours`
    /// before `now`. A checkpoint ahead of `now` is clamped to `now`.
    pub fn compute(
        checkpoint: Option<OffsetDateTime>,
        look_back_hours: u8,
        now: OffsetDateTime,
    ) -> Self {
        let start = checkpoint
            .unwrap_or_else(|| now - Duration::hours(i64::from(look_back_hours)))
            .min(now);
        Self { start, end: now }
    }

    /// `start` in the vendor's `lastGMTUpdateTime` format.
    pub fn start_wire(&self) -> String {
        format_wire(self.start)
    }
}

impl Display for PollWindow {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} .. {}", format_wire(self.start), format_wire(self.end))
    }
}

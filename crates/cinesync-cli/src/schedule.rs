//! Daily job schedule for `cinesync daemon`.

use std::fmt;

use chrono::{Days, NaiveDateTime, NaiveTime};

/// A scheduled job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    /// TMDB catalog sync.
    Tmdb,
    /// KOFIC box office and mapping.
    Kofic,
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Tmdb => "tmdb",
            Self::Kofic => "kofic",
        })
    }
}

/// Jobs run once a day at a fixed local wall-clock time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailySchedule {
    entries: Vec<(Job, NaiveTime)>,
}

impl DailySchedule {
    /// Creates a schedule from `(job, time of day)` pairs.
    #[must_use]
    pub const fn new(entries: Vec<(Job, NaiveTime)>) -> Self {
        Self { entries }
    }

    /// The earliest job due strictly after `now`, with its start time.
    ///
    /// Jobs due at the same instant keep their declaration order.
    #[must_use]
    pub fn next_due(&self, now: NaiveDateTime) -> Option<(Job, NaiveDateTime)> {
        let mut best: Option<(Job, NaiveDateTime)> = None;
        for &(job, at) in &self.entries {
            let due = next_occurrence(now, at);
            if best.is_none_or(|(_, current)| due < current) {
                best = Some((job, due));
            }
        }
        best
    }
}

/// Next time strictly after `now` whose wall-clock time is `at`.
#[must_use]
pub fn next_occurrence(now: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    let today = now.date().and_time(at);
    if today > now {
        return today;
    }
    now.date()
        .checked_add_days(Days::new(1))
        .map_or(today, |tomorrow| tomorrow.and_time(at))
}

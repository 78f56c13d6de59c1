use chrono::{Days, NaiveDate};
use tracing::{debug, warn};

use crate::TweetGraphError;

/// One calendar day of a search window: `[start, end)` with `end = start + 1 day`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayChunk {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// An inclusive range of calendar days to scrape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    first: NaiveDate,
    last: NaiveDate,
}

impl DateWindow {
    /// Window covering `first..=last`. Reversed bounds are rejected.
    pub fn new(first: NaiveDate, last: NaiveDate) -> Result<Self, TweetGraphError> {
        if first > last {
            return Err(TweetGraphError::Validation(format!(
                "date window starts after it ends ({first} > {last})"
            )));
        }
        Ok(Self { first, last })
    }

    /// Resolve a ticket's optional bounds into a window.
    ///
    /// `until` is exclusive: the last scraped day is the one before it. With no
    /// `until`, the window runs through `today`; with no `since`, it starts
    /// `default_days` before that. Reversed bounds are swapped and a zero-length
    /// span collapses to the single day `since`. Days after `today` are never
    /// scraped: the window ends at `today`, or is the single day `first` when it
    /// starts in the future.
    pub fn resolve(
        since: Option<NaiveDate>,
        until: Option<NaiveDate>,
        today: NaiveDate,
        default_days: i64,
    ) -> Self {
        let lookback = Days::new(default_days.max(0).unsigned_abs());
        let default_since = today.checked_sub_days(lookback).unwrap_or(NaiveDate::MIN);

        let mut first = since.unwrap_or(default_since);
        let mut last = match until {
            None => today.max(first),
            Some(mut until) => {
                if first > until {
                    warn!(since = %first, %until, "Ticket window reversed, swapping bounds");
                    std::mem::swap(&mut first, &mut until);
                }
                until.pred_opt().unwrap_or(until).max(first)
            }
        };

        if last > today {
            if first > today {
                warn!(%first, %today, "Window starts in the future, scraping that day only");
                last = first;
            } else {
                debug!(%last, %today, "Window ends in the future, stopping at today");
                last = today;
            }
        }

        Self { first, last }
    }

    pub fn first(&self) -> NaiveDate {
        self.first
    }

    pub fn last(&self) -> NaiveDate {
        self.last
    }

    /// Number of day chunks in the window.
    pub fn len_days(&self) -> usize {
        ((self.last - self.first).num_days() + 1) as usize
    }

    /// Lazy ascending sequence of one-day chunks. Calling again restarts from the first day.
    pub fn days(&self) -> DayChunks {
        DayChunks {
            next: Some(self.first),
            last: self.last,
        }
    }
}

/// Iterator over the days of a [`DateWindow`].
#[derive(Debug, Clone)]
pub struct DayChunks {
    next: Option<NaiveDate>,
    last: NaiveDate,
}

impl Iterator for DayChunks {
    type Item = DayChunk;

    fn next(&mut self) -> Option<DayChunk> {
        let start = self.next.filter(|d| *d <= self.last)?;
        let end = start.succ_opt()?;
        self.next = Some(end);
        Some(DayChunk { start, end })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self
            .next
            .filter(|d| *d <= self.last)
            .map(|d| ((self.last - d).num_days() + 1) as usize)
            .unwrap_or(0);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for DayChunks {}

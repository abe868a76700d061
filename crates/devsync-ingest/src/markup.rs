//! Entry markup: ownership and defaults stamped onto every decoded record

use chrono::{Local, NaiveDateTime};
use devsync_common::types::{Entry, DEVICE_TIME_FORMAT};
use std::fmt;
use std::sync::Arc;

/// Source of "now" for entries that arrive without a device time
pub type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

/// Stamps decoded entries with the owning group.
///
/// A missing `deviceTime` is defaulted to the local time at markup. This runs
/// before identity assignment, so such entries hash differently on every run.
#[derive(Clone)]
pub struct EntryMarkup {
    group_id: Arc<str>,
    clock: Clock,
}

impl EntryMarkup {
    pub fn new(group_id: &str) -> Self {
        Self {
            group_id: Arc::from(group_id),
            clock: Arc::new(|| Local::now().naive_local()),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub fn mark(&self, mut entry: Entry) -> Entry {
        entry.group_id = Some(self.group_id.to_string());
        if entry.device_time.is_none() {
            entry.device_time = Some((self.clock)().format(DEVICE_TIME_FORMAT).to_string());
        }
        entry
    }
}

impl fmt::Debug for EntryMarkup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryMarkup")
            .field("group_id", &self.group_id)
            .finish_non_exhaustive()
    }
}

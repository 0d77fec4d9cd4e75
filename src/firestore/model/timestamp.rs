use std::cmp::Ordering;

use chrono::{DateTime, Datelike, TimeZone, Utc};

use crate::firestore::error::{invalid_argument, FirestoreResult};

/// Years representable by a Firestore timestamp.
const MIN_YEAR: i32 = 1;
const MAX_YEAR: i32 = 9999;

/// Provider-native timestamp scalar with nanosecond precision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: i32,
}

impl Timestamp {
    pub fn new(seconds: i64, nanos: i32) -> Self {
        let mut timestamp = Self { seconds, nanos };
        timestamp.normalize();
        timestamp
    }

    pub fn now() -> Self {
        Self::from_date_time(&Utc::now())
    }

    pub fn from_date_time(value: &DateTime<Utc>) -> Self {
        Self::new(value.timestamp(), value.timestamp_subsec_nanos() as i32)
    }

    /// Like [`from_date_time`](Self::from_date_time), rejecting dates outside
    /// years 0001 through 9999.
    pub fn try_from_date_time(value: &DateTime<Utc>) -> FirestoreResult<Self> {
        if !(MIN_YEAR..=MAX_YEAR).contains(&value.year()) {
            return Err(invalid_argument(format!(
                "Date {value} is outside the supported timestamp range (years {MIN_YEAR:04} to {MAX_YEAR})"
            )));
        }
        Ok(Self::from_date_time(value))
    }

    /// Converts to a UTC date, or `None` when the value is outside chrono's range.
    pub fn to_date_time(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.seconds, self.nanos as u32).single()
    }

    fn normalize(&mut self) {
        let extra_seconds = self.nanos.div_euclid(1_000_000_000);
        self.seconds += extra_seconds as i64;
        self.nanos = self.nanos.rem_euclid(1_000_000_000);
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.seconds.cmp(&other.seconds) {
            Ordering::Equal => self.nanos.cmp(&other.nanos),
            ordering => ordering,
        }
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self::from_date_time(&value)
    }
}

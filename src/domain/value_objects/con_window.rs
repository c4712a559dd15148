use chrono::{DateTime, Utc};
use serde::Serialize;

/// The stretch of time the convention runs; every slot must fit inside it.
///
/// Both bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ConWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, &'static str> {
        if start >= end {
            return Err("Convention start must be before its end");
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant <= self.end
    }
}

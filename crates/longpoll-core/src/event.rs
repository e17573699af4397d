use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single event handed to a waiting client. Immutable once stamped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub message: String,
    pub time: DateTime<Utc>,
}

impl Event {
    /// Stamp a new event with the current wall-clock time.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            time: Utc::now(),
        }
    }
}

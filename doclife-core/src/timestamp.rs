// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::Value;

/// Microseconds since UNIX epoch.
///
/// Used for the `creation` and `modified` audit columns. The optimistic concurrency check compares
/// these values for equality, so two consecutive writes to the same document must never produce
/// the same timestamp, see `Timestamp::after`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    /// Current system time.
    pub fn now() -> Self {
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|duration| duration.as_micros() as u64)
            .unwrap_or_default();
        Self(micros)
    }

    /// Current system time, but strictly greater than `previous` if one was given.
    pub fn after(previous: Option<Timestamp>) -> Self {
        let now = Self::now();
        match previous {
            Some(previous) if previous >= now => Self(previous.0 + 1),
            _ => now,
        }
    }

    pub fn as_micros(&self) -> u64 {
        self.0
    }

    pub fn to_value(self) -> Value {
        Value::Int(self.0 as i64)
    }

    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(micros) if *micros >= 0 => Some(Self(*micros as u64)),
            Value::Text(text) => text.parse().ok().map(Self),
            _ => None,
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Timestamp {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::Timestamp;

    #[test]
    fn strictly_after_previous() {
        let far_future = Timestamp::from_micros(u64::MAX / 2);
        assert_eq!(
            Timestamp::after(Some(far_future)),
            Timestamp::from_micros(u64::MAX / 2 + 1)
        );

        let past = Timestamp::from_micros(1);
        assert!(Timestamp::after(Some(past)) > past);
    }

    #[test]
    fn value_conversion() {
        let timestamp = Timestamp::from_micros(1_700_000_000_000_000);
        assert_eq!(Timestamp::from_value(&timestamp.to_value()), Some(timestamp));
        assert_eq!(Timestamp::from_value(&"42".into()), Some(Timestamp::from_micros(42)));
    }
}

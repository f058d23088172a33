//! `DateTime<Utc>` serde helpers for persisted descriptors.
//!
//! Timestamps are written as RFC3339. Reading also accepts Unix timestamps
//! (seconds or milliseconds), which older provider feeds emit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serializer};

pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&dt.to_rfc3339())
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Timestamp {
        Text(String),
        Unix(i64),
    }

    match Timestamp::deserialize(deserializer)? {
        Timestamp::Text(s) => DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| Error::custom(format!("Invalid RFC3339 timestamp: {e}"))),
        Timestamp::Unix(ts) => {
            from_unix(ts).ok_or_else(|| Error::custom(format!("Invalid Unix timestamp: {ts}")))
        }
    }
}

/// Values above 10^11 are milliseconds, anything else is seconds.
fn from_unix(ts: i64) -> Option<DateTime<Utc>> {
    if ts > 100_000_000_000 {
        DateTime::from_timestamp_millis(ts)
    } else {
        DateTime::from_timestamp(ts, 0)
    }
}

use chrono::{DateTime, SubsecRound, Utc};

pub type Timestamp = DateTime<Utc>;

const RFC3339_SECONDS: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Current UTC time truncated to whole seconds, so every persisted timestamp
/// round-trips through its string form unchanged.
pub fn now() -> Timestamp {
    Utc::now().trunc_subsecs(0)
}

pub fn format_rfc3339(ts: &Timestamp) -> String {
    ts.format(RFC3339_SECONDS).to_string()
}

/// Filename-safe stamp (no `:`).
pub fn dir_stamp(ts: &Timestamp) -> String {
    ts.format("%Y-%m-%dT%H-%M-%SZ").to_string()
}

pub fn parse_rfc3339(s: &str) -> Result<Timestamp, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|d| d.with_timezone(&Utc))
}

/// `#[serde(with = "awo_core::time::rfc3339")]`
pub mod rfc3339 {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::{format_rfc3339, parse_rfc3339, Timestamp};

    pub fn serialize<S: Serializer>(ts: &Timestamp, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format_rfc3339(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Timestamp, D::Error> {
        let raw = String::deserialize(d)?;
        parse_rfc3339(&raw).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};

        use super::super::{format_rfc3339, parse_rfc3339, Timestamp};

        pub fn serialize<S: Serializer>(ts: &Option<Timestamp>, s: S) -> Result<S::Ok, S::Error> {
            match ts {
                Some(ts) => s.serialize_str(&format_rfc3339(ts)),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Timestamp>, D::Error> {
            match Option::<String>::deserialize(d)? {
                Some(raw) => parse_rfc3339(&raw).map(Some).map_err(serde::de::Error::custom),
                None => Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_round_trips_through_text() {
        let ts = now();
        let text = format_rfc3339(&ts);
        assert!(text.ends_with('Z'));
        assert_eq!(parse_rfc3339(&text).unwrap(), ts);
    }
}

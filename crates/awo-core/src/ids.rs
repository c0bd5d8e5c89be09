use std::fmt;

use serde::{Deserialize, Serialize};

use crate::time::{dir_stamp, Timestamp};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn from_str(s: impl Into<String>) -> Self {
                Self(s.into())
            }
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

id_newtype!(RunId);
id_newtype!(StepId);

impl RunId {
    /// `run_<YYYY-MM-DDTHH-MM-SSZ>`; sortable and filename-safe.
    pub fn from_time(ts: &Timestamp) -> Self {
        Self(format!("run_{}", dir_stamp(ts)))
    }

    /// Disambiguates a run created within the same second as an existing one.
    pub fn with_suffix(&self, n: u32) -> Self {
        Self(format!("{}_{}", self.0, n))
    }
}

impl StepId {
    /// Positional id used when a step does not name itself.
    pub fn positional(index: usize) -> Self {
        Self(format!("step_{index}"))
    }

    /// Stem for `steps/NN_<stem>.json`.
    pub fn file_stem(&self) -> String {
        safe_file_stem(&self.0)
    }
}

/// Replaces everything outside `[A-Za-z0-9._-]` with `_`.
pub fn safe_file_stem(s: &str) -> String {
    let stem: String = s
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
        .collect();
    match stem.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => stem,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn run_id_is_derived_from_utc_time() {
        let ts = chrono::Utc.with_ymd_and_hms(2026, 10, 16, 9, 5, 3).unwrap();
        let id = RunId::from_time(&ts);
        assert_eq!(id.as_str(), "run_2026-10-16T09-05-03Z");
        assert_eq!(id.with_suffix(2).as_str(), "run_2026-10-16T09-05-03Z_2");
        assert!(id < id.with_suffix(1));
    }

    #[test]
    fn file_stem_strips_path_characters() {
        assert_eq!(StepId::from_str("gen-1").file_stem(), "gen-1");
        assert_eq!(StepId::from_str("../etc/passwd").file_stem(), ".._etc_passwd");
        assert_eq!(safe_file_stem(".."), "_");
        assert_eq!(safe_file_stem("a b"), "a_b");
    }
}

use anyhow::Context;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::mode::LocationKind;

pub const LAST_RUN_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The mode and version currently installed in one location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VersionRecord {
    #[serde(rename = "Mode")]
    pub mode: String,
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "LastRun", with = "last_run_format")]
    pub last_run: NaiveDateTime,
    #[serde(rename = "Location")]
    pub location: LocationKind,
}

impl VersionRecord {
    pub fn from_json_str(input: &str) -> anyhow::Result<Self> {
        serde_json::from_str(input).context("failed to parse version record")
    }

    pub fn to_json_string(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize version record")
    }
}

mod last_run_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::LAST_RUN_FORMAT;

    pub fn serialize<S>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(&value.format(LAST_RUN_FORMAT))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(raw.trim(), LAST_RUN_FORMAT)
            .map_err(serde::de::Error::custom)
    }
}

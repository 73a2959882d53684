use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

/// Version counter and creation time of one mined rule set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub version: u64,
    pub created_at: DateTime<Utc>,
}

impl Display for VersionRecord {
    /// Renders the `version;timestamp` line stored in `model_info`
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{};{}",
            self.version,
            self.created_at.to_rfc3339_opts(SecondsFormat::Micros, true)
        )
    }
}

impl FromStr for VersionRecord {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (version, created_at) = s
            .trim()
            .split_once(';')
            .ok_or_else(|| format!("expected `version;timestamp`, got {:?}", s))?;

        let version = version
            .trim()
            .parse::<u64>()
            .map_err(|e| format!("invalid version {:?}: {}", version, e))?;

        Ok(Self {
            version,
            created_at: parse_timestamp(created_at.trim())?,
        })
    }
}

/// Accepts RFC 3339 as well as the naive `YYYY-MM-DD HH:MM:SS.ffffff` form
/// written by earlier deployments (interpreted as UTC).
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| format!("invalid timestamp {:?}: {}", raw, e))
}

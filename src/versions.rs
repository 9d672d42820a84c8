//! Upgrades that changed how clients are counted, limited to the report window.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Release lines whose upgrade changes the meaning of the counters: 1.9
/// started counting non-entity tokens as clients, 1.10 added per-mount
/// attribution and 1.17 added secret syncs and ACME clients.
pub const NOTABLE_RELEASES: [(u32, u32); 3] = [(1, 9), (1, 10), (1, 17)];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionUpdate {
    pub version: String,
    pub previous_version: Option<String>,
    pub timestamp_installed: DateTime<Utc>,
}

impl VersionUpdate {
    /// First install of a notable release line. Patch upgrades within the
    /// same line do not count again.
    pub fn is_notable(&self) -> bool {
        let Some(line) = release_line(&self.version) else {
            return false;
        };
        if !NOTABLE_RELEASES.contains(&line) {
            return false;
        }
        self.previous_version
            .as_deref()
            .and_then(release_line)
            .map_or(true, |previous| previous != line)
    }
}

/// Notable upgrades installed within `[start, end]`. A missing bound leaves
/// that side open. Input order is kept.
pub fn filter_version_history(
    history: &[VersionUpdate],
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Vec<VersionUpdate> {
    history
        .iter()
        .filter(|update| update.is_notable())
        .filter(|update| start.map_or(true, |s| update.timestamp_installed >= s))
        .filter(|update| end.map_or(true, |e| update.timestamp_installed <= e))
        .cloned()
        .collect()
}

/// `(major, minor)` of a version such as `1.10.1+ent` or `v1.9.0`.
fn release_line(version: &str) -> Option<(u32, u32)> {
    let mut parts = version.trim().trim_start_matches('v').split('.');
    let major = leading_number(parts.next()?)?;
    let minor = leading_number(parts.next()?)?;
    Some((major, minor))
}

fn leading_number(part: &str) -> Option<u32> {
    let end = part
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(part.len());
    part[..end].parse().ok()
}

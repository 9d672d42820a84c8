//! Validation and flattening of the raw activity report.
//!
//! The raw report nests counters by month, namespace and mount, and may key
//! namespaces and mounts by id or path instead of listing them. Normalization
//! turns it into ordered records with every counter defaulted, and rejects
//! shapes that cannot be trusted.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::config::{EngineOptions, InvalidMonthPolicy};
use crate::error::ActivityError;
use crate::models::counts::{CountField, Counts};
use crate::models::month::MonthKey;
use crate::models::records::{MountRecord, NamespaceRecord, ROOT_NAMESPACE};
use crate::models::wire::{
    Keyed, RawActivityResponse, RawMonth, RawMount, RawNamespace, RawNewClients,
    RawVersionUpdate,
};
use crate::ranking::{sort_ranked, Ranked};
use crate::versions::VersionUpdate;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedReport {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Grand total as reported upstream for the whole query window.
    pub total: Counts,
    /// Per-namespace totals as reported upstream for the whole query window.
    pub by_namespace: Vec<NamespaceRecord>,
    /// Chronological, one entry per month.
    pub months: Vec<NormalizedMonth>,
    /// Ordered by install time.
    pub version_history: Vec<VersionUpdate>,
}

/// A validated month block. Parts the source did not report stay `None`;
/// the monthly aggregator decides how to default them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedMonth {
    pub month: MonthKey,
    pub counts: Option<Counts>,
    pub namespaces: Option<Vec<NamespaceRecord>>,
    pub new_clients: Option<NormalizedNewClients>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedNewClients {
    pub counts: Option<Counts>,
    pub namespaces: Option<Vec<NamespaceRecord>>,
}

/// Parses and normalizes a raw report from its JSON text.
pub fn normalize_str(raw: &str, opts: &EngineOptions) -> Result<NormalizedReport, ActivityError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| ActivityError::MalformedReport(format!("not valid JSON: {e}")))?;
    normalize(&value, opts)
}

pub fn normalize(raw: &Value, opts: &EngineOptions) -> Result<NormalizedReport, ActivityError> {
    let wire = RawActivityResponse::deserialize(raw)
        .map_err(|e| ActivityError::MalformedReport(e.to_string()))?;

    let start_time = parse_instant(wire.start_time.as_deref())?;
    let end_time = parse_instant(wire.end_time.as_deref())?;
    let total = check_counts(wire.total.unwrap_or_default(), opts, || "total".to_string())?;
    let by_namespace = match wire.by_namespace {
        Some(keyed) => flatten_namespaces(keyed, opts)?,
        None => Vec::new(),
    };
    let months = normalize_months(wire.months.unwrap_or_default(), opts)?;
    let version_history = match wire.version_history {
        Some(keyed) => normalize_version_history(keyed)?,
        None => Vec::new(),
    };

    tracing::debug!(
        months = months.len(),
        namespaces = by_namespace.len(),
        upgrades = version_history.len(),
        total_clients = total.clients,
        "Normalized activity report"
    );

    Ok(NormalizedReport {
        start_time,
        end_time,
        total,
        by_namespace,
        months,
        version_history,
    })
}

fn parse_instant(raw: Option<&str>) -> Result<Option<DateTime<Utc>>, ActivityError> {
    raw.map(|s| {
        DateTime::parse_from_rfc3339(s)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| ActivityError::invalid_timestamp(s, e.to_string()))
    })
    .transpose()
}

fn check_counts(
    counts: Counts,
    opts: &EngineOptions,
    scope: impl FnOnce() -> String,
) -> Result<Counts, ActivityError> {
    if opts.strict_counts && !counts.is_balanced() {
        return Err(ActivityError::IntegrityViolation(format!(
            "{}: clients {} != entity_clients {} + non_entity_clients {}",
            scope(),
            counts.clients,
            counts.entity_clients,
            counts.non_entity_clients
        )));
    }
    Ok(counts)
}

fn normalize_months(
    blocks: Vec<RawMonth>,
    opts: &EngineOptions,
) -> Result<Vec<NormalizedMonth>, ActivityError> {
    let mut months = Vec::with_capacity(blocks.len());

    for block in blocks {
        let month = match month_key(block.timestamp.as_deref()) {
            Ok(month) => month,
            Err(err) if opts.invalid_month_policy == InvalidMonthPolicy::Skip => {
                tracing::warn!(error = %err, "Skipping month with invalid timestamp");
                continue;
            }
            Err(err) => return Err(err),
        };
        months.push(normalize_month(month, block, opts)?);
    }

    months.sort_by_key(|m| m.month);
    if let Some(pair) = months.windows(2).find(|w| w[0].month == w[1].month) {
        return Err(ActivityError::MalformedReport(format!(
            "month {} is reported more than once",
            pair[0].month
        )));
    }
    Ok(months)
}

fn month_key(timestamp: Option<&str>) -> Result<MonthKey, ActivityError> {
    match timestamp {
        Some(raw) => MonthKey::from_timestamp(raw),
        None => Err(ActivityError::invalid_timestamp("", "month has no timestamp")),
    }
}

fn normalize_month(
    month: MonthKey,
    block: RawMonth,
    opts: &EngineOptions,
) -> Result<NormalizedMonth, ActivityError> {
    let counts = block
        .counts
        .map(|c| check_counts(c, opts, || format!("month {month}")))
        .transpose()?;
    let namespaces = block
        .namespaces
        .map(|keyed| flatten_namespaces(keyed, opts))
        .transpose()?;
    let new_clients = block
        .new_clients
        .map(|raw| normalize_new_clients(month, raw, opts))
        .transpose()?;

    Ok(NormalizedMonth {
        month,
        counts,
        namespaces,
        new_clients,
    })
}

fn normalize_new_clients(
    month: MonthKey,
    raw: RawNewClients,
    opts: &EngineOptions,
) -> Result<NormalizedNewClients, ActivityError> {
    Ok(NormalizedNewClients {
        counts: raw
            .counts
            .map(|c| check_counts(c, opts, || format!("new clients of month {month}")))
            .transpose()?,
        namespaces: raw
            .namespaces
            .map(|keyed| flatten_namespaces(keyed, opts))
            .transpose()?,
    })
}

/// Listed collections keep their order. Keyed ones have none, so they are
/// put in rank order by clients, then label.
fn flatten<T, R, F>(keyed: Keyed<T>, mut build: F) -> Result<Vec<R>, ActivityError>
where
    R: Ranked,
    F: FnMut(T, Option<String>) -> Result<R, ActivityError>,
{
    match keyed {
        Keyed::Ordered(items) => items.into_iter().map(|item| build(item, None)).collect(),
        Keyed::ByKey(items) => {
            let mut records = items
                .into_iter()
                .map(|(key, item)| build(item, Some(key)))
                .collect::<Result<Vec<_>, _>>()?;
            sort_ranked(&mut records, CountField::Clients);
            Ok(records)
        }
    }
}

fn flatten_namespaces(
    keyed: Keyed<RawNamespace>,
    opts: &EngineOptions,
) -> Result<Vec<NamespaceRecord>, ActivityError> {
    flatten(keyed, |raw, key| namespace_record(raw, key, opts))
}

fn namespace_record(
    raw: RawNamespace,
    key: Option<String>,
    opts: &EngineOptions,
) -> Result<NamespaceRecord, ActivityError> {
    let id = raw
        .namespace_id
        .filter(|id| !id.is_empty())
        .or(key)
        .unwrap_or_default();
    let label = namespace_label(raw.namespace_path.as_deref(), &id);
    let counts = check_counts(raw.counts.unwrap_or_default(), opts, || {
        format!("namespace '{label}'")
    })?;
    let mounts = match raw.mounts {
        Some(keyed) => flatten(keyed, |mount, key| mount_record(mount, key, &label, opts))?,
        None => Vec::new(),
    };

    let record = NamespaceRecord {
        id,
        label,
        counts,
        mounts,
    };
    record.verify_mounts()?;
    Ok(record)
}

/// The root namespace is reported with an empty path.
fn namespace_label(path: Option<&str>, id: &str) -> String {
    match path {
        Some(path) if !path.is_empty() => path.to_string(),
        Some(_) => ROOT_NAMESPACE.to_string(),
        None if id.is_empty() => ROOT_NAMESPACE.to_string(),
        None => id.to_string(),
    }
}

fn mount_record(
    raw: RawMount,
    key: Option<String>,
    namespace: &str,
    opts: &EngineOptions,
) -> Result<MountRecord, ActivityError> {
    let label = raw
        .mount_path
        .filter(|path| !path.is_empty())
        .or(key)
        .unwrap_or_default();
    let counts = check_counts(raw.counts.unwrap_or_default(), opts, || {
        format!("mount '{label}' of namespace '{namespace}'")
    })?;
    Ok(MountRecord { label, counts })
}

fn normalize_version_history(
    keyed: Keyed<RawVersionUpdate>,
) -> Result<Vec<VersionUpdate>, ActivityError> {
    let entries: Vec<(RawVersionUpdate, Option<String>)> = match keyed {
        Keyed::Ordered(items) => items.into_iter().map(|item| (item, None)).collect(),
        Keyed::ByKey(items) => items.into_iter().map(|(key, item)| (item, Some(key))).collect(),
    };

    let mut history = entries
        .into_iter()
        .map(|(raw, key)| version_update(raw, key))
        .collect::<Result<Vec<_>, _>>()?;
    history.sort_by(|a, b| {
        a.timestamp_installed
            .cmp(&b.timestamp_installed)
            .then_with(|| a.version.cmp(&b.version))
    });
    Ok(history)
}

fn version_update(
    raw: RawVersionUpdate,
    key: Option<String>,
) -> Result<VersionUpdate, ActivityError> {
    let version = raw
        .version
        .filter(|v| !v.is_empty())
        .or(key)
        .ok_or_else(|| {
            ActivityError::MalformedReport("version history entry has no version".to_string())
        })?;
    let timestamp_installed = parse_instant(raw.timestamp_installed.as_deref())?.ok_or_else(|| {
        ActivityError::invalid_timestamp("", format!("version {version} has no install time"))
    })?;

    Ok(VersionUpdate {
        version,
        previous_version: raw.previous_version.filter(|v| !v.is_empty()),
        timestamp_installed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn opts() -> EngineOptions {
        EngineOptions::default()
    }

    fn labels(records: &[NamespaceRecord]) -> Vec<&str> {
        records.iter().map(|r| r.label.as_str()).collect()
    }

    fn month_block(timestamp: &str, clients: u64) -> Value {
        json!({
            "timestamp": timestamp,
            "counts": { "clients": clients, "entity_clients": clients, "non_entity_clients": 0 },
        })
    }

    #[test]
    fn test_absent_sections_yield_empty_report() {
        let report = normalize(&json!({}), &opts()).unwrap();
        assert_eq!(report, NormalizedReport::default());

        let report = normalize(&json!({ "total": null, "months": null, "by_namespace": null }), &opts())
            .unwrap();
        assert!(report.months.is_empty());
        assert!(report.total.is_zero());
    }

    #[test]
    fn test_wrong_structural_types_are_malformed() {
        for raw in [
            json!({ "total": "100" }),
            json!({ "months": { "2024-01": {} } }),
            json!({ "months": [ 42 ] }),
            json!({ "by_namespace": [ { "namespace_id": "x", "mounts": "none" } ] }),
            json!({ "start_time": 1700000000 }),
            json!([]),
            json!(null),
        ] {
            let err = normalize(&raw, &opts()).unwrap_err();
            assert!(matches!(err, ActivityError::MalformedReport(_)), "{raw} -> {err:?}");
        }
    }

    #[test]
    fn test_malformed_list_entry_keeps_its_cause() {
        let raw = json!({ "by_namespace": [ { "namespace_id": "x", "counts": "many" } ] });
        let err = normalize(&raw, &opts()).unwrap_err();
        let ActivityError::MalformedReport(msg) = err else {
            panic!("expected MalformedReport, got {err:?}");
        };
        assert!(msg.contains("invalid type"), "{msg}");
        assert!(!msg.contains("untagged"), "{msg}");

        let err = normalize(&json!({ "by_namespace": "everything" }), &opts()).unwrap_err();
        assert!(
            matches!(err, ActivityError::MalformedReport(ref msg) if msg.contains("a list or an object keyed by id")),
            "{err:?}"
        );
    }

    #[test]
    fn test_upstream_activity_response_normalizes() {
        let report = normalize_str(
            include_str!("../tests/fixtures/activity_response.json"),
            &opts(),
        )
        .unwrap();

        let keys: Vec<String> = report.months.iter().map(|m| m.month.to_string()).collect();
        assert_eq!(keys, ["2023-08", "2023-09"]);
        assert_eq!(report.months[1].month.short_label(), "9/23");
        assert_eq!(report.months[0].counts, None);
        assert_eq!(report.months[1].counts.unwrap().clients, 3928);
        assert_eq!(report.total.clients, 35287);
        assert_eq!(labels(&report.by_namespace), ["ns1", "root"]);
        assert_eq!(report.by_namespace[0].mounts.len(), 3);

        let new_clients = report.months[1].new_clients.as_ref().unwrap();
        assert_eq!(new_clients.counts.unwrap().clients, 364);
    }

    #[test]
    fn test_version_history_list_or_keyed() {
        let listed = json!({
            "version_history": [
                { "version": "1.10.1", "previous_version": "1.9.1", "timestamp_installed": "2023-09-02T00:00:00Z" },
                { "version": "1.9.0", "previous_version": null, "timestamp_installed": "2023-07-02T00:00:00Z" },
            ]
        });
        let keyed = json!({
            "version_history": {
                "1.9.0": { "previous_version": "", "timestamp_installed": "2023-07-02T00:00:00Z" },
                "1.10.1": { "previous_version": "1.9.1", "timestamp_installed": "2023-09-02T00:00:00Z" }
            }
        });
        let listed = normalize(&listed, &opts()).unwrap().version_history;
        let keyed = normalize(&keyed, &opts()).unwrap().version_history;
        assert_eq!(listed, keyed);
        assert_eq!(listed[0].version, "1.9.0");
        assert_eq!(listed[0].previous_version, None);
        assert_eq!(listed[1].version, "1.10.1");

        let err = normalize(
            &json!({ "version_history": [ { "version": "1.9.0" } ] }),
            &opts(),
        )
        .unwrap_err();
        assert!(matches!(err, ActivityError::InvalidTimestamp { .. }));
    }

    #[test]
    fn test_invalid_json_text_is_malformed() {
        assert!(matches!(
            normalize_str("{ not json", &opts()),
            Err(ActivityError::MalformedReport(_))
        ));
        assert_eq!(
            normalize_str("{}", &opts()).unwrap(),
            NormalizedReport::default()
        );
    }

    #[test]
    fn test_listed_namespaces_keep_their_order() {
        let raw = json!({
            "by_namespace": [
                { "namespace_id": "s07UR", "namespace_path": "ns1/", "counts": { "clients": 10 } },
                { "namespace_id": "root", "namespace_path": "", "counts": { "clients": 20 } },
            ]
        });
        let report = normalize(&raw, &opts()).unwrap();
        assert_eq!(labels(&report.by_namespace), ["ns1/", "root"]);
        assert_eq!(report.by_namespace[1].id, "root");
    }

    #[test]
    fn test_keyed_namespaces_are_ranked() {
        let raw = json!({
            "by_namespace": {
                "aaa": { "namespace_path": "small/", "counts": { "clients": 1 } },
                "bbb": { "namespace_path": "tie-b/", "counts": { "clients": 7 } },
                "ccc": { "namespace_path": "tie-a/", "counts": { "clients": 7 } },
                "root": { "counts": { "clients": 9 },
                          "mounts": {
                              "kv/": { "counts": { "clients": 4 } },
                              "auth/token/": { "counts": { "clients": 5 } }
                          } }
            }
        });
        let report = normalize(&raw, &opts()).unwrap();
        assert_eq!(labels(&report.by_namespace), ["root", "tie-a/", "tie-b/", "small/"]);
        assert_eq!(report.by_namespace[1].id, "ccc");

        let mounts: Vec<&str> = report.by_namespace[0]
            .mounts
            .iter()
            .map(|m| m.label.as_str())
            .collect();
        assert_eq!(mounts, ["auth/token/", "kv/"]);
    }

    #[test]
    fn test_months_are_sorted_and_absent_parts_stay_absent() {
        let raw = json!({
            "months": [
                month_block("2021-10-01T00:00:00Z", 40),
                { "timestamp": "2021-06-01T00:00:00Z", "counts": null, "namespaces": null, "new_clients": null },
                month_block("2021-09-01T00:00:00Z", 35),
            ]
        });
        let report = normalize(&raw, &opts()).unwrap();
        let keys: Vec<String> = report.months.iter().map(|m| m.month.to_string()).collect();
        assert_eq!(keys, ["2021-06", "2021-09", "2021-10"]);

        let empty = &report.months[0];
        assert_eq!(empty.counts, None);
        assert_eq!(empty.namespaces, None);
        assert_eq!(empty.new_clients, None);
        assert_eq!(report.months[2].counts.unwrap().clients, 40);
    }

    #[test]
    fn test_duplicate_months_are_malformed() {
        let raw = json!({
            "months": [
                month_block("2021-09-01T00:00:00Z", 35),
                month_block("2021-09-01T00:00:00+00:00", 36),
            ]
        });
        let err = normalize(&raw, &opts()).unwrap_err();
        assert!(matches!(err, ActivityError::MalformedReport(ref msg) if msg.contains("2021-09")));
    }

    #[test]
    fn test_invalid_month_aborts_by_default() {
        let raw = json!({
            "months": [
                month_block("2021-09-01T00:00:00Z", 35),
                month_block("2021-10-15T00:00:00Z", 40),
            ]
        });
        let err = normalize(&raw, &opts()).unwrap_err();
        assert!(matches!(err, ActivityError::InvalidTimestamp { ref value, .. } if value == "2021-10-15T00:00:00Z"));
    }

    #[test]
    fn test_invalid_month_is_dropped_under_skip_policy() {
        let skip = EngineOptions {
            invalid_month_policy: InvalidMonthPolicy::Skip,
            ..EngineOptions::default()
        };
        let raw = json!({
            "months": [
                month_block("2021-09-01T00:00:00Z", 35),
                month_block("2021-10-15T00:00:00Z", 40),
                { "counts": { "clients": 3 } },
                month_block("2021-11-01T00:00:00Z", 45),
            ]
        });
        let report = normalize(&raw, &skip).unwrap();
        let keys: Vec<String> = report.months.iter().map(|m| m.month.to_string()).collect();
        assert_eq!(keys, ["2021-09", "2021-11"]);
    }

    #[test]
    fn test_report_window_timestamps() {
        let raw = json!({
            "start_time": "2023-07-02T00:00:00Z",
            "end_time": "2024-03-04T16:14:21.000Z",
        });
        let report = normalize(&raw, &opts()).unwrap();
        assert_eq!(
            report.start_time.unwrap().to_rfc3339(),
            "2023-07-02T00:00:00+00:00"
        );
        assert_eq!(MonthKey::containing(report.end_time.unwrap()).to_string(), "2024-03");

        let err = normalize(&json!({ "end_time": "yesterday" }), &opts()).unwrap_err();
        assert!(matches!(err, ActivityError::InvalidTimestamp { .. }));
    }

    #[test]
    fn test_mount_sums_must_match_namespace() {
        let raw = json!({
            "months": [{
                "timestamp": "2021-05-01T00:00:00Z",
                "counts": { "clients": 20 },
                "namespaces": [{
                    "namespace_id": "root",
                    "namespace_path": "",
                    "counts": { "clients": 20, "entity_clients": 13, "non_entity_clients": 7 },
                    "mounts": [
                        { "mount_path": "auth/up2/", "counts": { "clients": 8, "entity_clients": 8 } },
                        { "mount_path": "auth/up1/", "counts": { "clients": 7, "non_entity_clients": 7 } }
                    ]
                }]
            }]
        });
        let err = normalize(&raw, &opts()).unwrap_err();
        assert!(matches!(err, ActivityError::IntegrityViolation(ref msg) if msg.contains("root")));
    }

    #[test]
    fn test_new_client_namespaces_are_flattened_too() {
        let raw = json!({
            "months": [{
                "timestamp": "2021-05-01T00:00:00Z",
                "counts": { "clients": 50, "entity_clients": 25, "non_entity_clients": 25 },
                "new_clients": {
                    "counts": { "clients": 5, "entity_clients": 3, "non_entity_clients": 2 },
                    "namespaces": [{
                        "namespace_id": "root",
                        "namespace_path": "",
                        "counts": { "clients": 5, "entity_clients": 3, "non_entity_clients": 2 },
                        "mounts": [
                            { "mount_path": "auth/up2/", "counts": { "clients": 3, "entity_clients": 3 } },
                            { "mount_path": "auth/up1/", "counts": { "clients": 2, "non_entity_clients": 2 } }
                        ]
                    }]
                }
            }]
        });
        let report = normalize(&raw, &opts()).unwrap();
        let new_clients = report.months[0].new_clients.as_ref().unwrap();
        assert_eq!(new_clients.counts.unwrap().clients, 5);
        let namespaces = new_clients.namespaces.as_ref().unwrap();
        assert_eq!(labels(namespaces), ["root"]);
        assert_eq!(namespaces[0].mounts.len(), 2);
    }

    #[test]
    fn test_strict_counts_rejects_unbalanced_totals() {
        let strict = EngineOptions {
            strict_counts: true,
            ..EngineOptions::default()
        };
        let raw = json!({
            "total": { "clients": 22, "entity_clients": 3, "non_entity_clients": 5, "secret_syncs": 10, "acme_clients": 4 }
        });
        assert!(normalize(&raw, &opts()).is_ok());
        let err = normalize(&raw, &strict).unwrap_err();
        assert!(matches!(err, ActivityError::IntegrityViolation(ref msg) if msg.starts_with("total")));
    }
}

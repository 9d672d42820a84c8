use serde::Deserialize;

use super::counts::CountField;
use super::month::MonthKey;
use crate::report::{RangeQuery, TopNConfig};

const MAX_TOP_N: usize = 100;

/// Query string of `POST /api/v1/activity/report`.
#[derive(Debug, Default, Deserialize)]
pub struct ReportQuery {
    pub start: Option<String>,
    pub end: Option<String>,
    pub field: Option<String>,
    /// Kept as text so a non-number is reported like any other bad value.
    pub top: Option<String>,
    pub namespace: Option<String>,
}

impl ReportQuery {
    pub fn range(&self) -> Result<RangeQuery, String> {
        let parse = |raw: &Option<String>, name: &str| {
            raw.as_deref()
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<MonthKey>().map_err(|e| format!("invalid {name}: {e}")))
                .transpose()
        };
        Ok(RangeQuery {
            start: parse(&self.start, "start")?,
            end: parse(&self.end, "end")?,
        })
    }

    pub fn top_config(&self, default_top_n: usize) -> Result<TopNConfig, String> {
        let field = match self.field.as_deref() {
            Some(raw) if !raw.is_empty() => raw.parse::<CountField>()?,
            _ => CountField::default(),
        };
        let n = match self.top.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => raw
                .parse::<usize>()
                .map_err(|_| format!("invalid top: '{raw}' is not a non-negative integer"))?,
            _ => default_top_n,
        };
        if n > MAX_TOP_N {
            return Err(format!("top must be at most {MAX_TOP_N}, got {n}"));
        }
        Ok(TopNConfig {
            field,
            n,
            namespace: self.namespace.clone().filter(|ns| !ns.is_empty()),
        })
    }
}

use std::env;
use std::str::FromStr;

/// What the normalizer does with a month whose timestamp is not the first
/// instant of a UTC month.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InvalidMonthPolicy {
    /// Fail the whole report with `InvalidTimestamp`.
    #[default]
    Abort,
    /// Drop the month, log a warning and keep going.
    Skip,
}

impl FromStr for InvalidMonthPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(InvalidMonthPolicy::Abort),
            "skip" => Ok(InvalidMonthPolicy::Skip),
            other => Err(format!("unknown invalid-month policy '{other}'")),
        }
    }
}

/// Policies applied by the normalizer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineOptions {
    pub invalid_month_policy: InvalidMonthPolicy,
    /// Reject any counts where `clients != entity_clients + non_entity_clients`.
    pub strict_counts: bool,
}

pub struct Config {
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub max_payload_bytes: usize,
    pub default_top_n: usize,
    pub invalid_month_policy: InvalidMonthPolicy,
    pub strict_counts: bool,
    /// Bearer token for `/admin/*`. Unset hides those routes.
    pub admin_token: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            cors_origins: env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:4200".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_payload_bytes: env::var("MAX_PAYLOAD_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8 * 1_048_576), // 8 MB
            default_top_n: env::var("DEFAULT_TOP_N")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n| *n >= 1)
                .unwrap_or(10),
            invalid_month_policy: env::var("INVALID_MONTH_POLICY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
            strict_counts: env::var("STRICT_COUNTS")
                .ok()
                .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
                .unwrap_or(false),
            admin_token: env::var("ADMIN_TOKEN").ok().filter(|t| !t.is_empty()),
        }
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            invalid_month_policy: self.invalid_month_policy,
            strict_counts: self.strict_counts,
        }
    }
}

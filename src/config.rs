//! Configuration for Podium
//!
//! CLI arguments and environment variable handling using clap. Program
//! parameters (pool, cutoff, boosts, deadline, curve) are static for the
//! lifetime of the process.

use chrono::{DateTime, Utc};
use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::time::Duration;

use crate::boost::BoostConfig;
use crate::cache::CacheConfig;

/// Podium - creator leaderboard and reward snapshot service
#[derive(Parser, Debug, Clone)]
#[command(name = "podium")]
#[command(about = "Creator leaderboard with reward decisions and a one-shot payout snapshot")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8090")]
    pub listen: SocketAddr,

    /// Enable development mode (in-memory stores, static score source allowed)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "podium")]
    pub mongodb_db: String,

    /// Base URL of the upstream score API (required outside dev mode)
    #[arg(long, env = "SCORE_SOURCE_URL")]
    pub score_source_url: Option<String>,

    /// Page size requested from the score API
    #[arg(long, env = "SCORE_PAGE_SIZE", default_value = "500")]
    pub score_page_size: u32,

    /// Upper bound on pages drained per fetch
    #[arg(long, env = "SCORE_MAX_PAGES", default_value = "1000")]
    pub score_max_pages: u32,

    /// Timeout applied to every external call, in milliseconds
    #[arg(long, env = "UPSTREAM_TIMEOUT_MS", default_value = "10000")]
    pub upstream_timeout_ms: u64,

    /// API key for authenticated operations (decision reads and writes)
    #[arg(long, env = "API_KEY_AUTHENTICATED")]
    pub api_key_authenticated: Option<String>,

    /// API key for admin operations (snapshot creation, score refresh)
    #[arg(long, env = "API_KEY_ADMIN")]
    pub api_key_admin: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON", default_value = "false")]
    pub log_json: bool,

    /// Cache configuration
    #[command(flatten)]
    pub cache: CacheArgs,

    /// Program configuration
    #[command(flatten)]
    pub program: ProgramArgs,
}

/// Cache TTLs, one per ranking view
#[derive(Parser, Debug, Clone)]
pub struct CacheArgs {
    /// Maximum number of cached entries
    #[arg(long, env = "CACHE_MAX_ENTRIES", default_value = "10000")]
    pub cache_max_entries: usize,

    /// TTL of the decision-free ranking view, in seconds
    #[arg(long, env = "CACHE_BASIC_TTL_SECS", default_value = "60")]
    pub cache_basic_ttl_secs: u64,

    /// TTL of the top-N reward view, in seconds
    #[arg(long, env = "CACHE_TOP_TTL_SECS", default_value = "300")]
    pub cache_top_ttl_secs: u64,

    /// TTL of the snapshot view, in seconds
    #[arg(long, env = "CACHE_SNAPSHOT_TTL_SECS", default_value = "3600")]
    pub cache_snapshot_ttl_secs: u64,

    /// TTL of per-identity decision entries, in seconds
    #[arg(long, env = "CACHE_DECISION_TTL_SECS", default_value = "60")]
    pub cache_decision_ttl_secs: u64,

    /// How long an expired entry may still be served when upstream is down
    #[arg(long, env = "CACHE_STALE_GRACE_SECS", default_value = "900")]
    pub cache_stale_grace_secs: u64,
}

/// Program parameters
#[derive(Parser, Debug, Clone)]
pub struct ProgramArgs {
    /// Program instance identifier (one snapshot per program)
    #[arg(long, env = "PROGRAM_ID", default_value = "creator-rewards")]
    pub program_id: String,

    /// Fixed reward pool, in currency units
    #[arg(long, env = "REWARD_POOL_TOTAL", default_value = "100000")]
    pub reward_pool_total: f64,

    /// Number of rewarded ranks (N)
    #[arg(long, env = "REWARD_SLOTS", default_value = "200")]
    pub reward_slots: u32,

    /// Decimal places of the payout currency
    #[arg(long, env = "CURRENCY_DECIMALS", default_value = "2")]
    pub currency_decimals: u32,

    /// Program deadline (RFC 3339); snapshots may only be taken at or after it
    #[arg(long, env = "PROGRAM_DEADLINE", value_parser = parse_deadline)]
    pub program_deadline: DateTime<Utc>,

    /// Allocation curve over rank
    #[arg(long, env = "ALLOCATION_CURVE", value_enum, default_value = "equal")]
    pub allocation_curve: CurveKind,

    /// Ratio between consecutive ranks for the geometric curve
    #[arg(long, env = "CURVE_RATIO", default_value = "0.98")]
    pub curve_ratio: f64,

    /// What happens to shares forfeited by opted-out or undecided entries
    #[arg(long, env = "REDISTRIBUTION", value_enum, default_value = "pro-rata")]
    pub redistribution: RedistributionKind,

    /// Token balance needed for the token-holder boost
    #[arg(long, env = "BOOST_TOKEN_THRESHOLD", default_value = "1000")]
    pub boost_token_threshold: f64,

    /// Percent added by the token-holder boost
    #[arg(long, env = "BOOST_TOKEN_PCT", default_value = "10")]
    pub boost_token_pct: f64,

    /// Percent added by the notifications boost
    #[arg(long, env = "BOOST_NOTIFICATIONS_PCT", default_value = "10")]
    pub boost_notifications_pct: f64,

    /// Percent added by the verified social account boost
    #[arg(long, env = "BOOST_SOCIAL_PCT", default_value = "10")]
    pub boost_social_pct: f64,

    /// Upper bound on the combined multiplier
    #[arg(long, env = "BOOST_MAX_MULTIPLIER", default_value = "1.3")]
    pub boost_max_multiplier: f64,
}

/// Shape of the reward allocation over rank
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveKind {
    /// Every rewarded rank weighs the same
    Equal,
    /// Weight falls by one per rank
    Linear,
    /// Weight falls by a constant ratio per rank
    Geometric,
}

/// Policy for forfeited shares
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedistributionKind {
    /// Forfeited shares stay in the pool
    Forfeit,
    /// Forfeited shares go to opted-in entries by curve weight
    ProRata,
}

fn parse_deadline(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("invalid RFC 3339 timestamp '{}': {}", value, e))
}

/// Static program configuration
#[derive(Debug, Clone)]
pub struct ProgramConfig {
    pub program_id: String,
    pub pool_total: f64,
    pub reward_slots: u32,
    pub currency_decimals: u32,
    pub deadline: DateTime<Utc>,
    pub curve: CurveKind,
    pub curve_ratio: f64,
    pub redistribution: RedistributionKind,
    pub boost: BoostConfig,
}

impl ProgramConfig {
    /// Pool expressed in currency minor units
    pub fn pool_minor_units(&self) -> u64 {
        (self.pool_total * self.minor_per_unit()).round() as u64
    }

    /// Minor units per currency unit (100 for two decimals)
    pub fn minor_per_unit(&self) -> f64 {
        10f64.powi(self.currency_decimals as i32)
    }

    /// Round an amount half-up to the currency's minor unit
    pub fn round_currency(&self, amount: f64) -> f64 {
        let scale = self.minor_per_unit();
        (amount * scale).round() / scale
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.pool_total.is_finite() || self.pool_total < 0.0 {
            return Err("REWARD_POOL_TOTAL must be a non-negative number".into());
        }
        if self.reward_slots == 0 {
            return Err("REWARD_SLOTS must be at least 1".into());
        }
        if self.currency_decimals > 8 {
            return Err("CURRENCY_DECIMALS must be at most 8".into());
        }
        if self.curve == CurveKind::Geometric && !(self.curve_ratio > 0.0 && self.curve_ratio <= 1.0) {
            return Err("CURVE_RATIO must be in (0, 1] for the geometric curve".into());
        }
        self.boost.validate()
    }
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            program_id: "creator-rewards".into(),
            pool_total: 100_000.0,
            reward_slots: 200,
            currency_decimals: 2,
            deadline: DateTime::<Utc>::MIN_UTC,
            curve: CurveKind::Equal,
            curve_ratio: 0.98,
            redistribution: RedistributionKind::ProRata,
            boost: BoostConfig::default(),
        }
    }
}

impl Args {
    /// Timeout for external calls
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }

    pub fn program_config(&self) -> ProgramConfig {
        let p = &self.program;
        ProgramConfig {
            program_id: p.program_id.clone(),
            pool_total: p.reward_pool_total,
            reward_slots: p.reward_slots,
            currency_decimals: p.currency_decimals,
            deadline: p.program_deadline,
            curve: p.allocation_curve,
            curve_ratio: p.curve_ratio,
            redistribution: p.redistribution,
            boost: BoostConfig {
                token_threshold: p.boost_token_threshold,
                token_pct: p.boost_token_pct,
                notifications_pct: p.boost_notifications_pct,
                social_pct: p.boost_social_pct,
                max_multiplier: p.boost_max_multiplier,
            },
        }
    }

    pub fn cache_config(&self) -> CacheConfig {
        let c = &self.cache;
        CacheConfig {
            max_entries: c.cache_max_entries,
            basic_ttl: Duration::from_secs(c.cache_basic_ttl_secs),
            top_ttl: Duration::from_secs(c.cache_top_ttl_secs),
            snapshot_ttl: Duration::from_secs(c.cache_snapshot_ttl_secs),
            decision_ttl: Duration::from_secs(c.cache_decision_ttl_secs),
            stale_grace: Duration::from_secs(c.cache_stale_grace_secs),
            cleanup_interval: Duration::from_secs(60),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        self.program_config().validate()?;

        if !self.dev_mode {
            if self.score_source_url.is_none() {
                return Err("SCORE_SOURCE_URL is required in production mode".into());
            }
            if self.api_key_admin.as_deref().map_or(true, str::is_empty) {
                return Err("API_KEY_ADMIN is required in production mode".into());
            }
        }

        if let (Some(auth), Some(admin)) = (&self.api_key_authenticated, &self.api_key_admin) {
            if !auth.is_empty() && auth == admin {
                return Err("API_KEY_ADMIN must differ from API_KEY_AUTHENTICATED".into());
            }
        }

        if self.score_page_size == 0 {
            return Err("SCORE_PAGE_SIZE must be at least 1".into());
        }

        if self.cache.cache_basic_ttl_secs > self.cache.cache_top_ttl_secs {
            tracing::warn!("Basic ranking TTL exceeds the top-N TTL; rewards may refresh before ranks");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["podium", "--program-deadline", "2026-12-01T00:00:00Z"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["--dev-mode"]);
        let program = args.program_config();
        assert_eq!(program.reward_slots, 200);
        assert_eq!(program.curve, CurveKind::Equal);
        assert_eq!(program.redistribution, RedistributionKind::ProRata);
        assert_eq!(program.boost.max_multiplier, 1.3);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_deadline_must_be_rfc3339() {
        let result = Args::try_parse_from(["podium", "--program-deadline", "next tuesday"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_production_requires_admin_key_and_source() {
        let args = parse(&[]);
        assert!(args.validate().is_err());

        let args = parse(&[
            "--score-source-url",
            "http://scores.local",
            "--api-key-admin",
            "root",
        ]);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_admin_key_must_be_distinct() {
        let args = parse(&[
            "--dev-mode",
            "--api-key-admin",
            "same",
            "--api-key-authenticated",
            "same",
        ]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_currency_helpers() {
        let config = ProgramConfig {
            pool_total: 100.0,
            ..ProgramConfig::default()
        };
        assert_eq!(config.pool_minor_units(), 10_000);
        assert_eq!(config.round_currency(12.346), 12.35);
        assert_eq!(config.round_currency(0.004), 0.0);
    }

    #[test]
    fn test_geometric_ratio_validation() {
        let config = ProgramConfig {
            curve: CurveKind::Geometric,
            curve_ratio: 1.5,
            ..ProgramConfig::default()
        };
        assert!(config.validate().is_err());
    }
}

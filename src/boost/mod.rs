//! Reward boosts
//!
//! Each active signal adds a fixed percentage. Percentages are summed, never
//! compounded, and the resulting multiplier is capped. No rounding happens
//! here; amounts are rounded once, when the boosted reward is formatted.

use serde::{Deserialize, Serialize};

use crate::types::{BoostInputs, ScoreRecord};

/// An engagement condition that earns a boost
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoostSignal {
    /// Holds at least the configured amount of the program token
    TokenHolder,
    /// Has enabled notifications
    Notifications,
    /// Has linked a verified social account
    SocialVerified,
}

impl BoostSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoostSignal::TokenHolder => "token_holder",
            BoostSignal::Notifications => "notifications",
            BoostSignal::SocialVerified => "social_verified",
        }
    }
}

impl std::str::FromStr for BoostSignal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "token_holder" => Ok(BoostSignal::TokenHolder),
            "notifications" => Ok(BoostSignal::Notifications),
            "social_verified" => Ok(BoostSignal::SocialVerified),
            other => Err(format!("unknown boost signal '{}'", other)),
        }
    }
}

/// Boost percentages and cap
#[derive(Debug, Clone, PartialEq)]
pub struct BoostConfig {
    pub token_threshold: f64,
    pub token_pct: f64,
    pub notifications_pct: f64,
    pub social_pct: f64,
    pub max_multiplier: f64,
}

impl Default for BoostConfig {
    fn default() -> Self {
        Self {
            token_threshold: 1000.0,
            token_pct: 10.0,
            notifications_pct: 10.0,
            social_pct: 10.0,
            max_multiplier: 1.3,
        }
    }
}

impl BoostConfig {
    pub fn validate(&self) -> Result<(), String> {
        for (name, pct) in [
            ("BOOST_TOKEN_PCT", self.token_pct),
            ("BOOST_NOTIFICATIONS_PCT", self.notifications_pct),
            ("BOOST_SOCIAL_PCT", self.social_pct),
        ] {
            if !pct.is_finite() || pct < 0.0 {
                return Err(format!("{} must be a non-negative number", name));
            }
        }
        if !self.max_multiplier.is_finite() || self.max_multiplier < 1.0 {
            return Err("BOOST_MAX_MULTIPLIER must be at least 1.0".into());
        }
        Ok(())
    }

    fn pct_for(&self, signal: BoostSignal) -> f64 {
        match signal {
            BoostSignal::TokenHolder => self.token_pct,
            BoostSignal::Notifications => self.notifications_pct,
            BoostSignal::SocialVerified => self.social_pct,
        }
    }
}

/// Outcome of boosting one participant
#[derive(Debug, Clone, PartialEq)]
pub struct Boost {
    pub multiplier: f64,
    pub active: Vec<BoostSignal>,
}

/// Computes reward multipliers from boost signals
#[derive(Debug, Clone, Default)]
pub struct BoostEngine {
    config: BoostConfig,
}

impl BoostEngine {
    pub fn new(config: BoostConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BoostConfig {
        &self.config
    }

    /// Signals satisfied by the given inputs, in a fixed order
    pub fn signals(&self, inputs: &BoostInputs) -> Vec<BoostSignal> {
        let mut active = Vec::with_capacity(3);
        if inputs.token_balance.is_finite() && inputs.token_balance >= self.config.token_threshold {
            active.push(BoostSignal::TokenHolder);
        }
        if inputs.notifications_enabled {
            active.push(BoostSignal::Notifications);
        }
        if inputs.social_verified {
            active.push(BoostSignal::SocialVerified);
        }
        active
    }

    /// Additive multiplier for a set of signals, capped and never below 1.0
    pub fn multiplier(&self, signals: &[BoostSignal]) -> f64 {
        let pct: f64 = signals.iter().map(|s| self.config.pct_for(*s)).sum();
        (1.0 + pct / 100.0).clamp(1.0, self.config.max_multiplier)
    }

    /// Boost for a score record
    pub fn boost(&self, record: &ScoreRecord) -> Boost {
        let active = self.signals(&record.boost);
        Boost {
            multiplier: self.multiplier(&active),
            active,
        }
    }
}

//! Podium - creator leaderboard and reward payout snapshot
//!
//! Ranks program participants by score, applies capped percentage boosts,
//! overlays each participant's reward decision, and after the program
//! deadline freezes the rewarded top-N into a single immutable snapshot.
//!
//! ## Components
//!
//! - **Ranking**: deterministic total order with dense 1-based ranks
//! - **Boost**: additive, capped multiplier from engagement signals
//! - **Rewards**: decision overlay with pluggable allocation curve and redistribution
//! - **Snapshot**: one-shot, post-deadline capture of the decided top-N
//! - **Cache**: tag-keyed TTL cache with a closed mutation → tag table

pub mod auth;
pub mod boost;
pub mod cache;
pub mod config;
pub mod db;
pub mod decisions;
pub mod leaderboard;
pub mod podium;
pub mod ranking;
pub mod rewards;
pub mod routes;
pub mod server;
pub mod snapshot;
pub mod store;
pub mod types;

pub use config::Args;
pub use podium::{Podium, Stores};
pub use server::{run, AppState};
pub use types::{PodiumError, Result};

//! Reward decision reads and writes
//!
//! Writes are validated, serialized per identity and timestamped. Before a
//! write returns, every cache tag named by [`Mutation::DecisionWritten`] is
//! invalidated, so the writer's next read observes its own decision.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::cache::{CacheTag, Mutation, TagCache};
use crate::store::{bounded, PreferenceStore};
use crate::types::{DecisionRecord, PodiumError, Result, RewardDecision};

/// Longest accepted wallet address
pub const MAX_WALLET_LEN: usize = 128;

/// Body of a decision write
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRequest {
    pub decision: String,
    #[serde(default)]
    pub primary_wallet_address: Option<String>,
}

/// Parse a path or body identity; only canonical UUIDs are accepted
pub fn parse_identity(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| PodiumError::Validation(format!("'{}' is not a valid identity UUID", raw)))
}

/// Normalize an optional wallet address. Blank means none.
pub fn validate_wallet(wallet: Option<String>) -> Result<Option<String>> {
    let Some(wallet) = wallet else {
        return Ok(None);
    };
    let wallet = wallet.trim();
    if wallet.is_empty() {
        return Ok(None);
    }
    if wallet.chars().count() > MAX_WALLET_LEN {
        return Err(PodiumError::Validation(format!(
            "wallet address exceeds {} characters",
            MAX_WALLET_LEN
        )));
    }
    if wallet.chars().any(char::is_whitespace) {
        return Err(PodiumError::Validation("wallet address must not contain whitespace".into()));
    }
    Ok(Some(wallet.to_string()))
}

/// Decision reads and writes over a [`PreferenceStore`]
pub struct DecisionService {
    store: Arc<dyn PreferenceStore>,
    cache: Arc<TagCache>,
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
    timeout: Duration,
}

impl DecisionService {
    pub fn new(store: Arc<dyn PreferenceStore>, cache: Arc<TagCache>, timeout: Duration) -> Self {
        Self {
            store,
            cache,
            locks: DashMap::new(),
            timeout,
        }
    }

    /// Decision for one identity, cached under `decision:{id}`
    pub async fn get(&self, identity: Uuid) -> Result<DecisionRecord> {
        let tag = CacheTag::Decision(identity);
        let ttl = self.cache.config().ttl_for(&tag);
        self.cache
            .get_or_compute(&tag, ttl, || async {
                bounded("preference store read", self.timeout, self.store.get_decision(identity)).await
            })
            .await
    }

    /// Stored decisions for many identities, read straight from the store
    pub async fn get_many(&self, identities: &[Uuid]) -> Result<HashMap<Uuid, DecisionRecord>> {
        bounded(
            "preference store batch read",
            self.timeout,
            self.store.get_decisions(identities),
        )
        .await
    }

    /// Validate and parse a raw request, then write it
    pub async fn submit(&self, identity: Uuid, request: DecisionRequest, now: DateTime<Utc>) -> Result<DecisionRecord> {
        let decision: RewardDecision = request.decision.trim().parse()?;
        let wallet = validate_wallet(request.primary_wallet_address)?;
        self.put(identity, decision, wallet, now).await
    }

    /// Persist a decision. Last write wins; writes for one identity never interleave.
    pub async fn put(
        &self,
        identity: Uuid,
        decision: RewardDecision,
        wallet: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<DecisionRecord> {
        let lock = self
            .locks
            .entry(identity)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let result = {
            let _guard = lock.lock().await;
            let record = bounded(
                "preference store write",
                self.timeout,
                self.store.put_decision(identity, decision, wallet, now),
            )
            .await?;

            let dropped = self.cache.apply_mutation(&Mutation::DecisionWritten(identity));
            debug!(identity = %identity, dropped = dropped, "Invalidated caches after decision write");
            record
        };

        drop(lock);
        self.locks.remove_if(&identity, |_, l| Arc::strong_count(l) == 1);

        info!(identity = %identity, decision = %result.decision, "Decision recorded");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryPreferenceStore;

    fn service() -> (DecisionService, Arc<TagCache>) {
        let cache = Arc::new(TagCache::with_defaults());
        let service = DecisionService::new(
            Arc::new(MemoryPreferenceStore::new()),
            Arc::clone(&cache),
            Duration::from_secs(1),
        );
        (service, cache)
    }

    fn request(decision: &str, wallet: Option<&str>) -> DecisionRequest {
        DecisionRequest {
            decision: decision.to_string(),
            primary_wallet_address: wallet.map(str::to_string),
        }
    }

    #[test]
    fn test_wallet_validation() {
        assert_eq!(validate_wallet(None).unwrap(), None);
        assert_eq!(validate_wallet(Some("   ".into())).unwrap(), None);
        assert_eq!(validate_wallet(Some(" 0xabc ".into())).unwrap().as_deref(), Some("0xabc"));
        assert!(validate_wallet(Some("0x ab".into())).is_err());
        assert!(validate_wallet(Some("a".repeat(MAX_WALLET_LEN + 1))).is_err());
        assert!(validate_wallet(Some("a".repeat(MAX_WALLET_LEN))).is_ok());
    }

    #[test]
    fn test_identity_must_be_uuid() {
        assert!(parse_identity("not-a-uuid").is_err());
        let id = Uuid::new_v4();
        assert_eq!(parse_identity(&id.to_string()).unwrap(), id);
    }

    #[tokio::test]
    async fn test_unknown_decision_rejected() {
        let (service, _) = service();
        let err = service
            .submit(Uuid::new_v4(), request("maybe", None), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, PodiumError::Validation(_)));
    }

    #[tokio::test]
    async fn test_read_after_write_through_cache() {
        let (service, cache) = service();
        let id = Uuid::new_v4();

        // Prime the cache with the undecided default
        assert_eq!(service.get(id).await.unwrap().decision, RewardDecision::Undecided);
        assert!(cache.contains(&CacheTag::Decision(id)));

        let now = Utc::now();
        let written = service
            .submit(id, request("opted_in", Some("0xfeed")), now)
            .await
            .unwrap();
        assert_eq!(written.decided_at, Some(now));

        let read = service.get(id).await.unwrap();
        assert_eq!(read.decision, RewardDecision::OptedIn);
        assert_eq!(read.primary_wallet_address.as_deref(), Some("0xfeed"));
    }

    #[tokio::test]
    async fn test_write_invalidates_rankings() {
        let (service, cache) = service();
        let ttl = Duration::from_secs(60);
        cache.set(&CacheTag::RankingTop, b"[]".to_vec(), ttl);
        cache.set(&CacheTag::RankingBasic, b"[]".to_vec(), ttl);
        cache.set(&CacheTag::SnapshotProfiles, b"null".to_vec(), ttl);

        service
            .put(Uuid::new_v4(), RewardDecision::OptedOut, None, Utc::now())
            .await
            .unwrap();

        assert!(!cache.contains(&CacheTag::RankingTop));
        assert!(!cache.contains(&CacheTag::RankingBasic));
        assert!(cache.contains(&CacheTag::SnapshotProfiles));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writes_leave_no_locks_behind() {
        let (service, _) = service();
        let service = Arc::new(service);
        let id = Uuid::new_v4();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let service = Arc::clone(&service);
                let decision = if i % 2 == 0 { "opted_in" } else { "opted_out" };
                tokio::spawn(async move { service.submit(id, request(decision, None), Utc::now()).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert!(service.locks.is_empty());
        let last = service.get(id).await.unwrap();
        assert_ne!(last.decision, RewardDecision::Undecided);
    }
}

//! Dealer profile access.
//!
//! Profiles come from an external administrative system; this service only
//! needs `get_active(dealer_code)`. `CachedProfiles` puts a TTL cache in
//! front of the source, so an updated profile may keep serving its previous
//! value for at most one TTL window.

use crate::models::DealerProfile;
use async_trait::async_trait;
use settlement_core::error::AppError;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::cache::TtlStore;

#[async_trait]
pub trait ProfileSource: Send + Sync {
    /// Resolve a dealer code to its profile, active profiles only.
    async fn get_active(&self, dealer_code: &str) -> Result<Option<DealerProfile>, AppError>;
}

/// In-memory profile source, optionally seeded from a JSON file.
#[derive(Default)]
pub struct StaticProfileSource {
    profiles: RwLock<HashMap<String, DealerProfile>>,
}

impl StaticProfileSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn from_seed_file(path: &str) -> Result<Self, AppError> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!("Failed to read profile seed '{}': {}", path, e))
        })?;
        let profiles: Vec<DealerProfile> = serde_json::from_str(&raw).map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!("Invalid profile seed '{}': {}", path, e))
        })?;

        let source = Self::new();
        for profile in profiles {
            source.insert(profile).await;
        }
        Ok(source)
    }

    pub async fn insert(&self, profile: DealerProfile) {
        self.profiles
            .write()
            .await
            .insert(profile.dealer_code.clone(), profile);
    }
}

#[async_trait]
impl ProfileSource for StaticProfileSource {
    async fn get_active(&self, dealer_code: &str) -> Result<Option<DealerProfile>, AppError> {
        let profiles = self.profiles.read().await;
        Ok(profiles
            .get(dealer_code)
            .filter(|profile| profile.is_active())
            .cloned())
    }
}

/// TTL-cached accessor over a `ProfileSource`.
pub struct CachedProfiles {
    source: Arc<dyn ProfileSource>,
    store: Arc<dyn TtlStore>,
    ttl: Duration,
}

impl CachedProfiles {
    pub fn new(source: Arc<dyn ProfileSource>, store: Arc<dyn TtlStore>, ttl: Duration) -> Self {
        Self { source, store, ttl }
    }

    fn cache_key(dealer_code: &str) -> String {
        format!("settle:profile:{}", dealer_code)
    }

    pub async fn get_active(&self, dealer_code: &str) -> Result<Option<DealerProfile>, AppError> {
        let key = Self::cache_key(dealer_code);

        if let Some(cached) = self.store.get(&key).await.map_err(AppError::InternalError)? {
            match serde_json::from_str::<DealerProfile>(&cached) {
                Ok(profile) => return Ok(Some(profile)),
                Err(e) => {
                    // A corrupt cache entry falls through to the source.
                    tracing::warn!(dealer_code, error = %e, "Discarding unreadable cached profile");
                    let _ = self.store.delete(&key).await;
                }
            }
        }

        let profile = self.source.get_active(dealer_code).await?;

        if let Some(ref profile) = profile {
            let serialized = serde_json::to_string(profile)?;
            self.store
                .put(&key, &serialized, self.ttl)
                .await
                .map_err(AppError::InternalError)?;
        }

        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProfileStatus;
    use crate::services::cache::MemoryStore;

    fn profile(code: &str, status: ProfileStatus, tax_rate: f64) -> DealerProfile {
        DealerProfile {
            dealer_code: code.to_string(),
            tax_rate,
            default_sim_fee: 5500.0,
            default_mnp_discount: -800.0,
            status,
        }
    }

    #[tokio::test]
    async fn inactive_profiles_are_not_resolvable() {
        let source = StaticProfileSource::new();
        source
            .insert(profile("D-001", ProfileStatus::Inactive, 0.133))
            .await;
        assert_eq!(source.get_active("D-001").await.unwrap(), None);
    }

    #[tokio::test]
    async fn cache_serves_stale_profile_within_ttl() {
        let source = Arc::new(StaticProfileSource::new());
        source
            .insert(profile("D-001", ProfileStatus::Active, 0.133))
            .await;

        let cached = CachedProfiles::new(
            source.clone(),
            Arc::new(MemoryStore::new()),
            Duration::from_secs(300),
        );

        let first = cached.get_active("D-001").await.unwrap().unwrap();
        assert_eq!(first.tax_rate, 0.133);

        // Update the underlying profile; the cache keeps the old value
        // until the TTL lapses.
        source
            .insert(profile("D-001", ProfileStatus::Active, 0.2))
            .await;
        let second = cached.get_active("D-001").await.unwrap().unwrap();
        assert_eq!(second.tax_rate, 0.133);
    }

    #[tokio::test]
    async fn unknown_dealer_is_not_cached() {
        let source = Arc::new(StaticProfileSource::new());
        let cached = CachedProfiles::new(
            source.clone(),
            Arc::new(MemoryStore::new()),
            Duration::from_secs(300),
        );

        assert_eq!(cached.get_active("D-404").await.unwrap(), None);

        // Once the profile appears it resolves immediately; a miss was not
        // pinned in the cache.
        source
            .insert(profile("D-404", ProfileStatus::Active, 0.1))
            .await;
        assert!(cached.get_active("D-404").await.unwrap().is_some());
    }
}

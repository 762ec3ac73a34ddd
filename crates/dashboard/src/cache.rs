use crate::data::DashboardData;
use core_types::CompanyUnit;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

struct CacheEntry {
    data: Arc<DashboardData>,
    stored: Instant,
}

/// API data per business unit, reused until it is older than the TTL.
pub struct DataCache {
    ttl: Duration,
    entries: RwLock<HashMap<CompanyUnit, CacheEntry>>,
}

impl DataCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// The cached data of `unit`, if it is still fresh.
    pub async fn get(&self, unit: CompanyUnit) -> Option<Arc<DashboardData>> {
        let entries = self.entries.read().await;
        entries
            .get(&unit)
            .filter(|entry| entry.stored.elapsed() < self.ttl)
            .map(|entry| Arc::clone(&entry.data))
    }

    pub async fn insert(&self, unit: CompanyUnit, data: DashboardData) -> Arc<DashboardData> {
        let data = Arc::new(data);
        self.entries.write().await.insert(
            unit,
            CacheEntry {
                data: Arc::clone(&data),
                stored: Instant::now(),
            },
        );
        data
    }

    /// Drops every entry and returns how many there were.
    pub async fn clear(&self) -> usize {
        let mut entries = self.entries.write().await;
        let count = entries.len();
        entries.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn data(unit: CompanyUnit) -> DashboardData {
        DashboardData {
            unit,
            periods: Vec::new(),
            budgets: Vec::new(),
            cash_flows: Vec::new(),
            fetched_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn entries_are_kept_per_unit_until_cleared() {
        let cache = DataCache::new(Duration::from_secs(300));
        cache.insert(CompanyUnit::Europe, data(CompanyUnit::Europe)).await;

        assert!(cache.get(CompanyUnit::Europe).await.is_some());
        assert!(cache.get(CompanyUnit::Consolidated).await.is_none());
        assert_eq!(cache.clear().await, 1);
        assert!(cache.get(CompanyUnit::Europe).await.is_none());
    }

    #[tokio::test]
    async fn zero_ttl_never_serves_from_cache() {
        let cache = DataCache::new(Duration::ZERO);
        cache.insert(CompanyUnit::Europe, data(CompanyUnit::Europe)).await;
        assert!(cache.get(CompanyUnit::Europe).await.is_none());
    }
}

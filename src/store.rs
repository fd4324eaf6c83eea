// User data collaborator: favorites, price alerts and search history
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

use crate::listing::{Domain, Entity, ListingAttributes};
use crate::search::SearchParams;

const DEFAULT_HISTORY_LIMIT: usize = 50;

#[derive(Error, Debug, PartialEq)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    Duplicate(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Favorite {
    pub user_id: String,
    pub item_id: String,
    pub domain: Domain,
    pub name: String,
    pub price: f64,
    pub added_at: DateTime<Utc>,
}

impl Favorite {
    pub fn from_entity<A: ListingAttributes>(user_id: &str, entity: &Entity<A>) -> Self {
        Self {
            user_id: user_id.to_string(),
            item_id: entity.id.clone(),
            domain: A::DOMAIN,
            name: entity.name.clone(),
            price: entity.lowest_price,
            added_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPriceAlert {
    pub user_id: String,
    pub item_id: String,
    pub domain: Domain,
    pub name: String,
    pub target_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceAlert {
    pub id: u64,
    pub user_id: String,
    pub item_id: String,
    pub domain: Domain,
    pub name: String,
    pub target_price: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRecord {
    pub user_id: String,
    pub domain: Domain,
    pub params: SearchParams,
    pub result_count: usize,
    pub searched_at: DateTime<Utc>,
}

impl SearchRecord {
    pub fn new(user_id: &str, domain: Domain, params: SearchParams, result_count: usize) -> Self {
        Self {
            user_id: user_id.to_string(),
            domain,
            params,
            result_count,
            searched_at: Utc::now(),
        }
    }
}

/// CRUD operations keyed by user and item identity.
#[async_trait]
pub trait UserDataStore: Send + Sync + 'static {
    async fn add_favorite(&self, favorite: Favorite) -> Result<(), StoreError>;
    async fn favorites(&self, user_id: &str) -> Result<Vec<Favorite>, StoreError>;
    async fn remove_favorite(&self, user_id: &str, item_id: &str) -> Result<(), StoreError>;

    async fn create_alert(&self, alert: NewPriceAlert) -> Result<PriceAlert, StoreError>;
    async fn alerts(&self, user_id: &str) -> Result<Vec<PriceAlert>, StoreError>;
    async fn delete_alert(&self, user_id: &str, alert_id: u64) -> Result<(), StoreError>;

    async fn record_search(&self, record: SearchRecord) -> Result<(), StoreError>;
    // Most recent first
    async fn history(&self, user_id: &str, limit: usize) -> Result<Vec<SearchRecord>, StoreError>;
    async fn clear_history(&self, user_id: &str) -> Result<usize, StoreError>;
}

// In-process store, one entry list per user
pub struct MemoryStore {
    favorites: DashMap<String, Vec<Favorite>>,
    alerts: DashMap<String, Vec<PriceAlert>>,
    history: DashMap<String, Vec<SearchRecord>>,
    next_alert_id: AtomicU64,
    history_limit: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl MemoryStore {
    // Older history entries beyond the limit are dropped
    pub fn new(history_limit: usize) -> Self {
        Self {
            favorites: DashMap::new(),
            alerts: DashMap::new(),
            history: DashMap::new(),
            next_alert_id: AtomicU64::new(1),
            history_limit,
        }
    }
}

#[async_trait]
impl UserDataStore for MemoryStore {
    async fn add_favorite(&self, favorite: Favorite) -> Result<(), StoreError> {
        let mut entries = self.favorites.entry(favorite.user_id.clone()).or_default();
        if entries.iter().any(|f| f.item_id == favorite.item_id) {
            return Err(StoreError::Duplicate(favorite.item_id));
        }
        entries.push(favorite);
        Ok(())
    }

    async fn favorites(&self, user_id: &str) -> Result<Vec<Favorite>, StoreError> {
        Ok(self
            .favorites
            .get(user_id)
            .map(|entries| entries.value().clone())
            .unwrap_or_default())
    }

    async fn remove_favorite(&self, user_id: &str, item_id: &str) -> Result<(), StoreError> {
        let mut entries = self
            .favorites
            .get_mut(user_id)
            .ok_or_else(|| StoreError::NotFound(item_id.to_string()))?;
        let before = entries.len();
        entries.retain(|f| f.item_id != item_id);
        if entries.len() == before {
            return Err(StoreError::NotFound(item_id.to_string()));
        }
        Ok(())
    }

    async fn create_alert(&self, alert: NewPriceAlert) -> Result<PriceAlert, StoreError> {
        if !(alert.target_price > 0.0) {
            return Err(StoreError::InvalidInput(format!(
                "target price must be positive, got {}",
                alert.target_price
            )));
        }

        let created = PriceAlert {
            id: self.next_alert_id.fetch_add(1, Ordering::SeqCst),
            user_id: alert.user_id,
            item_id: alert.item_id,
            domain: alert.domain,
            name: alert.name,
            target_price: alert.target_price,
            created_at: Utc::now(),
        };
        self.alerts
            .entry(created.user_id.clone())
            .or_default()
            .push(created.clone());
        Ok(created)
    }

    async fn alerts(&self, user_id: &str) -> Result<Vec<PriceAlert>, StoreError> {
        Ok(self
            .alerts
            .get(user_id)
            .map(|entries| entries.value().clone())
            .unwrap_or_default())
    }

    async fn delete_alert(&self, user_id: &str, alert_id: u64) -> Result<(), StoreError> {
        let mut entries = self
            .alerts
            .get_mut(user_id)
            .ok_or_else(|| StoreError::NotFound(format!("alert {}", alert_id)))?;
        let before = entries.len();
        entries.retain(|a| a.id != alert_id);
        if entries.len() == before {
            return Err(StoreError::NotFound(format!("alert {}", alert_id)));
        }
        Ok(())
    }

    async fn record_search(&self, record: SearchRecord) -> Result<(), StoreError> {
        let mut entries = self.history.entry(record.user_id.clone()).or_default();
        entries.push(record);
        if entries.len() > self.history_limit {
            let excess = entries.len() - self.history_limit;
            entries.drain(..excess);
        }
        Ok(())
    }

    async fn history(&self, user_id: &str, limit: usize) -> Result<Vec<SearchRecord>, StoreError> {
        Ok(self
            .history
            .get(user_id)
            .map(|entries| entries.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn clear_history(&self, user_id: &str) -> Result<usize, StoreError> {
        Ok(self
            .history
            .remove(user_id)
            .map(|(_, entries)| entries.len())
            .unwrap_or(0))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TriggeredAlert {
    pub alert: PriceAlert,
    pub current_price: f64,
}

/// Alerts whose listing is now at or below the target price.
pub fn triggered_alerts<A: ListingAttributes>(
    alerts: &[PriceAlert],
    entities: &[Entity<A>],
) -> Vec<TriggeredAlert> {
    alerts
        .iter()
        .filter(|alert| alert.domain == A::DOMAIN)
        .filter_map(|alert| {
            entities
                .iter()
                .find(|entity| entity.id == alert.item_id)
                .filter(|entity| entity.has_valid_price() && entity.lowest_price <= alert.target_price)
                .map(|entity| TriggeredAlert {
                    alert: alert.clone(),
                    current_price: entity.lowest_price,
                })
        })
        .collect()
}

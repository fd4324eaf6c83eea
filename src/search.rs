// Search orchestration: provider fan-out, merge, and stale-result guarding
use futures::future::join_all;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::listing::{Entity, ListingAttributes};
use crate::merge::MergeEngine;
use crate::provider::Provider;
use crate::store::{SearchRecord, UserDataStore};

#[derive(Error, Debug, PartialEq)]
pub enum SearchError {
    #[error("No providers configured for {0} search")]
    NoProviders(String),

    #[error("All {attempted} providers failed, please try again")]
    AllProvidersFailed { attempted: usize },
}

/// Parameters collected by the search form.
///
/// `location` is the city for hotels and cars and the origin for flights.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    pub location: String,
    pub destination: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub guests: u32,
}

impl SearchParams {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("location", self.location.clone())];
        if let Some(destination) = &self.destination {
            pairs.push(("destination", destination.clone()));
        }
        if let Some(start) = &self.start_date {
            pairs.push(("start_date", start.clone()));
        }
        if let Some(end) = &self.end_date {
            pairs.push(("end_date", end.clone()));
        }
        if self.guests > 0 {
            pairs.push(("guests", self.guests.to_string()));
        }
        pairs
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchMeta {
    pub total: usize,
    // Candidates returned per platform that answered
    pub sources: BTreeMap<String, usize>,
    pub failed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse<A> {
    pub success: bool,
    pub items: Vec<Entity<A>>,
    pub meta: Option<SearchMeta>,
    pub error: Option<String>,
}

impl<A> SearchResponse<A> {
    pub fn ok(items: Vec<Entity<A>>, meta: SearchMeta) -> Self {
        Self {
            success: true,
            items,
            meta: Some(meta),
            error: None,
        }
    }

    pub fn failed(error: SearchError, meta: Option<SearchMeta>) -> Self {
        Self {
            success: false,
            items: Vec::new(),
            meta,
            error: Some(error.to_string()),
        }
    }

    // Successful search that found nothing; distinct from a failure
    pub fn is_empty(&self) -> bool {
        self.success && self.items.is_empty()
    }
}

pub struct SearchService<A> {
    providers: Vec<Arc<dyn Provider<A>>>,
    engine: MergeEngine<A>,
}

impl<A: ListingAttributes> SearchService<A> {
    pub fn new(engine: MergeEngine<A>) -> Self {
        Self {
            providers: Vec::new(),
            engine,
        }
    }

    pub fn with_provider(mut self, provider: impl Provider<A>) -> Self {
        self.providers.push(Arc::new(provider));
        self
    }

    pub fn add_provider(&mut self, provider: Arc<dyn Provider<A>>) {
        self.providers.push(provider);
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Queries every provider concurrently and merges whatever came back.
    ///
    /// A failing provider only loses its own results. The search fails when
    /// no provider is configured or every provider failed.
    pub async fn search(&self, params: &SearchParams) -> SearchResponse<A> {
        if self.providers.is_empty() {
            return SearchResponse::failed(SearchError::NoProviders(A::DOMAIN.to_string()), None);
        }

        let outcomes = join_all(self.providers.iter().map(|provider| async move {
            (provider.platform().to_string(), provider.fetch(params).await)
        }))
        .await;

        let mut meta = SearchMeta::default();
        let mut batches = Vec::with_capacity(outcomes.len());
        for (platform, outcome) in outcomes {
            match outcome {
                Ok(candidates) => {
                    debug!(platform = %platform, count = candidates.len(), "provider answered");
                    *meta.sources.entry(platform).or_default() += candidates.len();
                    batches.push(candidates);
                }
                Err(e) => {
                    warn!(platform = %platform, error = %e, "provider failed, continuing without it");
                    meta.failed.push(platform);
                }
            }
        }

        if meta.failed.len() == self.providers.len() {
            let attempted = self.providers.len();
            return SearchResponse::failed(SearchError::AllProvidersFailed { attempted }, Some(meta));
        }

        let items = self.engine.merge(batches);
        meta.total = items.len();
        info!(
            domain = %A::DOMAIN,
            total = meta.total,
            failed = meta.failed.len(),
            "search completed"
        );

        SearchResponse::ok(items, meta)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommittedSearch<A> {
    pub generation: u64,
    pub params: SearchParams,
    pub response: SearchResponse<A>,
}

/// A results page's view of the search service.
///
/// Every submission takes the next generation number. A response is committed
/// only if no newer submission started while it was in flight, so a slow
/// earlier search can never overwrite a later one.
pub struct SearchSession<A> {
    service: Arc<SearchService<A>>,
    generation: AtomicU64,
    committed: Mutex<Option<CommittedSearch<A>>>,
    history: Option<(Arc<dyn UserDataStore>, String)>,
}

impl<A: ListingAttributes> SearchSession<A> {
    pub fn new(service: Arc<SearchService<A>>) -> Self {
        Self {
            service,
            generation: AtomicU64::new(0),
            committed: Mutex::new(None),
            history: None,
        }
    }

    // Record committed searches in the user's history
    pub fn with_history(mut self, store: Arc<dyn UserDataStore>, user_id: &str) -> Self {
        self.history = Some((store, user_id.to_string()));
        self
    }

    /// Runs a search; `None` means a newer search superseded this one.
    pub async fn submit(&self, params: SearchParams) -> Option<SearchResponse<A>> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let response = self.service.search(&params).await;

        {
            let mut committed = self.committed.lock();
            if self.generation.load(Ordering::SeqCst) != generation {
                debug!(generation, "discarding stale search response");
                return None;
            }
            *committed = Some(CommittedSearch {
                generation,
                params: params.clone(),
                response: response.clone(),
            });
        }

        if let Some((store, user_id)) = &self.history {
            let record = SearchRecord::new(user_id, A::DOMAIN, params, response.items.len());
            if let Err(e) = store.record_search(record).await {
                warn!(error = %e, "failed to record search history");
            }
        }

        Some(response)
    }

    pub fn latest(&self) -> Option<CommittedSearch<A>> {
        self.committed.lock().clone()
    }

    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::{CarAttrs, Candidate, HotelAttrs};
    use crate::platform::PlatformCatalog;
    use crate::provider::{AdapterError, FixtureProvider};
    use crate::store::MemoryStore;
    use crate::upstream::{RawCar, RawHotel, ResponseFormat};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    // Provider that always fails and counts its calls
    struct FailingProvider {
        platform: String,
        calls: AtomicUsize,
    }

    impl FailingProvider {
        fn new(platform: &str) -> Self {
            Self {
                platform: platform.to_string(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl<A: ListingAttributes> Provider<A> for FailingProvider {
        fn platform(&self) -> &str {
            &self.platform
        }

        async fn fetch(&self, _params: &SearchParams) -> Result<Vec<Candidate<A>>, AdapterError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(AdapterError::StatusError {
                status_code: 503,
                message: "Service Unavailable".to_string(),
            })
        }
    }

    fn hotels(platform: &str, body: &'static str) -> FixtureProvider<RawHotel> {
        FixtureProvider::new(platform, body, ResponseFormat::Json)
    }

    fn hotel_service() -> SearchService<HotelAttrs> {
        SearchService::new(MergeEngine::new(PlatformCatalog::default()))
    }

    #[tokio::test]
    async fn test_merges_across_providers() {
        let service = hotel_service()
            .with_provider(hotels(
                "Booking.com",
                r#"[{"name": "Hotel X", "price": 100, "image": "https://img/x.jpg"}]"#,
            ))
            .with_provider(hotels(
                "Expedia",
                r#"[{"name": "hotel x", "price": 90, "image": "https://img/x2.jpg"}]"#,
            ));

        let response = service.search(&SearchParams::default()).await;
        assert!(response.success);
        assert_eq!(response.items.len(), 1);
        assert_eq!(response.items[0].lowest_price, 90.0);
        assert_eq!(response.items[0].prices.len(), 2);

        let meta = response.meta.unwrap();
        assert_eq!(meta.total, 1);
        assert_eq!(meta.sources.get("Booking.com"), Some(&1));
        assert_eq!(meta.sources.get("Expedia"), Some(&1));
    }

    #[tokio::test]
    async fn test_source_counts_add_up_for_shared_platform_names() {
        let service = hotel_service()
            .with_provider(hotels(
                "Booking.com",
                r#"[{"name": "Hotel A", "price": 100}, {"name": "Hotel B", "price": 80}]"#,
            ))
            .with_provider(hotels(
                "Booking.com",
                r#"[{"name": "Hotel C", "price": 120}]"#,
            ));

        let response = service.search(&SearchParams::default()).await;
        assert!(response.success);
        assert_eq!(response.items.len(), 3);
        assert_eq!(response.meta.unwrap().sources.get("Booking.com"), Some(&3));
    }

    #[tokio::test]
    async fn test_empty_providers_are_not_an_error() {
        let service = hotel_service()
            .with_provider(hotels("Booking.com", "[]"))
            .with_provider(hotels("Expedia", r#"{"data": []}"#));

        let response = service.search(&SearchParams::default()).await;
        assert!(response.success);
        assert!(response.items.is_empty());
        assert!(response.is_empty());
        assert_eq!(response.error, None);
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_other_results() {
        let service = hotel_service()
            .with_provider(FailingProvider::new("Agoda"))
            .with_provider(hotels(
                "Booking.com",
                r#"[{"name": "Hotel Y", "price": 75, "image": "https://img/y.jpg"}]"#,
            ));

        let response = service.search(&SearchParams::default()).await;
        assert!(response.success);
        assert_eq!(response.items.len(), 1);
        assert_eq!(response.meta.unwrap().failed, vec!["Agoda".to_string()]);
    }

    #[tokio::test]
    async fn test_all_providers_failing_is_a_search_failure() {
        let failing = Arc::new(FailingProvider::new("Hertz"));
        let mut service: SearchService<CarAttrs> =
            SearchService::new(MergeEngine::new(PlatformCatalog::default()));
        service.add_provider(failing.clone());
        service.add_provider(Arc::new(FixtureProvider::<RawCar>::new(
            "Europcar",
            "not json",
            ResponseFormat::Json,
        )));

        let response = service.search(&SearchParams::default()).await;
        assert!(!response.success);
        assert!(response.items.is_empty());
        assert_eq!(
            response.error.as_deref(),
            Some("All 2 providers failed, please try again")
        );
        // Single attempt, no retries
        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_providers_is_a_search_failure() {
        let response = hotel_service().search(&SearchParams::default()).await;
        assert!(!response.success);
        assert_eq!(
            response.error.as_deref(),
            Some("No providers configured for hotel search")
        );
    }

    #[tokio::test]
    async fn test_stale_search_is_discarded() {
        let slow = Arc::new(hotel_service().with_provider(
            hotels(
                "Booking.com",
                r#"[{"name": "Slow Hotel", "price": 100, "image": "https://img/s.jpg"}]"#,
            )
            .with_delay(Duration::from_millis(200)),
        ));
        let session = Arc::new(SearchSession::new(slow));

        let first = {
            let session = session.clone();
            tokio::spawn(async move {
                session
                    .submit(SearchParams {
                        location: "Paris".to_string(),
                        ..SearchParams::default()
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let second = session
            .submit(SearchParams {
                location: "Rome".to_string(),
                ..SearchParams::default()
            })
            .await;
        let first = first.await.unwrap();

        // Both resolve at about the same time; only the newer one may commit
        assert!(second.is_some());
        assert!(first.is_none());

        let latest = session.latest().unwrap();
        assert_eq!(latest.generation, 2);
        assert_eq!(latest.params.location, "Rome");
        assert_eq!(session.current_generation(), 2);
    }

    #[tokio::test]
    async fn test_committed_searches_are_recorded() {
        let store = Arc::new(MemoryStore::default());
        let service = Arc::new(hotel_service().with_provider(hotels(
            "Booking.com",
            r#"[{"name": "Hotel Z", "price": 60, "image": "https://img/z.jpg"}]"#,
        )));
        let session = SearchSession::new(service).with_history(store.clone(), "user-1");

        let params = SearchParams {
            location: "Lisbon".to_string(),
            guests: 2,
            ..SearchParams::default()
        };
        session.submit(params.clone()).await.unwrap();

        let history = store.history("user-1", 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].params, params);
        assert_eq!(history[0].result_count, 1);
    }

    #[test]
    fn test_query_pairs_skip_empty_values() {
        let params = SearchParams {
            location: "Paris".to_string(),
            start_date: Some("2025-06-11".to_string()),
            ..SearchParams::default()
        };
        assert_eq!(
            params.query_pairs(),
            vec![
                ("location", "Paris".to_string()),
                ("start_date", "2025-06-11".to_string())
            ]
        );
    }
}

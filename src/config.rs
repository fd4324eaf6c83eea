// Metasearch configuration and service construction
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::filter::{CarFilters, FlightFilters, HotelFilters, PriceRange};
use crate::listing::{CarAttrs, Domain, FlightAttrs, HotelAttrs, ListingAttributes};
use crate::merge::{DiscountPolicy, MergeEngine};
use crate::platform::{PlatformCatalog, PlatformMeta};
use crate::provider::{HttpProvider, SyntheticFlightProvider};
use crate::search::SearchService;
use crate::upstream::{RawCar, RawFlight, RawHotel, RawListing, ResponseFormat};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid provider {name}: {reason}")]
    InvalidProvider { name: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub domain: Domain,
    pub base_url: String,
    // Environment variable holding the API key
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub format: ResponseFormat,
}

impl ProviderConfig {
    pub fn api_key(&self) -> Option<String> {
        let var = self.api_key_env.as_deref()?;
        match std::env::var(var) {
            Ok(key) if !key.trim().is_empty() => Some(key),
            _ => {
                warn!(provider = %self.name, env = var, "API key variable not set");
                None
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetasearchConfig {
    pub platforms: Vec<PlatformMeta>,
    pub providers: Vec<ProviderConfig>,
    // Upper bound of the default price filter; unbounded when unset
    pub price_ceiling: Option<f64>,
    pub discount_policy: DiscountPolicy,
    pub synthetic_flight_platforms: Vec<String>,
    pub synthetic_flight_count: usize,
    pub flight_seed: Option<u64>,
}

impl Default for MetasearchConfig {
    fn default() -> Self {
        Self {
            platforms: PlatformCatalog::default().platforms().to_vec(),
            providers: Vec::new(),
            price_ceiling: None,
            discount_policy: DiscountPolicy::default(),
            synthetic_flight_platforms: vec![
                "Skyscanner".to_string(),
                "Kayak".to_string(),
                "Google Flights".to_string(),
            ],
            synthetic_flight_count: 12,
            flight_seed: None,
        }
    }
}

impl MetasearchConfig {
    // A missing file means defaults
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for provider in &self.providers {
            let invalid = |reason: &str| ConfigError::InvalidProvider {
                name: provider.name.clone(),
                reason: reason.to_string(),
            };

            if provider.name.trim().is_empty() {
                return Err(invalid("name is empty"));
            }
            if !(provider.base_url.starts_with("http://") || provider.base_url.starts_with("https://")) {
                return Err(invalid("base_url must be an http(s) URL"));
            }
        }

        if let Some(ceiling) = self.price_ceiling {
            if !(ceiling > 0.0) {
                return Err(ConfigError::ParseError(format!(
                    "price_ceiling must be positive, got {}",
                    ceiling
                )));
            }
        }

        Ok(())
    }

    pub fn catalog(&self) -> PlatformCatalog {
        PlatformCatalog::new(self.platforms.clone())
    }

    pub fn merge_engine<A: ListingAttributes>(&self) -> MergeEngine<A> {
        MergeEngine::new(self.catalog()).with_discount_policy(self.discount_policy)
    }

    pub fn price_range(&self) -> PriceRange {
        PriceRange::up_to(self.price_ceiling)
    }

    fn http_service<R: RawListing>(&self) -> SearchService<R::Attrs> {
        let mut service = SearchService::new(self.merge_engine());
        for provider in self
            .providers
            .iter()
            .filter(|p| p.domain == <R::Attrs as ListingAttributes>::DOMAIN)
        {
            service.add_provider(Arc::new(HttpProvider::<R>::new(
                &provider.name,
                &provider.base_url,
                provider.api_key(),
                provider.format,
            )));
        }
        service
    }

    pub fn hotel_service(&self) -> SearchService<HotelAttrs> {
        self.http_service::<RawHotel>()
    }

    pub fn car_service(&self) -> SearchService<CarAttrs> {
        self.http_service::<RawCar>()
    }

    // Configured flight APIs plus the synthetic generators
    pub fn flight_service(&self) -> SearchService<FlightAttrs> {
        let mut service = self.http_service::<RawFlight>();
        for platform in &self.synthetic_flight_platforms {
            service.add_provider(Arc::new(SyntheticFlightProvider::new(
                platform,
                self.flight_seed,
                self.synthetic_flight_count,
            )));
        }
        service
    }

    pub fn hotel_filters(&self) -> HotelFilters {
        HotelFilters::up_to(self.price_ceiling)
    }

    pub fn flight_filters(&self) -> FlightFilters {
        FlightFilters {
            price: self.price_range(),
            ..FlightFilters::default()
        }
    }

    pub fn car_filters(&self) -> CarFilters {
        CarFilters {
            price: self.price_range(),
            ..CarFilters::default()
        }
    }
}

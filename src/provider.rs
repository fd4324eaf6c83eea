// Provider adapters: one outbound call per search, normalized into candidates
use async_trait::async_trait;
use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::marker::PhantomData;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::listing::{Candidate, FlightAttrs, FlightLeg};
use crate::search::SearchParams;
use crate::upstream::{normalize_records, RawListing, ResponseFormat};

#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Upstream error: {status_code} - {message}")]
    StatusError { status_code: u16, message: String },

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("Other error: {0}")]
    Other(String),
}

/// One upstream booking platform for a single search domain.
///
/// Implementations make a single attempt per call and never retry.
#[async_trait]
pub trait Provider<A>: Send + Sync + 'static {
    fn platform(&self) -> &str;

    async fn fetch(&self, params: &SearchParams) -> Result<Vec<Candidate<A>>, AdapterError>;
}

// Partner API reached over HTTP; requires an API key
pub struct HttpProvider<R> {
    platform: String,
    base_url: String,
    api_key: Option<String>,
    format: ResponseFormat,
    client: reqwest::Client,
    _raw: PhantomData<fn() -> R>,
}

impl<R: RawListing> HttpProvider<R> {
    pub fn new(
        platform: &str,
        base_url: &str,
        api_key: Option<String>,
        format: ResponseFormat,
    ) -> Self {
        Self {
            platform: platform.to_string(),
            base_url: base_url.to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            format,
            client: reqwest::Client::new(),
            _raw: PhantomData,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

#[async_trait]
impl<R: RawListing> Provider<R::Attrs> for HttpProvider<R> {
    fn platform(&self) -> &str {
        &self.platform
    }

    async fn fetch(
        &self,
        params: &SearchParams,
    ) -> Result<Vec<Candidate<R::Attrs>>, AdapterError> {
        // Unconfigured partners contribute nothing rather than failing the search
        let Some(api_key) = self.api_key.as_deref() else {
            warn!(platform = %self.platform, "no API credentials configured, skipping provider");
            return Ok(Vec::new());
        };

        let response = self
            .client
            .get(&self.base_url)
            .query(&params.query_pairs())
            .header("x-api-key", api_key)
            .send()
            .await
            .map_err(|e| AdapterError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AdapterError::StatusError {
                status_code: status.as_u16(),
                message: status.canonical_reason().unwrap_or("unknown").to_string(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| AdapterError::NetworkError(e.to_string()))?;

        normalize_records::<R>(&self.platform, &body, self.format)
    }
}

// Canned upstream response, decoded exactly like a live one
pub struct FixtureProvider<R> {
    platform: String,
    body: Bytes,
    format: ResponseFormat,
    delay: Option<Duration>,
    _raw: PhantomData<fn() -> R>,
}

impl<R: RawListing> FixtureProvider<R> {
    pub fn new(platform: &str, body: impl Into<Bytes>, format: ResponseFormat) -> Self {
        Self {
            platform: platform.to_string(),
            body: body.into(),
            format,
            delay: None,
            _raw: PhantomData,
        }
    }

    pub fn from_file(
        platform: &str,
        path: impl AsRef<Path>,
        format: ResponseFormat,
    ) -> std::io::Result<Self> {
        let body = std::fs::read(path)?;
        Ok(Self::new(platform, body, format))
    }

    // Simulated network latency
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl<R: RawListing> Provider<R::Attrs> for FixtureProvider<R> {
    fn platform(&self) -> &str {
        &self.platform
    }

    async fn fetch(
        &self,
        _params: &SearchParams,
    ) -> Result<Vec<Candidate<R::Attrs>>, AdapterError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        normalize_records::<R>(&self.platform, &self.body, self.format)
    }
}

const AIRLINES: [(&str, &str); 6] = [
    ("Air France", "AF"),
    ("Lufthansa", "LH"),
    ("British Airways", "BA"),
    ("KLM", "KL"),
    ("Iberia", "IB"),
    ("Emirates", "EK"),
];

const HUBS: [&str; 5] = ["FRA", "AMS", "MAD", "DXB", "IST"];

/// Generates flight offers instead of calling an upstream API.
///
/// The schedule depends only on the seed and the route, so every platform
/// sharing a seed lists the same flights; each platform prices them differently
/// and carries roughly four in five of them.
pub struct SyntheticFlightProvider {
    platform: String,
    seed: Option<u64>,
    flights: usize,
}

impl SyntheticFlightProvider {
    pub fn new(platform: &str, seed: Option<u64>, flights: usize) -> Self {
        Self {
            platform: platform.to_string(),
            seed,
            flights,
        }
    }

    fn generate(&self, seed: u64, origin: &str, destination: &str) -> Vec<Candidate<FlightAttrs>> {
        let mut schedule = StdRng::seed_from_u64(seed ^ stable_hash(&format!("{origin}>{destination}")));
        let mut pricing = StdRng::seed_from_u64(seed ^ stable_hash(&self.platform));
        let platform_factor = pricing.gen_range(0.9..1.15);

        let mut candidates = Vec::with_capacity(self.flights);
        for index in 0..self.flights {
            let (airline, code) = AIRLINES[schedule.gen_range(0..AIRLINES.len())];
            let number = schedule.gen_range(10..2000);
            let departure_minutes = schedule.gen_range(5..23) * 60 + schedule.gen_range(0..4) * 15;
            let duration_minutes = schedule.gen_range(60..14 * 60);
            let stops = match schedule.gen_range(0..10) {
                0..=5 => 0,
                6..=8 => 1,
                _ => 2,
            };
            let base_price = 60.0 + duration_minutes as f64 * 0.7 - stops as f64 * 25.0;

            // Draw every random value for this slot before deciding to skip it
            let listed = pricing.gen_bool(0.8);
            let jitter = pricing.gen_range(0.95..1.05);
            let discounted = pricing.gen_bool(0.25);
            if !listed {
                continue;
            }

            let price = (base_price * platform_factor * jitter).round();
            let flight_number = format!("{code}{number}");
            let outbound = legs(
                origin,
                destination,
                &flight_number,
                departure_minutes,
                duration_minutes,
                stops,
            );

            candidates.push(Candidate {
                id: format!("{}-{}", self.platform.to_lowercase(), index),
                name: format!("{airline} {flight_number}"),
                platform: self.platform.clone(),
                price,
                original_price: discounted.then(|| (price * 1.2).round()),
                url: format!(
                    "https://www.{}/book/{flight_number}",
                    self.platform.to_lowercase().replace(' ', "")
                ),
                attrs: FlightAttrs {
                    airline: airline.to_string(),
                    origin: origin.to_string(),
                    destination: destination.to_string(),
                    outbound,
                    duration: format!("{}h {}m", duration_minutes / 60, duration_minutes % 60),
                    stops,
                    cabin_class: "economy".to_string(),
                },
            });
        }

        candidates
    }
}

#[async_trait]
impl Provider<FlightAttrs> for SyntheticFlightProvider {
    fn platform(&self) -> &str {
        &self.platform
    }

    async fn fetch(
        &self,
        params: &SearchParams,
    ) -> Result<Vec<Candidate<FlightAttrs>>, AdapterError> {
        let origin = params.location.trim().to_uppercase();
        let destination = params
            .destination
            .as_deref()
            .unwrap_or_default()
            .trim()
            .to_uppercase();

        if origin.is_empty() || destination.is_empty() {
            debug!(platform = %self.platform, "flight search without a route, nothing to generate");
            return Ok(Vec::new());
        }

        let seed = self.seed.unwrap_or_else(rand::random);
        Ok(self.generate(seed, &origin, &destination))
    }
}

// Splits a journey into evenly spaced legs through hub airports
fn legs(
    origin: &str,
    destination: &str,
    flight_number: &str,
    departure_minutes: u32,
    duration_minutes: u32,
    stops: u32,
) -> Vec<FlightLeg> {
    let mut airports = vec![origin.to_string()];
    airports.extend(
        HUBS.iter()
            .filter(|hub| **hub != origin && **hub != destination)
            .take(stops as usize)
            .map(|hub| hub.to_string()),
    );
    airports.push(destination.to_string());

    let segment = duration_minutes / (stops + 1);
    airports
        .windows(2)
        .enumerate()
        .map(|(index, pair)| {
            let start = departure_minutes + segment * index as u32;
            FlightLeg {
                from: pair[0].clone(),
                to: pair[1].clone(),
                departure_time: clock(start),
                arrival_time: clock(start + segment),
                flight_number: flight_number.to_string(),
            }
        })
        .collect()
}

fn clock(minutes: u32) -> String {
    let minutes = minutes % (24 * 60);
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

// FNV-1a, stable across runs and platforms
fn stable_hash(text: &str) -> u64 {
    text.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ byte as u64).wrapping_mul(0x0100_0000_01b3)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::{HotelAttrs, ListingAttributes};
    use crate::upstream::RawHotel;

    fn route(origin: &str, destination: &str) -> SearchParams {
        SearchParams {
            location: origin.to_string(),
            destination: Some(destination.to_string()),
            ..SearchParams::default()
        }
    }

    #[test]
    fn test_fixture_provider_decodes_body() {
        let provider = FixtureProvider::<RawHotel>::new(
            "Booking.com",
            r#"[{"name": "Hotel X", "price": 100}]"#,
            ResponseFormat::Json,
        );

        let candidates: Vec<Candidate<HotelAttrs>> =
            tokio_test::block_on(provider.fetch(&SearchParams::default())).unwrap();
        assert_eq!(provider.platform(), "Booking.com");
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].platform, "Booking.com");
    }

    #[test]
    fn test_fixture_provider_loads_sample_file() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/samples/hotels_booking.com.json");
        let provider =
            FixtureProvider::<RawHotel>::from_file("Booking.com", path, ResponseFormat::Json).unwrap();

        let candidates = tokio_test::block_on(provider.fetch(&SearchParams::default())).unwrap();
        assert!(!candidates.is_empty());
        assert!(candidates.iter().all(|c| c.platform == "Booking.com"));
    }

    #[tokio::test]
    async fn test_http_provider_without_credentials_returns_empty() {
        let provider = HttpProvider::<RawHotel>::new(
            "Hotels.com",
            "http://127.0.0.1:9/unreachable",
            Some("   ".to_string()),
            ResponseFormat::Json,
        );
        assert!(!provider.is_configured());

        let candidates = provider.fetch(&SearchParams::default()).await.unwrap();
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn test_http_provider_network_failure_is_an_error() {
        let provider = HttpProvider::<RawHotel>::new(
            "Hotels.com",
            "http://127.0.0.1:9/unreachable",
            Some("key".to_string()),
            ResponseFormat::Json,
        );

        let result = provider.fetch(&SearchParams::default()).await;
        assert!(matches!(result, Err(AdapterError::NetworkError(_))));
    }

    #[tokio::test]
    async fn test_synthetic_flights_share_schedule_across_platforms() {
        let sky = SyntheticFlightProvider::new("Skyscanner", Some(7), 20);
        let kayak = SyntheticFlightProvider::new("Kayak", Some(7), 20);

        let a = sky.fetch(&route("cdg", "jfk")).await.unwrap();
        let b = kayak.fetch(&route("CDG", "JFK")).await.unwrap();
        assert!(!a.is_empty() && !b.is_empty());

        let keys_a: Vec<String> = a.iter().map(FlightAttrs::identity_key).collect();
        let shared = b
            .iter()
            .filter(|c| keys_a.contains(&FlightAttrs::identity_key(c)))
            .count();
        assert!(shared > 0);

        for flight in a.iter().chain(b.iter()) {
            assert!(flight.price > 0.0);
            assert_eq!(flight.attrs.outbound.len() as u32, flight.attrs.stops + 1);
            assert_eq!(flight.attrs.origin, "CDG");
            assert_eq!(flight.attrs.outbound.last().unwrap().to, "JFK");
        }

        // Same seed, same output
        let again = sky.fetch(&route("CDG", "JFK")).await.unwrap();
        assert_eq!(a, again);
    }

    #[tokio::test]
    async fn test_synthetic_flights_need_a_route() {
        let provider = SyntheticFlightProvider::new("Kayak", Some(1), 10);
        let candidates = provider.fetch(&SearchParams::default()).await.unwrap();
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_clock_wraps_midnight() {
        assert_eq!(clock(23 * 60 + 45), "23:45");
        assert_eq!(clock(25 * 60 + 5), "01:05");
    }
}

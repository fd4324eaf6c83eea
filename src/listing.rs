// Listing data model shared by the hotel, flight and car pipelines
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::identity;
use crate::platform::PlatformMeta;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Hotel,
    Flight,
    Car,
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Domain::Hotel => "hotel",
            Domain::Flight => "flight",
            Domain::Car => "car",
        };
        f.write_str(name)
    }
}

// One platform's offer for a merged entity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlatformPrice {
    pub platform: String,
    pub price: f64,
    pub original_price: Option<f64>,
    pub meta: PlatformMeta,
    pub url: String,
}

/// A single adapter-normalized record, before merging.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate<A> {
    pub id: String,
    pub name: String,
    pub platform: String,
    pub price: f64,
    pub original_price: Option<f64>,
    pub url: String,
    pub attrs: A,
}

/// A merged, platform-deduplicated listing.
///
/// `lowest_price` always equals the minimum of `prices[].price`; every entry in
/// `prices` is strictly positive and there is at most one entry per platform.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity<A> {
    pub id: String,
    pub name: String,
    pub lowest_price: f64,
    pub discount: Option<u32>,
    pub prices: Vec<PlatformPrice>,
    pub attrs: A,
}

impl<A> Entity<A> {
    // Seed an entity with display attributes and no offers yet
    pub fn new(id: String, name: String, attrs: A) -> Self {
        Self {
            id,
            name,
            lowest_price: 0.0,
            discount: None,
            prices: Vec::new(),
            attrs,
        }
    }

    /// Adds an offer and recomputes `lowest_price`.
    ///
    /// Non-positive prices are ignored. A second offer from a platform that is
    /// already present replaces the first only when it is cheaper.
    /// Returns whether the offer was recorded.
    pub fn add_price(&mut self, offer: PlatformPrice) -> bool {
        if !(offer.price > 0.0) || !offer.price.is_finite() {
            return false;
        }

        let recorded = match self
            .prices
            .iter_mut()
            .find(|p| p.platform.eq_ignore_ascii_case(&offer.platform))
        {
            Some(existing) if offer.price < existing.price => {
                *existing = offer;
                true
            }
            Some(_) => false,
            None => {
                self.prices.push(offer);
                true
            }
        };

        self.lowest_price = lowest_valid_price(&self.prices);
        recorded
    }

    pub fn has_valid_price(&self) -> bool {
        self.lowest_price > 0.0
    }

    pub fn offered_on(&self, platform: &str) -> bool {
        self.prices
            .iter()
            .any(|p| p.platform.eq_ignore_ascii_case(platform))
    }
}

pub fn lowest_valid_price(prices: &[PlatformPrice]) -> f64 {
    prices
        .iter()
        .map(|p| p.price)
        .filter(|price| *price > 0.0)
        .fold(None, |lowest: Option<f64>, price| {
            Some(lowest.map_or(price, |l| l.min(price)))
        })
        .unwrap_or(0.0)
}

// Whole percentage saved against the original price, if any
pub fn discount_percent(price: f64, original_price: Option<f64>) -> Option<u32> {
    match original_price {
        Some(original) if price > 0.0 && original > price => {
            Some(((1.0 - price / original) * 100.0).round() as u32)
        }
        _ => None,
    }
}

/// Domain-specific behaviour the merge, filter and sort stages need.
pub trait ListingAttributes: Clone + fmt::Debug + Send + Sync + 'static {
    const DOMAIN: Domain;

    // Only hotels carry a discount badge
    const TRACKS_DISCOUNT: bool = false;

    fn identity_key(candidate: &Candidate<Self>) -> String
    where
        Self: Sized;

    fn is_displayable(&self) -> bool {
        true
    }

    // Merge-stage ordering; discovery order by default
    fn rank(_entities: &mut [Entity<Self>])
    where
        Self: Sized,
    {
    }

    fn rating(&self) -> Option<f64> {
        None
    }

    fn duration_hours(&self) -> Option<u32> {
        None
    }

    fn departure_time(&self) -> Option<&str> {
        None
    }

    fn stops(&self) -> Option<u32> {
        None
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HotelAttrs {
    pub location: String,
    pub stars: u8,
    pub rating: f64,
    pub image: Option<String>,
    pub amenities: Vec<String>,
    pub featured: bool,
}

impl ListingAttributes for HotelAttrs {
    const DOMAIN: Domain = Domain::Hotel;
    const TRACKS_DISCOUNT: bool = true;

    fn identity_key(candidate: &Candidate<Self>) -> String {
        identity::normalize_name(&candidate.name)
    }

    fn is_displayable(&self) -> bool {
        self.image.as_deref().is_some_and(|url| !url.trim().is_empty())
    }

    // Featured hotels first, then by guest rating
    fn rank(entities: &mut [Entity<Self>]) {
        entities.sort_by(|a, b| {
            b.attrs
                .featured
                .cmp(&a.attrs.featured)
                .then_with(|| b.attrs.rating.total_cmp(&a.attrs.rating))
        });
    }

    fn rating(&self) -> Option<f64> {
        Some(self.rating)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlightLeg {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(default, alias = "departure")]
    pub departure_time: String,
    #[serde(default, alias = "arrival")]
    pub arrival_time: String,
    #[serde(default)]
    pub flight_number: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlightAttrs {
    pub airline: String,
    pub origin: String,
    pub destination: String,
    pub outbound: Vec<FlightLeg>,
    pub duration: String,
    pub stops: u32,
    pub cabin_class: String,
}

impl FlightAttrs {
    pub fn first_departure(&self) -> Option<&str> {
        self.outbound.first().map(|leg| leg.departure_time.as_str())
    }

    // Hour of the first outbound departure; 0 when missing or malformed
    pub fn departure_hour(&self) -> u32 {
        self.first_departure().map_or(0, parse_hour)
    }
}

impl ListingAttributes for FlightAttrs {
    const DOMAIN: Domain = Domain::Flight;

    fn identity_key(candidate: &Candidate<Self>) -> String {
        identity::route_key(&candidate.attrs)
    }

    fn duration_hours(&self) -> Option<u32> {
        Some(parse_duration_hours(&self.duration))
    }

    fn departure_time(&self) -> Option<&str> {
        self.first_departure().filter(|time| !time.trim().is_empty())
    }

    fn stops(&self) -> Option<u32> {
        Some(self.stops)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CarAttrs {
    pub company: String,
    pub location: String,
    pub vehicle_type: String,
    pub transmission: String,
    pub fuel_type: String,
    pub seats: u32,
    pub rating: f64,
    pub features: Vec<String>,
    pub image: Option<String>,
}

impl ListingAttributes for CarAttrs {
    const DOMAIN: Domain = Domain::Car;

    fn identity_key(candidate: &Candidate<Self>) -> String {
        identity::normalize_name(&candidate.name)
    }

    fn rating(&self) -> Option<f64> {
        Some(self.rating)
    }
}

/// Leading integer hours of a free-text duration, e.g. `"7h 15m"` is 7.
///
/// Truncates rather than rounds; anything unparseable yields 0.
pub fn parse_duration_hours(duration: &str) -> u32 {
    leading_number(duration)
}

// Hour part of an "HH:MM" time string; anything unparseable yields 0
pub fn parse_hour(time: &str) -> u32 {
    leading_number(time)
}

fn leading_number(text: &str) -> u32 {
    let digits: String = text
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(0)
}

// Filter engine: pure predicates over merged entities, one filter state per domain
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use crate::listing::{parse_duration_hours, CarAttrs, Entity, FlightAttrs, HotelAttrs};

/// An entity passes a filter state iff every active predicate passes.
pub trait FilterSet<A>: Clone + PartialEq {
    fn matches(&self, entity: &Entity<A>) -> bool;
}

pub fn apply_filters<A: Clone, F: FilterSet<A>>(entities: &[Entity<A>], filters: &F) -> Vec<Entity<A>> {
    entities
        .iter()
        .filter(|entity| filters.matches(entity))
        .cloned()
        .collect()
}

// Inclusive bounds on an entity's lowest price
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

impl Default for PriceRange {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: f64::INFINITY,
        }
    }
}

impl PriceRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    // Full range up to a configured ceiling
    pub fn up_to(ceiling: Option<f64>) -> Self {
        Self {
            min: 0.0,
            max: ceiling.unwrap_or(f64::INFINITY),
        }
    }

    pub fn contains(&self, price: f64) -> bool {
        self.min <= price && price <= self.max
    }
}

// Inclusive departure-hour window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourRange {
    pub start: u32,
    pub end: u32,
}

impl Default for HourRange {
    fn default() -> Self {
        Self { start: 0, end: 24 }
    }
}

impl HourRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, hour: u32) -> bool {
        self.start <= hour && hour <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StopBucket {
    #[serde(rename = "direct")]
    Direct,
    #[serde(rename = "1stop")]
    OneStop,
    #[serde(rename = "2plus")]
    TwoPlus,
}

impl StopBucket {
    pub fn for_stops(stops: u32) -> Self {
        match stops {
            0 => StopBucket::Direct,
            1 => StopBucket::OneStop,
            _ => StopBucket::TwoPlus,
        }
    }
}

impl fmt::Display for StopBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StopBucket::Direct => "direct",
            StopBucket::OneStop => "1stop",
            StopBucket::TwoPlus => "2plus",
        };
        f.write_str(label)
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Unknown stop bucket: {0}")]
pub struct UnknownStopBucket(String);

impl FromStr for StopBucket {
    type Err = UnknownStopBucket;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "direct" | "0" => Ok(StopBucket::Direct),
            "1stop" | "1" => Ok(StopBucket::OneStop),
            "2plus" | "2" | "2+" => Ok(StopBucket::TwoPlus),
            other => Err(UnknownStopBucket(other.to_string())),
        }
    }
}

// Empty selection means the dimension is not filtered
fn selected(selection: &BTreeSet<String>, value: &str) -> bool {
    selection.is_empty() || selection.iter().any(|s| s.eq_ignore_ascii_case(value))
}

fn contains_all(selection: &BTreeSet<String>, values: &[String]) -> bool {
    selection
        .iter()
        .all(|wanted| values.iter().any(|v| v.eq_ignore_ascii_case(wanted)))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotelFilters {
    pub price: PriceRange,
    pub star_ratings: BTreeSet<u8>,
    pub platforms: BTreeSet<String>,
    pub amenities: BTreeSet<String>,
}

impl HotelFilters {
    // Maximally permissive state; no platform selection keeps every platform
    pub fn up_to(price_ceiling: Option<f64>) -> Self {
        Self {
            price: PriceRange::up_to(price_ceiling),
            ..Self::default()
        }
    }
}

impl FilterSet<HotelAttrs> for HotelFilters {
    fn matches(&self, entity: &Entity<HotelAttrs>) -> bool {
        if !self.price.contains(entity.lowest_price) {
            return false;
        }

        // Star ratings are a threshold: the lowest selected rating and up
        if let Some(min_stars) = self.star_ratings.iter().min() {
            if entity.attrs.stars < *min_stars {
                return false;
            }
        }

        if !self.platforms.is_empty()
            && !self
                .platforms
                .iter()
                .any(|platform| entity.offered_on(platform))
        {
            return false;
        }

        contains_all(&self.amenities, &entity.attrs.amenities)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlightFilters {
    pub price: PriceRange,
    pub airlines: BTreeSet<String>,
    pub stops: BTreeSet<StopBucket>,
    pub departure_hours: HourRange,
    pub max_duration_hours: Option<u32>,
}

impl FilterSet<FlightAttrs> for FlightFilters {
    fn matches(&self, entity: &Entity<FlightAttrs>) -> bool {
        let flight = &entity.attrs;

        self.price.contains(entity.lowest_price)
            && selected(&self.airlines, &flight.airline)
            && (self.stops.is_empty() || self.stops.contains(&StopBucket::for_stops(flight.stops)))
            && self.departure_hours.contains(flight.departure_hour())
            && self
                .max_duration_hours
                .map_or(true, |max| parse_duration_hours(&flight.duration) <= max)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarFilters {
    pub price: PriceRange,
    pub vehicle_types: BTreeSet<String>,
    pub transmissions: BTreeSet<String>,
    pub fuel_types: BTreeSet<String>,
    pub features: BTreeSet<String>,
}

impl FilterSet<CarAttrs> for CarFilters {
    fn matches(&self, entity: &Entity<CarAttrs>) -> bool {
        let car = &entity.attrs;

        self.price.contains(entity.lowest_price)
            && selected(&self.vehicle_types, &car.vehicle_type)
            && selected(&self.transmissions, &car.transmission)
            && selected(&self.fuel_types, &car.fuel_type)
            && contains_all(&self.features, &car.features)
    }
}

/// Re-runs a filter only when its input list or filter state changed.
///
/// The input is compared by identity (the same `Arc`), the filter state by value.
pub struct MemoizedFilter<A, F> {
    cached: Option<MemoEntry<A, F>>,
    evaluations: usize,
}

struct MemoEntry<A, F> {
    input: Arc<[Entity<A>]>,
    filters: F,
    output: Arc<[Entity<A>]>,
}

impl<A, F> Default for MemoizedFilter<A, F> {
    fn default() -> Self {
        Self {
            cached: None,
            evaluations: 0,
        }
    }
}

impl<A: Clone, F: FilterSet<A>> MemoizedFilter<A, F> {
    pub fn apply(&mut self, entities: &Arc<[Entity<A>]>, filters: &F) -> Arc<[Entity<A>]> {
        if let Some(entry) = &self.cached {
            if Arc::ptr_eq(&entry.input, entities) && entry.filters == *filters {
                return entry.output.clone();
            }
        }

        self.evaluations += 1;
        let output: Arc<[Entity<A>]> = apply_filters(entities, filters).into();
        self.cached = Some(MemoEntry {
            input: entities.clone(),
            filters: filters.clone(),
            output: output.clone(),
        });
        output
    }

    // How many times the filter actually ran
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }
}

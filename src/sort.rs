// Client-side ordering of filtered results
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::listing::{Entity, ListingAttributes};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortKey {
    // Keeps the merge engine's order
    #[default]
    Recommended,
    PriceAsc,
    PriceDesc,
    RatingDesc,
    DurationAsc,
    DepartureAsc,
    StopsAsc,
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SortKey::Recommended => "recommended",
            SortKey::PriceAsc => "price-asc",
            SortKey::PriceDesc => "price-desc",
            SortKey::RatingDesc => "rating-desc",
            SortKey::DurationAsc => "duration-asc",
            SortKey::DepartureAsc => "departure-asc",
            SortKey::StopsAsc => "stops-asc",
        };
        f.write_str(label)
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Unknown sort key: {0}")]
pub struct UnknownSortKey(String);

impl FromStr for SortKey {
    type Err = UnknownSortKey;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "recommended" => Ok(SortKey::Recommended),
            "price" | "price-asc" => Ok(SortKey::PriceAsc),
            "price-desc" => Ok(SortKey::PriceDesc),
            "rating" | "rating-desc" => Ok(SortKey::RatingDesc),
            "duration" | "duration-asc" => Ok(SortKey::DurationAsc),
            "departure" | "departure-asc" => Ok(SortKey::DepartureAsc),
            "stops" | "stops-asc" => Ok(SortKey::StopsAsc),
            other => Err(UnknownSortKey(other.to_string())),
        }
    }
}

/// Stable in-place sort. Keys a domain does not have leave the order untouched.
///
/// Departure times compare as strings, so they must already be zero-padded.
pub fn sort_entities<A: ListingAttributes>(entities: &mut [Entity<A>], key: SortKey) {
    match key {
        SortKey::Recommended => {}
        SortKey::PriceAsc => entities.sort_by(|a, b| a.lowest_price.total_cmp(&b.lowest_price)),
        SortKey::PriceDesc => entities.sort_by(|a, b| b.lowest_price.total_cmp(&a.lowest_price)),
        SortKey::RatingDesc => entities.sort_by(|a, b| {
            let rating = |e: &Entity<A>| e.attrs.rating().unwrap_or(0.0);
            rating(b).total_cmp(&rating(a))
        }),
        SortKey::DurationAsc => entities.sort_by_key(|e| e.attrs.duration_hours()),
        SortKey::DepartureAsc => {
            entities.sort_by(|a, b| departure_key(a).cmp(&departure_key(b)))
        }
        SortKey::StopsAsc => entities.sort_by_key(|e| e.attrs.stops()),
    }
}

// Missing departures go last
fn departure_key<A: ListingAttributes>(entity: &Entity<A>) -> (bool, Option<&str>) {
    let departure = entity.attrs.departure_time();
    (departure.is_none(), departure)
}

pub fn sorted<A: ListingAttributes>(mut entities: Vec<Entity<A>>, key: SortKey) -> Vec<Entity<A>> {
    sort_entities(&mut entities, key);
    entities
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::{CarAttrs, FlightAttrs, FlightLeg, PlatformPrice};
    use crate::platform::PlatformMeta;
    use test_case::test_case;

    fn flight(id: &str, price: f64, departure: &str, duration: &str, stops: u32) -> Entity<FlightAttrs> {
        let mut entity = Entity::new(
            id.to_string(),
            id.to_string(),
            FlightAttrs {
                outbound: vec![FlightLeg {
                    departure_time: departure.to_string(),
                    ..FlightLeg::default()
                }],
                duration: duration.to_string(),
                stops,
                ..FlightAttrs::default()
            },
        );
        entity.add_price(PlatformPrice {
            platform: "Kayak".to_string(),
            price,
            original_price: None,
            meta: PlatformMeta::fallback("Kayak"),
            url: String::new(),
        });
        entity
    }

    fn flights() -> Vec<Entity<FlightAttrs>> {
        vec![
            flight("a", 300.0, "14:10", "8h 50m", 1),
            flight("b", 250.0, "06:30", "8h 05m", 0),
            flight("c", 300.0, "09:45", "11h 0m", 2),
            flight("d", 410.0, "23:15", "7h 40m", 0),
        ]
    }

    fn ids<A>(entities: &[Entity<A>]) -> Vec<&str> {
        entities.iter().map(|e| e.id.as_str()).collect()
    }

    #[test_case(SortKey::Recommended, vec!["a", "b", "c", "d"]; "#1 Recommended keeps merge order")]
    #[test_case(SortKey::PriceAsc, vec!["b", "a", "c", "d"]; "#2 Price ascending is stable on ties")]
    #[test_case(SortKey::PriceDesc, vec!["d", "a", "c", "b"]; "#3 Price descending")]
    #[test_case(SortKey::DurationAsc, vec!["d", "a", "b", "c"]; "#4 Duration uses truncated hours")]
    #[test_case(SortKey::DepartureAsc, vec!["b", "c", "a", "d"]; "#5 Departure time")]
    #[test_case(SortKey::StopsAsc, vec!["b", "d", "a", "c"]; "#6 Stops")]
    #[test_case(SortKey::RatingDesc, vec!["a", "b", "c", "d"]; "#7 Flights have no rating")]
    fn test_sort_flights(key: SortKey, expected: Vec<&str>) {
        let result = sorted(flights(), key);
        assert_eq!(ids(&result), expected);
    }

    #[test]
    fn test_missing_departures_sort_last() {
        let mut no_legs = flight("x", 200.0, "", "5h", 0);
        no_legs.attrs.outbound.clear();
        let entities = vec![
            no_legs,
            flight("y", 220.0, "", "6h", 0),
            flight("a", 300.0, "14:10", "8h 50m", 1),
            flight("b", 250.0, "06:30", "8h 05m", 0),
        ];

        let result = sorted(entities, SortKey::DepartureAsc);
        assert_eq!(ids(&result), vec!["b", "a", "x", "y"]);
    }

    #[test]
    fn test_resorting_is_stable() {
        for key in [
            SortKey::PriceAsc,
            SortKey::PriceDesc,
            SortKey::DurationAsc,
            SortKey::DepartureAsc,
            SortKey::StopsAsc,
        ] {
            let once = sorted(flights(), key);
            let twice = sorted(once.clone(), key);
            assert_eq!(once, twice, "re-sorting by {} changed the order", key);
        }
    }

    #[test]
    fn test_rating_desc_for_cars() {
        let car = |id: &str, rating: f64| {
            Entity::new(
                id.to_string(),
                id.to_string(),
                CarAttrs {
                    rating,
                    ..CarAttrs::default()
                },
            )
        };
        let result = sorted(vec![car("x", 7.9), car("y", 9.2), car("z", 8.4)], SortKey::RatingDesc);
        assert_eq!(ids(&result), vec!["y", "z", "x"]);

        // Cars have no stops; order is unchanged
        let unchanged = sorted(result, SortKey::StopsAsc);
        assert_eq!(ids(&unchanged), vec!["y", "z", "x"]);
    }

    #[test]
    fn test_sort_key_parsing() {
        assert_eq!("price".parse::<SortKey>(), Ok(SortKey::PriceAsc));
        assert_eq!("Price-Desc".parse::<SortKey>(), Ok(SortKey::PriceDesc));
        assert_eq!("departure".parse::<SortKey>(), Ok(SortKey::DepartureAsc));
        assert!("cheapest".parse::<SortKey>().is_err());

        for key in [SortKey::Recommended, SortKey::RatingDesc, SortKey::StopsAsc] {
            assert_eq!(key.to_string().parse::<SortKey>(), Ok(key));
        }
    }
}

// Identity keys decide which platform records describe the same real-world listing.
// They are heuristics: collisions and misses are expected.
use crate::listing::{Candidate, FlightAttrs, ListingAttributes};

pub trait IdentityKey<A>: Send + Sync {
    fn key(&self, candidate: &Candidate<A>) -> String;
}

impl<A, F> IdentityKey<A> for F
where
    F: Fn(&Candidate<A>) -> String + Send + Sync,
{
    fn key(&self, candidate: &Candidate<A>) -> String {
        self(candidate)
    }
}

// The domain's built-in strategy (normalized name, or route for flights)
#[derive(Debug, Clone, Copy, Default)]
pub struct DomainDefault;

impl<A: ListingAttributes> IdentityKey<A> for DomainDefault {
    fn key(&self, candidate: &Candidate<A>) -> String {
        A::identity_key(candidate)
    }
}

// Case-folded name with every non-alphanumeric character stripped
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizedName;

impl<A> IdentityKey<A> for NormalizedName {
    fn key(&self, candidate: &Candidate<A>) -> String {
        normalize_name(&candidate.name)
    }
}

// Airline, endpoints and first departure time of a flight
#[derive(Debug, Clone, Copy, Default)]
pub struct RouteKey;

impl IdentityKey<FlightAttrs> for RouteKey {
    fn key(&self, candidate: &Candidate<FlightAttrs>) -> String {
        route_key(&candidate.attrs)
    }
}

pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

pub fn route_key(flight: &FlightAttrs) -> String {
    format!(
        "{}|{}|{}|{}",
        normalize_name(&flight.airline),
        normalize_name(&flight.origin),
        normalize_name(&flight.destination),
        flight.first_departure().unwrap_or_default().trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::{FlightLeg, HotelAttrs};
    use test_case::test_case;

    fn candidate<A>(name: &str, attrs: A) -> Candidate<A> {
        Candidate {
            id: "id".to_string(),
            name: name.to_string(),
            platform: "Expedia".to_string(),
            price: 100.0,
            original_price: None,
            url: String::new(),
            attrs,
        }
    }

    #[test_case("Hotel X", "hotelx"; "#1 Case and spaces")]
    #[test_case("hotel x", "hotelx"; "#2 Already lower case")]
    #[test_case("The Ritz-Carlton, Paris!", "theritzcarltonparis"; "#3 Punctuation")]
    #[test_case("Hôtel Élysée", "hôtelélysée"; "#4 Unicode letters are kept")]
    #[test_case("---", ""; "#5 Nothing left")]
    fn test_normalize_name(name: &str, expected: &str) {
        assert_eq!(normalize_name(name), expected);
    }

    #[test]
    fn test_route_key_uses_first_leg_departure() {
        let flight = FlightAttrs {
            airline: "Air France".to_string(),
            origin: "CDG".to_string(),
            destination: "JFK".to_string(),
            outbound: vec![FlightLeg {
                departure_time: "10:30".to_string(),
                ..FlightLeg::default()
            }],
            ..FlightAttrs::default()
        };
        assert_eq!(route_key(&flight), "airfrance|cdg|jfk|10:30");

        let same = candidate("AF 006", flight.clone());
        let other_name = candidate("AF006 via partner", flight);
        assert_eq!(RouteKey.key(&same), RouteKey.key(&other_name));
    }

    #[test]
    fn test_closure_is_an_identity_key() {
        let by_location =
            |c: &Candidate<HotelAttrs>| normalize_name(&format!("{} {}", c.name, c.attrs.location));
        let hotel = candidate(
            "Hotel X",
            HotelAttrs {
                location: "Paris".to_string(),
                ..HotelAttrs::default()
            },
        );
        assert_eq!(by_location.key(&hotel), "hotelxparis");
        assert_eq!(NormalizedName.key(&hotel), "hotelx");
        assert_eq!(DomainDefault.key(&hotel), "hotelx");
    }
}

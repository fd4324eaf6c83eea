// Raw upstream listing shapes and their normalization into candidates
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use tracing::debug;

use crate::identity::normalize_name;
use crate::listing::{CarAttrs, Candidate, FlightAttrs, FlightLeg, HotelAttrs, ListingAttributes};
use crate::provider::AdapterError;

// Object keys that may wrap the listing array in a JSON response
const ENVELOPE_KEYS: [&str; 6] = ["data", "results", "items", "hotels", "flights", "cars"];

const XML_ROOT: &str = "Listings";
const XML_RECORD: &str = "Listing";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    #[default]
    Json,
    Xml,
}

/// A provider's record shape for one domain.
pub trait RawListing: DeserializeOwned + Send + 'static {
    type Attrs: ListingAttributes;

    // Fields (aliases included) whose values may arrive as strings
    const NUMERIC_FIELDS: &'static [&'static str];
    // Fields (aliases included) whose values may arrive as numbers
    const TEXT_FIELDS: &'static [&'static str];
    // List fields; a single value becomes a one-element list
    const LIST_FIELDS: &'static [&'static str] = &[];
    // Boolean fields that may arrive as text or 0/1
    const FLAG_FIELDS: &'static [&'static str] = &[];

    // None when the record cannot describe a listing
    fn into_candidate(self, platform: &str) -> Option<Candidate<Self::Attrs>>;
}

/// Decodes a provider response body and normalizes every usable record.
///
/// Malformed records are skipped one by one, in JSON and XML alike. A body
/// that cannot be read as a listing collection at all is a `DecodeError`.
pub fn normalize_records<R: RawListing>(
    platform: &str,
    body: &[u8],
    format: ResponseFormat,
) -> Result<Vec<Candidate<R::Attrs>>, AdapterError> {
    let items = match format {
        ResponseFormat::Json => json_items(body)?,
        ResponseFormat::Xml => xml_items(body)?,
    };
    let records: Vec<R> = decode_records(platform, items);

    let total = records.len();
    let candidates: Vec<_> = records
        .into_iter()
        .filter_map(|record| record.into_candidate(platform))
        .collect();

    if candidates.len() < total {
        debug!(
            platform,
            skipped = total - candidates.len(),
            "skipped records without a usable name"
        );
    }

    Ok(candidates)
}

fn decode_error(e: impl std::fmt::Display) -> AdapterError {
    AdapterError::DecodeError(e.to_string())
}

fn json_items(body: &[u8]) -> Result<Vec<Value>, AdapterError> {
    let value: Value = serde_json::from_slice(body).map_err(decode_error)?;

    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => ENVELOPE_KEYS
            .iter()
            .find_map(|key| match map.remove(*key) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .ok_or_else(|| decode_error("response has no listing collection")),
        other => Err(decode_error(format!(
            "expected an array or object, got {}",
            json_kind(&other)
        ))),
    }
}

fn decode_records<R: RawListing>(platform: &str, items: Vec<Value>) -> Vec<R> {
    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, mut item)| {
            coerce_fields::<R>(&mut item);
            match serde_json::from_value::<R>(item) {
                Ok(record) => Some(record),
                Err(e) => {
                    debug!(platform, index, error = %e, "skipping malformed record");
                    None
                }
            }
        })
        .collect()
}

// An open XML element: its text, and its child elements by name
struct XmlNode {
    name: String,
    text: String,
    children: Map<String, Value>,
}

impl XmlNode {
    fn new(start: &BytesStart) -> Self {
        Self {
            name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
            text: String::new(),
            children: Map::new(),
        }
    }

    // Leaf elements become their trimmed text, others an object of their children
    fn into_value(self) -> Value {
        if self.children.is_empty() {
            Value::String(self.text.trim().to_string())
        } else {
            Value::Object(self.children)
        }
    }
}

/// Reads `<Listings><Listing>...</Listing></Listings>` into one JSON value per
/// `<Listing>`, so XML records go through the same per-record decoding as JSON.
/// Repeated child elements become arrays.
fn xml_items(body: &[u8]) -> Result<Vec<Value>, AdapterError> {
    let text = std::str::from_utf8(body).map_err(decode_error)?;
    let mut reader = Reader::from_str(text);

    let mut stack: Vec<XmlNode> = Vec::new();
    let mut items = Vec::new();
    let mut saw_root = false;

    loop {
        match reader.read_event().map_err(|e| {
            decode_error(format!("at position {}: {}", reader.error_position(), e))
        })? {
            Event::Start(e) => {
                let node = XmlNode::new(&e);
                if stack.is_empty() {
                    check_root(&node.name, &mut saw_root)?;
                }
                stack.push(node);
            }
            Event::Empty(e) => {
                let node = XmlNode::new(&e);
                if stack.is_empty() {
                    check_root(&node.name, &mut saw_root)?;
                } else {
                    close_element(&mut stack, &mut items, node);
                }
            }
            Event::End(_) => {
                if let Some(node) = stack.pop() {
                    if !stack.is_empty() {
                        close_element(&mut stack, &mut items, node);
                    }
                }
            }
            Event::Text(e) => push_text(&mut stack, &e.decode().map_err(decode_error)?),
            Event::CData(e) => push_text(&mut stack, &e.decode().map_err(decode_error)?),
            Event::GeneralRef(e) => {
                let resolved = match e.resolve_char_ref().map_err(decode_error)? {
                    Some(ch) => ch.to_string(),
                    None => {
                        let entity = e.decode().map_err(decode_error)?;
                        resolve_predefined_entity(&entity)
                            .ok_or_else(|| decode_error(format!("unknown entity &{};", entity)))?
                            .to_string()
                    }
                };
                push_text(&mut stack, &resolved);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(decode_error("document ended inside an open element"));
    }
    if !saw_root {
        return Err(decode_error(format!("response has no <{}> root", XML_ROOT)));
    }
    Ok(items)
}

fn check_root(name: &str, saw_root: &mut bool) -> Result<(), AdapterError> {
    if name != XML_ROOT {
        return Err(decode_error(format!(
            "expected <{}> root, found <{}>",
            XML_ROOT, name
        )));
    }
    *saw_root = true;
    Ok(())
}

fn push_text(stack: &mut [XmlNode], text: &str) {
    if let Some(node) = stack.last_mut() {
        node.text.push_str(text);
    }
}

// Attach a finished element to its parent; records directly under the root are collected
fn close_element(stack: &mut [XmlNode], items: &mut Vec<Value>, node: XmlNode) {
    let depth = stack.len();
    let Some(parent) = stack.last_mut() else {
        return;
    };

    if depth == 1 {
        if node.name == XML_RECORD {
            items.push(node.into_value());
        }
        return;
    }

    let name = node.name.clone();
    let value = node.into_value();
    match parent.children.get_mut(&name) {
        Some(Value::Array(values)) => values.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            parent.children.insert(name, value);
        }
    }
}

// Smooths over the usual upstream sloppiness before strict decoding:
// nulls fall back to defaults, numbers-as-strings become numbers, numeric ids
// become text, lone values become lists and textual flags become booleans.
fn coerce_fields<R: RawListing>(record: &mut Value) {
    let Value::Object(map) = record else {
        return;
    };
    map.retain(|_, value| !value.is_null());

    for key in R::NUMERIC_FIELDS {
        let parsed = match map.get(*key) {
            Some(Value::String(raw)) => Some(raw.trim().parse::<f64>().ok()),
            _ => None,
        };
        match parsed {
            Some(Some(number)) => {
                if let Some(number) = json_number(number) {
                    map.insert(key.to_string(), Value::Number(number));
                } else {
                    map.remove(*key);
                }
            }
            Some(None) => {
                map.remove(*key);
            }
            None => {}
        }
    }

    for key in R::TEXT_FIELDS {
        stringify_number(map, key);
    }

    for key in R::LIST_FIELDS {
        let Some(value) = map.get_mut(*key) else {
            continue;
        };
        let items = match &mut *value {
            Value::Array(_) => continue,
            Value::String(text) if text.trim().is_empty() => Vec::new(),
            other => vec![other.take()],
        };
        *value = Value::Array(items);
    }

    for key in R::FLAG_FIELDS {
        if let Some(value) = map.get_mut(*key) {
            if let Some(flag) = parse_flag(value) {
                *value = Value::Bool(flag);
            }
        }
    }
}

// Unrecognized flags are left alone and fail the record
fn parse_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => match number.as_u64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn json_number(number: f64) -> Option<Number> {
    if number.fract() == 0.0 && number >= 0.0 && number <= u32::MAX as f64 {
        Some(Number::from(number as u64))
    } else {
        Number::from_f64(number)
    }
}

fn stringify_number(map: &mut Map<String, Value>, key: &str) {
    if let Some(Value::Number(number)) = map.get(key) {
        let text = number.to_string();
        map.insert(key.to_string(), Value::String(text));
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// Upstream id, or a platform-scoped id derived from the name
fn record_id(id: Option<String>, platform: &str, name: &str) -> String {
    non_empty(id).unwrap_or_else(|| format!("{}-{}", normalize_name(platform), normalize_name(name)))
}

fn valid_price(price: Option<f64>) -> f64 {
    price.filter(|p| p.is_finite()).unwrap_or(0.0)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawHotel {
    #[serde(alias = "hotel_id", alias = "hotelId")]
    pub id: Option<String>,
    #[serde(alias = "hotel_name", alias = "title")]
    pub name: Option<String>,
    #[serde(alias = "city", alias = "address")]
    pub location: Option<String>,
    #[serde(alias = "star_rating", alias = "category")]
    pub stars: Option<f64>,
    #[serde(alias = "review_score", alias = "guest_rating")]
    pub rating: Option<f64>,
    #[serde(alias = "amount", alias = "total_price", alias = "price_per_night")]
    pub price: Option<f64>,
    #[serde(alias = "originalPrice", alias = "was_price")]
    pub original_price: Option<f64>,
    #[serde(alias = "image_url", alias = "thumbnail")]
    pub image: Option<String>,
    #[serde(alias = "facilities")]
    pub amenities: Vec<String>,
    pub featured: bool,
    #[serde(alias = "booking_url", alias = "deep_link")]
    pub url: Option<String>,
}

impl RawListing for RawHotel {
    type Attrs = HotelAttrs;

    const NUMERIC_FIELDS: &'static [&'static str] = &[
        "stars",
        "star_rating",
        "category",
        "rating",
        "review_score",
        "guest_rating",
        "price",
        "amount",
        "total_price",
        "price_per_night",
        "original_price",
        "originalPrice",
        "was_price",
    ];
    const TEXT_FIELDS: &'static [&'static str] = &["id", "hotel_id", "hotelId"];
    const LIST_FIELDS: &'static [&'static str] = &["amenities", "facilities"];
    const FLAG_FIELDS: &'static [&'static str] = &["featured"];

    fn into_candidate(self, platform: &str) -> Option<Candidate<HotelAttrs>> {
        let name = non_empty(self.name)?;
        let stars = self.stars.unwrap_or(0.0).clamp(0.0, 5.0) as u8;

        Some(Candidate {
            id: record_id(self.id, platform, &name),
            platform: platform.to_string(),
            price: valid_price(self.price),
            original_price: self.original_price,
            url: self.url.unwrap_or_default(),
            attrs: HotelAttrs {
                location: self.location.unwrap_or_default(),
                stars,
                rating: self.rating.unwrap_or(0.0),
                image: non_empty(self.image),
                amenities: self.amenities,
                featured: self.featured,
            },
            name,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawFlight {
    #[serde(alias = "flight_id", alias = "offer_id")]
    pub id: Option<String>,
    #[serde(alias = "carrier", alias = "airline_name")]
    pub airline: Option<String>,
    #[serde(alias = "number")]
    pub flight_number: Option<String>,
    #[serde(alias = "from", alias = "departure_airport")]
    pub origin: Option<String>,
    #[serde(alias = "to", alias = "arrival_airport")]
    pub destination: Option<String>,
    #[serde(alias = "legs", alias = "segments")]
    pub outbound: Vec<FlightLeg>,
    #[serde(alias = "departure")]
    pub departure_time: Option<String>,
    #[serde(alias = "arrival")]
    pub arrival_time: Option<String>,
    #[serde(alias = "total_duration")]
    pub duration: Option<String>,
    #[serde(alias = "stop_count")]
    pub stops: Option<u32>,
    #[serde(alias = "cabin")]
    pub cabin_class: Option<String>,
    #[serde(alias = "amount", alias = "total_price")]
    pub price: Option<f64>,
    #[serde(alias = "originalPrice")]
    pub original_price: Option<f64>,
    #[serde(alias = "booking_url", alias = "deep_link")]
    pub url: Option<String>,
}

impl RawListing for RawFlight {
    type Attrs = FlightAttrs;

    const NUMERIC_FIELDS: &'static [&'static str] = &[
        "stops",
        "stop_count",
        "price",
        "amount",
        "total_price",
        "original_price",
        "originalPrice",
    ];
    const TEXT_FIELDS: &'static [&'static str] =
        &["id", "flight_id", "offer_id", "flight_number", "number"];
    const LIST_FIELDS: &'static [&'static str] = &["outbound", "legs", "segments"];

    fn into_candidate(self, platform: &str) -> Option<Candidate<FlightAttrs>> {
        let airline = non_empty(self.airline)?;
        let origin = non_empty(self.origin).unwrap_or_default();
        let destination = non_empty(self.destination).unwrap_or_default();
        let flight_number = non_empty(self.flight_number).unwrap_or_default();

        // Flat records describe a single leg
        let outbound = if self.outbound.is_empty() {
            vec![FlightLeg {
                from: origin.clone(),
                to: destination.clone(),
                departure_time: self.departure_time.unwrap_or_default(),
                arrival_time: self.arrival_time.unwrap_or_default(),
                flight_number: flight_number.clone(),
            }]
        } else {
            self.outbound
        };
        let stops = self
            .stops
            .unwrap_or_else(|| outbound.len().saturating_sub(1) as u32);
        let name = format!("{} {}", airline, flight_number).trim().to_string();

        Some(Candidate {
            id: record_id(self.id, platform, &name),
            name,
            platform: platform.to_string(),
            price: valid_price(self.price),
            original_price: self.original_price,
            url: self.url.unwrap_or_default(),
            attrs: FlightAttrs {
                airline,
                origin,
                destination,
                outbound,
                duration: self.duration.unwrap_or_default(),
                stops,
                cabin_class: self.cabin_class.unwrap_or_else(|| "economy".to_string()),
            },
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawCar {
    #[serde(alias = "car_id", alias = "vehicle_id")]
    pub id: Option<String>,
    #[serde(alias = "model", alias = "vehicle")]
    pub name: Option<String>,
    #[serde(alias = "supplier", alias = "vendor")]
    pub company: Option<String>,
    #[serde(alias = "pickup_location")]
    pub location: Option<String>,
    #[serde(alias = "car_type", alias = "category")]
    pub vehicle_type: Option<String>,
    #[serde(alias = "gearbox")]
    pub transmission: Option<String>,
    #[serde(alias = "fuel")]
    pub fuel_type: Option<String>,
    #[serde(alias = "passengers")]
    pub seats: Option<u32>,
    pub rating: Option<f64>,
    #[serde(alias = "extras")]
    pub features: Vec<String>,
    #[serde(alias = "amount", alias = "total_price", alias = "price_per_day")]
    pub price: Option<f64>,
    #[serde(alias = "originalPrice")]
    pub original_price: Option<f64>,
    #[serde(alias = "image_url")]
    pub image: Option<String>,
    #[serde(alias = "booking_url", alias = "deep_link")]
    pub url: Option<String>,
}

impl RawListing for RawCar {
    type Attrs = CarAttrs;

    const NUMERIC_FIELDS: &'static [&'static str] = &[
        "seats",
        "passengers",
        "rating",
        "price",
        "amount",
        "total_price",
        "price_per_day",
        "original_price",
        "originalPrice",
    ];
    const TEXT_FIELDS: &'static [&'static str] = &["id", "car_id", "vehicle_id"];
    const LIST_FIELDS: &'static [&'static str] = &["features", "extras"];

    fn into_candidate(self, platform: &str) -> Option<Candidate<CarAttrs>> {
        let name = non_empty(self.name)?;

        Some(Candidate {
            id: record_id(self.id, platform, &name),
            platform: platform.to_string(),
            price: valid_price(self.price),
            original_price: self.original_price,
            url: self.url.unwrap_or_default(),
            attrs: CarAttrs {
                company: self.company.unwrap_or_default(),
                location: self.location.unwrap_or_default(),
                vehicle_type: self.vehicle_type.unwrap_or_default(),
                transmission: self.transmission.unwrap_or_default(),
                fuel_type: self.fuel_type.unwrap_or_default(),
                seats: self.seats.unwrap_or(0),
                rating: self.rating.unwrap_or(0.0),
                features: self.features,
                image: non_empty(self.image),
            },
            name,
        })
    }
}

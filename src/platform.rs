// Platform display metadata
use serde::{Deserialize, Serialize};

const FALLBACK_COLOR: &str = "#6B7280";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformMeta {
    pub name: String,
    pub code: String,
    pub color: String,
}

impl PlatformMeta {
    pub fn new(name: &str, code: &str, color: &str) -> Self {
        Self {
            name: name.to_string(),
            code: code.to_string(),
            color: color.to_string(),
        }
    }

    // Metadata for a platform the catalog does not know about
    pub fn fallback(name: &str) -> Self {
        let code = name
            .chars()
            .find(|c| c.is_alphanumeric())
            .map(|c| c.to_uppercase().collect::<String>())
            .unwrap_or_else(|| "?".to_string());

        Self {
            name: name.to_string(),
            code,
            color: FALLBACK_COLOR.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlatformCatalog {
    platforms: Vec<PlatformMeta>,
}

impl Default for PlatformCatalog {
    fn default() -> Self {
        Self::new(vec![
            PlatformMeta::new("Booking.com", "B", "#003580"),
            PlatformMeta::new("Expedia", "E", "#FFC72C"),
            PlatformMeta::new("Hotels.com", "H", "#D32F2F"),
            PlatformMeta::new("Agoda", "A", "#5392F9"),
            PlatformMeta::new("Trip.com", "T", "#287DFA"),
            PlatformMeta::new("Skyscanner", "S", "#0770E3"),
            PlatformMeta::new("Kayak", "K", "#FF690F"),
            PlatformMeta::new("Google Flights", "G", "#4285F4"),
            PlatformMeta::new("Rentalcars", "R", "#00A3E0"),
            PlatformMeta::new("Hertz", "Z", "#FFD100"),
            PlatformMeta::new("Europcar", "U", "#00913F"),
        ])
    }
}

impl PlatformCatalog {
    pub fn new(platforms: Vec<PlatformMeta>) -> Self {
        Self { platforms }
    }

    // Lookup is case-insensitive; unknown platforms get fallback metadata
    pub fn meta(&self, platform: &str) -> PlatformMeta {
        self.platforms
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(platform))
            .cloned()
            .unwrap_or_else(|| PlatformMeta::fallback(platform))
    }

    pub fn platforms(&self) -> &[PlatformMeta] {
        &self.platforms
    }

    pub fn len(&self) -> usize {
        self.platforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.platforms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_platform_lookup_ignores_case() {
        let catalog = PlatformCatalog::default();
        let meta = catalog.meta("booking.com");
        assert_eq!(meta.name, "Booking.com");
        assert_eq!(meta.code, "B");
        assert_eq!(meta.color, "#003580");
    }

    #[test]
    fn test_unknown_platform_gets_fallback() {
        let catalog = PlatformCatalog::default();
        let meta = catalog.meta("momondo");
        assert_eq!(meta.name, "momondo");
        assert_eq!(meta.code, "M");
        assert_eq!(meta.color, FALLBACK_COLOR);

        assert_eq!(PlatformMeta::fallback("").code, "?");
        assert_eq!(PlatformMeta::fallback("  9flats").code, "9");
    }
}

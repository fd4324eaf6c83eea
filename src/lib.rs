// Travel metasearch core: provider adapters, merge, filter and sort pipelines

pub mod config;
pub mod filter;
pub mod identity;
pub mod listing;
pub mod merge;
pub mod platform;
pub mod provider;
pub mod search;
pub mod sort;
pub mod store;
pub mod upstream;
pub mod view;

// Re-export key types for convenience
pub use config::{ConfigError, MetasearchConfig, ProviderConfig};
pub use filter::{
    apply_filters, CarFilters, FilterSet, FlightFilters, HotelFilters, HourRange, MemoizedFilter,
    PriceRange, StopBucket,
};
pub use identity::{normalize_name, IdentityKey, NormalizedName, RouteKey};
pub use listing::{
    CarAttrs, Candidate, Domain, Entity, FlightAttrs, FlightLeg, HotelAttrs, ListingAttributes,
    PlatformPrice,
};
pub use merge::{DiscountPolicy, MergeEngine};
pub use platform::{PlatformCatalog, PlatformMeta};
pub use provider::{AdapterError, FixtureProvider, HttpProvider, Provider, SyntheticFlightProvider};
pub use search::{
    CommittedSearch, SearchError, SearchMeta, SearchParams, SearchResponse, SearchService,
    SearchSession,
};
pub use sort::{sort_entities, sorted, SortKey};
pub use store::{
    triggered_alerts, Favorite, MemoryStore, NewPriceAlert, PriceAlert, SearchRecord, StoreError,
    TriggeredAlert, UserDataStore,
};
pub use upstream::{RawCar, RawFlight, RawHotel, RawListing, ResponseFormat};
pub use view::ResultsView;

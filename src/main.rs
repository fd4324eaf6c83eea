use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use travel_metasearch::{
    CarAttrs, CarFilters, Entity, FilterSet, FixtureProvider, FlightAttrs, FlightFilters,
    HotelAttrs, HotelFilters, HourRange, ListingAttributes, MetasearchConfig, PlatformCatalog,
    PriceRange, RawCar, RawHotel, RawListing, ResponseFormat, ResultsView, SearchParams,
    SearchService, SortKey, StopBucket,
};

#[derive(Debug, Parser)]
#[command(
    name = "metasearch",
    version,
    about = "Compare hotel, flight and car rental prices across partner platforms"
)]
struct Cli {
    /// JSON configuration file; defaults apply when it does not exist
    #[arg(long, default_value = "metasearch.json")]
    config: PathBuf,

    /// Directory of canned partner responses (hotels_<platform>.json, cars_<platform>.xml, ...)
    #[arg(long, default_value = "samples")]
    samples: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Hotels {
        location: String,
        #[arg(long)]
        check_in: Option<String>,
        #[arg(long)]
        check_out: Option<String>,
        #[arg(long, default_value_t = 2)]
        guests: u32,
        /// Minimum star rating; may be repeated
        #[arg(long)]
        stars: Vec<u8>,
        #[arg(long)]
        amenity: Vec<String>,
        #[command(flatten)]
        view: ViewArgs,
    },
    Flights {
        from: String,
        to: String,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        airline: Vec<String>,
        /// direct, 1stop or 2plus; may be repeated
        #[arg(long)]
        stops: Vec<StopBucket>,
        #[arg(long, default_value_t = 0)]
        depart_after: u32,
        #[arg(long, default_value_t = 24)]
        depart_before: u32,
        #[arg(long)]
        max_hours: Option<u32>,
        #[command(flatten)]
        view: ViewArgs,
    },
    Cars {
        location: String,
        #[arg(long)]
        pickup: Option<String>,
        #[arg(long)]
        dropoff: Option<String>,
        #[arg(long)]
        vehicle_type: Vec<String>,
        #[arg(long)]
        transmission: Vec<String>,
        #[arg(long)]
        fuel: Vec<String>,
        #[arg(long)]
        feature: Vec<String>,
        #[command(flatten)]
        view: ViewArgs,
    },
}

#[derive(Debug, Args)]
struct ViewArgs {
    #[arg(long, default_value = "recommended")]
    sort: SortKey,
    #[arg(long)]
    min_price: Option<f64>,
    #[arg(long)]
    max_price: Option<f64>,
    #[arg(long, default_value_t = 20)]
    limit: usize,
    /// Print the results as JSON
    #[arg(long)]
    json: bool,
}

impl ViewArgs {
    fn price(&self, default: PriceRange) -> PriceRange {
        PriceRange::new(
            self.min_price.unwrap_or(default.min),
            self.max_price.unwrap_or(default.max),
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = MetasearchConfig::load_from(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let catalog = config.catalog();

    match cli.command {
        Command::Hotels {
            location,
            check_in,
            check_out,
            guests,
            stars,
            amenity,
            view,
        } => {
            let mut service = config.hotel_service();
            add_fixtures::<RawHotel>(&mut service, &cli.samples, "hotels_", &catalog)?;

            let mut results = ResultsView::<HotelAttrs, HotelFilters>::new(config.hotel_filters());
            results.update_filters(|f| {
                f.price = view.price(f.price);
                f.star_ratings.extend(stars);
                f.amenities.extend(amenity);
            });

            let params = SearchParams {
                location,
                destination: None,
                start_date: check_in,
                end_date: check_out,
                guests,
            };
            run(service, params, results, &view).await
        }
        Command::Flights {
            from,
            to,
            date,
            airline,
            stops,
            depart_after,
            depart_before,
            max_hours,
            view,
        } => {
            let service = config.flight_service();

            let mut results = ResultsView::<FlightAttrs, FlightFilters>::new(config.flight_filters());
            results.update_filters(|f| {
                f.price = view.price(f.price);
                f.airlines.extend(airline);
                f.stops.extend(stops);
                f.departure_hours = HourRange::new(depart_after, depart_before);
                f.max_duration_hours = max_hours;
            });

            let params = SearchParams {
                location: from,
                destination: Some(to),
                start_date: date,
                end_date: None,
                guests: 1,
            };
            run(service, params, results, &view).await
        }
        Command::Cars {
            location,
            pickup,
            dropoff,
            vehicle_type,
            transmission,
            fuel,
            feature,
            view,
        } => {
            let mut service = config.car_service();
            add_fixtures::<RawCar>(&mut service, &cli.samples, "cars_", &catalog)?;

            let mut results = ResultsView::<CarAttrs, CarFilters>::new(config.car_filters());
            results.update_filters(|f| {
                f.price = view.price(f.price);
                f.vehicle_types.extend(vehicle_type);
                f.transmissions.extend(transmission);
                f.fuel_types.extend(fuel);
                f.features.extend(feature);
            });

            let params = SearchParams {
                location,
                destination: None,
                start_date: pickup,
                end_date: dropoff,
                guests: 1,
            };
            run(service, params, results, &view).await
        }
    }
}

// One fixture provider per <prefix><platform>.<json|xml> file in the samples directory
fn add_fixtures<R: RawListing>(
    service: &mut SearchService<R::Attrs>,
    dir: &Path,
    prefix: &str,
    catalog: &PlatformCatalog,
) -> Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }

    let mut paths = std::fs::read_dir(dir)
        .with_context(|| format!("reading {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    paths.sort();

    for path in paths {
        let Some(platform) = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(|stem| stem.strip_prefix(prefix))
        else {
            continue;
        };
        let format = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => ResponseFormat::Json,
            Some("xml") => ResponseFormat::Xml,
            _ => continue,
        };

        let name = catalog.meta(platform).name;
        let provider = FixtureProvider::<R>::from_file(&name, &path, format)
            .with_context(|| format!("loading {}", path.display()))?;
        service.add_provider(Arc::new(provider));
    }

    Ok(())
}

async fn run<A, F>(
    service: SearchService<A>,
    params: SearchParams,
    mut results: ResultsView<A, F>,
    view: &ViewArgs,
) -> Result<()>
where
    A: ListingAttributes + Serialize,
    F: FilterSet<A>,
{
    let response = service.search(&params).await;
    if !response.success {
        bail!(response.error.unwrap_or_else(|| "search failed".to_string()));
    }

    results.set_results(response.items);
    results.set_sort(view.sort);
    let visible: Vec<Entity<A>> = results.visible().into_iter().take(view.limit).collect();

    if view.json {
        println!("{}", serde_json::to_string_pretty(&visible)?);
        return Ok(());
    }

    if visible.is_empty() {
        println!("No results ({} found before filtering)", results.total());
        return Ok(());
    }

    println!("{} of {} results, sorted by {}", visible.len(), results.total(), view.sort);
    for entity in &visible {
        let platforms: Vec<String> = entity
            .prices
            .iter()
            .map(|p| format!("{} {:.2}", p.meta.code, p.price))
            .collect();
        let discount = entity
            .discount
            .map(|d| format!(" -{}%", d))
            .unwrap_or_default();
        println!(
            "{:>9.2}{}  {}  [{}]",
            entity.lowest_price,
            discount,
            entity.name,
            platforms.join(", ")
        );
    }

    Ok(())
}

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use travel_metasearch::{
    apply_filters, sorted, Candidate, HotelAttrs, HotelFilters, MergeEngine, PlatformCatalog,
    SortKey,
};

const PLATFORMS: [&str; 5] = ["Booking.com", "Expedia", "Hotels.com", "Agoda", "Trip.com"];
const AMENITIES: [&str; 6] = ["WiFi", "Pool", "Spa", "Parking", "Gym", "Breakfast"];

// Each platform returns an overlapping slice of the same hotel pool
fn hotel_batches(hotels: usize, seed: u64) -> Vec<Vec<Candidate<HotelAttrs>>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut batches = Vec::with_capacity(PLATFORMS.len());

    for platform in PLATFORMS {
        let mut batch = Vec::new();
        for i in 0..hotels {
            if !rng.gen_bool(0.7) {
                continue;
            }
            let amenities = AMENITIES
                .choose_multiple(&mut rng, 3)
                .map(|a| a.to_string())
                .collect();
            batch.push(Candidate {
                id: format!("{}-{}", platform, i),
                name: format!("Hotel {}", i),
                platform: platform.to_string(),
                price: rng.gen_range(40.0..600.0),
                original_price: None,
                url: String::new(),
                attrs: HotelAttrs {
                    location: "Paris".to_string(),
                    stars: rng.gen_range(1..=5),
                    rating: rng.gen_range(5.0..10.0),
                    image: Some(format!("https://img.test/{}.jpg", i)),
                    amenities,
                    featured: rng.gen_bool(0.1),
                },
            });
        }
        batches.push(batch);
    }

    batches
}

pub fn merge_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("hotel_merge");
    let engine = MergeEngine::<HotelAttrs>::new(PlatformCatalog::default());

    for hotels in [100, 1_000, 10_000].iter() {
        let batches = hotel_batches(*hotels, 7);
        group.bench_with_input(BenchmarkId::from_parameter(hotels), &batches, |b, batches| {
            b.iter(|| engine.merge(black_box(batches.clone())))
        });
    }

    group.finish();
}

pub fn filter_sort_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("hotel_filter_sort");
    let catalog = PlatformCatalog::default();
    let engine = MergeEngine::<HotelAttrs>::new(catalog.clone());

    let mut filters = HotelFilters::up_to(Some(400.0));
    filters.star_ratings.insert(3);
    filters.amenities.insert("wifi".to_string());

    for hotels in [1_000, 10_000].iter() {
        let entities = engine.merge(hotel_batches(*hotels, 11));
        group.bench_with_input(BenchmarkId::from_parameter(hotels), &entities, |b, entities| {
            b.iter(|| {
                let visible = apply_filters(black_box(entities), &filters);
                sorted(visible, SortKey::PriceAsc)
            })
        });
    }

    group.finish();
}

criterion_group!(benches, merge_benchmark, filter_sort_benchmark);
criterion_main!(benches);

// Merge/dedup engine: folds per-provider candidates into price-ranked entities
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::identity::{DomainDefault, IdentityKey};
use crate::listing::{discount_percent, Candidate, Entity, ListingAttributes, PlatformPrice};
use crate::platform::PlatformCatalog;

/// How the discount badge of a merged listing is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountPolicy {
    // Fixed from the first-seen offer when the entity is created
    #[default]
    FirstOffer,
    // Taken from the cheapest offer once all providers are merged
    LowestPrice,
}

pub struct MergeEngine<A> {
    catalog: PlatformCatalog,
    key_fn: Box<dyn IdentityKey<A>>,
    discount_policy: DiscountPolicy,
}

impl<A: ListingAttributes> MergeEngine<A> {
    pub fn new(catalog: PlatformCatalog) -> Self {
        Self {
            catalog,
            key_fn: Box::new(DomainDefault),
            discount_policy: DiscountPolicy::default(),
        }
    }

    pub fn with_identity_key(mut self, key_fn: impl IdentityKey<A> + 'static) -> Self {
        self.key_fn = Box::new(key_fn);
        self
    }

    pub fn with_discount_policy(mut self, policy: DiscountPolicy) -> Self {
        self.discount_policy = policy;
        self
    }

    /// Merges provider batches, in provider order, into displayable entities.
    ///
    /// The first candidate seen for an identity key supplies the entity's
    /// display attributes; later ones only contribute a platform price.
    /// Entities left without a positive price, or that cannot be displayed,
    /// are dropped. The result is in the domain's merge ranking.
    pub fn merge(&self, batches: Vec<Vec<Candidate<A>>>) -> Vec<Entity<A>> {
        let mut slots: HashMap<String, usize> = HashMap::new();
        let mut entities: Vec<Entity<A>> = Vec::new();

        for candidate in batches.into_iter().flatten() {
            let key = self.key_fn.key(&candidate);
            if key.is_empty() {
                debug!(platform = %candidate.platform, name = %candidate.name, "skipping candidate without identity key");
                continue;
            }

            let offer = PlatformPrice {
                meta: self.catalog.meta(&candidate.platform),
                platform: candidate.platform,
                price: candidate.price,
                original_price: candidate.original_price,
                url: candidate.url,
            };

            match slots.get(&key) {
                Some(&slot) => {
                    entities[slot].add_price(offer);
                }
                None => {
                    let mut entity =
                        Entity::new(format!("{}:{}", A::DOMAIN, key), candidate.name, candidate.attrs);
                    if A::TRACKS_DISCOUNT {
                        entity.discount = discount_percent(offer.price, offer.original_price);
                    }
                    entity.add_price(offer);

                    slots.insert(key, entities.len());
                    entities.push(entity);
                }
            }
        }

        if A::TRACKS_DISCOUNT && self.discount_policy == DiscountPolicy::LowestPrice {
            for entity in &mut entities {
                entity.discount = cheapest_offer(entity)
                    .and_then(|offer| discount_percent(offer.price, offer.original_price));
            }
        }

        let merged = entities.len();
        entities.retain(|entity| entity.has_valid_price() && entity.attrs.is_displayable());
        if entities.len() < merged {
            debug!(
                domain = %A::DOMAIN,
                dropped = merged - entities.len(),
                "dropped entities without a bookable offer"
            );
        }

        A::rank(&mut entities);
        entities
    }
}

fn cheapest_offer<A>(entity: &Entity<A>) -> Option<&PlatformPrice> {
    entity
        .prices
        .iter()
        .min_by(|a, b| a.price.total_cmp(&b.price))
}

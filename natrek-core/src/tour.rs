use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Price for a party-size range. `price_cop` / `price_usd` are per person.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingTier {
    pub min_pax: i32,
    pub max_pax: i32,
    pub price_cop: i64,
    pub price_usd: i64,
}

/// Catalog entity. Immutable during a booking's lifetime except by explicit
/// admin edit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tour {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub pricing_tiers: Vec<PricingTier>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tour {
    pub fn new(name: String, description: String, pricing_tiers: Vec<PricingTier>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            description,
            pricing_tiers,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn tier_for(&self, pax: i32) -> Option<&PricingTier> {
        self.pricing_tiers
            .iter()
            .find(|t| t.min_pax <= pax && pax <= t.max_pax)
    }
}

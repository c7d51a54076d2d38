use serde::{Deserialize, Serialize};

use crate::tour::Tour;
use crate::{CoreError, CoreResult};

/// Business policy numbers. These are configuration, not protocol: they load
/// from the config layer at startup and are passed by reference into the
/// components that need them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessRules {
    /// Portion of the tour price collected up front.
    pub deposit_rate: f64,
    /// Tax applied on the deposit.
    pub tax_rate: f64,
    pub default_public_capacity: i32,
    pub default_private_capacity: i32,
}

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            deposit_rate: 0.30,
            tax_rate: 0.05,
            default_public_capacity: 10,
            default_private_capacity: 8,
        }
    }
}

/// Amounts due at payment initialization, all in COP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub amount: i64,
    pub tax: i64,
    pub total_due: i64,
}

/// Deposit quote for a party of `pax` on the given tour.
pub fn quote_deposit(tour: &Tour, pax: i32, rules: &BusinessRules) -> CoreResult<Quote> {
    if pax <= 0 {
        return Err(CoreError::Validation(format!("invalid party size: {pax}")));
    }
    let tier = tour.tier_for(pax).ok_or_else(|| {
        CoreError::Validation(format!("no pricing tier for {pax} pax on tour {}", tour.id))
    })?;

    let total = tier.price_cop * pax as i64;
    let amount = (total as f64 * rules.deposit_rate).round() as i64;
    let tax = (amount as f64 * rules.tax_rate).round() as i64;

    Ok(Quote {
        amount,
        tax,
        total_due: amount + tax,
    })
}

//! Nutrient lookup: food name and grams in, macros out.
//!
//! Implementations never surface errors to the caller. Any transport failure,
//! timeout or empty result is a miss (`None`).

pub mod usda;

use async_trait::async_trait;

use crate::nutrition::Macros;

pub use usda::{UsdaClient, UsdaClientConfig};

/// Source of per-food macro values.
#[async_trait]
pub trait NutrientLookup: Send + Sync {
    /// Macros for `grams` of the best match for `food`, or `None` on a miss.
    async fn lookup(&self, food: &str, grams: f64) -> Option<Macros>;
}

/// Used when no API key is configured. Every lookup misses.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledLookup;

#[async_trait]
impl NutrientLookup for DisabledLookup {
    async fn lookup(&self, _food: &str, _grams: f64) -> Option<Macros> {
        None
    }
}

/// Scale per-100g values to `grams`, rounded to two decimals.
pub fn scale_per_100g(per_100g: Macros, grams: f64) -> Macros {
    let factor = grams / 100.0;
    Macros::new(
        round2(per_100g.protein_g * factor),
        round2(per_100g.fat_g * factor),
        round2(per_100g.carb_g * factor),
    )
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaling_is_linear_and_rounded() {
        let per_100g = Macros::new(23.1, 1.24, 0.0);
        assert_eq!(scale_per_100g(per_100g, 100.0), per_100g);
        assert_eq!(scale_per_100g(per_100g, 150.0), Macros::new(34.65, 1.86, 0.0));
        assert_eq!(scale_per_100g(per_100g, 33.0), Macros::new(7.62, 0.41, 0.0));
    }

    #[tokio::test]
    async fn disabled_lookup_always_misses() {
        assert!(DisabledLookup.lookup("rice", 100.0).await.is_none());
    }
}

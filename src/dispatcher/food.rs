//! Free-form food report parsing: `"<name> <number>g"`.

use std::sync::LazyLock;

use regex::Regex;

/// Grams assumed when the text carries no quantity.
pub const DEFAULT_GRAMS: f64 = 100.0;

static FOOD_WITH_GRAMS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(.+?)\s+([0-9]+(?:\.[0-9]+)?)\s*g$").expect("food pattern compiles")
});

/// A parsed food report.
#[derive(Debug, Clone, PartialEq)]
pub struct FoodReport {
    pub name: String,
    pub grams: f64,
}

/// Why a food report was rejected without a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoodParseError {
    Empty,
    NonPositiveGrams,
}

/// Split a report into name and grams.
///
/// Text without a trailing `<number>g` is all name, at `DEFAULT_GRAMS`.
pub fn parse_food_input(text: &str) -> Result<FoodReport, FoodParseError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(FoodParseError::Empty);
    }

    let Some(caps) = FOOD_WITH_GRAMS.captures(text) else {
        return Ok(FoodReport {
            name: text.to_string(),
            grams: DEFAULT_GRAMS,
        });
    };

    let name = caps[1].trim().to_string();
    let grams: f64 = caps[2].parse().map_err(|_| FoodParseError::NonPositiveGrams)?;
    if !grams.is_finite() || grams <= 0.0 {
        return Err(FoodParseError::NonPositiveGrams);
    }
    Ok(FoodReport { name, grams })
}

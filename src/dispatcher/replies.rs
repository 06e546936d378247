//! Reply texts for registered users.

use crate::channels::OutgoingResponse;
use crate::nutrition::{Macros, remaining};
use crate::onboarding::model::{Goals, UserProfile};

use super::food::FoodReport;

pub const NOT_FOUND: &str = "Couldn't find nutrition data for that food (or the lookup service \
     failed). Send a food name and grams, like \"chicken breast 150g\".";
pub const MALFORMED_FOOD: &str =
    "Please send a food name and a positive amount in grams, like \"chicken breast 150g\".";
pub const STORAGE_FAILURE: &str = "Sorry, something went wrong saving your data. Please try again.";

/// Grams with at most two decimals and no trailing zeros.
fn fmt_g(value: f64) -> String {
    let s = format!("{value:.2}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" { "0".to_string() } else { s.to_string() }
}

fn fmt_opt<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

/// Goals or zeros when absent, for the remaining-to-goal math.
fn goals_or_zero(goals: Option<&Goals>) -> Goals {
    goals.copied().unwrap_or(Goals {
        calories: 0,
        protein_g: 0,
        fat_g: 0,
        carb_g: 0,
    })
}

fn remaining_block(goals: Option<&Goals>, consumed: &Macros) -> String {
    let left = remaining(&goals_or_zero(goals), consumed);
    format!(
        "Left to goal:\nP: {} g\nF: {} g\nC: {} g",
        fmt_g(left.protein_g),
        fmt_g(left.fat_g),
        fmt_g(left.carb_g)
    )
}

pub fn totals(consumed: &Macros, goals: Option<&Goals>) -> OutgoingResponse {
    OutgoingResponse::text(format!(
        "Today's totals:\nP: {} g\nF: {} g\nC: {} g\n\n{}",
        fmt_g(consumed.protein_g),
        fmt_g(consumed.fat_g),
        fmt_g(consumed.carb_g),
        remaining_block(goals, consumed)
    ))
}

pub fn goals(goals: Option<&Goals>) -> OutgoingResponse {
    OutgoingResponse::text(format!(
        "Your daily targets:\nCalories: {} kcal\nP: {} g\nF: {} g\nC: {} g",
        fmt_opt(goals.map(|g| g.calories)),
        fmt_opt(goals.map(|g| g.protein_g)),
        fmt_opt(goals.map(|g| g.fat_g)),
        fmt_opt(goals.map(|g| g.carb_g)),
    ))
}

pub fn profile(profile: &UserProfile) -> OutgoingResponse {
    OutgoingResponse::text(format!(
        "Sex: {}\nActivity: {}\nAge: {}\nWeight: {} kg\nHeight: {} cm",
        fmt_opt(profile.gender),
        fmt_opt(profile.activity),
        fmt_opt(profile.age),
        fmt_opt(profile.weight.map(fmt_g)),
        fmt_opt(profile.height.map(fmt_g)),
    ))
}

pub fn food_logged(
    report: &FoodReport,
    eaten: &Macros,
    today: &Macros,
    goals: Option<&Goals>,
) -> OutgoingResponse {
    OutgoingResponse::text(format!(
        "Logged {} {}g.\nThis meal: P={}g, F={}g, C={}g\n\n\
         Today's totals: P={}g, F={}g, C={}g\n{}",
        report.name,
        fmt_g(report.grams),
        fmt_g(eaten.protein_g),
        fmt_g(eaten.fat_g),
        fmt_g(eaten.carb_g),
        fmt_g(today.protein_g),
        fmt_g(today.fat_g),
        fmt_g(today.carb_g),
        remaining_block(goals, today)
    ))
}

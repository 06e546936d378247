//! Daily macro targets from body metrics.
//!
//! BMR uses the Mifflin-St Jeor equation (Mifflin et al., 1990):
//! `10 x weight_kg + 6.25 x height_cm - 5 x age + s`, with `s = +5` for men
//! and `s = -161` for women. TDEE is BMR scaled by an activity factor.
//!
//! Macro split:
//! - protein: 1.8 g per kg of body weight
//! - fat: 25% of calories, at 9 kcal/g
//! - carbohydrate: whatever calories remain, at 4 kcal/g
//!
//! Carbohydrate is not clamped. Heavy, sedentary inputs can push it negative.

use crate::onboarding::model::{Activity, Gender, Goals};

const MSJ_WEIGHT_COEF: f64 = 10.0;
const MSJ_HEIGHT_COEF: f64 = 6.25;
const MSJ_AGE_COEF: f64 = -5.0;
const MSJ_MALE_CONSTANT: f64 = 5.0;
const MSJ_FEMALE_CONSTANT: f64 = -161.0;

const PROTEIN_G_PER_KG: f64 = 1.8;
const FAT_CALORIE_SHARE: f64 = 0.25;
const KCAL_PER_G_FAT: f64 = 9.0;
const KCAL_PER_G_PROTEIN: f64 = 4.0;
const KCAL_PER_G_CARB: f64 = 4.0;

/// Basal metabolic rate in kcal/day.
pub fn basal_metabolic_rate(age: u32, gender: Gender, weight_kg: f64, height_cm: f64) -> f64 {
    let constant = match gender {
        Gender::Male => MSJ_MALE_CONSTANT,
        Gender::Female => MSJ_FEMALE_CONSTANT,
    };
    MSJ_WEIGHT_COEF * weight_kg + MSJ_HEIGHT_COEF * height_cm + MSJ_AGE_COEF * f64::from(age)
        + constant
}

/// TDEE multiplier for an activity level. Unknown levels count as moderate.
pub fn activity_factor(activity: Activity) -> f64 {
    match activity {
        Activity::Low => 1.2,
        Activity::Mid | Activity::Unknown => 1.55,
        Activity::High => 1.725,
    }
}

/// Compute daily calorie and macro targets. Deterministic and infallible.
pub fn calculate_goals(
    age: u32,
    gender: Gender,
    weight_kg: f64,
    height_cm: f64,
    activity: Activity,
) -> Goals {
    let bmr = basal_metabolic_rate(age, gender, weight_kg, height_cm);
    let calories = round(bmr * activity_factor(activity));
    let protein_g = round(weight_kg * PROTEIN_G_PER_KG);
    let fat_g = round(calories as f64 * FAT_CALORIE_SHARE / KCAL_PER_G_FAT);
    let remaining_kcal =
        calories as f64 - protein_g as f64 * KCAL_PER_G_PROTEIN - fat_g as f64 * KCAL_PER_G_FAT;
    let carb_g = round(remaining_kcal / KCAL_PER_G_CARB);

    Goals {
        calories,
        protein_g,
        fat_g,
        carb_g,
    }
}

/// Nearest integer, ties to even (`360.5` becomes `360`).
fn round(value: f64) -> i64 {
    value.round_ties_even() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_male_mid() {
        // 700 + 1093.75 - 125 + 5
        let bmr = basal_metabolic_rate(25, Gender::Male, 70.0, 175.0);
        assert!((bmr - 1673.75).abs() < 1e-9);

        // 2594.31 kcal; carbs (2594 - 504 - 648) / 4 = 360.5 rounds to even.
        let goals = calculate_goals(25, Gender::Male, 70.0, 175.0, Activity::Mid);
        assert_eq!(
            goals,
            Goals {
                calories: 2594,
                protein_g: 126,
                fat_g: 72,
                carb_g: 360,
            }
        );
    }

    #[test]
    fn halves_round_to_even() {
        assert_eq!(round(360.5), 360);
        assert_eq!(round(361.5), 362);
        assert_eq!(round(2.5), 2);
        assert_eq!(round(-12.5), -12);
        assert_eq!(round(72.06), 72);
        assert_eq!(round(2594.3125), 2594);
    }

    #[test]
    fn female_offset_is_166_below_male() {
        let male = basal_metabolic_rate(40, Gender::Male, 60.0, 160.0);
        let female = basal_metabolic_rate(40, Gender::Female, 60.0, 160.0);
        assert!((male - female - 166.0).abs() < 1e-9);
    }

    #[test]
    fn activity_factors() {
        assert_eq!(activity_factor(Activity::Low), 1.2);
        assert_eq!(activity_factor(Activity::Mid), 1.55);
        assert_eq!(activity_factor(Activity::High), 1.725);
        assert_eq!(activity_factor(Activity::Unknown), 1.55);
    }

    #[test]
    fn unknown_activity_matches_mid() {
        let mid = calculate_goals(30, Gender::Female, 55.0, 160.0, Activity::Mid);
        let unknown = calculate_goals(30, Gender::Female, 55.0, 160.0, Activity::Unknown);
        assert_eq!(mid, unknown);
    }

    #[test]
    fn macro_energy_matches_calories_within_rounding() {
        let genders = [Gender::Male, Gender::Female];
        let activities = [Activity::Low, Activity::Mid, Activity::High];
        for age in [18u32, 25, 40, 65, 90] {
            for weight in [45.0, 62.5, 80.0, 110.0] {
                for height in [150.0, 168.0, 185.0] {
                    for gender in genders {
                        for activity in activities {
                            let g = calculate_goals(age, gender, weight, height, activity);
                            let kcal = g.protein_g * 4 + g.fat_g * 9 + g.carb_g * 4;
                            assert!(
                                (kcal - g.calories).abs() <= 2,
                                "{age}/{gender}/{weight}/{height}/{activity}: {g:?} sums to {kcal}"
                            );
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn deterministic() {
        let a = calculate_goals(52, Gender::Female, 71.3, 166.4, Activity::High);
        let b = calculate_goals(52, Gender::Female, 71.3, 166.4, Activity::High);
        assert_eq!(a, b);
    }

    #[test]
    fn extreme_inputs_allow_negative_carbs() {
        // Tiny BMR: 400 + 625 - 600 - 161 = 264 kcal, x1.2 = 317 kcal.
        // Protein (72 g = 288 kcal) plus fat (9 g = 81 kcal) overshoot it.
        let goals = calculate_goals(120, Gender::Female, 40.0, 100.0, Activity::Low);
        assert_eq!(goals.calories, 317);
        assert_eq!(goals.protein_g, 72);
        assert_eq!(goals.fat_g, 9);
        assert_eq!(goals.carb_g, -13);
    }
}

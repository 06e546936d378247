//! Fixed questions and re-prompts for the onboarding questionnaire.

use crate::channels::{Choice, OutgoingResponse};

use super::model::{Activity, Gender, Goals, Selection};

pub const ASK_AGE: &str =
    "Got your activity level. Next, please send your age as a number (e.g. 25).";
pub const AGE_RETRY: &str = "Please send your age as a whole number (e.g. 25).";
pub const ASK_WEIGHT: &str = "Got your age. Next, please send your weight in kg (e.g. 60).";
pub const WEIGHT_RETRY: &str = "Please send your weight in kg as a number (e.g. 60).";
pub const ASK_HEIGHT: &str = "Got your weight. Next, please send your height in cm (e.g. 170).";
pub const HEIGHT_RETRY: &str = "Please send your height in cm as a number (e.g. 170).";
pub const ALREADY_REGISTERED: &str =
    "You're already registered. Send \"reset\" if you want to start over.";

const GENDER_QUESTION: &str = "Please choose your sex.";
const ACTIVITY_QUESTION: &str = "How active are you on a typical day?";

/// Gender question with its two buttons, optionally prefixed with a notice.
pub fn ask_gender(preface: Option<&str>) -> OutgoingResponse {
    OutgoingResponse::choices(
        with_preface(preface, GENDER_QUESTION),
        vec![
            Choice::new("Male", Selection::Gender(Gender::Male)),
            Choice::new("Female", Selection::Gender(Gender::Female)),
        ],
    )
}

/// Activity question with its three buttons.
pub fn ask_activity(preface: Option<&str>) -> OutgoingResponse {
    OutgoingResponse::choices(
        with_preface(preface, ACTIVITY_QUESTION),
        vec![
            Choice::new("Low (little or no exercise)", Selection::Activity(Activity::Low)),
            Choice::new("Moderate (1-3 times a week)", Selection::Activity(Activity::Mid)),
            Choice::new("High (exercise almost daily)", Selection::Activity(Activity::High)),
        ],
    )
}

/// Reply when height arrived but earlier answers are missing.
pub fn missing_fields(missing: &[&str]) -> OutgoingResponse {
    OutgoingResponse::text(format!(
        "Some answers are still missing: {}. Send \"reset\" to start over.",
        missing.join(", ")
    ))
}

/// Reply sent once the goals have been computed.
pub fn registration_complete(goals: &Goals) -> OutgoingResponse {
    OutgoingResponse::text(format!(
        "Registration complete!\n\n\
         Daily targets:\n\
         Calories: {} kcal\n\
         P: {} g\n\
         F: {} g\n\
         C: {} g\n\n\
         To log a meal, send something like \"chicken breast 150g\".\n\
         I'll reply with today's totals and what's left.",
        goals.calories, goals.protein_g, goals.fat_g, goals.carb_g
    ))
}

fn with_preface(preface: Option<&str>, question: &str) -> String {
    match preface {
        Some(p) => format!("{p}\n{question}"),
        None => question.to_string(),
    }
}

//! Onboarding machine: decides the next question from the stored profile and
//! the user's input, then persists the resulting patch.
//!
//! `step` is pure; `OnboardingMachine` wraps it with the store write so the
//! transition table can be tested without a database.

use std::sync::Arc;

use tracing::info;

use crate::channels::{InboundEvent, OutgoingResponse};
use crate::error::DatabaseError;
use crate::nutrition::calculate_goals;
use crate::store::Database;

use super::model::{Activity, ProfilePatch, Selection, UserProfile};
use super::prompts;
use super::state::OnboardingState;

const RESET_NOTICE: &str = "Your registration has been reset.";
const WELCOME: &str = "Welcome! Let's set up your daily PFC targets.";

/// The outcome of one onboarding input: what to persist and what to say.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// `None` means nothing changes (re-prompt).
    pub patch: Option<ProfilePatch>,
    pub reply: OutgoingResponse,
}

impl Step {
    fn stay(reply: OutgoingResponse) -> Self {
        Self { patch: None, reply }
    }

    fn advance(patch: ProfilePatch, reply: OutgoingResponse) -> Self {
        Self {
            patch: Some(patch),
            reply,
        }
    }
}

/// A whole number of years, at least 1.
pub fn parse_age(text: &str) -> Option<u32> {
    text.trim().parse::<u32>().ok().filter(|age| *age > 0)
}

/// A finite, strictly positive measurement (kg or cm).
pub fn parse_measurement(text: &str) -> Option<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v > 0.0)
}

/// Clear everything and return to the first question. Valid from any state.
pub fn reset() -> Step {
    Step::advance(ProfilePatch::reset(), prompts::ask_gender(Some(RESET_NOTICE)))
}

/// Compute the transition for `event` given the current profile.
///
/// Reset is not handled here; callers check for it first.
pub fn step(profile: Option<&UserProfile>, event: &InboundEvent) -> Step {
    let state = profile.map(|p| p.state).unwrap_or_default();

    match (state, event) {
        (OnboardingState::New, _) => Step::advance(
            ProfilePatch::state(OnboardingState::AwaitGender),
            prompts::ask_gender(Some(WELCOME)),
        ),

        (OnboardingState::AwaitGender, InboundEvent::Selection(Selection::Gender(gender))) => {
            Step::advance(
                ProfilePatch::state(OnboardingState::AwaitActivity).with_gender(*gender),
                prompts::ask_activity(Some("Got it.")),
            )
        }
        (OnboardingState::AwaitGender, _) => Step::stay(prompts::ask_gender(None)),

        (OnboardingState::AwaitActivity, InboundEvent::Selection(Selection::Activity(activity)))
            if *activity != Activity::Unknown =>
        {
            Step::advance(
                ProfilePatch::state(OnboardingState::AwaitAge).with_activity(*activity),
                OutgoingResponse::text(prompts::ASK_AGE),
            )
        }
        (OnboardingState::AwaitActivity, _) => Step::stay(prompts::ask_activity(None)),

        (OnboardingState::AwaitAge, InboundEvent::Text(text)) => match parse_age(text) {
            Some(age) => Step::advance(
                ProfilePatch::state(OnboardingState::AwaitWeight).with_age(age),
                OutgoingResponse::text(prompts::ASK_WEIGHT),
            ),
            None => Step::stay(OutgoingResponse::text(prompts::AGE_RETRY)),
        },
        (OnboardingState::AwaitAge, _) => Step::stay(OutgoingResponse::text(prompts::AGE_RETRY)),

        (OnboardingState::AwaitWeight, InboundEvent::Text(text)) => {
            match parse_measurement(text) {
                Some(weight) => Step::advance(
                    ProfilePatch::state(OnboardingState::AwaitHeight).with_weight(weight),
                    OutgoingResponse::text(prompts::ASK_HEIGHT),
                ),
                None => Step::stay(OutgoingResponse::text(prompts::WEIGHT_RETRY)),
            }
        }
        (OnboardingState::AwaitWeight, _) => {
            Step::stay(OutgoingResponse::text(prompts::WEIGHT_RETRY))
        }

        (OnboardingState::AwaitHeight, InboundEvent::Text(text)) => {
            match (profile, parse_measurement(text)) {
                (Some(profile), Some(height)) => complete(profile, height),
                _ => Step::stay(OutgoingResponse::text(prompts::HEIGHT_RETRY)),
            }
        }
        (OnboardingState::AwaitHeight, _) => {
            Step::stay(OutgoingResponse::text(prompts::HEIGHT_RETRY))
        }

        (OnboardingState::Done, _) => Step::stay(OutgoingResponse::text(prompts::ALREADY_REGISTERED)),
    }
}

/// Height is in hand: either compute goals and finish, or report what is
/// still missing and stay on this step.
fn complete(profile: &UserProfile, height: f64) -> Step {
    let mut candidate = profile.clone();
    candidate.height = Some(height);

    match (
        candidate.age,
        candidate.gender,
        candidate.weight,
        candidate.activity,
    ) {
        (Some(age), Some(gender), Some(weight), Some(activity)) => {
            let goals = calculate_goals(age, gender, weight, height, activity);
            // State and goals land in one write so DONE never lacks goals.
            Step::advance(
                ProfilePatch::state(OnboardingState::Done)
                    .with_height(height)
                    .with_goals(goals),
                prompts::registration_complete(&goals),
            )
        }
        _ => Step::advance(
            ProfilePatch::default().with_height(height),
            prompts::missing_fields(&candidate.missing_fields()),
        ),
    }
}

/// Runs `step` against the store.
#[derive(Clone)]
pub struct OnboardingMachine {
    db: Arc<dyn Database>,
}

impl OnboardingMachine {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    /// Advance onboarding for `user_id` and return the reply to send.
    pub async fn handle(
        &self,
        user_id: &str,
        profile: Option<&UserProfile>,
        event: &InboundEvent,
    ) -> Result<OutgoingResponse, DatabaseError> {
        let from = profile.map(|p| p.state).unwrap_or_default();
        let step = step(profile, event);
        self.persist(user_id, from, step).await
    }

    /// Clear the profile and restart onboarding.
    pub async fn reset(
        &self,
        user_id: &str,
        profile: Option<&UserProfile>,
    ) -> Result<OutgoingResponse, DatabaseError> {
        let from = profile.map(|p| p.state).unwrap_or_default();
        self.persist(user_id, from, reset()).await
    }

    async fn persist(
        &self,
        user_id: &str,
        from: OnboardingState,
        step: Step,
    ) -> Result<OutgoingResponse, DatabaseError> {
        if let Some(patch) = &step.patch {
            if let Some(to) = patch.state {
                if !from.can_transition_to(to) {
                    return Err(DatabaseError::Constraint(format!(
                        "invalid onboarding transition {from} -> {to}"
                    )));
                }
            }
            self.db.apply_profile_patch(user_id, patch).await?;
            if let Some(to) = patch.state {
                info!(user_id, from = %from, to = %to, "Onboarding transition");
            }
        }
        Ok(step.reply)
    }
}

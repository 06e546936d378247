//! Conversation dispatcher: routes each inbound message to onboarding, a
//! command, or food logging, and always produces a reply.

pub mod commands;
pub mod food;
pub mod locks;
pub mod replies;

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::channels::{InboundEvent, IncomingMessage, OutgoingResponse};
use crate::error::DatabaseError;
use crate::lookup::NutrientLookup;
use crate::nutrition::{Clock, IntakeLedger, Macros, remaining};
use crate::onboarding::model::{Goals, UserProfile};
use crate::onboarding::{OnboardingMachine, prompts};
use crate::store::Database;

pub use commands::Command;
pub use food::{FoodReport, parse_food_input};
pub use locks::UserLocks;

/// Today's intake for a registered user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TodaySummary {
    pub user_id: String,
    pub date: NaiveDate,
    pub totals: Macros,
    pub goals: Option<Goals>,
    pub remaining: Option<Macros>,
}

/// Owns the per-request flow. Shared across tasks behind an `Arc`.
pub struct Dispatcher {
    db: Arc<dyn Database>,
    lookup: Arc<dyn NutrientLookup>,
    clock: Arc<dyn Clock>,
    onboarding: OnboardingMachine,
    ledger: IntakeLedger,
    locks: UserLocks,
}

impl Dispatcher {
    pub fn new(
        db: Arc<dyn Database>,
        lookup: Arc<dyn NutrientLookup>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            onboarding: OnboardingMachine::new(Arc::clone(&db)),
            ledger: IntakeLedger::new(Arc::clone(&db)),
            db,
            lookup,
            clock,
            locks: UserLocks::new(),
        }
    }

    /// Handle one message. Messages from the same user are processed one at
    /// a time; storage failures become a generic apology.
    pub async fn handle(&self, msg: &IncomingMessage) -> OutgoingResponse {
        let _guard = self.locks.acquire(&msg.user_id).await;

        match self.route(msg).await {
            Ok(response) => response,
            Err(e) => {
                error!(user_id = %msg.user_id, channel = %msg.channel, error = %e, "Failed to handle message");
                OutgoingResponse::text(replies::STORAGE_FAILURE)
            }
        }
    }

    async fn route(&self, msg: &IncomingMessage) -> Result<OutgoingResponse, DatabaseError> {
        let user_id = msg.user_id.as_str();
        let profile = self.db.get_profile(user_id).await?;
        let command = match &msg.event {
            InboundEvent::Text(text) => Command::parse(text),
            InboundEvent::Selection(_) => None,
        };

        match profile {
            Some(profile) if profile.is_done() => {
                self.registered(&profile, &msg.event, command).await
            }
            other if command == Some(Command::Reset) => {
                self.onboarding.reset(user_id, other.as_ref()).await
            }
            other => {
                self.onboarding
                    .handle(user_id, other.as_ref(), &msg.event)
                    .await
            }
        }
    }

    async fn registered(
        &self,
        profile: &UserProfile,
        event: &InboundEvent,
        command: Option<Command>,
    ) -> Result<OutgoingResponse, DatabaseError> {
        let user_id = profile.user_id.as_str();
        let today = self.clock.today();

        match (command, event) {
            (Some(Command::Reset), _) => self.onboarding.reset(user_id, Some(profile)).await,
            (Some(Command::ShowTotals), _) => {
                let consumed = self.ledger.totals_for(user_id, today).await?;
                Ok(replies::totals(&consumed, profile.goals.as_ref()))
            }
            (Some(Command::ShowGoals), _) => Ok(replies::goals(profile.goals.as_ref())),
            (Some(Command::ShowProfile), _) => Ok(replies::profile(profile)),
            (None, InboundEvent::Selection(_)) => {
                Ok(OutgoingResponse::text(prompts::ALREADY_REGISTERED))
            }
            (None, InboundEvent::Text(text)) => self.log_food(profile, text, today).await,
        }
    }

    async fn log_food(
        &self,
        profile: &UserProfile,
        text: &str,
        today: NaiveDate,
    ) -> Result<OutgoingResponse, DatabaseError> {
        let user_id = profile.user_id.as_str();
        let report = match parse_food_input(text) {
            Ok(report) => report,
            Err(reason) => {
                debug!(user_id, ?reason, "Rejected food report");
                return Ok(OutgoingResponse::text(replies::MALFORMED_FOOD));
            }
        };

        let Some(eaten) = self.lookup.lookup(&report.name, report.grams).await else {
            return Ok(OutgoingResponse::text(replies::NOT_FOUND));
        };
        if !eaten.is_valid_delta() {
            warn!(user_id, food = %report.name, ?eaten, "Lookup returned unusable values");
            return Ok(OutgoingResponse::text(replies::NOT_FOUND));
        }

        self.ledger.record(user_id, today, eaten).await?;
        let totals = self.ledger.totals_for(user_id, today).await?;
        Ok(replies::food_logged(
            &report,
            &eaten,
            &totals,
            profile.goals.as_ref(),
        ))
    }

    /// Read-only view of today's intake, or `None` before onboarding is done.
    pub async fn today_summary(
        &self,
        user_id: &str,
    ) -> Result<Option<TodaySummary>, DatabaseError> {
        let Some(profile) = self.db.get_profile(user_id).await? else {
            return Ok(None);
        };
        if !profile.is_done() {
            return Ok(None);
        }

        let date = self.clock.today();
        let totals = self.ledger.totals_for(user_id, date).await?;
        Ok(Some(TodaySummary {
            user_id: profile.user_id,
            date,
            totals,
            goals: profile.goals,
            remaining: profile.goals.map(|g| remaining(&g, &totals)),
        }))
    }
}

//! `Database` trait: the single async interface for all persistence.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::DatabaseError;
use crate::nutrition::{IntakeRecord, Macros};
use crate::onboarding::model::{ProfilePatch, UserProfile};

/// Backend-agnostic storage for user profiles and daily intake.
///
/// Every write is a single atomic statement, so a concurrent reader never
/// observes a half-applied patch or a torn intake update.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn init_schema(&self) -> Result<(), DatabaseError>;

    // ── Profiles ────────────────────────────────────────────────────

    /// Load a profile, or `None` if the user has never been seen.
    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>, DatabaseError>;

    /// Create the profile if absent, then write exactly the fields the patch
    /// touches.
    async fn apply_profile_patch(
        &self,
        user_id: &str,
        patch: &ProfilePatch,
    ) -> Result<(), DatabaseError>;

    // ── Intake ──────────────────────────────────────────────────────

    /// Add `delta` to the `(user_id, date)` totals, inserting the row if absent.
    async fn add_intake(
        &self,
        user_id: &str,
        date: NaiveDate,
        delta: &Macros,
    ) -> Result<(), DatabaseError>;

    /// Fetch the `(user_id, date)` totals, if any food was logged.
    async fn get_intake(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<IntakeRecord>, DatabaseError>;
}

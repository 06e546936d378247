//! libSQL backend: async `Database` trait implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use libsql::{Connection, Database as LibSqlDatabase, Value, params};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::nutrition::{IntakeRecord, Macros};
use crate::onboarding::model::{Activity, FieldUpdate, Gender, ProfilePatch, UserProfile};
use crate::onboarding::state::OnboardingState;
use crate::store::migrations;
use crate::store::traits::Database;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

const DATE_FORMAT: &str = "%Y-%m-%d";

const PROFILE_COLUMNS: &str =
    "user_id, state, gender, activity, age, weight, height, goals_json";

fn opt_text(s: Option<&str>) -> Value {
    match s {
        Some(s) => Value::Text(s.to_string()),
        None => Value::Null,
    }
}

fn value_to_text(v: Value) -> Option<String> {
    match v {
        Value::Text(s) => Some(s),
        _ => None,
    }
}

/// REAL columns written by older clients may hold integers.
fn value_to_real(v: Value) -> Option<f64> {
    match v {
        Value::Real(f) => Some(f),
        Value::Integer(i) => Some(i as f64),
        _ => None,
    }
}

fn value_to_int(v: Value) -> Option<i64> {
    match v {
        Value::Integer(i) => Some(i),
        Value::Real(f) => Some(f as i64),
        _ => None,
    }
}

/// Collects the columns a patch touches for a single upsert statement.
struct ColumnWrites {
    columns: Vec<&'static str>,
    values: Vec<Value>,
}

impl ColumnWrites {
    fn new(user_id: &str) -> Self {
        Self {
            columns: vec!["user_id"],
            values: vec![Value::Text(user_id.to_string())],
        }
    }

    fn push(&mut self, column: &'static str, value: Value) {
        self.columns.push(column);
        self.values.push(value);
    }

    fn push_update<T: Copy>(
        &mut self,
        column: &'static str,
        update: &FieldUpdate<T>,
        encode: impl Fn(T) -> Value,
    ) {
        if !update.is_keep() {
            let value = update.value().map(encode).unwrap_or(Value::Null);
            self.push(column, value);
        }
    }

    /// `INSERT ... ON CONFLICT DO UPDATE` touching only the collected columns.
    fn upsert_sql(&self) -> String {
        let placeholders: Vec<String> = (1..=self.columns.len()).map(|i| format!("?{i}")).collect();
        let assignments: Vec<String> = self.columns[1..]
            .iter()
            .map(|c| format!("{c} = excluded.{c}"))
            .collect();
        format!(
            "INSERT INTO users ({}) VALUES ({}) ON CONFLICT(user_id) DO UPDATE SET {}",
            self.columns.join(", "),
            placeholders.join(", "),
            assignments.join(", "),
        )
    }
}

fn patch_to_writes(user_id: &str, patch: &ProfilePatch) -> Result<ColumnWrites, DatabaseError> {
    let mut writes = ColumnWrites::new(user_id);
    if let Some(state) = patch.state {
        writes.push("state", Value::Text(state.as_str().to_string()));
    }
    writes.push_update("gender", &patch.gender, |g: Gender| {
        Value::Text(g.as_str().to_string())
    });
    writes.push_update("activity", &patch.activity, |a: Activity| {
        Value::Text(a.as_str().to_string())
    });
    writes.push_update("age", &patch.age, |a: u32| Value::Integer(i64::from(a)));
    writes.push_update("weight", &patch.weight, Value::Real);
    writes.push_update("height", &patch.height, Value::Real);

    if !patch.goals.is_keep() {
        let json = match patch.goals.value() {
            Some(goals) => Some(
                serde_json::to_string(&goals)
                    .map_err(|e| DatabaseError::Serialization(format!("goals: {e}")))?,
            ),
            None => None,
        };
        writes.push("goals_json", opt_text(json.as_deref()));
    }

    writes.push("updated_at", Value::Text(Utc::now().to_rfc3339()));
    Ok(writes)
}

fn row_to_profile(row: &libsql::Row) -> Result<UserProfile, DatabaseError> {
    let get = |idx: i32| {
        row.get_value(idx)
            .map_err(|e| DatabaseError::Query(format!("profile column {idx}: {e}")))
    };

    let user_id = value_to_text(get(0)?).unwrap_or_default();

    // Rows from before state tracking may carry NULL.
    let state = match value_to_text(get(1)?) {
        Some(s) => s
            .parse::<OnboardingState>()
            .map_err(|e| DatabaseError::Serialization(format!("user {user_id}: {e}")))?,
        None => OnboardingState::New,
    };

    let gender = match value_to_text(get(2)?) {
        Some(s) => Some(
            s.parse::<Gender>()
                .map_err(|e| DatabaseError::Serialization(format!("user {user_id}: {e}")))?,
        ),
        None => None,
    };

    let activity = value_to_text(get(3)?).map(|s| Activity::from_stored(&s));
    let age = value_to_int(get(4)?).and_then(|a| u32::try_from(a).ok());
    let weight = value_to_real(get(5)?);
    let height = value_to_real(get(6)?);

    let goals = match value_to_text(get(7)?) {
        Some(json) => Some(
            serde_json::from_str(&json)
                .map_err(|e| DatabaseError::Serialization(format!("user {user_id} goals: {e}")))?,
        ),
        None => None,
    };

    Ok(UserProfile {
        user_id,
        state,
        gender,
        activity,
        age,
        weight,
        height,
        goals,
    })
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Profiles ────────────────────────────────────────────────────

    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!("SELECT {PROFILE_COLUMNS} FROM users WHERE user_id = ?1"),
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_profile: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_profile(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_profile: {e}"))),
        }
    }

    async fn apply_profile_patch(
        &self,
        user_id: &str,
        patch: &ProfilePatch,
    ) -> Result<(), DatabaseError> {
        if patch.is_empty() {
            return Ok(());
        }

        let writes = patch_to_writes(user_id, patch)?;
        let sql = writes.upsert_sql();
        self.conn()
            .execute(&sql, writes.values)
            .await
            .map_err(|e| DatabaseError::Query(format!("apply_profile_patch: {e}")))?;

        debug!(user_id, state = ?patch.state, "Profile patch applied");
        Ok(())
    }

    // ── Intake ──────────────────────────────────────────────────────

    async fn add_intake(
        &self,
        user_id: &str,
        date: NaiveDate,
        delta: &Macros,
    ) -> Result<(), DatabaseError> {
        let conn = self.conn();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO intake (user_id, date, protein, fat, carb, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(user_id, date) DO UPDATE SET
                protein = protein + excluded.protein,
                fat = fat + excluded.fat,
                carb = carb + excluded.carb,
                updated_at = excluded.updated_at",
            params![
                user_id,
                date.format(DATE_FORMAT).to_string(),
                delta.protein_g,
                delta.fat_g,
                delta.carb_g,
                now,
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("add_intake: {e}")))?;

        debug!(user_id, %date, "Intake recorded");
        Ok(())
    }

    async fn get_intake(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<IntakeRecord>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                "SELECT protein, fat, carb FROM intake WHERE user_id = ?1 AND date = ?2",
                params![user_id, date.format(DATE_FORMAT).to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_intake: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let component = |idx: i32| -> Result<f64, DatabaseError> {
                    let v = row
                        .get_value(idx)
                        .map_err(|e| DatabaseError::Query(format!("get_intake row parse: {e}")))?;
                    Ok(value_to_real(v).unwrap_or(0.0))
                };
                let totals = Macros::new(component(0)?, component(1)?, component(2)?);
                Ok(Some(IntakeRecord {
                    user_id: user_id.to_string(),
                    date,
                    totals,
                }))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_intake: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onboarding::model::Goals;

    async fn test_db() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    fn goals() -> Goals {
        Goals {
            calories: 2731,
            protein_g: 126,
            fat_g: 76,
            carb_g: 386,
        }
    }

    // ── Profile tests ───────────────────────────────────────────────

    #[tokio::test]
    async fn unknown_user_has_no_profile() {
        let db = test_db().await;
        assert!(db.get_profile("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn patch_creates_then_updates() {
        let db = test_db().await;
        db.apply_profile_patch("u1", &ProfilePatch::state(OnboardingState::AwaitGender))
            .await
            .unwrap();
        let p = db.get_profile("u1").await.unwrap().unwrap();
        assert_eq!(p, UserProfile::new("u1", OnboardingState::AwaitGender));

        db.apply_profile_patch(
            "u1",
            &ProfilePatch::state(OnboardingState::AwaitActivity).with_gender(Gender::Female),
        )
        .await
        .unwrap();
        let p = db.get_profile("u1").await.unwrap().unwrap();
        assert_eq!(p.state, OnboardingState::AwaitActivity);
        assert_eq!(p.gender, Some(Gender::Female));
        assert_eq!(p.activity, None);
    }

    #[tokio::test]
    async fn patch_leaves_untouched_fields_alone() {
        let db = test_db().await;
        db.apply_profile_patch(
            "u1",
            &ProfilePatch::state(OnboardingState::AwaitWeight)
                .with_gender(Gender::Male)
                .with_activity(Activity::High)
                .with_age(33),
        )
        .await
        .unwrap();
        db.apply_profile_patch("u1", &ProfilePatch::default().with_weight(72.5))
            .await
            .unwrap();

        let p = db.get_profile("u1").await.unwrap().unwrap();
        assert_eq!(p.state, OnboardingState::AwaitWeight);
        assert_eq!(p.gender, Some(Gender::Male));
        assert_eq!(p.activity, Some(Activity::High));
        assert_eq!(p.age, Some(33));
        assert_eq!(p.weight, Some(72.5));
    }

    #[tokio::test]
    async fn stored_patches_match_in_memory_apply() {
        let db = test_db().await;
        let patches = [
            ProfilePatch::state(OnboardingState::AwaitGender),
            ProfilePatch::state(OnboardingState::AwaitActivity).with_gender(Gender::Female),
            ProfilePatch::state(OnboardingState::AwaitAge).with_activity(Activity::Low),
            ProfilePatch::default().with_age(41),
            ProfilePatch::state(OnboardingState::Done)
                .with_weight(61.0)
                .with_height(168.0)
                .with_goals(goals()),
            ProfilePatch::reset(),
        ];

        let mut expected = UserProfile::new("u1", OnboardingState::New);
        for patch in &patches {
            db.apply_profile_patch("u1", patch).await.unwrap();
            expected.apply(patch);
            assert_eq!(db.get_profile("u1").await.unwrap().unwrap(), expected, "after {patch:?}");
        }
    }

    #[tokio::test]
    async fn goals_round_trip_and_reset_clears() {
        let db = test_db().await;
        db.apply_profile_patch(
            "u1",
            &ProfilePatch::state(OnboardingState::Done)
                .with_gender(Gender::Male)
                .with_activity(Activity::Mid)
                .with_age(25)
                .with_weight(70.0)
                .with_height(175.0)
                .with_goals(goals()),
        )
        .await
        .unwrap();
        let p = db.get_profile("u1").await.unwrap().unwrap();
        assert!(p.is_done());
        assert_eq!(p.goals, Some(goals()));

        db.apply_profile_patch("u1", &ProfilePatch::reset()).await.unwrap();
        let p = db.get_profile("u1").await.unwrap().unwrap();
        assert_eq!(p, UserProfile::new("u1", OnboardingState::AwaitGender));
    }

    #[tokio::test]
    async fn empty_patch_does_not_create_profile() {
        let db = test_db().await;
        db.apply_profile_patch("u1", &ProfilePatch::default()).await.unwrap();
        assert!(db.get_profile("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unrecognized_activity_reads_as_unknown() {
        let db = test_db().await;
        db.apply_profile_patch("u1", &ProfilePatch::state(OnboardingState::AwaitAge))
            .await
            .unwrap();
        db.conn()
            .execute("UPDATE users SET activity = 'extreme' WHERE user_id = 'u1'", ())
            .await
            .unwrap();
        let p = db.get_profile("u1").await.unwrap().unwrap();
        assert_eq!(p.activity, Some(Activity::Unknown));
    }

    #[tokio::test]
    async fn corrupt_state_is_a_serialization_error() {
        let db = test_db().await;
        db.conn()
            .execute("INSERT INTO users (user_id, state) VALUES ('u1', 'bogus')", ())
            .await
            .unwrap();
        let err = db.get_profile("u1").await.unwrap_err();
        assert!(matches!(err, DatabaseError::Serialization(_)));
    }

    // ── Intake tests ────────────────────────────────────────────────

    #[tokio::test]
    async fn intake_accumulates_per_day() {
        let db = test_db().await;
        let day = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        assert!(db.get_intake("u1", day).await.unwrap().is_none());

        db.add_intake("u1", day, &Macros::new(34.5, 5.4, 0.0)).await.unwrap();
        db.add_intake("u1", day, &Macros::new(2.5, 0.3, 28.0)).await.unwrap();

        let record = db.get_intake("u1", day).await.unwrap().unwrap();
        assert_eq!(record.date, day);
        assert!((record.totals.protein_g - 37.0).abs() < 1e-9);
        assert!((record.totals.fat_g - 5.7).abs() < 1e-9);
        assert!((record.totals.carb_g - 28.0).abs() < 1e-9);

        let next = day.succ_opt().unwrap();
        assert!(db.get_intake("u1", next).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_intake_adds_are_not_lost() {
        let db = Arc::new(test_db().await);
        let day = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();

        let mut handles = Vec::new();
        for _ in 0..20 {
            let db = Arc::clone(&db);
            handles.push(tokio::spawn(async move {
                db.add_intake("u1", day, &Macros::new(1.0, 0.5, 2.0)).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let totals = db.get_intake("u1", day).await.unwrap().unwrap().totals;
        assert!((totals.protein_g - 20.0).abs() < 1e-9);
        assert!((totals.fat_g - 10.0).abs() < 1e-9);
        assert!((totals.carb_g - 40.0).abs() < 1e-9);
    }
}

//! Intake ledger: additive per-user, per-day macro totals.

use std::ops::Add;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::DatabaseError;
use crate::onboarding::model::Goals;
use crate::store::Database;

/// Protein, fat and carbohydrate amounts in grams.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Macros {
    pub protein_g: f64,
    pub fat_g: f64,
    pub carb_g: f64,
}

impl Macros {
    pub fn new(protein_g: f64, fat_g: f64, carb_g: f64) -> Self {
        Self {
            protein_g,
            fat_g,
            carb_g,
        }
    }

    /// All components finite and non-negative.
    pub fn is_valid_delta(&self) -> bool {
        [self.protein_g, self.fat_g, self.carb_g]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0)
    }
}

impl Add for Macros {
    type Output = Macros;

    fn add(self, rhs: Macros) -> Macros {
        Macros {
            protein_g: self.protein_g + rhs.protein_g,
            fat_g: self.fat_g + rhs.fat_g,
            carb_g: self.carb_g + rhs.carb_g,
        }
    }
}

/// One user's totals for one calendar day.
#[derive(Debug, Clone, PartialEq)]
pub struct IntakeRecord {
    pub user_id: String,
    pub date: NaiveDate,
    pub totals: Macros,
}

/// What is left to eat today: `max(0, goal - consumed)` per macro.
pub fn remaining(goals: &Goals, consumed: &Macros) -> Macros {
    Macros {
        protein_g: (goals.protein_g as f64 - consumed.protein_g).max(0.0),
        fat_g: (goals.fat_g as f64 - consumed.fat_g).max(0.0),
        carb_g: (goals.carb_g as f64 - consumed.carb_g).max(0.0),
    }
}

/// Accumulates consumed macros. The only writer of intake records.
#[derive(Clone)]
pub struct IntakeLedger {
    db: Arc<dyn Database>,
}

impl IntakeLedger {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    /// Add `delta` to the user's totals for `date`, creating the record if
    /// this is the first food of the day.
    pub async fn record(
        &self,
        user_id: &str,
        date: NaiveDate,
        delta: Macros,
    ) -> Result<(), DatabaseError> {
        if !delta.is_valid_delta() {
            return Err(DatabaseError::Constraint(format!(
                "intake delta must be finite and non-negative, got {delta:?}"
            )));
        }
        self.db.add_intake(user_id, date, &delta).await
    }

    /// Totals for `date`, or zeros if nothing was logged.
    pub async fn totals_for(&self, user_id: &str, date: NaiveDate) -> Result<Macros, DatabaseError> {
        Ok(self
            .db
            .get_intake(user_id, date)
            .await?
            .map(|r| r.totals)
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LibSqlBackend;

    async fn test_ledger() -> IntakeLedger {
        IntakeLedger::new(Arc::new(LibSqlBackend::new_memory().await.unwrap()))
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn assert_close(a: Macros, b: Macros) {
        assert!((a.protein_g - b.protein_g).abs() < 1e-9, "{a:?} vs {b:?}");
        assert!((a.fat_g - b.fat_g).abs() < 1e-9, "{a:?} vs {b:?}");
        assert!((a.carb_g - b.carb_g).abs() < 1e-9, "{a:?} vs {b:?}");
    }

    #[tokio::test]
    async fn totals_default_to_zero() {
        let ledger = test_ledger().await;
        let totals = ledger.totals_for("nobody", day(1)).await.unwrap();
        assert_eq!(totals, Macros::default());
    }

    #[tokio::test]
    async fn record_is_additive() {
        let split = test_ledger().await;
        split.record("u1", day(1), Macros::new(10.5, 2.0, 30.0)).await.unwrap();
        split.record("u1", day(1), Macros::new(4.25, 1.5, 0.0)).await.unwrap();

        let once = test_ledger().await;
        once.record("u1", day(1), Macros::new(14.75, 3.5, 30.0)).await.unwrap();

        assert_close(
            split.totals_for("u1", day(1)).await.unwrap(),
            once.totals_for("u1", day(1)).await.unwrap(),
        );
    }

    #[tokio::test]
    async fn days_and_users_are_separate() {
        let ledger = test_ledger().await;
        ledger.record("u1", day(1), Macros::new(1.0, 1.0, 1.0)).await.unwrap();
        ledger.record("u1", day(2), Macros::new(2.0, 2.0, 2.0)).await.unwrap();
        ledger.record("u2", day(1), Macros::new(5.0, 5.0, 5.0)).await.unwrap();

        assert_close(ledger.totals_for("u1", day(1)).await.unwrap(), Macros::new(1.0, 1.0, 1.0));
        assert_close(ledger.totals_for("u1", day(2)).await.unwrap(), Macros::new(2.0, 2.0, 2.0));
        assert_close(ledger.totals_for("u2", day(1)).await.unwrap(), Macros::new(5.0, 5.0, 5.0));
        assert_eq!(ledger.totals_for("u2", day(2)).await.unwrap(), Macros::default());
    }

    #[tokio::test]
    async fn negative_delta_is_rejected_and_totals_unchanged() {
        let ledger = test_ledger().await;
        ledger.record("u1", day(1), Macros::new(10.0, 10.0, 10.0)).await.unwrap();
        let err = ledger
            .record("u1", day(1), Macros::new(-5.0, 0.0, 0.0))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Constraint(_)));
        assert!(ledger.record("u1", day(1), Macros::new(f64::NAN, 0.0, 0.0)).await.is_err());
        assert_close(ledger.totals_for("u1", day(1)).await.unwrap(), Macros::new(10.0, 10.0, 10.0));
    }

    #[test]
    fn remaining_clamps_at_zero() {
        let goals = Goals {
            calories: 2000,
            protein_g: 100,
            fat_g: 60,
            carb_g: -20,
        };
        let left = remaining(&goals, &Macros::new(40.0, 75.0, 5.0));
        assert_eq!(left, Macros::new(60.0, 0.0, 0.0));
    }

    #[test]
    fn macros_add() {
        let sum = Macros::new(1.0, 2.0, 3.0) + Macros::new(0.5, 0.5, 0.5);
        assert_eq!(sum, Macros::new(1.5, 2.5, 3.5));
    }
}

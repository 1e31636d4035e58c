//! Origin data source for meals, strength workouts and goals.
//!
//! The gate treats the ledger as a black box that can answer "records for this
//! identity between two instants". Persistence is not this crate's concern;
//! [`MemoryLedger`] backs the binary and the tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::auth::Identity;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meal {
    pub description: String,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub logged_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrengthWorkout {
    pub exercise: String,
    pub sets: u32,
    pub reps: u32,
    pub weight: f64,
    pub logged_at: DateTime<Utc>,
}

impl StrengthWorkout {
    pub fn volume(&self) -> f64 {
        f64::from(self.sets) * f64::from(self.reps) * self.weight
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Goals {
    pub daily_calories_target: f64,
    pub daily_protein_target: f64,
    pub weekly_volume_target: f64,
}

#[async_trait]
pub trait FitnessLedger: Send + Sync {
    /// Every meal logged by `identity`, newest first.
    async fn meals(&self, identity: &Identity) -> Result<Vec<Meal>>;

    /// Meals logged in `[start, end)`, oldest first.
    async fn meals_between(&self, identity: &Identity, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Meal>>;

    /// Workouts logged in `[start, end)`, oldest first.
    async fn workouts_between(
        &self,
        identity: &Identity,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<StrengthWorkout>>;

    async fn goals(&self, identity: &Identity) -> Result<Option<Goals>>;

    async fn record_meal(&self, identity: &Identity, meal: Meal) -> Result<()>;

    async fn record_workout(&self, identity: &Identity, workout: StrengthWorkout) -> Result<()>;

    async fn set_goals(&self, identity: &Identity, goals: Goals) -> Result<()>;
}

#[derive(Debug, Default)]
struct UserRecords {
    meals: Vec<Meal>,
    workouts: Vec<StrengthWorkout>,
    goals: Option<Goals>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    users: Arc<RwLock<HashMap<String, UserRecords>>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

fn within(at: &DateTime<Utc>, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    *at >= start && *at < end
}

#[async_trait]
impl FitnessLedger for MemoryLedger {
    async fn meals(&self, identity: &Identity) -> Result<Vec<Meal>> {
        let users = self.users.read().await;
        // Reversed before the stable sort so equal timestamps keep the latest insert first
        let mut meals: Vec<Meal> = users
            .get(identity.as_str())
            .map(|records| records.meals.iter().rev().cloned().collect())
            .unwrap_or_default();
        meals.sort_by(|a, b| b.logged_at.cmp(&a.logged_at));
        Ok(meals)
    }

    async fn meals_between(&self, identity: &Identity, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Meal>> {
        let users = self.users.read().await;
        let mut meals: Vec<Meal> = users
            .get(identity.as_str())
            .map(|records| {
                records
                    .meals
                    .iter()
                    .filter(|m| within(&m.logged_at, start, end))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        meals.sort_by_key(|m| m.logged_at);
        Ok(meals)
    }

    async fn workouts_between(
        &self,
        identity: &Identity,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<StrengthWorkout>> {
        let users = self.users.read().await;
        let mut workouts: Vec<StrengthWorkout> = users
            .get(identity.as_str())
            .map(|records| {
                records
                    .workouts
                    .iter()
                    .filter(|w| within(&w.logged_at, start, end))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        workouts.sort_by_key(|w| w.logged_at);
        Ok(workouts)
    }

    async fn goals(&self, identity: &Identity) -> Result<Option<Goals>> {
        let users = self.users.read().await;
        Ok(users.get(identity.as_str()).and_then(|records| records.goals))
    }

    async fn record_meal(&self, identity: &Identity, meal: Meal) -> Result<()> {
        let mut users = self.users.write().await;
        users.entry(identity.as_str().to_string()).or_default().meals.push(meal);
        Ok(())
    }

    async fn record_workout(&self, identity: &Identity, workout: StrengthWorkout) -> Result<()> {
        let mut users = self.users.write().await;
        users
            .entry(identity.as_str().to_string())
            .or_default()
            .workouts
            .push(workout);
        Ok(())
    }

    async fn set_goals(&self, identity: &Identity, goals: Goals) -> Result<()> {
        let mut users = self.users.write().await;
        users.entry(identity.as_str().to_string()).or_default().goals = Some(goals);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
    }

    fn meal(calories: f64, logged_at: DateTime<Utc>) -> Meal {
        Meal {
            description: "oats".into(),
            calories,
            protein: 10.0,
            carbs: 50.0,
            fat: 5.0,
            logged_at,
        }
    }

    #[tokio::test]
    async fn test_meals_filtered_by_range_and_identity() {
        let ledger = MemoryLedger::new();
        let alice = Identity::new("alice").unwrap();
        let bob = Identity::new("bob").unwrap();

        ledger.record_meal(&alice, meal(300.0, at(2, 8))).await.unwrap();
        ledger.record_meal(&alice, meal(200.0, at(1, 8))).await.unwrap();
        ledger.record_meal(&alice, meal(900.0, at(3, 0))).await.unwrap();
        ledger.record_meal(&bob, meal(100.0, at(1, 9))).await.unwrap();

        let meals = ledger.meals_between(&alice, at(1, 0), at(3, 0)).await.unwrap();
        let calories: Vec<f64> = meals.iter().map(|m| m.calories).collect();
        assert_eq!(calories, vec![200.0, 300.0]);
    }

    #[tokio::test]
    async fn test_meal_history_is_newest_first() {
        let ledger = MemoryLedger::new();
        let alice = Identity::new("alice").unwrap();
        let bob = Identity::new("bob").unwrap();

        ledger.record_meal(&alice, meal(300.0, at(2, 8))).await.unwrap();
        ledger.record_meal(&alice, meal(200.0, at(1, 8))).await.unwrap();
        ledger.record_meal(&alice, meal(900.0, at(3, 0))).await.unwrap();
        ledger.record_meal(&bob, meal(100.0, at(1, 9))).await.unwrap();

        let calories: Vec<f64> = ledger
            .meals(&alice)
            .await
            .unwrap()
            .iter()
            .map(|m| m.calories)
            .collect();
        assert_eq!(calories, vec![900.0, 300.0, 200.0]);
        assert!(ledger.meals(&Identity::new("carol").unwrap()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_goals_overwrite() {
        let ledger = MemoryLedger::new();
        let alice = Identity::new("alice").unwrap();
        assert!(ledger.goals(&alice).await.unwrap().is_none());

        let goals = Goals {
            daily_calories_target: 2500.0,
            daily_protein_target: 180.0,
            weekly_volume_target: 40_000.0,
        };
        ledger.set_goals(&alice, goals).await.unwrap();
        ledger.set_goals(&alice, Goals { daily_calories_target: 2000.0, ..goals }).await.unwrap();

        assert_eq!(ledger.goals(&alice).await.unwrap().unwrap().daily_calories_target, 2000.0);
    }

    #[test]
    fn test_workout_volume() {
        let workout = StrengthWorkout {
            exercise: "squat".into(),
            sets: 5,
            reps: 5,
            weight: 100.0,
            logged_at: at(1, 0),
        };
        assert_eq!(workout.volume(), 2500.0);
    }
}

//! Daily and weekly aggregations over the ledger.

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::Identity;
use crate::error::{GateError, Result};
use crate::ledger::{FitnessLedger, Goals, Meal, StrengthWorkout};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeeklyTotals {
    pub calories: f64,
    pub protein: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeeklyGoals {
    pub weekly_calories: f64,
    pub weekly_protein: f64,
    pub weekly_volume: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklySummary {
    pub days: Vec<String>,
    pub calories: Vec<f64>,
    pub protein: Vec<f64>,
    pub volume: Vec<f64>,
    pub weekly_totals: WeeklyTotals,
    pub goals: WeeklyGoals,
    pub progress_percent: WeeklyTotals,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyTotals {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub total_sets: u64,
    pub total_reps: u64,
    pub total_volume: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MealTotals {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

/// One day's meals, oldest first, with their nutrition totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayMeals {
    pub meals: Vec<Meal>,
    pub summary: MealTotals,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkoutEntry {
    #[serde(flatten)]
    pub workout: StrengthWorkout,
    pub volume: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyDashboard {
    pub meals: Vec<Meal>,
    pub workouts: Vec<WorkoutEntry>,
    pub summary: DailyTotals,
}

/// Monday of the week containing `date`.
pub fn week_start_of(date: NaiveDate) -> NaiveDate {
    let offset = u64::from(date.weekday().num_days_from_monday());
    date.checked_sub_days(Days::new(offset)).unwrap_or(date)
}

pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::default()))
}

fn next_day(date: NaiveDate) -> Result<NaiveDate> {
    date.checked_add_days(Days::new(1))
        .ok_or_else(|| GateError::InvalidRequest(format!("date out of range: {}", date)))
}

fn percent(actual: f64, goal: f64) -> f64 {
    if goal > 0.0 {
        actual / goal * 100.0
    } else {
        0.0
    }
}

impl WeeklySummary {
    /// Aggregate seven days starting at `week_start` from records already
    /// restricted to that week.
    pub fn build(
        week_start: NaiveDate,
        meals: &[Meal],
        workouts: &[StrengthWorkout],
        goals: Option<&Goals>,
    ) -> Result<Self> {
        let mut summary = WeeklySummary {
            days: Vec::with_capacity(7),
            calories: Vec::with_capacity(7),
            protein: Vec::with_capacity(7),
            volume: Vec::with_capacity(7),
            weekly_totals: WeeklyTotals::default(),
            goals: WeeklyGoals::default(),
            progress_percent: WeeklyTotals::default(),
        };

        let mut day = week_start;
        for _ in 0..7 {
            let next = next_day(day)?;
            let (start, end) = (start_of_day(day), start_of_day(next));
            let in_day = |at: &DateTime<Utc>| *at >= start && *at < end;

            let (calories, protein) = meals
                .iter()
                .filter(|m| in_day(&m.logged_at))
                .fold((0.0, 0.0), |(c, p), m| (c + m.calories, p + m.protein));
            let volume: f64 = workouts
                .iter()
                .filter(|w| in_day(&w.logged_at))
                .map(StrengthWorkout::volume)
                .sum();

            summary.days.push(day.format(DATE_FORMAT).to_string());
            summary.calories.push(calories);
            summary.protein.push(protein);
            summary.volume.push(volume);

            summary.weekly_totals.calories += calories;
            summary.weekly_totals.protein += protein;
            summary.weekly_totals.volume += volume;

            day = next;
        }

        let goals = goals.copied().unwrap_or_default();
        summary.goals = WeeklyGoals {
            weekly_calories: goals.daily_calories_target * 7.0,
            weekly_protein: goals.daily_protein_target * 7.0,
            weekly_volume: goals.weekly_volume_target,
        };
        summary.progress_percent = WeeklyTotals {
            calories: percent(summary.weekly_totals.calories, summary.goals.weekly_calories),
            protein: percent(summary.weekly_totals.protein, summary.goals.weekly_protein),
            volume: percent(summary.weekly_totals.volume, summary.goals.weekly_volume),
        };

        Ok(summary)
    }

    /// Query the ledger for the week and aggregate it.
    pub async fn compute(ledger: &dyn FitnessLedger, identity: &Identity, week_start: NaiveDate) -> Result<Self> {
        let week_end = week_start
            .checked_add_days(Days::new(7))
            .ok_or_else(|| GateError::InvalidRequest(format!("date out of range: {}", week_start)))?;
        let (start, end) = (start_of_day(week_start), start_of_day(week_end));

        let meals = ledger.meals_between(identity, start, end).await?;
        let workouts = ledger.workouts_between(identity, start, end).await?;
        let goals = ledger.goals(identity).await?;

        Self::build(week_start, &meals, &workouts, goals.as_ref())
    }
}

impl DayMeals {
    pub async fn compute(ledger: &dyn FitnessLedger, identity: &Identity, date: NaiveDate) -> Result<Self> {
        let (start, end) = (start_of_day(date), start_of_day(next_day(date)?));
        let meals = ledger.meals_between(identity, start, end).await?;

        let summary = meals.iter().fold(MealTotals::default(), |acc, meal| MealTotals {
            calories: acc.calories + meal.calories,
            protein: acc.protein + meal.protein,
            carbs: acc.carbs + meal.carbs,
            fat: acc.fat + meal.fat,
        });

        Ok(Self { meals, summary })
    }
}

impl DailyDashboard {
    pub async fn compute(ledger: &dyn FitnessLedger, identity: &Identity, date: NaiveDate) -> Result<Self> {
        let (start, end) = (start_of_day(date), start_of_day(next_day(date)?));

        let meals = ledger.meals_between(identity, start, end).await?;
        let workouts = ledger.workouts_between(identity, start, end).await?;

        let mut summary = DailyTotals::default();
        for meal in &meals {
            summary.calories += meal.calories;
            summary.protein += meal.protein;
            summary.carbs += meal.carbs;
            summary.fat += meal.fat;
        }

        let workouts: Vec<WorkoutEntry> = workouts
            .into_iter()
            .map(|workout| {
                let volume = workout.volume();
                let reps = u64::from(workout.sets) * u64::from(workout.reps);
                summary.total_sets = summary.total_sets.saturating_add(u64::from(workout.sets));
                summary.total_reps = summary.total_reps.saturating_add(reps);
                summary.total_volume += volume;
                WorkoutEntry { workout, volume }
            })
            .collect();

        Ok(Self {
            meals,
            workouts,
            summary,
        })
    }
}

use axum::{
    extract::{Query, State},
    http::{HeaderName, HeaderValue, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::error::Result;
use crate::gate::{Caller, Gate};
use crate::health::HealthChecker;
use crate::ledger::{FitnessLedger, Goals, Meal, StrengthWorkout};
use crate::response::{MessageResponse, MetricsResponse};
use crate::summary::{DailyDashboard, DayMeals, WeeklySummary, DATE_FORMAT};
use crate::validation::RequestValidator;

pub const CACHE_STATUS_HEADER: HeaderName = HeaderName::from_static("x-cache");

/// Shared application state
pub type SharedState = Arc<AppState>;

/// Gate plus the collaborators behind it
pub struct AppState {
    pub gate: Gate,
    pub ledger: Arc<dyn FitnessLedger>,
    pub health: HealthChecker,
}

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WeekQuery {
    pub start: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LogMealRequest {
    #[validate(length(min = 1, max = 200))]
    pub description: String,
    #[validate(range(min = 0.0))]
    pub calories: f64,
    #[validate(range(min = 0.0))]
    #[serde(default)]
    pub protein: f64,
    #[validate(range(min = 0.0))]
    #[serde(default)]
    pub carbs: f64,
    #[validate(range(min = 0.0))]
    #[serde(default)]
    pub fat: f64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LogStrengthRequest {
    #[validate(length(min = 1, max = 100))]
    pub exercise: String,
    #[validate(range(min = 1, max = 100))]
    pub sets: u32,
    #[validate(range(min = 1, max = 1000))]
    pub reps: u32,
    #[validate(range(min = 0.0))]
    pub weight: f64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetGoalsRequest {
    #[validate(range(min = 0.0))]
    pub daily_calories_target: f64,
    #[validate(range(min = 0.0))]
    pub daily_protein_target: f64,
    #[validate(range(min = 0.0))]
    pub weekly_volume_target: f64,
}

/// Liveness check
pub async fn ping() -> &'static str {
    "pong"
}

/// Health check endpoint
pub async fn health_check(State(state): State<SharedState>) -> impl IntoResponse {
    let status = state.health.check_health().await;
    let code = if status.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(status))
}

/// Per-route gate counters for this process
pub async fn metrics(State(state): State<SharedState>) -> impl IntoResponse {
    let collector = state.gate.metrics();
    Json(MetricsResponse {
        totals: collector.totals().await,
        routes: collector.all_metrics().await,
    })
}

pub async fn profile(Extension(caller): Extension<Caller>) -> impl IntoResponse {
    Json(MessageResponse::new(format!(
        "Hello, {}! This is your profile.",
        caller.identity()
    )))
}

/// Weekly summary, served through the aggregation cache
pub async fn weekly_dashboard(
    State(state): State<SharedState>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<WeekQuery>,
) -> Result<impl IntoResponse> {
    let week_start = RequestValidator::week_start(query.start.as_deref(), Utc::now().date_naive())?;
    let period = week_start.format(DATE_FORMAT).to_string();

    let ledger = state.ledger.clone();
    let identity = caller.identity().clone();
    let fetched = state
        .gate
        .cached(&caller, &period, move || async move {
            WeeklySummary::compute(ledger.as_ref(), &identity, week_start).await
        })
        .await?;

    let mut response = Json(fetched.value).into_response();
    response.headers_mut().insert(
        CACHE_STATUS_HEADER,
        HeaderValue::from_static(fetched.status.as_str()),
    );
    Ok(response)
}

/// Single-day dashboard; cheap enough to compute on every request
pub async fn daily_dashboard(
    State(state): State<SharedState>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<DateQuery>,
) -> Result<impl IntoResponse> {
    let date = RequestValidator::parse_date(query.date.as_deref(), Utc::now().date_naive())?;
    let dashboard = DailyDashboard::compute(state.ledger.as_ref(), caller.identity(), date).await?;
    Ok(Json(dashboard))
}

/// Full meal history, newest first
pub async fn list_meals(
    State(state): State<SharedState>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse> {
    let meals = state.ledger.meals(caller.identity()).await?;
    Ok(Json(meals))
}

/// Today's meals with their nutrition totals
pub async fn today_meals(
    State(state): State<SharedState>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse> {
    let today = Utc::now().date_naive();
    let day = DayMeals::compute(state.ledger.as_ref(), caller.identity(), today).await?;
    Ok(Json(day))
}

pub async fn log_calories(
    State(state): State<SharedState>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<LogMealRequest>,
) -> Result<impl IntoResponse> {
    RequestValidator::validate_payload(&payload)?;

    let meal = Meal {
        description: payload.description,
        calories: payload.calories,
        protein: payload.protein,
        carbs: payload.carbs,
        fat: payload.fat,
        logged_at: Utc::now(),
    };
    state.ledger.record_meal(caller.identity(), meal).await?;

    Ok((StatusCode::CREATED, Json(MessageResponse::new("Meal logged"))))
}

pub async fn log_strength(
    State(state): State<SharedState>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<LogStrengthRequest>,
) -> Result<impl IntoResponse> {
    RequestValidator::validate_payload(&payload)?;

    let workout = StrengthWorkout {
        exercise: payload.exercise,
        sets: payload.sets,
        reps: payload.reps,
        weight: payload.weight,
        logged_at: Utc::now(),
    };
    state.ledger.record_workout(caller.identity(), workout).await?;

    Ok((StatusCode::CREATED, Json(MessageResponse::new("Workout logged"))))
}

pub async fn get_goals(
    State(state): State<SharedState>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse> {
    let goals = state.ledger.goals(caller.identity()).await?.unwrap_or_default();
    Ok(Json(goals))
}

pub async fn set_goals(
    State(state): State<SharedState>,
    Extension(caller): Extension<Caller>,
    Json(payload): Json<SetGoalsRequest>,
) -> Result<impl IntoResponse> {
    RequestValidator::validate_payload(&payload)?;

    let goals = Goals {
        daily_calories_target: payload.daily_calories_target,
        daily_protein_target: payload.daily_protein_target,
        weekly_volume_target: payload.weekly_volume_target,
    };
    state.ledger.set_goals(caller.identity(), goals).await?;

    Ok(Json(goals))
}

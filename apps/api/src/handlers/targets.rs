use super::*;

use chrono::Utc;
use drivelane_application::ManualAssignment;
use drivelane_core::AppError;
use drivelane_domain::ServiceRecord;

use crate::dto::{
    AdvisorAchievementQuery, AdvisorAchievementResponse, AdvisorTargetResponse,
    CityAchievementQuery, CityAchievementResponse, CityMonthQuery, CityTargetResponse,
    DistributeTargetRequest, IngestReportResponse, IngestServiceRecordsRequest,
    ManualDistributionRequest, SaveCityTargetRequest,
};

pub async fn save_city_target_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Json(payload): Json<SaveCityTargetRequest>,
) -> ApiResult<Json<CityTargetResponse>> {
    let month = payload.month.parse::<MonthKey>()?;
    let target = state
        .target_service
        .set_city_target(&user, payload.city.as_str(), month, payload.metrics)
        .await?;

    Ok(Json(CityTargetResponse::from(target)))
}

pub async fn city_target_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Query(query): Query<CityMonthQuery>,
) -> ApiResult<Json<CityTargetResponse>> {
    let month = query.month.parse::<MonthKey>()?;
    let target = state
        .target_service
        .city_target(&user, query.city.as_str(), month)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "city '{}' has no target for {month}",
                query.city
            ))
        })?;

    Ok(Json(CityTargetResponse::from(target)))
}

pub async fn distribute_automatic_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Json(payload): Json<DistributeTargetRequest>,
) -> ApiResult<Json<Vec<AdvisorTargetResponse>>> {
    let month = payload.month.parse::<MonthKey>()?;
    let targets = state
        .target_service
        .distribute_automatic(&user, payload.city.as_str(), month, &payload.advisors)
        .await?
        .into_iter()
        .map(AdvisorTargetResponse::from)
        .collect();

    Ok(Json(targets))
}

pub async fn distribute_manual_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Json(payload): Json<ManualDistributionRequest>,
) -> ApiResult<Json<Vec<AdvisorTargetResponse>>> {
    let month = payload.month.parse::<MonthKey>()?;
    let assignments = payload
        .assignments
        .into_iter()
        .map(|assignment| ManualAssignment {
            advisor: assignment.advisor,
            metrics: assignment.metrics,
        })
        .collect();

    let targets = state
        .target_service
        .distribute_manual(
            &user,
            payload.city.as_str(),
            month,
            &payload.roster,
            assignments,
        )
        .await?
        .into_iter()
        .map(AdvisorTargetResponse::from)
        .collect();

    Ok(Json(targets))
}

pub async fn advisor_targets_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Query(query): Query<CityMonthQuery>,
) -> ApiResult<Json<Vec<AdvisorTargetResponse>>> {
    let month = query.month.parse::<MonthKey>()?;
    let targets = state
        .target_service
        .advisor_targets(&user, query.city.as_str(), month)
        .await?
        .into_iter()
        .map(AdvisorTargetResponse::from)
        .collect();

    Ok(Json(targets))
}

pub async fn ingest_service_records_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Json(payload): Json<IngestServiceRecordsRequest>,
) -> ApiResult<(StatusCode, Json<IngestReportResponse>)> {
    let records = payload
        .records
        .into_iter()
        .map(|record| {
            ServiceRecord::new(
                record.advisor,
                record.city,
                record.work_type.as_str(),
                record.labour_amount,
                record.parts_amount,
                record.closed_on,
            )
        })
        .collect::<Result<Vec<_>, _>>()?;

    let stored = state
        .target_service
        .ingest_service_records(&user, records)
        .await?;

    Ok((StatusCode::CREATED, Json(IngestReportResponse { stored })))
}

pub async fn advisor_achievement_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Query(query): Query<AdvisorAchievementQuery>,
) -> ApiResult<Json<AdvisorAchievementResponse>> {
    let month = query.month.parse::<MonthKey>()?;
    let as_of = query.as_of.unwrap_or_else(|| Utc::now().date_naive());

    let achievement = state
        .target_service
        .advisor_achievement(&user, query.advisor.as_str(), month, as_of)
        .await?;

    Ok(Json(AdvisorAchievementResponse::from(achievement)))
}

pub async fn city_achievement_handler(
    State(state): State<AppState>,
    Extension(user): Extension<UserIdentity>,
    Query(query): Query<CityAchievementQuery>,
) -> ApiResult<Json<CityAchievementResponse>> {
    let month = query.month.parse::<MonthKey>()?;
    let as_of = query.as_of.unwrap_or_else(|| Utc::now().date_naive());

    let achievement = state
        .target_service
        .city_achievement(&user, query.city.as_str(), month, as_of)
        .await?;

    Ok(Json(CityAchievementResponse::from(achievement)))
}

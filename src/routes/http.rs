//! HTTP endpoint handlers. These are thin wrappers that forward to the
//! report store. Each handler is instrumented and logs basic result info.
//!
//! Rejections (missing identity, out-of-range step) come back as 400 with a
//! user-facing message; collaborator failures come back as 502 with the same
//! shape. Nothing here panics or drops the process.

use std::sync::Arc;

use axum::{
  extract::{Query, State},
  http::StatusCode,
  response::IntoResponse,
  Json,
};
use tracing::{info, instrument, warn};

use crate::protocol::*;
use crate::domain::StudentIdentity;
use crate::store::ReportStore;

fn reject(status: StatusCode, message: impl Into<String>) -> axum::response::Response {
  (status, Json(ErrorOut { ok: false, message: message.into() })).into_response()
}

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse {
  Json(HealthOut { ok: true })
}

#[instrument(level = "info", skip(store))]
pub async fn http_get_steps(State(store): State<Arc<ReportStore>>) -> impl IntoResponse {
  Json(store.catalog.clone())
}

#[instrument(level = "info", skip(store, body), fields(student = %body.identity.key(), step = body.step, answer_len = body.answer.len()))]
pub async fn http_post_answer(
  State(store): State<Arc<ReportStore>>,
  Json(body): Json<AnswerIn>,
) -> impl IntoResponse {
  match store.set_answer(&body.identity, body.step, &body.answer).await {
    Ok((completed, updated_at)) => {
      info!(target: "report", student = %body.identity.key(), step = body.step, completed, "HTTP answer saved");
      Json(AnswerOut { ok: true, completed, updated_at }).into_response()
    }
    Err(message) => reject(StatusCode::BAD_REQUEST, message),
  }
}

#[instrument(level = "info", skip(store), fields(student = %q.key()))]
pub async fn http_get_record(
  State(store): State<Arc<ReportStore>>,
  Query(q): Query<StudentIdentity>,
) -> impl IntoResponse {
  if q.is_blank() {
    return reject(StatusCode::BAD_REQUEST, "학생 정보(학번과 이름)를 먼저 입력해주세요.");
  }
  let out = match store.submission(&q).await {
    Some(sub) => RecordOut::from_submission(&sub),
    None => RecordOut::empty_for(q),
  };
  Json(out).into_response()
}

#[instrument(level = "info", skip(store))]
pub async fn http_get_submissions(State(store): State<Arc<ReportStore>>) -> impl IntoResponse {
  let students: Vec<RecordOut> = store
    .list_submissions()
    .await
    .iter()
    .map(RecordOut::from_submission)
    .collect();
  info!(target: "report", count = students.len(), "HTTP submissions listed");
  Json(SubmissionsOut { ok: true, count: students.len(), students })
}

#[instrument(level = "info", skip(store), fields(student = %q.key()))]
pub async fn http_get_evaluation(
  State(store): State<Arc<ReportStore>>,
  Query(q): Query<StudentIdentity>,
) -> impl IntoResponse {
  match store.evaluate_student(&q).await {
    Ok(stored) => Json(stored).into_response(),
    Err(message) => reject(StatusCode::BAD_REQUEST, message),
  }
}

#[instrument(level = "info", skip(store))]
pub async fn http_post_refresh(State(store): State<Arc<ReportStore>>) -> impl IntoResponse {
  match store.refresh_from_sheet().await {
    Ok((fetched, merged, skipped)) => {
      info!(target: "report", fetched, merged, skipped, "HTTP refresh merged roster");
      Json(RefreshOut { ok: true, fetched, merged, skipped, message: None }).into_response()
    }
    Err(message) => {
      warn!(target: "report", %message, "HTTP refresh failed");
      reject(StatusCode::BAD_GATEWAY, message)
    }
  }
}

#[instrument(level = "info", skip(store, body), fields(step = body.step, answer_len = body.answer.len()))]
pub async fn http_post_advice(
  State(store): State<Arc<ReportStore>>,
  Json(body): Json<AdviceIn>,
) -> impl IntoResponse {
  let text = store.advice(body.step, &body.answer, &body.history).await;
  Json(AdviceOut { text })
}

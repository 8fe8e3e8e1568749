//! Application state: the report store.
//!
//! This module owns:
//!   - the per-student submission map (keyed by the composite identity)
//!   - the step catalog and advisor prompts
//!   - the persistence collaborator (write-through on every save)
//!   - optional OpenAI and sheet clients
//!
//! All mutation is serialized behind one async RwLock. Remote pushes and
//! fetches may race local edits; the only ordering guarantee is
//! last-write-wins by the `updatedAt` wall-clock timestamp.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{error, info, instrument, warn};

use crate::config::{load_config_from_env, Prompts};
use crate::domain::{StepDefinition, StudentIdentity, StudentSubmission, StepRecord, STEP_COUNT};
use crate::evaluate::evaluate;
use crate::ingest;
use crate::openai::OpenAI;
use crate::persist::{FileStore, KeyValueStore};
use crate::protocol::{ChatTurn, StoredEvaluation};
use crate::sheet::SheetClient;
use crate::steps::resolve_catalog;

/// Current wall-clock time as an ISO-8601 string (millisecond precision),
/// the format every `updatedAt` in the system carries.
pub fn now_iso() -> String {
  chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

#[derive(Clone)]
pub struct ReportStore {
  submissions: Arc<RwLock<HashMap<String, StudentSubmission>>>,
  pub catalog: Vec<StepDefinition>,
  pub prompts: Prompts,
  pub openai: Option<OpenAI>,
  pub sheet: Option<SheetClient>,
  persist: Arc<dyn KeyValueStore>,
}

impl ReportStore {
  /// Build state from env: load config, resolve the catalog, open the
  /// persistence file and hydrate from it, init optional clients.
  #[instrument(level = "info", skip_all)]
  pub fn new() -> Self {
    let cfg = load_config_from_env().unwrap_or_default();
    let catalog = resolve_catalog(&cfg.steps);
    let persist: Arc<dyn KeyValueStore> = Arc::new(FileStore::from_env());

    let mut store = Self::with_parts(catalog, cfg.prompts, persist);

    store.openai = OpenAI::from_env();
    if let Some(oa) = &store.openai {
      info!(target: "tamgu_backend", base_url = %oa.base_url, model = %oa.model, "OpenAI advisor enabled.");
    } else {
      info!(target: "tamgu_backend", "OpenAI advisor disabled (no OPENAI_API_KEY). Using local advice.");
    }

    store.sheet = SheetClient::from_env();
    if let Some(sheet) = &store.sheet {
      info!(target: "tamgu_backend", url = %sheet.url, "Sheet endpoint enabled.");
    } else {
      info!(target: "tamgu_backend", "Sheet endpoint disabled (no SHEET_ENDPOINT_URL). Local persistence only.");
    }

    store
  }

  /// Core constructor without env-driven collaborators; also the seam the
  /// tests use.
  pub fn with_parts(
    catalog: Vec<StepDefinition>,
    prompts: Prompts,
    persist: Arc<dyn KeyValueStore>,
  ) -> Self {
    let (submissions, skipped) = hydrate(persist.as_ref());
    info!(target: "report", loaded = submissions.len(), skipped, "Hydrated submissions from persistence");

    Self {
      submissions: Arc::new(RwLock::new(submissions)),
      catalog,
      prompts,
      openai: None,
      sheet: None,
      persist,
    }
  }

  pub fn step(&self, id: u8) -> Option<&StepDefinition> {
    self.catalog.iter().find(|s| s.id == id)
  }

  /// Upsert one answer for one student. Blank answers clear the step; the
  /// whole record is overwritten in persistence either way. Returns the
  /// new completed count and timestamp.
  ///
  /// The push to the remote sheet is fire-and-forget: its outcome never
  /// affects the local save.
  #[instrument(level = "info", skip(self, answer), fields(student = %identity.key(), step, answer_len = answer.len()))]
  pub async fn set_answer(
    &self,
    identity: &StudentIdentity,
    step: u8,
    answer: &str,
  ) -> Result<(usize, String), String> {
    if identity.is_blank() {
      return Err("학생 정보(학번과 이름)를 먼저 입력해주세요.".into());
    }
    if !(1..=STEP_COUNT).contains(&step) {
      return Err(format!("단계 번호는 1에서 9 사이여야 합니다: {}", step));
    }

    let snapshot = {
      let mut submissions = self.submissions.write().await;
      let sub = submissions.entry(identity.key()).or_insert_with(|| StudentSubmission {
        identity: identity.clone(),
        steps: StepRecord::new(),
        updated_at: String::new(),
      });
      sub.steps.set(step, answer);
      sub.updated_at = now_iso();
      sub.clone()
    };

    self.persist_submission(&snapshot);

    if let Some(sheet) = self.sheet.clone() {
      let identity = identity.clone();
      let answer = answer.to_string();
      tokio::spawn(async move {
        sheet.push_answer(&identity, step, &answer).await;
      });
    }

    Ok((snapshot.steps.completed_count(), snapshot.updated_at))
  }

  /// Current step record for a student; a student who never saved reads as
  /// an empty record.
  #[instrument(level = "debug", skip(self), fields(student = %identity.key()))]
  pub async fn record(&self, identity: &StudentIdentity) -> StepRecord {
    self
      .submissions
      .read()
      .await
      .get(&identity.key())
      .map(|s| s.steps.clone())
      .unwrap_or_default()
  }

  pub async fn submission(&self, identity: &StudentIdentity) -> Option<StudentSubmission> {
    self.submissions.read().await.get(&identity.key()).cloned()
  }

  /// All submissions, most recently updated first. The sort is stable, so
  /// ties keep their relative order within one call.
  #[instrument(level = "debug", skip(self))]
  pub async fn list_submissions(&self) -> Vec<StudentSubmission> {
    let mut all: Vec<StudentSubmission> =
      self.submissions.read().await.values().cloned().collect();
    all.sort_by_key(|s| std::cmp::Reverse(s.updated_at_epoch()));
    all
  }

  /// Evaluate one student's record and cache the result in persistence
  /// (best-effort, display hint only). An unknown student evaluates as an
  /// empty record, which is a valid zero-score outcome.
  #[instrument(level = "info", skip(self), fields(student = %identity.key()))]
  pub async fn evaluate_student(&self, identity: &StudentIdentity) -> Result<StoredEvaluation, String> {
    if identity.is_blank() {
      return Err("학생 정보(학번과 이름)를 먼저 입력해주세요.".into());
    }

    let record = self.record(identity).await;
    let result = evaluate(&record);
    info!(target: "report", student = %identity.key(), total = result.scores.total, "Evaluation computed");

    let stored = StoredEvaluation {
      identity: identity.clone(),
      result,
      evaluated_at: now_iso(),
    };
    match serde_json::to_string(&stored) {
      Ok(body) => {
        if let Err(e) = self.persist.set(&identity.evaluation_key(), &body) {
          warn!(target: "report", student = %identity.key(), error = %e, "Failed to cache evaluation");
        }
      }
      Err(e) => warn!(target: "report", error = %e, "Failed to serialize evaluation"),
    }
    Ok(stored)
  }

  /// Merge remotely fetched submissions under last-write-wins: an incoming
  /// record replaces the local one only when strictly newer, so a stale
  /// network response never clobbers a fresher local edit.
  #[instrument(level = "info", skip(self, incoming), fields(incoming = incoming.len()))]
  pub async fn merge_remote(&self, incoming: Vec<StudentSubmission>) -> usize {
    let mut merged = 0usize;
    let mut to_persist: Vec<StudentSubmission> = Vec::new();
    {
      let mut submissions = self.submissions.write().await;
      for sub in incoming {
        let key = sub.identity.key();
        let newer = submissions
          .get(&key)
          .map(|local| sub.updated_at_epoch() > local.updated_at_epoch())
          .unwrap_or(true);
        if newer {
          submissions.insert(key, sub.clone());
          to_persist.push(sub);
          merged += 1;
        }
      }
    }
    for sub in &to_persist {
      self.persist_submission(sub);
    }
    merged
  }

  /// Pull the roster from the sheet endpoint and merge it in.
  /// Returns (fetched, merged, skipped).
  #[instrument(level = "info", skip(self))]
  pub async fn refresh_from_sheet(&self) -> Result<(usize, usize, usize), String> {
    let sheet = self
      .sheet
      .as_ref()
      .ok_or_else(|| "원격 제출 서버가 설정되어 있지 않습니다.".to_string())?;
    let (submissions, skipped) = sheet.fetch_roster().await?;
    let fetched = submissions.len();
    let merged = self.merge_remote(submissions).await;
    Ok((fetched, merged, skipped))
  }

  /// Per-step writing advice: OpenAI when available, local stub otherwise.
  /// Independent of the evaluation engine by design.
  #[instrument(level = "info", skip(self, answer, history), fields(step, answer_len = answer.len()))]
  pub async fn advice(&self, step: u8, answer: &str, history: &[ChatTurn]) -> String {
    let Some(step_def) = self.step(step) else {
      return format!("알 수 없는 단계입니다: {}", step);
    };

    if let Some(oa) = &self.openai {
      match oa.step_advice(&self.prompts, step_def, answer, history).await {
        Ok(text) => return text,
        Err(e) => {
          error!(target: "report", step, error = %e, "OpenAI advice failed; using local advice.");
        }
      }
    }
    advice_stub(step_def, answer)
  }

  fn persist_submission(&self, sub: &StudentSubmission) {
    match serde_json::to_string(sub) {
      Ok(body) => {
        if let Err(e) = self.persist.set(&sub.identity.storage_key(), &body) {
          warn!(target: "report", student = %sub.identity.key(), error = %e, "Failed to persist submission");
        }
      }
      Err(e) => warn!(target: "report", error = %e, "Failed to serialize submission"),
    }
  }
}

/// Load every `student-` cell from persistence, skipping unreadable ones.
fn hydrate(persist: &dyn KeyValueStore) -> (HashMap<String, StudentSubmission>, usize) {
  let mut map = HashMap::new();
  let mut skipped = 0usize;
  for key in persist.keys_with_prefix("student-") {
    let parsed = persist
      .get(&key)
      .and_then(|raw| serde_json::from_str::<serde_json::Value>(&raw).ok())
      .and_then(|value| ingest::parse_submission(&value));
    match parsed {
      Some(sub) => {
        map.insert(sub.identity.key(), sub);
      }
      None => {
        warn!(target: "report", %key, "Skipping unreadable persisted submission");
        skipped += 1;
      }
    }
  }
  (map, skipped)
}

/// Offline fallback advice, built from the step's own guidance.
fn advice_stub(step: &StepDefinition, answer: &str) -> String {
  if answer.trim().is_empty() {
    format!("아직 작성된 내용이 없어요. {}", step.guide)
  } else {
    format!(
      "좋은 시작이에요! \"{}\" 단계에서는 이렇게 해보세요: {}",
      step.title, step.guide
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::steps::step_catalog;
  use std::collections::BTreeMap;
  use std::sync::Mutex;

  /// In-memory KeyValueStore standing in for the file store.
  #[derive(Default)]
  struct MemoryStore {
    cells: Mutex<BTreeMap<String, String>>,
  }

  impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
      self.cells.lock().expect("lock").get(key).cloned()
    }
    fn set(&self, key: &str, value: &str) -> Result<(), String> {
      self.cells.lock().expect("lock").insert(key.into(), value.into());
      Ok(())
    }
    fn remove(&self, key: &str) -> Result<(), String> {
      self.cells.lock().expect("lock").remove(key);
      Ok(())
    }
    fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
      self
        .cells
        .lock()
        .expect("lock")
        .keys()
        .filter(|k| k.starts_with(prefix))
        .cloned()
        .collect()
    }
  }

  fn test_store() -> ReportStore {
    ReportStore::with_parts(step_catalog(), Prompts::default(), Arc::new(MemoryStore::default()))
  }

  fn submission(id: &str, name: &str, step: u8, text: &str, updated_at: &str) -> StudentSubmission {
    let mut steps = StepRecord::new();
    steps.set(step, text);
    StudentSubmission {
      identity: StudentIdentity::new(id, name),
      steps,
      updated_at: updated_at.into(),
    }
  }

  #[tokio::test]
  async fn save_then_read_back() {
    let store = test_store();
    let who = StudentIdentity::new("101", "김철수");
    let (completed, updated_at) = store
      .set_answer(&who, 1, "물의 온도에 따른 얼음 어는 시간")
      .await
      .expect("save");
    assert_eq!(completed, 1);
    assert!(!updated_at.is_empty());

    let record = store.record(&who).await;
    assert_eq!(record.answer(1), "물의 온도에 따른 얼음 어는 시간");
    assert_eq!(record.answer(2), "");
  }

  #[tokio::test]
  async fn blank_identity_and_bad_step_are_rejected() {
    let store = test_store();
    let blank = StudentIdentity::new("  ", "김철수");
    assert!(store.set_answer(&blank, 1, "x").await.is_err());

    let who = StudentIdentity::new("101", "김철수");
    assert!(store.set_answer(&who, 0, "x").await.is_err());
    assert!(store.set_answer(&who, 10, "x").await.is_err());
    // Nothing was saved along the way.
    assert!(store.record(&who).await.is_empty());
  }

  #[tokio::test]
  async fn blank_answer_clears_the_step() {
    let store = test_store();
    let who = StudentIdentity::new("101", "김철수");
    store.set_answer(&who, 3, "가설").await.expect("save");
    let (completed, _) = store.set_answer(&who, 3, "   ").await.expect("clear");
    assert_eq!(completed, 0);
    assert_eq!(store.record(&who).await.answer(3), "");
  }

  #[tokio::test]
  async fn saves_are_written_through_and_hydrate_back() {
    let persist = Arc::new(MemoryStore::default());
    let who = StudentIdentity::new("406", "김신목");
    {
      let store =
        ReportStore::with_parts(step_catalog(), Prompts::default(), persist.clone());
      store.set_answer(&who, 1, "광합성").await.expect("save");
      store.set_answer(&who, 2, "식물 관찰").await.expect("save");
    }
    // Corrupt cell alongside the good one: hydration skips it quietly.
    persist.set("student-bad-cell", "{{{").expect("set");

    let reloaded = ReportStore::with_parts(step_catalog(), Prompts::default(), persist);
    let record = reloaded.record(&who).await;
    assert_eq!(record.completed_count(), 2);
    assert_eq!(record.answer(2), "식물 관찰");
  }

  #[tokio::test]
  async fn listing_orders_by_updated_at_descending() {
    let store = test_store();
    store
      .merge_remote(vec![
        submission("1", "가", 1, "a", "2025-12-18T01:00:00Z"),
        submission("2", "나", 1, "b", "2025-12-18T03:00:00Z"),
        submission("3", "다", 1, "c", "2025-12-18T02:00:00Z"),
      ])
      .await;
    let listed = store.list_submissions().await;
    let names: Vec<&str> = listed.iter().map(|s| s.identity.student_name.as_str()).collect();
    assert_eq!(names, vec!["나", "다", "가"]);
  }

  #[tokio::test]
  async fn stale_remote_records_never_overwrite_newer_local_ones() {
    let store = test_store();
    store
      .merge_remote(vec![submission("101", "김철수", 1, "최신 주제", "2025-12-18T05:00:00Z")])
      .await;

    // Older remote copy arrives late: ignored.
    let merged = store
      .merge_remote(vec![submission("101", "김철수", 1, "옛 주제", "2025-12-18T01:00:00Z")])
      .await;
    assert_eq!(merged, 0);
    let who = StudentIdentity::new("101", "김철수");
    assert_eq!(store.record(&who).await.answer(1), "최신 주제");

    // Newer remote copy replaces the whole record, not per-step.
    let replacement = submission("101", "김철수", 2, "새 동기", "2025-12-18T06:00:00Z");
    let merged = store.merge_remote(vec![replacement]).await;
    assert_eq!(merged, 1);
    let record = store.record(&who).await;
    assert_eq!(record.answer(1), "");
    assert_eq!(record.answer(2), "새 동기");
  }

  #[tokio::test]
  async fn evaluation_is_cached_in_persistence() {
    let persist = Arc::new(MemoryStore::default());
    let store = ReportStore::with_parts(step_catalog(), Prompts::default(), persist.clone());
    let who = StudentIdentity::new("101", "김철수");
    store.set_answer(&who, 1, "가설과 실험").await.expect("save");

    let stored = store.evaluate_student(&who).await.expect("evaluate");
    assert_eq!(stored.result.suggestions.len(), 3);

    let cached = persist.get(&who.evaluation_key()).expect("cached cell");
    let parsed: crate::protocol::StoredEvaluation =
      serde_json::from_str(&cached).expect("cached JSON");
    assert_eq!(parsed.result, stored.result);
  }

  #[tokio::test]
  async fn unknown_student_evaluates_as_an_empty_record() {
    let store = test_store();
    let who = StudentIdentity::new("999", "아무개");
    let stored = store.evaluate_student(&who).await.expect("evaluate");
    assert_eq!(stored.result.scores.total, 0);
  }

  #[tokio::test]
  async fn advice_without_openai_uses_the_step_guide() {
    let store = test_store();
    let text = store.advice(1, "", &[]).await;
    assert!(text.contains("아직 작성된 내용이 없어요"));
    let text = store.advice(1, "빛과 식물", &[]).await;
    assert!(text.contains("탐구 주제"));
    let text = store.advice(42, "x", &[]).await;
    assert!(text.contains("알 수 없는 단계"));
  }
}

//! Domain models: step catalog entries, student identity, per-student step
//! records, submissions, and evaluation results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The inquiry report always has exactly 9 steps (ids 1..=9).
pub const STEP_COUNT: u8 = 9;

/// One entry of the static step catalog.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StepDefinition {
  pub id: u8,
  pub title: String,
  #[serde(default)] pub icon: String,
  /// Short guidance shown to the student while writing this step.
  #[serde(default)] pub guide: String,
  /// Review instruction handed to the AI advisor for this step.
  #[serde(default)] pub ai_prompt: String,
}

/// Composite student identity. The (id, name) pair is the lookup and dedup
/// key everywhere; there is no surrogate key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StudentIdentity {
  #[serde(rename = "studentId")]
  pub student_id: String,
  #[serde(rename = "studentName")]
  pub student_name: String,
}

impl StudentIdentity {
  pub fn new(student_id: impl Into<String>, student_name: impl Into<String>) -> Self {
    Self { student_id: student_id.into(), student_name: student_name.into() }
  }

  /// Saving or evaluating without both fields is rejected up front.
  pub fn is_blank(&self) -> bool {
    self.student_id.trim().is_empty() || self.student_name.trim().is_empty()
  }

  /// In-memory map key.
  pub fn key(&self) -> String {
    format!("{}|{}", self.student_id, self.student_name)
  }

  /// Persistence key for the submission record.
  pub fn storage_key(&self) -> String {
    format!("student-{}-{}", self.student_id, self.student_name)
  }

  /// Persistence key for the last computed evaluation (display hint only).
  pub fn evaluation_key(&self) -> String {
    format!("evaluation-{}-{}", self.student_id, self.student_name)
  }
}

/// Mapping of step id (1..=9) to answer text.
///
/// Canonical invariant: only non-empty trimmed answers are stored, so a
/// step is "complete" iff its key is present, and `completed_count` equals
/// a recount over trimmed texts regardless of how the record was built.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepRecord {
  steps: BTreeMap<u8, String>,
}

impl StepRecord {
  pub fn new() -> Self {
    Self::default()
  }

  /// Upsert one step. Blank text clears the step instead of storing "".
  pub fn set(&mut self, step: u8, text: &str) {
    let trimmed = text.trim();
    if trimmed.is_empty() {
      self.steps.remove(&step);
    } else {
      self.steps.insert(step, trimmed.to_string());
    }
  }

  /// Answer text for a step; absent steps read as "" (never null), so
  /// downstream `.trim()` style checks stay safe.
  pub fn answer(&self, step: u8) -> &str {
    self.steps.get(&step).map(String::as_str).unwrap_or("")
  }

  /// Number of completed steps (non-empty trimmed answers).
  pub fn completed_count(&self) -> usize {
    self.steps.values().filter(|t| !t.trim().is_empty()).count()
  }

  pub fn is_empty(&self) -> bool {
    self.steps.is_empty()
  }

  /// Stored answers in step order.
  pub fn answers(&self) -> impl Iterator<Item = &str> {
    self.steps.values().map(String::as_str)
  }

  pub fn iter(&self) -> impl Iterator<Item = (u8, &str)> {
    self.steps.iter().map(|(k, v)| (*k, v.as_str()))
  }
}

/// One student's submission: identity + step record + last-write timestamp.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StudentSubmission {
  #[serde(flatten)]
  pub identity: StudentIdentity,
  #[serde(default)]
  pub steps: StepRecord,
  #[serde(rename = "updatedAt")]
  pub updated_at: String,
}

impl StudentSubmission {
  /// Millisecond epoch of `updated_at` for last-write-wins comparison.
  /// Unparseable timestamps sort oldest.
  pub fn updated_at_epoch(&self) -> i64 {
    chrono::DateTime::parse_from_rfc3339(&self.updated_at)
      .map(|d| d.timestamp_millis())
      .unwrap_or(0)
  }
}

/// Sub-scores of one evaluation. `total` is always the sum of the three
/// pre-clamped dimensions, so it stays within 0..=100.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scores {
  pub scientific: u32,
  pub logical: u32,
  pub creative: u32,
  pub total: u32,
}

/// One short categorical comment per dimension.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comments {
  pub scientific: String,
  pub logical: String,
  pub creative: String,
}

/// Deterministic rule-based assessment of one StepRecord. A derived value:
/// recomputed on demand, cached at the caller's discretion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationResult {
  pub scores: Scores,
  pub comments: Comments,
  pub feedback: String,
  /// Always exactly 3 entries.
  pub suggestions: Vec<String>,
}

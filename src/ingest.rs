//! The single normalization boundary for external payload shapes.
//!
//! Submissions arrive from several collaborators (our own persistence file,
//! the remote spreadsheet endpoint, manual imports) and their `steps` field
//! shows up either as a dense array (index 0..8 meaning steps 1..9) or as a
//! sparse object keyed by numeric-string step ids. Everything is funneled
//! through here into the canonical `StepRecord`; nothing else in the crate
//! tolerates shape ambiguity.
//!
//! Failure semantics: a record that cannot be read (missing identity, wrong
//! shape) is skipped and counted, never fatal. An empty result is valid.

use serde_json::Value;
use tracing::warn;

use crate::domain::{StepRecord, StudentIdentity, StudentSubmission, STEP_COUNT};

/// Stringify one step entry the way the worksheet frontends did:
/// strings pass through, numbers and booleans are stringified, anything
/// else (null, arrays, objects) becomes empty. The result is trimmed by
/// `StepRecord::set`, and blank entries are simply not stored.
fn entry_text(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    Value::Number(n) => n.to_string(),
    Value::Bool(b) => b.to_string(),
    _ => String::new(),
  }
}

/// Normalize a `steps` payload of either observed shape into a StepRecord.
/// Unknown step ids (outside 1..=9) and unreadable shapes yield an empty
/// record, never an error.
pub fn normalize_steps(value: &Value) -> StepRecord {
  let mut record = StepRecord::new();
  match value {
    // Dense array: 0-based index i maps to step id i+1.
    Value::Array(entries) => {
      for (i, entry) in entries.iter().take(STEP_COUNT as usize).enumerate() {
        record.set((i + 1) as u8, &entry_text(entry));
      }
    }
    // Sparse object keyed by numeric-string step ids.
    Value::Object(map) => {
      for (key, entry) in map {
        match key.parse::<u8>() {
          Ok(step) if (1..=STEP_COUNT).contains(&step) => {
            record.set(step, &entry_text(entry));
          }
          _ => {
            warn!(target: "report", %key, "Ignoring step entry with non-step key");
          }
        }
      }
    }
    _ => {}
  }
  record
}

/// Identity fields arrive as strings, but spreadsheet backends are fond of
/// turning numeric ids into numbers. Accept both; anything else is invalid.
fn identity_text(value: &Value) -> Option<String> {
  match value {
    Value::String(s) => Some(s.trim().to_string()),
    Value::Number(n) => Some(n.to_string()),
    _ => None,
  }
}

/// Parse one submission object. Requires non-empty `studentId` and
/// `studentName`; any externally supplied completed-step count is ignored
/// (the canonical record is the only ground truth). A missing or
/// unreadable `updatedAt` defaults to now.
pub fn parse_submission(value: &Value) -> Option<StudentSubmission> {
  let obj = value.as_object()?;
  let student_id = obj.get("studentId").and_then(identity_text)?;
  let student_name = obj.get("studentName").and_then(identity_text)?;
  if student_id.is_empty() || student_name.is_empty() {
    return None;
  }

  let steps = obj
    .get("steps")
    .map(normalize_steps)
    .unwrap_or_default();

  let updated_at = obj
    .get("updatedAt")
    .and_then(Value::as_str)
    .map(str::to_string)
    .unwrap_or_else(crate::store::now_iso);

  Some(StudentSubmission {
    identity: StudentIdentity::new(student_id, student_name),
    steps,
    updated_at,
  })
}

/// Parse a roster payload: either the wrapped form
/// `{ ok: true, students: [...] }` or a bare array of submissions.
///
/// Duplicate identities keep only the newer submission (whole-record
/// last-write-wins, no per-step merging). Returns the parsed submissions
/// plus the count of skipped records.
pub fn parse_roster(value: &Value) -> (Vec<StudentSubmission>, usize) {
  let students: &[Value] = if let Some(arr) = value.as_array() {
    arr
  } else if let Some(arr) = value.get("students").and_then(Value::as_array) {
    if value.get("ok").and_then(Value::as_bool) != Some(true) {
      warn!(target: "report", "Roster payload has no ok=true field; parsing anyway");
    }
    arr
  } else {
    warn!(target: "report", "Roster payload has no students array");
    return (Vec::new(), 0);
  };

  let mut skipped = 0usize;
  let mut by_key: Vec<StudentSubmission> = Vec::new();
  for (index, entry) in students.iter().enumerate() {
    match parse_submission(entry) {
      Some(sub) => {
        if let Some(existing) = by_key
          .iter_mut()
          .find(|s| s.identity == sub.identity)
        {
          if sub.updated_at_epoch() > existing.updated_at_epoch() {
            *existing = sub;
          }
        } else {
          by_key.push(sub);
        }
      }
      None => {
        warn!(target: "report", index, "Skipping invalid student record");
        skipped += 1;
      }
    }
  }
  (by_key, skipped)
}

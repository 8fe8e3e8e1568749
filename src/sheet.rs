//! Client for the optional spreadsheet-backed submission endpoint.
//!
//! The endpoint is a third-party web app in front of a spreadsheet: answers
//! are pushed one at a time as JSON, and the full roster can be pulled back
//! with a GET. We depend on nothing beyond a best-effort success/failure
//! signal; responses are frequently plain text, so all parsing here is
//! tolerant of non-JSON bodies.

use std::time::Duration;

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::domain::{StudentIdentity, StudentSubmission};
use crate::ingest;
use crate::util::trunc_for_log;

#[derive(Serialize)]
struct AnswerPush<'a> {
  #[serde(rename = "studentId")]
  student_id: &'a str,
  #[serde(rename = "studentName")]
  student_name: &'a str,
  step: u8,
  answer: &'a str,
}

#[derive(Clone)]
pub struct SheetClient {
  client: reqwest::Client,
  pub url: String,
}

impl SheetClient {
  /// Construct the client if SHEET_ENDPOINT_URL is set; otherwise None.
  pub fn from_env() -> Option<Self> {
    let url = std::env::var("SHEET_ENDPOINT_URL").ok()?;
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(20))
      .build()
      .ok()?;
    Some(Self { client, url })
  }

  /// Push one saved answer. Best-effort: any failure is logged and
  /// reported as `false`, never propagated.
  #[instrument(level = "info", skip(self, answer), fields(%identity.student_id, step, answer_len = answer.len()))]
  pub async fn push_answer(&self, identity: &StudentIdentity, step: u8, answer: &str) -> bool {
    let body = AnswerPush {
      student_id: &identity.student_id,
      student_name: &identity.student_name,
      step,
      answer,
    };
    let res = match self.client.post(&self.url).json(&body).send().await {
      Ok(res) => res,
      Err(e) => {
        warn!(target: "report", error = %e, "Sheet push failed (transport)");
        return false;
      }
    };

    let status = res.status();
    let text = res.text().await.unwrap_or_default();
    if !status.is_success() {
      warn!(target: "report", %status, body = %trunc_for_log(&text, 200), "Sheet push rejected");
      return false;
    }

    // The endpoint may answer with JSON carrying an ok flag, or with an
    // opaque plain-text acknowledgement. Only an explicit ok=false fails.
    let ok = serde_json::from_str::<serde_json::Value>(&text)
      .ok()
      .and_then(|v| v.get("ok").and_then(|o| o.as_bool()))
      .unwrap_or(true);
    info!(target: "report", %ok, "Sheet push acknowledged");
    ok
  }

  /// Pull the full roster and run it through the ingest boundary.
  /// Returns the parsed submissions plus the skipped-record count.
  #[instrument(level = "info", skip(self))]
  pub async fn fetch_roster(&self) -> Result<(Vec<StudentSubmission>, usize), String> {
    let res = self
      .client
      .get(&self.url)
      .send()
      .await
      .map_err(|e| format!("sheet fetch failed: {}", e))?;

    let status = res.status();
    let text = res.text().await.map_err(|e| e.to_string())?;
    if !status.is_success() {
      return Err(format!("sheet HTTP {}: {}", status, trunc_for_log(&text, 200)));
    }

    let value = serde_json::from_str::<serde_json::Value>(&text)
      .map_err(|e| format!("sheet returned non-JSON body ({}): {}", e, trunc_for_log(&text, 200)))?;

    let (submissions, skipped) = ingest::parse_roster(&value);
    info!(target: "report", fetched = submissions.len(), skipped, "Roster fetched from sheet");
    Ok((submissions, skipped))
  }
}

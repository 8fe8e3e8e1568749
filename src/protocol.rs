//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable so the worksheet frontend and the dashboard
//! can evolve independently of the backend internals.

use serde::{Deserialize, Serialize};

use crate::domain::{EvaluationResult, StepRecord, StudentIdentity, StudentSubmission};

/// Messages the worksheet client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    SaveAnswer {
        #[serde(flatten)]
        identity: StudentIdentity,
        step: u8,
        answer: String,
    },
    GetRecord {
        #[serde(flatten)]
        identity: StudentIdentity,
    },
    Evaluate {
        #[serde(flatten)]
        identity: StudentIdentity,
    },
    Advice {
        step: u8,
        answer: String,
        #[serde(default)]
        history: Vec<ChatTurn>,
    },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Saved {
        completed: usize,
        #[serde(rename = "updatedAt")]
        updated_at: String,
    },
    Record {
        record: RecordOut,
    },
    Evaluation {
        evaluation: StoredEvaluation,
    },
    Advice {
        text: String,
    },
    Error {
        message: String,
    },
}

/// One prior turn of the per-step advisor conversation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

/// DTO for one student's record, used by both WS and HTTP.
/// `completed_steps` is always recomputed from the canonical record.
#[derive(Debug, Serialize)]
pub struct RecordOut {
    #[serde(flatten)]
    pub identity: StudentIdentity,
    pub steps: StepRecord,
    #[serde(rename = "completedSteps")]
    pub completed_steps: usize,
    #[serde(rename = "updatedAt")]
    pub updated_at: String,
}

impl RecordOut {
    pub fn from_submission(sub: &StudentSubmission) -> Self {
        Self {
            identity: sub.identity.clone(),
            completed_steps: sub.steps.completed_count(),
            steps: sub.steps.clone(),
            updated_at: sub.updated_at.clone(),
        }
    }

    /// Degenerate record for a student who has saved nothing yet.
    pub fn empty_for(identity: StudentIdentity) -> Self {
        Self {
            identity,
            steps: StepRecord::new(),
            completed_steps: 0,
            updated_at: String::new(),
        }
    }
}

/// An evaluation result annotated with who/when, as cached in persistence.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredEvaluation {
    #[serde(flatten)]
    pub identity: StudentIdentity,
    #[serde(flatten)]
    pub result: EvaluationResult,
    #[serde(rename = "evaluatedAt")]
    pub evaluated_at: String,
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct AnswerIn {
    #[serde(flatten)]
    pub identity: StudentIdentity,
    pub step: u8,
    pub answer: String,
}

#[derive(Serialize)]
pub struct AnswerOut {
    pub ok: bool,
    pub completed: usize,
    #[serde(rename = "updatedAt")]
    pub updated_at: String,
}

#[derive(Serialize)]
pub struct SubmissionsOut {
    pub ok: bool,
    pub count: usize,
    pub students: Vec<RecordOut>,
}

#[derive(Serialize)]
pub struct RefreshOut {
    pub ok: bool,
    pub fetched: usize,
    pub merged: usize,
    pub skipped: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdviceIn {
    pub step: u8,
    pub answer: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

#[derive(Serialize)]
pub struct AdviceOut {
    pub text: String,
}

#[derive(Serialize)]
pub struct ErrorOut {
    pub ok: bool,
    pub message: String,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

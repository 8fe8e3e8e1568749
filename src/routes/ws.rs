//! WebSocket upgrade + message loop. Each client message is parsed as JSON
//! and forwarded to the report store. We reply with a single JSON message
//! per request.

use std::sync::Arc;

use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{debug, error, info, instrument};

use crate::protocol::{ClientWsMessage, RecordOut, ServerWsMessage};
use crate::store::ReportStore;

#[instrument(level = "info", skip(store))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(store): State<Arc<ReportStore>>) -> impl IntoResponse {
  info!(target: "tamgu_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, store))
}

#[instrument(level = "info", skip(socket, store))]
async fn handle_ws(mut socket: WebSocket, store: Arc<ReportStore>) {
  info!(target: "tamgu_backend", "WebSocket connected");
  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        // Parse, dispatch, serialize response.
        let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "tamgu_backend", "WS received: {:?}", &incoming);
            handle_client_ws(incoming, &store).await
          }
          Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
        };

        let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "tamgu_backend", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "tamgu_backend", "WebSocket disconnected");
}

#[instrument(level = "info", skip(store))]
async fn handle_client_ws(msg: ClientWsMessage, store: &ReportStore) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::SaveAnswer { identity, step, answer } => {
      match store.set_answer(&identity, step, &answer).await {
        Ok((completed, updated_at)) => {
          tracing::info!(target: "report", student = %identity.key(), step, completed, "WS answer saved");
          ServerWsMessage::Saved { completed, updated_at }
        }
        Err(message) => ServerWsMessage::Error { message },
      }
    }

    ClientWsMessage::GetRecord { identity } => {
      if identity.is_blank() {
        return ServerWsMessage::Error {
          message: "학생 정보(학번과 이름)를 먼저 입력해주세요.".into(),
        };
      }
      let record = match store.submission(&identity).await {
        Some(sub) => RecordOut::from_submission(&sub),
        None => RecordOut::empty_for(identity),
      };
      ServerWsMessage::Record { record }
    }

    ClientWsMessage::Evaluate { identity } => {
      match store.evaluate_student(&identity).await {
        Ok(evaluation) => {
          tracing::info!(target: "report", student = %evaluation.identity.key(), total = evaluation.result.scores.total, "WS evaluation served");
          ServerWsMessage::Evaluation { evaluation }
        }
        Err(message) => ServerWsMessage::Error { message },
      }
    }

    ClientWsMessage::Advice { step, answer, history } => {
      let text = store.advice(step, &answer, &history).await;
      ServerWsMessage::Advice { text }
    }
  }
}

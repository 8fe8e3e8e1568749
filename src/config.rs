//! Loading worksheet configuration (advisor prompts + optional step catalog)
//! from TOML.
//!
//! See `WorksheetConfig` and `Prompts` for the expected schema.

use serde::Deserialize;
use tracing::{error, info};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct WorksheetConfig {
  #[serde(default)]
  pub prompts: Prompts,
  /// Optional replacement step catalog. Applied only when it is a full
  /// valid 9-entry set (see `steps::resolve_catalog`).
  #[serde(default)]
  pub steps: Vec<StepCfg>,
}

/// Step catalog entry accepted in TOML configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct StepCfg {
  pub id: u8,
  pub title: String,
  #[serde(default)] pub icon: Option<String>,
  #[serde(default)] pub guide: Option<String>,
  #[serde(default)] pub ai_prompt: Option<String>,
}

/// Prompts used by the AI advisor. Defaults match the worksheet's Korean
/// review flow; override in TOML to tune tone/structure.
#[derive(Clone, Debug, Deserialize)]
pub struct Prompts {
  /// System message; `{title}` is replaced with the step title.
  pub advice_system_template: String,
  /// User message when the step carries its own review instruction
  /// (`{ai_prompt}`, `{answer}`).
  pub advice_user_template: String,
  /// User message fallback when the step has no review instruction
  /// (`{title}`, `{answer}`).
  pub review_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      advice_system_template: "당신은 과학 탐구 보고서 작성 도우미입니다. 학생이 작성한 \"{title}\" 단계의 내용을 검토하고 개선 제안을 해주세요. 이전 대화 내용을 참고하여 맥락을 유지하며 대화를 이어가세요.".into(),
      advice_user_template: "{ai_prompt}\n\n작성한 내용:\n{answer}".into(),
      review_user_template: "다음은 \"{title}\" 단계에 작성한 내용입니다:\n\n{answer}\n\n이 내용을 검토하고 개선 제안을 해주세요.".into(),
    }
  }
}

/// Attempt to load `WorksheetConfig` from WORKSHEET_CONFIG_PATH.
/// On any parsing/IO error, returns None.
pub fn load_config_from_env() -> Option<WorksheetConfig> {
  let path = std::env::var("WORKSHEET_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<WorksheetConfig>(&s) {
      Ok(cfg) => {
        info!(target: "tamgu_backend", %path, "Loaded worksheet config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "tamgu_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "tamgu_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

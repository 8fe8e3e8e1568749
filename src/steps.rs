//! The step catalog: the fixed, ordered 9 sections of the inquiry report.
//!
//! Built-in defaults keep the app useful without any external config; a TOML
//! config may replace the catalog wholesale, but only when it supplies a full
//! valid set (9 entries, ids 1..=9 in order). Anything else keeps defaults.

use tracing::error;

use crate::config::StepCfg;
use crate::domain::{StepDefinition, STEP_COUNT};

fn def(id: u8, title: &str, icon: &str, guide: &str, ai_prompt: &str) -> StepDefinition {
  StepDefinition {
    id,
    title: title.into(),
    icon: icon.into(),
    guide: guide.into(),
    ai_prompt: ai_prompt.into(),
  }
}

/// Built-in 9-entry catalog (Korean inquiry-report sections).
pub fn step_catalog() -> Vec<StepDefinition> {
  vec![
    def(1, "탐구 주제", "🔍",
      "무엇을 탐구하고 싶은지 한 문장으로 정리해보세요.",
      "탐구 주제가 구체적이고 실제로 탐구할 수 있는 범위인지 검토하고 개선 제안을 해주세요."),
    def(2, "탐구 동기", "💭",
      "이 주제를 고른 까닭이나 계기를 적어보세요.",
      "탐구 동기가 일상 경험과 잘 연결되어 있는지 검토하고 개선 제안을 해주세요."),
    def(3, "탐구 목적", "🎯",
      "탐구를 통해 알아내고 싶은 것을 가설 형태로 써보세요.",
      "탐구 목적이 가설 형태로 명확하게 드러나는지 검토하고 개선 제안을 해주세요."),
    def(4, "이론적 배경", "📚",
      "관련된 과학 개념과 독립변인·종속변인·통제변인을 정리해보세요.",
      "이론적 배경에 변인 설정이 빠짐없이 들어갔는지 검토하고 개선 제안을 해주세요."),
    def(5, "탐구 방법", "🧪",
      "실험 순서와 준비물, 변인을 통제하는 방법을 단계별로 적어보세요.",
      "실험 방법이 다른 사람이 따라 할 수 있을 만큼 구체적인지 검토하고 개선 제안을 해주세요."),
    def(6, "결과 정리", "📊",
      "관찰하거나 측정한 데이터를 표나 문장으로 정리해보세요.",
      "결과가 측정한 데이터에 근거해 정리되었는지 검토하고 개선 제안을 해주세요."),
    def(7, "결론 및 보완점", "✅",
      "결과에서 이끌어낸 결론과 실험의 아쉬운 점을 적어보세요.",
      "결론이 결과로부터 논리적으로 이어지는지 검토하고 개선 제안을 해주세요."),
    def(8, "느낀 점", "💝",
      "탐구 과정에서 새롭게 알게 된 점과 느낀 점을 적어보세요.",
      "느낀 점에 탐구 과정에 대한 자기 평가가 담겨 있는지 검토하고 개선 제안을 해주세요."),
    def(9, "참고 문헌", "📖",
      "참고한 책이나 누리집 주소를 적어보세요.",
      "참고 문헌이 출처를 확인할 수 있는 형태로 적혔는지 검토하고 개선 제안을 해주세요."),
  ]
}

/// Resolve the effective catalog from optional config entries.
/// A partial or malformed config catalog never half-applies.
pub fn resolve_catalog(cfg_steps: &[StepCfg]) -> Vec<StepDefinition> {
  if cfg_steps.is_empty() {
    return step_catalog();
  }

  let defaults = step_catalog();
  if cfg_steps.len() != STEP_COUNT as usize {
    error!(target: "report", got = cfg_steps.len(), "Config step catalog must have exactly 9 entries; keeping defaults.");
    return defaults;
  }

  let mut out = Vec::with_capacity(cfg_steps.len());
  for (i, cfg) in cfg_steps.iter().enumerate() {
    let expected = (i + 1) as u8;
    if cfg.id != expected {
      error!(target: "report", got = cfg.id, expected, "Config step catalog ids must be 1..=9 in order; keeping defaults.");
      return defaults;
    }
    if cfg.title.trim().is_empty() {
      error!(target: "report", id = cfg.id, "Config step catalog entry has an empty title; keeping defaults.");
      return defaults;
    }
    let fallback = &defaults[i];
    out.push(StepDefinition {
      id: cfg.id,
      title: cfg.title.clone(),
      icon: cfg.icon.clone().unwrap_or_else(|| fallback.icon.clone()),
      guide: cfg.guide.clone().unwrap_or_else(|| fallback.guide.clone()),
      ai_prompt: cfg.ai_prompt.clone().unwrap_or_else(|| fallback.ai_prompt.clone()),
    });
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn builtin_catalog_is_well_formed() {
    let cat = step_catalog();
    assert_eq!(cat.len(), STEP_COUNT as usize);
    for (i, s) in cat.iter().enumerate() {
      assert_eq!(s.id as usize, i + 1);
      assert!(!s.title.trim().is_empty());
    }
  }

  #[test]
  fn partial_config_catalog_keeps_defaults() {
    let cfg = vec![StepCfg {
      id: 1,
      title: "주제".into(),
      icon: None,
      guide: None,
      ai_prompt: None,
    }];
    let cat = resolve_catalog(&cfg);
    assert_eq!(cat.len(), 9);
    assert_eq!(cat[0].title, "탐구 주제");
  }

  #[test]
  fn full_config_catalog_replaces_defaults() {
    let cfg: Vec<StepCfg> = (1..=9)
      .map(|id| StepCfg {
        id,
        title: format!("단계 {}", id),
        icon: None,
        guide: Some("안내".into()),
        ai_prompt: None,
      })
      .collect();
    let cat = resolve_catalog(&cfg);
    assert_eq!(cat[8].title, "단계 9");
    assert_eq!(cat[3].guide, "안내");
    // Unset fields fall back to the built-in entry.
    assert_eq!(cat[0].icon, "🔍");
  }
}

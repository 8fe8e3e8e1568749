//! Deterministic, explainable scoring of one student's step record.
//!
//! `evaluate` is a pure function of the StepRecord: no I/O, no clock, no
//! randomness. The score is built from three signals only:
//!   - how many of the 9 steps are completed,
//!   - substring hits against three fixed Korean keyword sets,
//!   - a shared length bonus rewarding elaboration (capped at 5).
//!
//! Keyword matching is plain substring containment, not tokenization; each
//! keyword counts at most once no matter how often it repeats.

use crate::domain::{Comments, EvaluationResult, Scores, StepRecord, STEP_COUNT};

pub const SCIENTIFIC_KEYWORDS: [&str; 11] = [
  "가설", "실험", "변인", "통제", "측정", "관찰", "데이터", "결과", "분석", "독립변인", "종속변인",
];
pub const LOGICAL_KEYWORDS: [&str; 10] = [
  "왜냐하면", "따라서", "그러므로", "결론", "근거", "이유", "원인", "결과", "그래서", "때문에",
];
pub const CREATIVE_KEYWORDS: [&str; 8] = [
  "새로운", "독특한", "창의", "혁신", "다른", "특별한", "차별화", "독창적",
];

const SUGGESTION_SCIENTIFIC: &str =
  "과학적 용어(가설, 실험, 변인, 결과 등)를 더 많이 사용해주세요.";
const SUGGESTION_LOGICAL: &str =
  "논리적 연결어(왜냐하면, 따라서, 결론 등)를 사용하여 단계 간 연결을 강화해주세요.";
const SUGGESTION_DETAIL: &str = "글자 수를 늘려 더 상세한 설명을 추가해주세요.";

fn count_hits(text: &str, keywords: &[&str]) -> usize {
  keywords.iter().filter(|kw| text.contains(*kw)).count()
}

/// Round first, then clamp — matches the score pipeline order exactly.
fn finish(raw: f64, max: f64) -> u32 {
  raw.round().max(0.0).min(max) as u32
}

/// Evaluate a step record into scores, comments, feedback, and exactly
/// three improvement suggestions.
pub fn evaluate(record: &StepRecord) -> EvaluationResult {
  // Concatenation order is irrelevant: only substring presence and total
  // length feed the score.
  let all_text = record.answers().collect::<Vec<_>>().join(" ").to_lowercase();
  let text_len = all_text.chars().count();
  let completed = record.completed_count() as f64;
  let steps_total = STEP_COUNT as f64;

  let sci_hits = count_hits(&all_text, &SCIENTIFIC_KEYWORDS);
  let log_hits = count_hits(&all_text, &LOGICAL_KEYWORDS);
  let cre_hits = count_hits(&all_text, &CREATIVE_KEYWORDS);

  // Shared elaboration bonus, applied with different weights per dimension.
  let bonus = (text_len as f64 / 500.0).min(5.0);

  let mut scientific = (completed / steps_total) * 30.0;
  scientific += ((sci_hits as f64 / SCIENTIFIC_KEYWORDS.len() as f64) * 20.0).min(20.0);
  scientific += bonus;

  let mut logical = if completed >= 5.0 { 15.0 } else { (completed / 5.0) * 15.0 };
  logical += ((log_hits as f64 / LOGICAL_KEYWORDS.len() as f64) * 15.0).min(15.0);
  logical += bonus * 0.6;

  let mut creative = if cre_hits > 0 { 10.0 } else { 0.0 };
  creative += if completed >= 7.0 { 10.0 } else { (completed / 7.0) * 10.0 };
  creative += bonus * 0.4;

  let scientific = finish(scientific, 50.0);
  let logical = finish(logical, 30.0);
  let creative = finish(creative, 20.0);
  let total = scientific + logical + creative;

  let comments = Comments {
    scientific: scientific_comment(scientific).into(),
    logical: logical_comment(logical).into(),
    creative: creative_comment(creative).into(),
  };

  let mut suggestions: Vec<String> = Vec::new();
  let completed = record.completed_count();
  if completed < STEP_COUNT as usize {
    suggestions.push(format!(
      "모든 단계를 완성해주세요. 현재 {}/9 단계만 작성되었습니다.",
      completed
    ));
  }
  if sci_hits < 5 {
    suggestions.push(SUGGESTION_SCIENTIFIC.into());
  }
  if log_hits < 3 {
    suggestions.push(SUGGESTION_LOGICAL.into());
  }
  while suggestions.len() < 3 {
    suggestions.push(SUGGESTION_DETAIL.into());
  }
  suggestions.truncate(3);

  EvaluationResult {
    scores: Scores { scientific, logical, creative, total },
    comments,
    feedback: feedback_for(total).into(),
    suggestions,
  }
}

fn scientific_comment(score: u32) -> &'static str {
  if score >= 40 {
    "과학적 용어와 개념을 잘 활용하고 있습니다. 가설, 변인, 실험 등의 과학적 접근이 체계적입니다."
  } else if score >= 25 {
    "과학적 용어 사용이 부족합니다. 가설, 실험, 변인 등의 개념을 더 명확히 다뤄주세요."
  } else {
    "과학적 접근이 부족합니다. 각 단계에서 과학적 용어와 개념을 명확히 사용해주세요."
  }
}

fn logical_comment(score: u32) -> &'static str {
  if score >= 20 {
    "논리적 흐름이 잘 연결되어 있습니다. 각 단계 간의 연결고리가 명확합니다."
  } else if score >= 12 {
    "논리적 연결이 일부 부족합니다. 근거와 결론을 더 명확히 연결해주세요."
  } else {
    "논리적 구조가 부족합니다. 각 단계 간의 인과관계를 더 명확히 표현해주세요."
  }
}

fn creative_comment(score: u32) -> &'static str {
  if score >= 15 {
    "창의적이고 독특한 접근이 돋보입니다. 새로운 관점이나 방법을 잘 활용했습니다."
  } else if score >= 8 {
    "일부 창의적인 요소가 있으나 더 발전시킬 여지가 있습니다."
  } else {
    "창의적 아이디어가 부족합니다. 새로운 관점이나 독특한 방법을 시도해보세요."
  }
}

fn feedback_for(total: u32) -> &'static str {
  if total >= 80 {
    "전반적으로 매우 우수한 보고서입니다. 과학적 탐구 과정을 체계적으로 잘 수행했으며, 논리적 흐름도 명확합니다. 창의적인 접근도 돋보입니다. 각 단계가 잘 연결되어 있어 탐구의 전체적인 흐름을 이해하기 쉽습니다."
  } else if total >= 60 {
    "양호한 보고서입니다. 대부분의 탐구 단계를 잘 수행했으나, 일부 부분에서 보완이 필요합니다. 과학적 용어 사용과 논리적 연결을 더 강화하면 더 좋은 보고서가 될 것입니다. 특히 각 단계 간의 연결고리를 명확히 하면 좋겠습니다."
  } else if total >= 40 {
    "기본적인 탐구 과정은 수행했으나, 여러 부분에서 개선이 필요합니다. 각 단계를 더 체계적으로 작성하고, 과학적 개념과 논리적 연결을 강화해주세요. 특히 가설 설정과 실험 설계 부분을 더 구체적으로 작성하면 좋겠습니다."
  } else {
    "탐구 보고서의 기본 구조는 갖추었으나, 내용이 부족합니다. 각 단계별로 더 구체적이고 상세한 내용을 작성하고, 과학적 접근과 논리적 흐름을 개선해주세요. 모든 단계를 완성하고 각 단계 간의 연결을 명확히 하는 것이 중요합니다."
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn record_from(pairs: &[(u8, &str)]) -> StepRecord {
    let mut r = StepRecord::new();
    for (step, text) in pairs {
      r.set(*step, text);
    }
    r
  }

  #[test]
  fn empty_record_scores_zero_everywhere() {
    let result = evaluate(&StepRecord::new());
    assert_eq!(result.scores.scientific, 0);
    assert_eq!(result.scores.logical, 0);
    assert_eq!(result.scores.creative, 0);
    assert_eq!(result.scores.total, 0);
    // All three conditional suggestions fire; no padding needed.
    assert_eq!(result.suggestions.len(), 3);
    assert!(result.suggestions[0].contains("0/9"));
    assert!(result.suggestions[1].contains("과학적 용어"));
    assert!(result.suggestions[2].contains("논리적 연결어"));
    // Lowest tiers.
    assert!(result.comments.scientific.starts_with("과학적 접근이 부족"));
    assert!(result.feedback.contains("내용이 부족합니다"));
  }

  #[test]
  fn full_report_with_all_scientific_keywords_hits_the_top_tier() {
    // 9 completed steps. Step 1 carries every scientific keyword once;
    // "결과" doubles as a logical keyword, so log_hits is exactly 1. The
    // filler pushes the joined text well past 2500 chars (bonus cap = 5).
    let keywords = "가설 실험 변인 통제 측정 관찰 데이터 결과 분석 독립변인 종속변인";
    let filler = "물".repeat(400);
    let mut pairs: Vec<(u8, String)> = vec![(1, format!("{} {}", keywords, filler))];
    for step in 2..=9 {
      pairs.push((step, filler.clone()));
    }
    let record = record_from(
      &pairs.iter().map(|(s, t)| (*s, t.as_str())).collect::<Vec<_>>(),
    );

    let result = evaluate(&record);
    // scientific: 30 (completion) + 20 (11/11 hits) + 5 (bonus) = 55 -> 50.
    assert_eq!(result.scores.scientific, 50);
    // logical: 15 + min(15, 1/10*15) + 3 = 19.5 -> 20.
    assert_eq!(result.scores.logical, 20);
    // creative: 0 hits + 10 (>=7 steps) + 2 = 12.
    assert_eq!(result.scores.creative, 12);
    assert_eq!(result.scores.total, 82);
    assert!(result.feedback.contains("매우 우수한 보고서"));
  }

  #[test]
  fn completion_alone_yields_a_nonzero_score() {
    // All 9 steps complete, zero keywords, negligible length bonus.
    let pairs: Vec<(u8, &str)> = (1..=9).map(|s| (s, "물")).collect();
    let result = evaluate(&record_from(&pairs));
    assert_eq!(result.scores.scientific, 30);
    assert_eq!(result.scores.logical, 15);
    assert_eq!(result.scores.creative, 10);
    assert_eq!(result.scores.total, 55);
    // 40..60 tier.
    assert!(result.feedback.contains("기본적인 탐구 과정"));
  }

  #[test]
  fn scores_stay_within_bounds_and_total_is_the_sum() {
    let samples = [
      StepRecord::new(),
      record_from(&[(3, "가설과 실험, 따라서 새로운 결과")]),
      record_from(&(1..=9).map(|s| (s, "측정 데이터 왜냐하면 창의")).collect::<Vec<_>>()),
    ];
    for record in &samples {
      let r = evaluate(record);
      assert!(r.scores.scientific <= 50);
      assert!(r.scores.logical <= 30);
      assert!(r.scores.creative <= 20);
      assert_eq!(r.scores.total, r.scores.scientific + r.scores.logical + r.scores.creative);
      assert!(r.scores.total <= 100);
      assert_eq!(r.suggestions.len(), 3);
    }
  }

  #[test]
  fn evaluation_is_idempotent() {
    let record = record_from(&[(1, "가설을 세웠다"), (5, "실험으로 측정했다. 따라서 결론!")]);
    assert_eq!(evaluate(&record), evaluate(&record));
  }

  #[test]
  fn more_completed_steps_never_lower_any_score() {
    // Same per-step text keeps keyword hits fixed while completion grows.
    let mut prev = evaluate(&StepRecord::new());
    for k in 1..=9u8 {
      let pairs: Vec<(u8, &str)> = (1..=k).map(|s| (s, "데이터 때문에")).collect();
      let next = evaluate(&record_from(&pairs));
      assert!(next.scores.scientific >= prev.scores.scientific, "scientific dropped at {}", k);
      assert!(next.scores.logical >= prev.scores.logical, "logical dropped at {}", k);
      assert!(next.scores.creative >= prev.scores.creative, "creative dropped at {}", k);
      prev = next;
    }
  }

  #[test]
  fn strong_report_pads_suggestions_with_the_detail_hint() {
    // Enough scientific terms and connectors that only completion fires.
    let text = "가설 실험 변인 통제 측정 관찰 왜냐하면 따라서 결론 근거";
    let pairs: Vec<(u8, &str)> = (1..=8).map(|s| (s, text)).collect();
    let result = evaluate(&record_from(&pairs));
    assert_eq!(result.suggestions.len(), 3);
    assert!(result.suggestions[0].contains("8/9"));
    assert_eq!(result.suggestions[1], SUGGESTION_DETAIL);
    assert_eq!(result.suggestions[2], SUGGESTION_DETAIL);
  }
}

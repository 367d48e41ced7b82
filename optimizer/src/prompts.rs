//! Prompt templates and strictness calibration tables.
//!
//! The completion service only understands free text, so these templates are
//! the de-facto wire protocol of the optimizer. Response parsing lives next
//! to the consumers (`metrics`, `evaluator`).

use std::fmt;
use std::str::FromStr;

/// Sent during validation to confirm the completion service is reachable.
pub(crate) const PROBE_PROMPT: &str = "Reply with only: OK";

/// Goal used when none is provided and inference fails.
pub(crate) const DEFAULT_GOAL: &str =
    "Make this content clearer, more comprehensive, and more effective for its intended purpose";

pub(crate) fn metrics_prompt(goal: &str, content_preview: &str) -> String {
    format!(
        "You are an evaluation expert. Based on the user's goal, create 5 specific evaluation criteria.\n\
         \n\
         USER'S GOAL: {goal}\n\
         \n\
         CONTENT TYPE/CONTEXT: {content_preview}\n\
         \n\
         Create 5 evaluation dimensions that are SPECIFIC to this goal. Each dimension should:\n\
         1. Be directly relevant to what the user wants to achieve\n\
         2. Have a clear name (1-2 words)\n\
         3. Have a brief description of what high vs low scores mean\n\
         \n\
         Reply in EXACTLY this format (5 lines, no extra text):\n\
         METRIC1_NAME: Description of what this measures for this specific goal\n\
         METRIC2_NAME: Description of what this measures for this specific goal\n\
         METRIC3_NAME: Description of what this measures for this specific goal\n\
         METRIC4_NAME: Description of what this measures for this specific goal\n\
         METRIC5_NAME: Description of what this measures for this specific goal\n\
         \n\
         Examples of good metric names: Persuasiveness, Technical_Depth, Clarity, Emotional_Impact, \
         Actionability, Evidence_Quality, Creativity, Conciseness, Engagement, Accuracy, Completeness, \
         Structure, Tone, Specificity, Practicality"
    )
}

pub(crate) fn critique_prompt(
    goal: &str,
    metrics_description: &str,
    weak_area: &str,
    draft: &str,
) -> String {
    format!(
        "You are a Critical Content Architect. Analyze this draft and suggest ONE specific improvement.\n\
         \n\
         GOAL: {goal}\n\
         \n\
         EVALUATION CRITERIA:\n{metrics_description}\n\
         \n\
         CURRENT WEAKEST AREA: {weak_area}\n\
         \n\
         CURRENT DRAFT:\n{draft}\n\
         \n\
         Based on the evaluation criteria, provide ONE specific, actionable critique (2-3 sentences) \
         that would most improve the weakest area. Be specific about what to add, change, or restructure."
    )
}

pub(crate) fn rewrite_prompt(goal: &str, content: &str, critique: &str) -> String {
    format!(
        "Improve this content by applying the critique below.\n\
         \n\
         GOAL: {goal}\n\
         \n\
         CURRENT CONTENT:\n{content}\n\
         \n\
         CRITIQUE TO APPLY:\n{critique}\n\
         \n\
         RULES:\n\
         1. Make the content LONGER and MORE DETAILED, never shorter\n\
         2. Keep all existing good content\n\
         3. Apply the specific improvement from the critique\n\
         4. Directly address the weakness identified\n\
         \n\
         Output ONLY the improved content, no explanations or meta-commentary."
    )
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn eval_prompt(
    goal: &str,
    metrics_description: &str,
    metrics_format: &str,
    content: &str,
    strictness: Strictness,
    comparative_section: &str,
) -> String {
    format!(
        "You are a {persona} content evaluator. Rate this content on the following criteria.\n\
         \n\
         GOAL: {goal}\n\
         \n\
         EVALUATION CRITERIA:\n{metrics_description}\n\
         \n\
         CONTENT TO EVALUATE:\n{content}\n\
         {comparative_section}\n\
         SCORING CALIBRATION ({strictness}):\n{guide}\n\
         \n\
         Reply with ONLY the scores in this exact format (one per line):\n\
         {metrics_format}",
        persona = strictness.persona(),
        guide = strictness.scoring_guide(),
    )
}

pub(crate) fn comparative_section(previous_best: f64) -> String {
    format!(
        "\nPREVIOUS BEST SCORE: {previous_best:.1}/10\n\
         If you score this higher, you MUST see clear improvement. Don't inflate scores.\n\
         If similar quality, scores should be similar or lower.\n"
    )
}

pub(crate) fn goal_inference_prompt(content: &str) -> String {
    format!(
        "Based on this content, infer what the user likely wants to achieve or improve.\n\
         \n\
         CONTENT:\n{content}\n\
         \n\
         Provide a specific, actionable goal statement (1-2 sentences) that captures what would make \
         this content better. Focus on the apparent purpose and audience.\n\
         \n\
         Reply with ONLY the goal statement, nothing else."
    )
}

/// Evaluator calibration profile: how generously scores are assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strictness {
    Relaxed,
    Normal,
    #[default]
    Strict,
    Brutal,
}

impl Strictness {
    /// Scoring-band description injected into the evaluation prompt.
    pub fn scoring_guide(self) -> &'static str {
        match self {
            Strictness::Relaxed => {
                "- 1-3: Major problems\n\
                 - 4-5: Needs work\n\
                 - 6-7: Acceptable\n\
                 - 8-9: Good (most decent content lands here)\n\
                 - 10: Great"
            }
            Strictness::Normal => {
                "- 1-3: Poor - Major issues, fails to meet the criterion\n\
                 - 4-5: Below Average - Significant gaps\n\
                 - 6-7: Good - Meets expectations with room for improvement\n\
                 - 8-9: Very Good - Exceeds expectations\n\
                 - 10: Excellent - Exceptional, couldn't be better"
            }
            Strictness::Strict => {
                "- 1-3: Fails completely\n\
                 - 4-5: Below average - Most content is here\n\
                 - 6-7: Good - Actually meets the bar (don't give this easily)\n\
                 - 8-9: Very Good - RARE. Requires excellence with minor gaps\n\
                 - 10: Perfect - Almost never give this"
            }
            Strictness::Brutal => {
                "- 1-3: Garbage, unusable\n\
                 - 4-5: Mediocre - This is where MOST content belongs\n\
                 - 6-7: Actually good - Requires clear evidence of quality\n\
                 - 8: Excellent - RARE. Near-professional quality\n\
                 - 9: Exceptional - Almost never give this\n\
                 - 10: NEVER give a 10 unless it's truly flawless"
            }
        }
    }

    /// Evaluator persona injected into the evaluation prompt.
    pub fn persona(self) -> &'static str {
        match self {
            Strictness::Relaxed => "supportive and encouraging",
            Strictness::Normal => "fair and balanced",
            Strictness::Strict => "critical and demanding",
            Strictness::Brutal => "ruthlessly critical (your reputation depends on finding flaws)",
        }
    }
}

impl fmt::Display for Strictness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strictness::Relaxed => "relaxed",
            Strictness::Normal => "normal",
            Strictness::Strict => "strict",
            Strictness::Brutal => "brutal",
        };
        f.write_str(name)
    }
}

impl FromStr for Strictness {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "relaxed" => Ok(Strictness::Relaxed),
            "normal" => Ok(Strictness::Normal),
            "strict" => Ok(Strictness::Strict),
            "brutal" => Ok(Strictness::Brutal),
            other => Err(format!(
                "unknown strictness '{other}', expected one of relaxed, normal, strict, brutal"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strictness_round_trips_through_str() {
        for s in [
            Strictness::Relaxed,
            Strictness::Normal,
            Strictness::Strict,
            Strictness::Brutal,
        ] {
            assert_eq!(s.to_string().parse::<Strictness>().unwrap(), s);
        }
    }

    #[test]
    fn strictness_rejects_unknown() {
        assert!("harsh".parse::<Strictness>().is_err());
    }

    #[test]
    fn eval_prompt_includes_calibration_and_format() {
        let prompt = eval_prompt(
            "be clearer",
            "- CLARITY: easy to follow",
            "CLARITY: [1-10]",
            "some draft",
            Strictness::Brutal,
            "",
        );
        assert!(prompt.contains("ruthlessly critical"));
        assert!(prompt.contains("SCORING CALIBRATION (brutal)"));
        assert!(prompt.contains("CLARITY: [1-10]"));
        assert!(prompt.contains("CONTENT TO EVALUATE"));
    }

    #[test]
    fn comparative_section_carries_previous_best() {
        let section = comparative_section(7.25);
        assert!(section.contains("PREVIOUS BEST SCORE: 7.2/10"));
    }
}

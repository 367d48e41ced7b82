//! Goal-specific evaluation metrics.
//!
//! A small set of metric dimensions is generated once per run from the goal
//! and a content preview, then frozen. Everything downstream (evaluation,
//! critique targeting, reporting) keys off these names, so they are
//! normalized to `UPPER_SNAKE` form usable as map keys and regex anchors.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::completion::{complete_with_retries, CompletionError, CompletionService};
use crate::prompts;

/// Maximum metric lines taken from the generation response.
const MAX_METRICS: usize = 5;

/// Minimum parsed lines before falling back to the default set.
const MIN_METRICS: usize = 3;

/// The evaluation dimensions for one run: an ordered list of names plus
/// human-readable descriptions. Immutable after generation.
#[derive(Debug, Clone)]
pub struct RunMetrics {
    names: Vec<String>,
    descriptions: HashMap<String, String>,
}

impl RunMetrics {
    /// Fixed default set used when generation output cannot be parsed.
    pub fn fallback() -> Self {
        let pairs = [
            ("COMPLETENESS", "Covers all aspects of the goal"),
            ("CLARITY", "Easy to understand and well-structured"),
            ("DEPTH", "Sufficient detail and examples"),
            ("ACCURACY", "Correct and well-reasoned"),
            ("ENGAGEMENT", "Interesting and appropriate tone"),
        ];
        Self {
            names: pairs.iter().map(|(n, _)| (*n).to_string()).collect(),
            descriptions: pairs
                .iter()
                .map(|(n, d)| ((*n).to_string(), (*d).to_string()))
                .collect(),
        }
    }

    /// Metric names in generation order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Description for a metric, or the empty string when unknown.
    pub fn description(&self, name: &str) -> &str {
        self.descriptions.get(name).map(String::as_str).unwrap_or("")
    }

    /// `- NAME: description` lines for prompt injection.
    pub(crate) fn prompt_description(&self) -> String {
        self.names
            .iter()
            .map(|name| format!("- {name}: {}", self.description(name)))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// The `NAME: [1-10]` response skeleton for the evaluation prompt.
    pub(crate) fn response_format(&self) -> String {
        self.names
            .iter()
            .map(|name| format!("{name}: [1-10]"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Numbered human-readable listing for reports.
    pub fn display_list(&self) -> String {
        self.names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                format!("{}. **{}**: {}", i + 1, display_name(name), self.description(name))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// The lowest-scoring metric; ties break toward the earlier metric in
    /// generation order. Unscored nodes weaken toward the first metric.
    pub fn weakest<'a>(&'a self, scores: Option<&HashMap<String, f64>>) -> &'a str {
        let first = self.names.first().map(String::as_str).unwrap_or("UNKNOWN");
        let Some(scores) = scores else {
            return first;
        };

        let mut weakest = first;
        let mut lowest = f64::INFINITY;
        for name in &self.names {
            if let Some(&score) = scores.get(name) {
                if score < lowest {
                    lowest = score;
                    weakest = name;
                }
            }
        }
        weakest
    }

    /// Total score for a node: arithmetic mean over the metric list, with
    /// equal weighting. Missing metrics count as the 1.0 floor.
    pub fn total_score(&self, scores: &HashMap<String, f64>) -> f64 {
        if self.names.is_empty() {
            return 1.0;
        }
        let sum: f64 = self
            .names
            .iter()
            .map(|name| scores.get(name).copied().unwrap_or(1.0))
            .sum();
        sum / self.names.len() as f64
    }

    /// Parse `NAME: description` lines. Returns `None` when fewer than
    /// [`MIN_METRICS`] valid lines are present.
    pub(crate) fn parse(response: &str) -> Option<Self> {
        let mut names = Vec::new();
        let mut descriptions = HashMap::new();

        for line in response.lines() {
            let line = line.trim();
            let Some((raw_name, raw_desc)) = line.split_once(':') else {
                continue;
            };
            let name = normalize_name(raw_name);
            let desc = raw_desc.trim();
            if name.is_empty() || desc.is_empty() {
                continue;
            }
            if !descriptions.contains_key(&name) {
                descriptions.insert(name.clone(), desc.to_string());
                names.push(name);
            }
            if names.len() == MAX_METRICS {
                break;
            }
        }

        if names.len() < MIN_METRICS {
            return None;
        }
        Some(Self { names, descriptions })
    }
}

/// Normalize a metric name so it is usable as a map key and regex anchor.
fn normalize_name(raw: &str) -> String {
    raw.trim()
        .trim_start_matches(|c: char| c.is_ascii_digit() || c == '.' || c == ')' || c == '-')
        .trim()
        .to_uppercase()
        .replace(' ', "_")
}

/// Metric name with underscores replaced and title casing for display.
pub(crate) fn display_name(name: &str) -> String {
    name.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Generate the run's metrics with one completion call.
///
/// Unparseable output degrades to [`RunMetrics::fallback`]; a transport-level
/// failure after retries is an error, which the driver turns into a
/// user-facing metric-generation failure.
pub(crate) async fn generate(
    service: &dyn CompletionService,
    max_retries: u32,
    goal: &str,
    content_preview: &str,
) -> Result<RunMetrics, CompletionError> {
    let prompt = prompts::metrics_prompt(goal, content_preview);
    let response = complete_with_retries(service, &prompt, max_retries).await?;

    match RunMetrics::parse(&response) {
        Some(metrics) => {
            debug!(metrics = ?metrics.names(), "generated evaluation metrics");
            Ok(metrics)
        }
        None => {
            warn!("metric generation output unparseable, using default metrics");
            Ok(RunMetrics::fallback())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scores(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
    }

    #[test]
    fn parse_reads_five_lines() {
        let response = "Persuasiveness: How convincing the argument is\n\
                        Technical Depth: Level of supporting detail\n\
                        CLARITY: Ease of reading\n\
                        Tone: Appropriateness for the audience\n\
                        Evidence_Quality: Strength of citations";
        let metrics = RunMetrics::parse(response).expect("five valid lines");
        assert_eq!(
            metrics.names(),
            ["PERSUASIVENESS", "TECHNICAL_DEPTH", "CLARITY", "TONE", "EVIDENCE_QUALITY"]
        );
        assert_eq!(metrics.description("CLARITY"), "Ease of reading");
    }

    #[test]
    fn parse_skips_noise_and_caps_at_five() {
        let response = "Here are your metrics\n\
                        1. Focus: stays on topic\n\
                        2. Detail: supporting specifics\n\
                        3. Flow: smooth transitions\n\
                        4. Tone: right register\n\
                        5. Impact: memorable close\n\
                        6. Extra: should be dropped";
        let metrics = RunMetrics::parse(response).expect("parses");
        assert_eq!(metrics.names().len(), 5);
        assert_eq!(metrics.names()[0], "FOCUS");
        assert!(!metrics.names().contains(&"EXTRA".to_string()));
    }

    #[test]
    fn parse_requires_three_valid_lines() {
        assert!(RunMetrics::parse("CLARITY: fine\nDEPTH: fine").is_none());
        assert!(RunMetrics::parse("no colons here at all").is_none());
    }

    #[test]
    fn fallback_set_is_stable() {
        let metrics = RunMetrics::fallback();
        assert_eq!(
            metrics.names(),
            ["COMPLETENESS", "CLARITY", "DEPTH", "ACCURACY", "ENGAGEMENT"]
        );
    }

    #[test]
    fn weakest_breaks_ties_by_order() {
        let metrics = RunMetrics::fallback();
        let s = scores(&[
            ("COMPLETENESS", 5.0),
            ("CLARITY", 4.0),
            ("DEPTH", 4.0),
            ("ACCURACY", 6.0),
            ("ENGAGEMENT", 8.0),
        ]);
        assert_eq!(metrics.weakest(Some(&s)), "CLARITY");
    }

    #[test]
    fn weakest_defaults_to_first_metric() {
        let metrics = RunMetrics::fallback();
        assert_eq!(metrics.weakest(None), "COMPLETENESS");
        assert_eq!(metrics.weakest(Some(&HashMap::new())), "COMPLETENESS");
    }

    #[test]
    fn total_score_is_equal_weighted_mean() {
        let metrics = RunMetrics::fallback();
        let s = scores(&[
            ("COMPLETENESS", 6.0),
            ("CLARITY", 8.0),
            ("DEPTH", 7.0),
            ("ACCURACY", 9.0),
            ("ENGAGEMENT", 5.0),
        ]);
        assert!((metrics.total_score(&s) - 7.0).abs() < 1e-9);
    }

    #[test]
    fn total_score_floors_missing_metrics() {
        let metrics = RunMetrics::fallback();
        let s = scores(&[("CLARITY", 6.0)]);
        assert!((metrics.total_score(&s) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn display_name_title_cases() {
        assert_eq!(display_name("TECHNICAL_DEPTH"), "Technical Depth");
        assert_eq!(display_name("CLARITY"), "Clarity");
    }

    #[test]
    fn response_format_lists_each_metric() {
        let metrics = RunMetrics::fallback();
        let format = metrics.response_format();
        assert!(format.contains("COMPLETENESS: [1-10]"));
        assert_eq!(format.lines().count(), 5);
    }
}

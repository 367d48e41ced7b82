//! Content evaluation against the run's metrics.
//!
//! The completion service returns free text, so score parsing is an ordered
//! best-effort pipeline: per-metric regex extraction, then bare-number
//! averaging, then conservative defaults. Malformed output never aborts the
//! run; it only degrades the scores.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::completion::{complete_with_retries, CompletionError, CompletionService};
use crate::config::OptimizerConfig;
use crate::metrics::RunMetrics;
use crate::prompts;

static BARE_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d+(?:\.\d+)?)\b").expect("bare number pattern compiles")
});

/// Score a node's content on every metric, returning a map of metric name
/// to a value in [1, 10].
///
/// When `previous_best` is provided and comparative evaluation is enabled,
/// the prompt anchors scoring against that value to prevent inflation.
/// Retry-exhausted transient failures degrade to all-1.0 defaults; terminal
/// service errors propagate so the driver can fail the run.
pub(crate) async fn evaluate_content(
    service: &dyn CompletionService,
    config: &OptimizerConfig,
    metrics: &RunMetrics,
    goal: &str,
    content: &str,
    previous_best: Option<f64>,
) -> Result<HashMap<String, f64>, CompletionError> {
    let comparative = match previous_best {
        Some(best) if config.comparative_eval => prompts::comparative_section(best),
        _ => String::new(),
    };

    let prompt = prompts::eval_prompt(
        goal,
        &metrics.prompt_description(),
        &metrics.response_format(),
        content,
        config.grading_strictness,
        &comparative,
    );

    let response = match complete_with_retries(service, &prompt, config.max_retries).await {
        Ok(response) => response,
        Err(err) if err.is_retryable() => {
            warn!(error = %err, "evaluation call failed, using default scores");
            return Ok(default_scores(metrics));
        }
        Err(err) => return Err(err),
    };

    match parse_scores(metrics, &response) {
        Some(scores) => Ok(scores),
        None => {
            warn!("no scores recoverable from evaluation output, using defaults");
            Ok(default_scores(metrics))
        }
    }
}

/// Every metric at the conservative 1.0 floor.
pub(crate) fn default_scores(metrics: &RunMetrics) -> HashMap<String, f64> {
    metrics
        .names()
        .iter()
        .map(|name| (name.clone(), 1.0))
        .collect()
}

/// Best-effort extraction of per-metric scores from free text.
///
/// Stage 1: `METRIC: number` per metric, case-insensitive, tolerating
/// space/underscore variants, clamped into [1, 10]. Stage 2: when fewer than
/// half the metrics were recovered, average all bare numbers in [1, 10] and
/// use that for the missing ones. Stage 3: fill any remaining gap with the
/// average of what was found. Returns `None` only when nothing at all is
/// recoverable.
pub(crate) fn parse_scores(metrics: &RunMetrics, response: &str) -> Option<HashMap<String, f64>> {
    let mut scores = HashMap::new();

    for name in metrics.names() {
        if let Some(value) = find_metric_score(name, response) {
            scores.insert(name.clone(), value.clamp(1.0, 10.0));
        }
    }

    // Fewer than half recovered: fall back to averaging any plausible
    // numbers in the response.
    if scores.len() * 2 < metrics.names().len() {
        let nums: Vec<f64> = BARE_NUMBER
            .captures_iter(response)
            .filter_map(|c| c.get(1))
            .filter_map(|m| m.as_str().parse::<f64>().ok())
            .filter(|n| (1.0..=10.0).contains(n))
            .collect();

        if !nums.is_empty() {
            let avg = nums.iter().sum::<f64>() / nums.len() as f64;
            debug!(avg, "score fallback: averaging bare numbers");
            for name in metrics.names() {
                scores.entry(name.clone()).or_insert(avg);
            }
        }
    }

    if scores.is_empty() {
        return None;
    }

    // Fill whatever is still missing with the average of what parsed.
    let avg = scores.values().sum::<f64>() / scores.len() as f64;
    for name in metrics.names() {
        scores.entry(name.clone()).or_insert(avg);
    }

    Some(scores)
}

fn find_metric_score(name: &str, response: &str) -> Option<f64> {
    let exact = format!(r"(?i){}[:\s]*(\d+(?:\.\d+)?)", regex::escape(name));
    if let Some(value) = first_capture(&exact, response) {
        return Some(value);
    }

    // Tolerate "TECHNICAL DEPTH" for "TECHNICAL_DEPTH" and vice versa.
    let loose = format!(r"(?i){}[:\s]*(\d+(?:\.\d+)?)", regex::escape(name).replace('_', r"[\s_]*"));
    first_capture(&loose, response)
}

fn first_capture(pattern: &str, response: &str) -> Option<f64> {
    let re = Regex::new(pattern).ok()?;
    re.captures(response)?
        .get(1)?
        .as_str()
        .parse::<f64>()
        .ok()
}

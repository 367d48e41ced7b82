//! Critique and rewrite generation for node expansion.
//!
//! Each expansion attempt fans out `num_thoughts` independent critique +
//! rewrite cycles against the completion service and keeps the candidates
//! that survive validation. Candidates are immutable and are only attached
//! to the tree by the driver after all calls complete, so no tree state is
//! shared across the concurrent calls.

use futures::future::join_all;
use std::collections::HashSet;
use tracing::debug;

use crate::completion::{complete_with_retries, CompletionService};
use crate::config::OptimizerConfig;
use crate::metrics::RunMetrics;
use crate::prompts;

/// Minimum critique length (chars) for a usable improvement direction.
const MIN_CRITIQUE_CHARS: usize = 10;

/// Minimum rewritten content length (chars).
const MIN_CONTENT_CHARS: usize = 50;

/// A rewrite may not shrink below this fraction of its parent's length.
const MIN_LENGTH_RATIO: f64 = 0.7;

/// Rewrites closer than this to the parent are near-duplicates.
const MAX_SIMILARITY: f64 = 0.95;

/// Expansion attempts before giving up on a node for this iteration.
const MAX_ATTEMPTS: usize = 2;

/// A validated rewrite candidate, not yet attached to the tree.
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub content: String,
    pub critique: String,
}

/// Generate expansion candidates for the node holding `parent_content`.
///
/// Returns the surviving candidates and the number of logical completion
/// calls spent. An empty result means the expansion failed; the driver
/// degrades to re-scoring the leaf rather than treating this as an error.
pub(crate) async fn generate_candidates(
    service: &dyn CompletionService,
    config: &OptimizerConfig,
    metrics: &RunMetrics,
    goal: &str,
    parent_content: &str,
    weak_metric: &str,
) -> (Vec<Candidate>, u32) {
    let mut total_calls = 0;

    for attempt in 0..MAX_ATTEMPTS {
        let proposals = (0..config.num_thoughts)
            .map(|_| propose(service, config, metrics, goal, parent_content, weak_metric));
        let results = join_all(proposals).await;

        let mut valid = Vec::new();
        for (candidate, calls) in results {
            total_calls += calls;
            if let Some(candidate) = candidate {
                valid.push(candidate);
            }
        }

        if !valid.is_empty() {
            return (valid, total_calls);
        }
        debug!(attempt, weak_metric, "no expansion candidate survived validation");
    }

    (Vec::new(), total_calls)
}

/// One critique + rewrite cycle. Any service failure or validation miss
/// rejects the candidate; rejection is silent by design.
async fn propose(
    service: &dyn CompletionService,
    config: &OptimizerConfig,
    metrics: &RunMetrics,
    goal: &str,
    parent_content: &str,
    weak_metric: &str,
) -> (Option<Candidate>, u32) {
    let mut calls = 0;

    let weak_area = format!("{weak_metric}: {}", metrics.description(weak_metric));
    let critique_prompt = prompts::critique_prompt(
        goal,
        &metrics.prompt_description(),
        &weak_area,
        parent_content,
    );

    calls += 1;
    let critique = match complete_with_retries(service, &critique_prompt, config.max_retries).await
    {
        Ok(critique) => critique.trim().to_string(),
        Err(_) => return (None, calls),
    };
    if critique.chars().count() < MIN_CRITIQUE_CHARS {
        return (None, calls);
    }

    let rewrite_prompt = prompts::rewrite_prompt(goal, parent_content, &critique);
    calls += 1;
    let content = match complete_with_retries(service, &rewrite_prompt, config.max_retries).await {
        Ok(content) => content.trim().to_string(),
        Err(_) => return (None, calls),
    };

    if !is_acceptable_rewrite(parent_content, &content) {
        return (None, calls);
    }

    (Some(Candidate { content, critique }), calls)
}

/// The monotonic-growth and novelty policy for rewrites.
pub(crate) fn is_acceptable_rewrite(parent: &str, rewritten: &str) -> bool {
    let len = rewritten.chars().count();
    if len < MIN_CONTENT_CHARS {
        return false;
    }
    if (len as f64) < parent.chars().count() as f64 * MIN_LENGTH_RATIO {
        return false;
    }
    if jaccard_similarity(parent, rewritten) > MAX_SIMILARITY {
        return false;
    }
    true
}

/// Word-set Jaccard similarity over lowercased whitespace tokens.
pub(crate) fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let a_lower = a.to_lowercase();
    let b_lower = b.to_lowercase();
    let a_words: HashSet<&str> = a_lower.split_whitespace().collect();
    let b_words: HashSet<&str> = b_lower.split_whitespace().collect();

    if a_words.is_empty() || b_words.is_empty() {
        return 0.0;
    }

    let intersection = a_words.intersection(&b_words).count();
    let union = a_words.union(&b_words).count();
    intersection as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::CompletionError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replays a scripted sequence of replies, one per call.
    struct ScriptedService {
        replies: Mutex<Vec<Result<String, CompletionError>>>,
    }

    impl ScriptedService {
        fn new(replies: Vec<Result<String, CompletionError>>) -> Self {
            Self {
                replies: Mutex::new(replies),
            }
        }
    }

    #[async_trait]
    impl CompletionService for ScriptedService {
        async fn complete(&self, _prompt: &str) -> Result<String, CompletionError> {
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                return Err(CompletionError::UnrecognizedResponse("script over".into()));
            }
            replies.remove(0)
        }
    }

    fn words(range: std::ops::Range<u32>) -> String {
        range.map(|i| format!("word{i}")).collect::<Vec<_>>().join(" ")
    }

    fn test_config() -> OptimizerConfig {
        OptimizerConfig::for_testing()
    }

    #[test]
    fn jaccard_identical_and_disjoint() {
        assert!((jaccard_similarity("a b c", "a b c") - 1.0).abs() < 1e-9);
        assert!(jaccard_similarity("a b c", "x y z").abs() < 1e-9);
        assert!(jaccard_similarity("", "a b").abs() < 1e-9);
    }

    #[test]
    fn jaccard_is_case_insensitive() {
        assert!((jaccard_similarity("The Draft", "the draft") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn near_duplicate_is_rejected() {
        // 100 shared words, 3 added: 100/103 ~ 0.971 > 0.95.
        let parent = words(0..100);
        let child = format!("{parent} {}", words(100..103));
        assert!(jaccard_similarity(&parent, &child) > 0.95);
        assert!(!is_acceptable_rewrite(&parent, &child));
    }

    #[test]
    fn substantive_rewrite_is_accepted() {
        // 100 shared words, 25 added: 100/125 = 0.80.
        let parent = words(0..100);
        let child = format!("{parent} {}", words(100..125));
        assert!((jaccard_similarity(&parent, &child) - 0.80).abs() < 1e-9);
        assert!(is_acceptable_rewrite(&parent, &child));
    }

    #[test]
    fn shrunken_rewrite_is_rejected() {
        let parent = words(0..100);
        // Well over 50 chars but below 70% of the parent's length.
        let child = words(200..230);
        assert!(child.chars().count() >= 50);
        assert!((child.chars().count() as f64) < parent.chars().count() as f64 * 0.7);
        assert!(!is_acceptable_rewrite(&parent, &child));
    }

    #[test]
    fn tiny_rewrite_is_rejected() {
        assert!(!is_acceptable_rewrite("short parent", "too short"));
    }

    #[tokio::test]
    async fn propose_rejects_weak_critique() {
        let service = ScriptedService::new(vec![Ok("meh".into())]);
        let config = test_config();
        let metrics = RunMetrics::fallback();

        let (candidate, calls) =
            propose(&service, &config, &metrics, "goal", &words(0..40), "CLARITY").await;
        assert!(candidate.is_none());
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn propose_accepts_growing_rewrite() {
        let parent = words(0..40);
        let rewrite = words(0..80);
        let service = ScriptedService::new(vec![
            Ok("Add concrete figures and a worked example to the middle section.".into()),
            Ok(rewrite.clone()),
        ]);
        let config = test_config();
        let metrics = RunMetrics::fallback();

        let (candidate, calls) =
            propose(&service, &config, &metrics, "goal", &parent, "DEPTH").await;
        let candidate = candidate.expect("valid candidate");
        assert_eq!(candidate.content, rewrite);
        assert!(candidate.critique.starts_with("Add concrete"));
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn generate_retries_full_cycle_once() {
        let parent = words(0..40);
        // First cycle: rewrite too short. Second cycle: acceptable.
        let service = ScriptedService::new(vec![
            Ok("A long enough critique for the first attempt.".into()),
            Ok("tiny".into()),
            Ok("A long enough critique for the second attempt.".into()),
            Ok(words(0..90)),
        ]);
        let mut config = test_config();
        config.num_thoughts = 1;
        let metrics = RunMetrics::fallback();

        let (candidates, calls) =
            generate_candidates(&service, &config, &metrics, "goal", &parent, "DEPTH").await;
        assert_eq!(candidates.len(), 1);
        assert_eq!(calls, 4);
    }

    #[tokio::test]
    async fn generate_gives_up_after_two_attempts() {
        let service = ScriptedService::new(vec![
            Ok("short".into()),
            Ok("short".into()),
        ]);
        let mut config = test_config();
        config.num_thoughts = 1;
        let metrics = RunMetrics::fallback();

        let (candidates, calls) =
            generate_candidates(&service, &config, &metrics, "goal", &words(0..40), "DEPTH").await;
        assert!(candidates.is_empty());
        assert_eq!(calls, 2);
    }
}

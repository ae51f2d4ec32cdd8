use chrono::Local;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use crate::llm::backend::{ChatBackend, ChatOutcome, ChatRequest};
use crate::llm::parsing::{parse_category_choice, CategoryChoice};
use crate::llm::prompts;
use crate::llm::prompts::CategoryOption;
use crate::models::activity::ActivitySnapshot;
use crate::models::usage::TokenUsageRecord;
use crate::usage::tracker::UsageTracker;

/// Transport-level retries against one backend before rotating to the next.
pub const RETRIES_PER_BACKEND: u32 = 3;

const BACKOFF_BASE_MS: u64 = 250;
const BACKOFF_JITTER_MS: u64 = 100;

const CHOICE_TEMPERATURE: f32 = 0.0;
const CHOICE_MAX_TOKENS: u32 = 1024;
const SUMMARY_TEMPERATURE: f32 = 0.7;
const SUMMARY_MAX_TOKENS: u32 = 256;

/// Rough chars-per-token estimate for providers that don't report usage.
const ESTIMATE_CHARS_PER_TOKEN: usize = 4;

/// Routes one logical call across an ordered list of interchangeable
/// backends. Each call owns its own walk over the list, so concurrent
/// categorizations never interfere with each other's failover sequence.
/// A malformed response rotates immediately; transport failures retry the
/// same backend with doubling backoff first. Worst case attempt count is
/// backends x RETRIES_PER_BACKEND, after which the call yields None.
pub struct FailoverRouter {
    backends: Vec<Arc<dyn ChatBackend>>,
    usage: Arc<UsageTracker>,
}

impl FailoverRouter {
    pub fn new(backends: Vec<Arc<dyn ChatBackend>>, usage: Arc<UsageTracker>) -> Self {
        Self { backends, usage }
    }

    pub fn backend_count(&self) -> usize {
        self.backends.len()
    }

    /// Ask for the best-matching category. None means "no categorization
    /// possible this tick" and is a routine outcome, not an error.
    pub async fn choose_category(
        &self,
        goals: &str,
        categories: &[CategoryOption],
        snapshot: &ActivitySnapshot,
    ) -> Option<CategoryChoice> {
        let request = ChatRequest {
            system: prompts::category_system_prompt(),
            user: prompts::category_user_prompt(goals, categories, snapshot),
            temperature: CHOICE_TEMPERATURE,
            max_tokens: CHOICE_MAX_TOKENS,
            json_response: true,
        };
        self.run(&request, parse_category_choice).await
    }

    /// Freeform one-sentence summary of a snapshot. Not decision-critical,
    /// so it runs at a higher temperature.
    pub async fn summarize_block(&self, snapshot: &ActivitySnapshot) -> Option<String> {
        let request = ChatRequest {
            system: prompts::summary_system_prompt(),
            user: prompts::summary_user_prompt(snapshot),
            temperature: SUMMARY_TEMPERATURE,
            max_tokens: SUMMARY_MAX_TOKENS,
            json_response: false,
        };
        self.run(&request, |text| {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
        .await
    }

    async fn run<T, F>(&self, request: &ChatRequest, parse: F) -> Option<T>
    where
        F: Fn(&str) -> Option<T>,
    {
        if self.backends.is_empty() {
            log::warn!("no LLM backends configured");
            return None;
        }

        for backend in &self.backends {
            for attempt in 0..RETRIES_PER_BACKEND {
                if attempt > 0 {
                    sleep(backoff_delay(attempt)).await;
                }

                match backend.chat(request).await {
                    Ok(outcome) => {
                        let parsed = parse(&outcome.text);
                        self.record(backend.as_ref(), request, Some(&outcome), parsed.is_some());
                        if let Some(value) = parsed {
                            return Some(value);
                        }
                        log::warn!(
                            "malformed response from {}, rotating to next backend",
                            backend.model()
                        );
                        break;
                    }
                    Err(e) => {
                        self.record(backend.as_ref(), request, None, false);
                        log::warn!(
                            "call to {} failed (attempt {}/{}): {}",
                            backend.model(),
                            attempt + 1,
                            RETRIES_PER_BACKEND,
                            e
                        );
                    }
                }
            }
        }

        log::error!(
            "all {} LLM backends exhausted, giving up on this call",
            self.backends.len()
        );
        None
    }

    /// Every attempt is accounted for, success or not. Failed transport
    /// attempts cost an unknown number of tokens and are recorded as zero;
    /// delivered-but-malformed responses keep their (possibly estimated)
    /// counts with success=false.
    fn record(
        &self,
        backend: &dyn ChatBackend,
        request: &ChatRequest,
        outcome: Option<&ChatOutcome>,
        success: bool,
    ) {
        let (prompt_tokens, completion_tokens) = match outcome {
            Some(outcome) => match &outcome.usage {
                Some(usage) => (usage.prompt_tokens, usage.completion_tokens),
                None => (
                    estimate_tokens(request.system.len() + request.user.len()),
                    estimate_tokens(outcome.text.len()),
                ),
            },
            None => (0, 0),
        };

        let record = TokenUsageRecord {
            timestamp: Local::now(),
            model: backend.model().to_string(),
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
            endpoint: backend.endpoint().to_string(),
            success,
        };

        if let Err(e) = self.usage.track_usage(record) {
            log::error!("failed to record token usage: {}", e);
        }
    }
}

fn estimate_tokens(chars: usize) -> i64 {
    ((chars + ESTIMATE_CHARS_PER_TOKEN - 1) / ESTIMATE_CHARS_PER_TOKEN) as i64
}

fn backoff_delay(attempt: u32) -> Duration {
    let base = BACKOFF_BASE_MS * 2_u64.pow(attempt - 1);
    let jitter = rand::thread_rng().gen_range(0..=BACKOFF_JITTER_MS);
    Duration::from_millis(base + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::backend::ProviderUsage;
    use crate::models::activity::SnapshotKind;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedBackend {
        model: String,
        reply: Option<String>,
        calls: AtomicUsize,
    }

    impl ScriptedBackend {
        fn failing(model: &str) -> Self {
            Self {
                model: model.to_string(),
                reply: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn replying(model: &str, reply: &str) -> Self {
            Self {
                model: model.to_string(),
                reply: Some(reply.to_string()),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        fn model(&self) -> &str {
            &self.model
        }

        fn endpoint(&self) -> &str {
            "https://test.invalid/v1"
        }

        async fn chat(&self, _request: &ChatRequest) -> Result<ChatOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Some(text) => Ok(ChatOutcome {
                    text: text.clone(),
                    usage: Some(ProviderUsage {
                        prompt_tokens: 100,
                        completion_tokens: 20,
                    }),
                }),
                None => Err(anyhow!("simulated outage")),
            }
        }
    }

    fn snapshot() -> ActivitySnapshot {
        ActivitySnapshot {
            owner_name: Some("Code".to_string()),
            title: Some("failover.rs \u{2014} focustrack".to_string()),
            url: None,
            content: None,
            kind: SnapshotKind::Window,
            browser: None,
            duration_ms: Some(60_000),
        }
    }

    fn tracker() -> (Arc<UsageTracker>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        (Arc::new(UsageTracker::open(dir.path()).unwrap()), dir)
    }

    #[tokio::test]
    async fn test_all_backends_exhausted_returns_none_with_bounded_attempts() {
        tokio::time::pause();

        let first = Arc::new(ScriptedBackend::failing("model-a"));
        let second = Arc::new(ScriptedBackend::failing("model-b"));
        let (usage, _dir) = tracker();
        let router = FailoverRouter::new(
            vec![first.clone() as Arc<dyn ChatBackend>, second.clone()],
            usage.clone(),
        );

        let result = router.choose_category("goals", &[], &snapshot()).await;

        assert!(result.is_none());
        assert_eq!(first.calls(), RETRIES_PER_BACKEND as usize);
        assert_eq!(second.calls(), RETRIES_PER_BACKEND as usize);

        // Every attempt was accounted, all as zero-token failures
        let today = usage.get_today_usage().unwrap();
        assert_eq!(today.requests, 2 * RETRIES_PER_BACKEND as i64);
        assert_eq!(today.failures, 2 * RETRIES_PER_BACKEND as i64);
        assert_eq!(today.total_tokens, 0);
    }

    #[tokio::test]
    async fn test_malformed_response_rotates_to_next_backend() {
        let garbage = Arc::new(ScriptedBackend::replying("model-a", "no json here"));
        let good = Arc::new(ScriptedBackend::replying(
            "model-b",
            r#"{"chosenCategoryName": "Work", "summary": "s", "reasoning": "r"}"#,
        ));
        let (usage, _dir) = tracker();
        let router = FailoverRouter::new(
            vec![garbage.clone() as Arc<dyn ChatBackend>, good.clone()],
            usage.clone(),
        );

        let choice = router
            .choose_category("goals", &[], &snapshot())
            .await
            .unwrap();

        assert_eq!(choice.chosen_category_name, "Work");
        // Malformed schema rotates immediately, no per-backend retries
        assert_eq!(garbage.calls(), 1);
        assert_eq!(good.calls(), 1);

        let today = usage.get_today_usage().unwrap();
        assert_eq!(today.requests, 2);
        assert_eq!(today.failures, 1);
    }

    #[tokio::test]
    async fn test_first_backend_success_short_circuits() {
        let good = Arc::new(ScriptedBackend::replying(
            "model-a",
            r#"{"chosenCategoryName": "Work", "summary": "s", "reasoning": "r"}"#,
        ));
        let unused = Arc::new(ScriptedBackend::failing("model-b"));
        let (usage, _dir) = tracker();
        let router = FailoverRouter::new(
            vec![good.clone() as Arc<dyn ChatBackend>, unused.clone()],
            usage,
        );

        let choice = router.choose_category("goals", &[], &snapshot()).await;
        assert!(choice.is_some());
        assert_eq!(good.calls(), 1);
        assert_eq!(unused.calls(), 0);
    }

    #[tokio::test]
    async fn test_summarize_block_returns_trimmed_text() {
        let backend = Arc::new(ScriptedBackend::replying(
            "model-a",
            "  Reviewing a pull request.  ",
        ));
        let (usage, _dir) = tracker();
        let router = FailoverRouter::new(vec![backend as Arc<dyn ChatBackend>], usage);

        let summary = router.summarize_block(&snapshot()).await;
        assert_eq!(summary.as_deref(), Some("Reviewing a pull request."));
    }

    #[tokio::test]
    async fn test_no_backends_yields_none() {
        let (usage, _dir) = tracker();
        let router = FailoverRouter::new(vec![], usage);
        assert!(router.choose_category("goals", &[], &snapshot()).await.is_none());
    }

    #[test]
    fn test_estimate_tokens_rounds_up() {
        assert_eq!(estimate_tokens(0), 0);
        assert_eq!(estimate_tokens(1), 1);
        assert_eq!(estimate_tokens(4), 1);
        assert_eq!(estimate_tokens(5), 2);
    }
}

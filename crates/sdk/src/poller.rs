//! Polling an execution until the remote service reports a terminal state.

use crate::config::PollConfig;
use crate::error::{DocflowError, DocflowResult};
use async_trait::async_trait;
use docflow_core::{CheckHandle, ExecutionState, ExecutionStatus};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Anything that can report the current state of an execution.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Issue exactly one status request.
    async fn fetch_status(&self, handle: &CheckHandle) -> DocflowResult<ExecutionState>;
}

/// Sequential status poller with an attempt budget.
pub struct Poller<'a, S: StatusSource + ?Sized> {
    source: &'a S,
    config: PollConfig,
    cancel: Option<CancellationToken>,
}

impl<'a, S: StatusSource + ?Sized> Poller<'a, S> {
    pub fn new(source: &'a S, config: PollConfig) -> Self {
        Self {
            source,
            config,
            cancel: None,
        }
    }

    /// Stop waiting as soon as the token is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Poll until the execution completes or fails.
    ///
    /// A `failed` execution is returned as a state, not an error. Transient
    /// request failures use up an attempt; authentication failures end
    /// polling at once.
    pub async fn poll(&self, handle: &CheckHandle) -> DocflowResult<ExecutionState> {
        let max_attempts = self.config.max_attempts;
        let mut last_status: Option<ExecutionStatus> = None;

        for attempt in 0..max_attempts {
            if self.is_cancelled() {
                return Err(DocflowError::Cancelled);
            }

            match self.source.fetch_status(handle).await {
                Ok(state) if state.is_terminal() => {
                    info!(
                        handle = %handle,
                        status = %state.status,
                        attempts = attempt + 1,
                        "Execution finished"
                    );
                    return Ok(state);
                }
                Ok(state) => {
                    debug!(handle = %handle, attempt = attempt + 1, status = %state.status, "Execution not finished");
                    last_status = Some(state.status);
                }
                Err(e) if e.is_transient() => {
                    warn!(
                        handle = %handle,
                        attempt = attempt + 1,
                        error = %e,
                        "Status check failed, will retry"
                    );
                }
                Err(e) => return Err(e),
            }

            let done = attempt + 1;
            if self.config.progress_every > 0 && done % self.config.progress_every == 0 {
                info!(
                    handle = %handle,
                    attempt = done,
                    max_attempts,
                    "Still waiting for execution"
                );
            }

            if done < max_attempts {
                self.wait(self.config.interval_after(attempt)).await?;
            }
        }

        Err(DocflowError::PollTimeout {
            attempts: max_attempts,
            last_status,
        })
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(CancellationToken::is_cancelled)
            .unwrap_or(false)
    }

    async fn wait(&self, interval: Duration) -> DocflowResult<()> {
        match &self.cancel {
            Some(token) => tokio::select! {
                _ = token.cancelled() => Err(DocflowError::Cancelled),
                _ = tokio::time::sleep(interval) => Ok(()),
            },
            None => {
                tokio::time::sleep(interval).await;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Replays scripted responses, then reports `processing` forever.
    struct ScriptedSource {
        responses: Mutex<VecDeque<DocflowResult<ExecutionState>>>,
        calls: AtomicU32,
    }

    impl ScriptedSource {
        fn new(responses: Vec<DocflowResult<ExecutionState>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StatusSource for ScriptedSource {
        async fn fetch_status(&self, _handle: &CheckHandle) -> DocflowResult<ExecutionState> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(ExecutionState::processing()))
        }
    }

    fn handle() -> CheckHandle {
        CheckHandle::new("/api/v1/workflows/executions/1")
    }

    #[tokio::test]
    async fn test_returns_after_completion() {
        let source = ScriptedSource::new(vec![
            Ok(ExecutionState::processing()),
            Ok(ExecutionState::processing()),
            Ok(ExecutionState::complete(json!({"pages": 3}))),
        ]);

        let poller = Poller::new(&source, PollConfig::new(5, Duration::ZERO));
        let state = poller.poll(&handle()).await.unwrap();

        assert_eq!(state.status, ExecutionStatus::Complete);
        assert_eq!(state.result, Some(json!({"pages": 3})));
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn test_times_out_after_budget() {
        let source = ScriptedSource::new(Vec::new());

        let poller = Poller::new(&source, PollConfig::new(2, Duration::ZERO));
        let err = poller.poll(&handle()).await.unwrap_err();

        match err {
            DocflowError::PollTimeout {
                attempts,
                last_status,
            } => {
                assert_eq!(attempts, 2);
                assert_eq!(last_status, Some(ExecutionStatus::Processing));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_failed_execution_is_returned() {
        let source = ScriptedSource::new(vec![Ok(ExecutionState::failed(json!("bad pdf")))]);

        let poller = Poller::new(&source, PollConfig::new(5, Duration::ZERO));
        let state = poller.poll(&handle()).await.unwrap();

        assert_eq!(state.status, ExecutionStatus::Failed);
        assert_eq!(state.error, Some(json!("bad pdf")));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_authentication_failure_is_immediate() {
        let source = ScriptedSource::new(vec![Err(DocflowError::Authentication {
            status: 401,
            message: "Invalid API key".to_string(),
        })]);

        let poller = Poller::new(&source, PollConfig::new(5, Duration::ZERO));
        let err = poller.poll(&handle()).await.unwrap_err();

        assert!(matches!(err, DocflowError::Authentication { status: 401, .. }));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let source = ScriptedSource::new(vec![
            Err(DocflowError::Api {
                status: 502,
                message: "Bad Gateway".to_string(),
                details: None,
            }),
            Err(DocflowError::Json(
                serde_json::from_str::<serde_json::Value>("<html>").unwrap_err(),
            )),
            Err(DocflowError::Timeout),
            Ok(ExecutionState::complete(json!({}))),
        ]);

        let poller = Poller::new(&source, PollConfig::new(5, Duration::ZERO));
        let state = poller.poll(&handle()).await.unwrap();

        assert!(state.is_terminal());
        assert_eq!(source.calls(), 4);
    }

    #[tokio::test]
    async fn test_transient_failures_count_against_budget() {
        let source = ScriptedSource::new(vec![
            Err(DocflowError::Timeout),
            Err(DocflowError::Timeout),
        ]);

        let poller = Poller::new(&source, PollConfig::new(2, Duration::ZERO));
        let err = poller.poll(&handle()).await.unwrap_err();

        assert!(matches!(
            err,
            DocflowError::PollTimeout {
                attempts: 2,
                last_status: None
            }
        ));
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_non_transient_error_propagates() {
        let source = ScriptedSource::new(vec![Err(DocflowError::Config(
            "bad handle".to_string(),
        ))]);

        let poller = Poller::new(&source, PollConfig::new(5, Duration::ZERO));
        let err = poller.poll(&handle()).await.unwrap_err();

        assert!(matches!(err, DocflowError::Config(_)));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_zero_budget_makes_no_requests() {
        let source = ScriptedSource::new(Vec::new());

        let poller = Poller::new(&source, PollConfig::new(0, Duration::ZERO));
        let err = poller.poll(&handle()).await.unwrap_err();

        assert!(matches!(err, DocflowError::PollTimeout { attempts: 0, .. }));
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_between_attempts_with_backoff() {
        let source = ScriptedSource::new(Vec::new());
        let config = PollConfig::new(4, Duration::from_secs(1))
            .with_backoff(2.0, Duration::from_secs(60));

        let started = tokio::time::Instant::now();
        let poller = Poller::new(&source, config);
        let err = poller.poll(&handle()).await.unwrap_err();

        assert!(matches!(err, DocflowError::PollTimeout { attempts: 4, .. }));
        // 1s + 2s + 4s, no wait after the last attempt
        assert_eq!(started.elapsed(), Duration::from_secs(7));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let source = ScriptedSource::new(Vec::new());
        let token = CancellationToken::new();
        token.cancel();

        let poller = Poller::new(&source, PollConfig::new(5, Duration::ZERO)).with_cancellation(token);
        let err = poller.poll(&handle()).await.unwrap_err();

        assert!(matches!(err, DocflowError::Cancelled));
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_while_waiting() {
        let source = ScriptedSource::new(Vec::new());
        let token = CancellationToken::new();

        let poller = Poller::new(&source, PollConfig::new(10, Duration::from_secs(30)))
            .with_cancellation(token.clone());

        let handle = handle();
        let canceller = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            token.cancel();
        };
        let (result, _) = tokio::join!(poller.poll(&handle), canceller);

        assert!(matches!(result, Err(DocflowError::Cancelled)));
        assert_eq!(source.calls(), 1);
    }
}

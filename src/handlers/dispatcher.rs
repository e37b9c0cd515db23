//! Bounded, failure-tolerant handler invocation.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use super::handler::{Handler, HandlerResponse};
use crate::protocol::Envelope;

/// Invokes the configured handler with a timeout and a cap on concurrent
/// invocations. Every failure collapses to "no response".
pub struct Dispatcher {
    handler: Option<Arc<dyn Handler>>,
    timeout: Duration,
    permits: Semaphore,
}

impl Dispatcher {
    pub fn new(handler: Option<Arc<dyn Handler>>, timeout: Duration, max_concurrent: usize) -> Self {
        Self {
            handler,
            timeout,
            permits: Semaphore::new(max_concurrent.max(1)),
        }
    }

    /// Pure logging/inbox mode: nothing is ever invoked.
    pub fn disabled() -> Self {
        Self::new(None, Duration::from_secs(30), 1)
    }

    pub fn is_enabled(&self) -> bool {
        self.handler.is_some()
    }

    pub fn handler_name(&self) -> Option<&str> {
        self.handler.as_deref().map(|h| h.name())
    }

    /// Run the handler for `envelope`.
    pub async fn dispatch(&self, envelope: &Envelope) -> Option<HandlerResponse> {
        let handler = self.handler.as_ref()?;

        // Waiting for a permit does not count against the timeout.
        let _permit = match self.permits.acquire().await {
            Ok(permit) => permit,
            Err(_) => return None,
        };

        match tokio::time::timeout(self.timeout, handler.invoke(envelope)).await {
            Ok(Ok(output)) => {
                let response = HandlerResponse::from_output(&output);
                tracing::debug!(
                    "Handler {} finished for {} (response: {})",
                    handler.name(),
                    envelope.id_or_unknown(),
                    response.is_some()
                );
                response
            }
            Ok(Err(e)) => {
                tracing::warn!("Handler error for {}: {}", envelope.id_or_unknown(), e);
                None
            }
            Err(_) => {
                tracing::warn!(
                    "Handler for {} exceeded timeout of {}s",
                    envelope.id_or_unknown(),
                    self.timeout.as_secs_f32()
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::handler::{HandlerError, Result};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedHandler {
        output: std::result::Result<&'static str, &'static str>,
        delay: Duration,
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl FixedHandler {
        fn new(output: std::result::Result<&'static str, &'static str>) -> Self {
            Self {
                output,
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }

        fn slow(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    #[async_trait]
    impl Handler for FixedHandler {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn invoke(&self, _envelope: &Envelope) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.output
                .map(str::to_string)
                .map_err(|e| HandlerError::Other(e.to_string()))
        }
    }

    fn dispatcher(handler: Arc<FixedHandler>, timeout: Duration) -> Dispatcher {
        let handler: Arc<dyn Handler> = handler;
        Dispatcher::new(Some(handler), timeout, 2)
    }

    #[tokio::test]
    async fn disabled_dispatcher_never_responds() {
        let dispatcher = Dispatcher::disabled();
        assert!(!dispatcher.is_enabled());
        assert!(dispatcher.dispatch(&Envelope::default()).await.is_none());
    }

    #[tokio::test]
    async fn json_output_becomes_response() {
        let handler = Arc::new(FixedHandler::new(Ok("{\"body\":\"ok\"}")));
        let response = dispatcher(handler.clone(), Duration::from_secs(1))
            .dispatch(&Envelope::default())
            .await
            .unwrap();
        assert_eq!(response.reply_body(), json!("ok"));
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn handler_error_is_no_response() {
        let handler = Arc::new(FixedHandler::new(Err("exit status 1")));
        let response = dispatcher(handler, Duration::from_secs(1))
            .dispatch(&Envelope::default())
            .await;
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn timeout_is_no_response() {
        let handler = Arc::new(FixedHandler::new(Ok("late")).slow(Duration::from_millis(500)));
        let response = dispatcher(handler, Duration::from_millis(50))
            .dispatch(&Envelope::default())
            .await;
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let handler = Arc::new(FixedHandler::new(Ok("x")).slow(Duration::from_millis(40)));
        let dispatcher = Arc::new(dispatcher(handler.clone(), Duration::from_secs(5)));

        let tasks: Vec<_> = (0..6)
            .map(|_| {
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move { dispatcher.dispatch(&Envelope::default()).await })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap().is_some());
        }

        assert_eq!(handler.calls.load(Ordering::SeqCst), 6);
        assert!(handler.peak.load(Ordering::SeqCst) <= 2);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn subprocess_timeout_kills_child() {
        let handler: Arc<dyn Handler> =
            Arc::new(crate::handlers::CommandHandler::new("sh").with_args(["-c", "sleep 5"]));
        let dispatcher = Dispatcher::new(Some(handler), Duration::from_millis(100), 1);

        let started = std::time::Instant::now();
        assert!(dispatcher.dispatch(&Envelope::default()).await.is_none());
        assert!(started.elapsed() < Duration::from_secs(3));
    }
}

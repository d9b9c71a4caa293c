// ABOUTME: The fallback chain executor: tries loaders in order and returns the first usable content.
// ABOUTME: Classifies every failure, reports it to the diagnostic sink, and aggregates them into Exhausted.

//! Chain execution.
//!
//! A [`Compose`] owns an ordered, immutable list of loaders. [`Compose::load`]
//! invokes them one at a time until one returns non-empty text. Every other
//! outcome becomes an [`AttemptRecord`]; when the list runs out the records are
//! returned inside [`LoadError::Exhausted`]. Because `Compose` is itself a
//! [`Loader`], chains can contain chains.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::debug;

use crate::diagnostics::{DiagnosticSink, TracingSink};
use crate::error::{FailureKind, LoadError};
use crate::loader::Loader;
use crate::options::{ComposeBuilder, EnvironmentPolicy};

/// One failed attempt inside a chain execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    pub loader: String,
    pub kind: FailureKind,
    pub detail: String,
}

impl AttemptRecord {
    pub fn new(loader: impl Into<String>, kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            loader: loader.into(),
            kind,
            detail: detail.into(),
        }
    }

    fn from_error(loader: &str, err: &LoadError) -> Self {
        Self::new(loader, err.kind(), err.detail())
    }
}

impl fmt::Display for AttemptRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} - {}", self.loader, self.kind, self.detail)
    }
}

/// What the executor does after recording a failed attempt.
enum Step {
    Next,
    Halt,
}

/// An ordered fallback chain of loaders.
pub struct Compose {
    name: String,
    loaders: Vec<Arc<dyn Loader>>,
    sink: Arc<dyn DiagnosticSink>,
    policy: EnvironmentPolicy,
    budget: Option<Duration>,
}

impl Compose {
    /// Create a chain with the default sink, policy and no time budget.
    pub fn new(loaders: Vec<Arc<dyn Loader>>) -> Self {
        Self {
            name: "compose".to_string(),
            loaders,
            sink: Arc::new(TracingSink),
            policy: EnvironmentPolicy::default(),
            budget: None,
        }
    }

    /// Create a new ComposeBuilder for configuring the chain.
    pub fn builder() -> ComposeBuilder {
        ComposeBuilder::new()
    }

    pub(crate) fn from_parts(
        name: String,
        loaders: Vec<Arc<dyn Loader>>,
        sink: Arc<dyn DiagnosticSink>,
        policy: EnvironmentPolicy,
        budget: Option<Duration>,
    ) -> Self {
        Self {
            name,
            loaders,
            sink,
            policy,
            budget,
        }
    }

    /// The loaders in precedence order.
    pub fn loaders(&self) -> &[Arc<dyn Loader>] {
        &self.loaders
    }

    pub fn len(&self) -> usize {
        self.loaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }

    pub fn policy(&self) -> EnvironmentPolicy {
        self.policy
    }

    pub fn budget(&self) -> Option<Duration> {
        self.budget
    }

    fn classify(&self, err: &LoadError) -> Step {
        let stops_under_abort = match err {
            // a nested chain that stopped early carries its halt outward
            LoadError::Exhausted { halted, .. } => *halted,
            other => other.kind().is_environmental(),
        };
        match (stops_under_abort, self.policy) {
            (true, EnvironmentPolicy::Abort) => Step::Halt,
            _ => Step::Next,
        }
    }

    fn exhausted(&self, url: &str, attempts: Vec<AttemptRecord>, halted: bool) -> LoadError {
        self.sink.exhausted(url, &attempts);
        LoadError::Exhausted {
            url: url.to_string(),
            attempts,
            halted,
        }
    }

    async fn run(&self, url: &str) -> Result<String, LoadError> {
        let started = Instant::now();
        let mut attempts = Vec::with_capacity(self.loaders.len());

        for loader in &self.loaders {
            let name = loader.name();
            debug!(chain = %self.name, loader = name, url, "attempting loader");

            let outcome = match self.budget {
                Some(budget) => {
                    let remaining = budget.saturating_sub(started.elapsed());
                    match tokio::time::timeout(remaining, loader.load(url)).await {
                        Ok(outcome) => outcome,
                        Err(_) => {
                            let record = AttemptRecord::new(
                                name,
                                FailureKind::Timeout,
                                format!("chain budget of {}s exhausted", budget.as_secs_f64()),
                            );
                            self.sink.attempt(url, &record);
                            attempts.push(record);
                            return Err(self.exhausted(url, attempts, true));
                        }
                    }
                }
                None => loader.load(url).await,
            };

            let (record, step) = match outcome {
                Ok(content) if !content.trim().is_empty() => {
                    self.sink.success(url, name);
                    return Ok(content);
                }
                Ok(_) => (
                    AttemptRecord::new(name, FailureKind::ContentError, "empty result"),
                    Step::Next,
                ),
                Err(err) => (AttemptRecord::from_error(name, &err), self.classify(&err)),
            };

            self.sink.attempt(url, &record);
            attempts.push(record);

            if let Step::Halt = step {
                return Err(self.exhausted(url, attempts, true));
            }
        }

        Err(self.exhausted(url, attempts, false))
    }
}

impl fmt::Debug for Compose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.loaders.iter().map(|l| l.name()).collect();
        f.debug_struct("Compose")
            .field("name", &self.name)
            .field("loaders", &names)
            .field("policy", &self.policy)
            .field("budget", &self.budget)
            .finish()
    }
}

#[async_trait]
impl Loader for Compose {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load(&self, url: &str) -> Result<String, LoadError> {
        self.run(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::LoaderExt;
    use crate::diagnostics::MemorySink;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const URL: &str = "https://example.com/post";

    /// Scripted loader that logs every invocation into a shared journal.
    struct Scripted {
        name: &'static str,
        journal: Arc<Mutex<Vec<&'static str>>>,
        reply: fn(&str) -> Result<String, LoadError>,
    }

    #[async_trait]
    impl Loader for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        async fn load(&self, url: &str) -> Result<String, LoadError> {
            self.journal.lock().unwrap().push(self.name);
            (self.reply)(url)
        }
    }

    struct Harness {
        journal: Arc<Mutex<Vec<&'static str>>>,
        sink: Arc<MemorySink>,
        loaders: Vec<Arc<dyn Loader>>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                journal: Arc::new(Mutex::new(Vec::new())),
                sink: Arc::new(MemorySink::new()),
                loaders: Vec::new(),
            }
        }

        fn with(mut self, name: &'static str, reply: fn(&str) -> Result<String, LoadError>) -> Self {
            self.loaders.push(Arc::new(Scripted {
                name,
                journal: Arc::clone(&self.journal),
                reply,
            }));
            self
        }

        fn chain(&self) -> Compose {
            Compose::builder()
                .loaders(self.loaders.clone())
                .sink(self.sink.clone())
                .build()
        }

        fn calls(&self) -> Vec<&'static str> {
            self.journal.lock().unwrap().clone()
        }
    }

    fn ok_hello(_: &str) -> Result<String, LoadError> {
        Ok("hello".to_string())
    }

    fn not_applicable(url: &str) -> Result<String, LoadError> {
        Err(LoadError::not_applicable(url, "wrong host"))
    }

    #[tokio::test]
    async fn empty_chain_is_exhausted_with_no_attempts() {
        let h = Harness::new();
        let err = h.chain().load(URL).await.unwrap_err();
        assert!(err.is_exhausted());
        assert_eq!(err.attempts().unwrap().len(), 0);
        assert!(err.to_string().contains(URL));
    }

    #[tokio::test]
    async fn single_loader_success() {
        let h = Harness::new().with("a", ok_hello);
        assert_eq!(h.chain().load(URL).await.unwrap(), "hello");
        assert_eq!(h.calls(), vec!["a"]);
    }

    #[tokio::test]
    async fn falls_back_after_not_applicable() {
        let h = Harness::new()
            .with("a", not_applicable)
            .with("b", ok_hello)
            .with("c", |_| Ok("late".to_string()));
        assert_eq!(h.chain().load(URL).await.unwrap(), "hello");
        assert_eq!(h.calls(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn first_success_short_circuits() {
        let h = Harness::new()
            .with("a", |_| Ok("x".to_string()))
            .with("b", |_| panic!("must not be invoked"));
        assert_eq!(h.chain().load(URL).await.unwrap(), "x");
        assert_eq!(h.calls(), vec!["a"]);
    }

    #[tokio::test]
    async fn empty_and_timeout_are_recorded_before_success() {
        let h = Harness::new()
            .with("a", |_| Ok(String::new()))
            .with("b", |url| {
                Err(LoadError::timeout(url, Duration::from_secs(2), None))
            })
            .with("c", |_| Ok("done".to_string()));

        assert_eq!(h.chain().load(URL).await.unwrap(), "done");
        assert_eq!(h.calls(), vec!["a", "b", "c"]);

        let attempts = h.sink.attempts();
        assert_eq!(attempts.len(), 2);
        assert_eq!(
            attempts[0],
            AttemptRecord::new("a", FailureKind::ContentError, "empty result")
        );
        assert_eq!(attempts[1].kind, FailureKind::Timeout);
        assert_eq!(attempts[1].loader, "b");
    }

    #[tokio::test]
    async fn exhausted_lists_reasons_in_order() {
        let h = Harness::new()
            .with("a", |url| Err(LoadError::content(url, "r1", None)))
            .with("b", |url| Err(LoadError::content(url, "r2", None)));

        let err = h.chain().load(URL).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains(URL));
        let r1 = msg.find("r1").expect("r1 in message");
        let r2 = msg.find("r2").expect("r2 in message");
        assert!(r1 < r2, "reasons out of order: {}", msg);

        let kinds: Vec<FailureKind> = err.attempts().unwrap().iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![FailureKind::ContentError, FailureKind::ContentError]);
        assert!(matches!(
            h.sink.events().last(),
            Some(crate::diagnostics::DiagnosticEvent::Exhausted { attempts: 2, .. })
        ));
    }

    #[tokio::test]
    async fn unexpected_failure_does_not_abort_chain() {
        let h = Harness::new()
            .with("a", |_| Err(LoadError::unexpected(anyhow::anyhow!("socket reset"))))
            .with("b", ok_hello);
        assert_eq!(h.chain().load(URL).await.unwrap(), "hello");
        assert_eq!(h.sink.attempts()[0].kind, FailureKind::Unexpected);
        assert_eq!(h.sink.attempts()[0].detail, "socket reset");
    }

    #[tokio::test]
    async fn environment_failures_continue_by_default() {
        let h = Harness::new()
            .with("a", |_| Err(LoadError::configuration("API key is not set")))
            .with("b", |_| Err(LoadError::missing_dependency("yt-dlp", "pip install yt-dlp")))
            .with("c", ok_hello);
        assert_eq!(h.chain().load(URL).await.unwrap(), "hello");
        assert_eq!(h.calls(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn abort_policy_stops_on_environment_failure() {
        let h = Harness::new()
            .with("a", not_applicable)
            .with("b", |_| Err(LoadError::configuration("API key is not set")))
            .with("c", ok_hello);
        let chain = Compose::builder()
            .loaders(h.loaders.clone())
            .sink(h.sink.clone())
            .policy(EnvironmentPolicy::Abort)
            .build();

        let err = chain.load(URL).await.unwrap_err();
        assert_eq!(h.calls(), vec!["a", "b"]);
        match err {
            LoadError::Exhausted {
                attempts, halted, ..
            } => {
                assert!(halted);
                assert_eq!(attempts.len(), 2);
                assert_eq!(attempts[1].kind, FailureKind::ConfigurationError);
            }
            other => panic!("expected Exhausted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn nested_chain_counts_as_one_attempt() {
        let inner = Harness::new().with("inner-a", not_applicable);
        let outer = Harness::new().with("outer-b", ok_hello);

        let chain = Compose::builder()
            .name("outer")
            .loader(inner.chain())
            .loaders(outer.loaders.clone())
            .sink(outer.sink.clone())
            .build();

        assert_eq!(chain.load(URL).await.unwrap(), "hello");
        let attempts = outer.sink.attempts();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].loader, "compose");
        assert_eq!(attempts[0].kind, FailureKind::Exhausted);
        assert!(attempts[0].detail.contains("inner-a"));
    }

    #[tokio::test]
    async fn halted_nested_chain_stops_an_aborting_outer_chain() {
        let inner = Harness::new()
            .with("inner-a", |_| Err(LoadError::configuration("API key is not set")))
            .with("inner-b", ok_hello);
        let inner_chain = Compose::builder()
            .name("inner")
            .loaders(inner.loaders.clone())
            .policy(EnvironmentPolicy::Abort)
            .build();
        let outer = Harness::new().with("outer-b", ok_hello);

        let chain = Compose::builder()
            .loader(inner_chain)
            .loaders(outer.loaders.clone())
            .sink(outer.sink.clone())
            .policy(EnvironmentPolicy::Abort)
            .build();

        let err = chain.load(URL).await.unwrap_err();
        assert_eq!(inner.calls(), vec!["inner-a"]);
        assert!(outer.calls().is_empty());
        match err {
            LoadError::Exhausted {
                attempts, halted, ..
            } => {
                assert!(halted);
                assert_eq!(attempts.len(), 1);
                assert_eq!(attempts[0].loader, "inner");
            }
            other => panic!("expected Exhausted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn halted_nested_chain_is_skipped_under_continue() {
        let inner = Harness::new()
            .with("inner-a", |_| Err(LoadError::configuration("API key is not set")));
        let inner_chain = Compose::builder()
            .loaders(inner.loaders.clone())
            .policy(EnvironmentPolicy::Abort)
            .build();
        let outer = Harness::new().with("outer-b", ok_hello);

        let chain = Compose::builder()
            .loader(inner_chain)
            .loaders(outer.loaders.clone())
            .sink(outer.sink.clone())
            .build();

        assert_eq!(chain.load(URL).await.unwrap(), "hello");
        assert_eq!(outer.calls(), vec!["outer-b"]);
    }

    #[tokio::test]
    async fn same_chain_twice_gives_same_outcome() {
        let h = Harness::new().with("a", not_applicable).with("b", ok_hello);
        let chain = h.chain();
        let first = chain.load(URL).await.unwrap();
        let second = chain.load(URL).await.unwrap();
        assert_eq!(first, second);

        let failing = Harness::new().with("a", not_applicable).chain();
        let k1 = failing.load(URL).await.unwrap_err().kind();
        let k2 = failing.load(URL).await.unwrap_err().kind();
        assert_eq!(k1, k2);
    }

    #[test]
    fn blocking_and_async_entry_points_agree() {
        let h = Harness::new().with("a", not_applicable).with("b", ok_hello);
        let chain = h.chain();
        let sync_result = chain.load_sync(URL).unwrap();
        let async_result = crate::bridge::block_on(chain.load(URL)).unwrap().unwrap();
        assert_eq!(sync_result, async_result);

        let failing = Harness::new().with("a", not_applicable).chain();
        let sync_err = failing.load_sync(URL).unwrap_err();
        let async_err = crate::bridge::block_on(failing.load(URL)).unwrap().unwrap_err();
        assert_eq!(
            sync_err.as_load_error().map(|e| e.kind()),
            Some(async_err.kind())
        );
    }

    struct Slow {
        delay: Duration,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Loader for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        async fn load(&self, _url: &str) -> Result<String, LoadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok("too late".to_string())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn budget_cuts_off_slow_chain() {
        let calls = Arc::new(AtomicUsize::new(0));
        let sink = Arc::new(MemorySink::new());
        let chain = Compose::builder()
            .loader(Slow {
                delay: Duration::from_secs(60),
                calls: Arc::clone(&calls),
            })
            .loader(Slow {
                delay: Duration::from_secs(1),
                calls: Arc::clone(&calls),
            })
            .sink(sink.clone())
            .budget(Duration::from_secs(5))
            .build();

        let err = chain.load(URL).await.unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        match err {
            LoadError::Exhausted {
                attempts, halted, ..
            } => {
                assert!(halted);
                assert_eq!(attempts.len(), 1);
                assert_eq!(attempts[0].kind, FailureKind::Timeout);
                assert!(attempts[0].detail.contains("budget"));
            }
            other => panic!("expected Exhausted, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn budget_allows_fast_loaders() {
        let calls = Arc::new(AtomicUsize::new(0));
        let chain = Compose::builder()
            .loader(Slow {
                delay: Duration::from_secs(1),
                calls: Arc::clone(&calls),
            })
            .budget(Duration::from_secs(5))
            .build();
        assert_eq!(chain.load(URL).await.unwrap(), "too late");
    }

    #[test]
    fn debug_lists_loader_names() {
        let h = Harness::new().with("a", ok_hello).with("b", ok_hello);
        let dbg = format!("{:?}", h.chain());
        assert!(dbg.contains("[\"a\", \"b\"]"), "got: {}", dbg);
    }
}

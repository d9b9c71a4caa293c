// ABOUTME: Configuration for loaders and chains: HttpOptions, EnvironmentPolicy and ComposeBuilder.
// ABOUTME: ComposeBuilder provides a fluent API for constructing Compose chains with custom settings.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::compose::Compose;
use crate::diagnostics::{DiagnosticSink, TracingSink};
use crate::loader::Loader;

/// Default user agent sent by HTTP-based loaders.
pub const DEFAULT_USER_AGENT: &str = concat!("kabigon/", env!("CARGO_PKG_VERSION"));

/// How a chain treats ConfigurationError and MissingDependency failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnvironmentPolicy {
    /// Record the failure and try the next loader.
    #[default]
    Continue,
    /// Record the failure and stop the chain with Exhausted.
    Abort,
}

/// Settings shared by the HTTP-based loaders.
#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub timeout: Duration,
    pub user_agent: String,
    pub allow_private_networks: bool,
    pub headers: HashMap<String, String>,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            allow_private_networks: false,
            headers: HashMap::new(),
        }
    }
}

impl HttpOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the User-Agent header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Allow or disallow requests to private networks.
    pub fn allow_private_networks(mut self, allow: bool) -> Self {
        self.allow_private_networks = allow;
        self
    }

    /// Add a custom header to all requests.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

/// Builder for constructing Compose chains.
pub struct ComposeBuilder {
    name: String,
    loaders: Vec<Arc<dyn Loader>>,
    sink: Arc<dyn DiagnosticSink>,
    policy: EnvironmentPolicy,
    budget: Option<Duration>,
}

impl ComposeBuilder {
    /// Create a new ComposeBuilder with no loaders and the tracing sink.
    pub fn new() -> Self {
        Self {
            name: "compose".to_string(),
            loaders: Vec::new(),
            sink: Arc::new(TracingSink),
            policy: EnvironmentPolicy::default(),
            budget: None,
        }
    }

    /// Set the identity the chain reports when nested inside another chain.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Append a loader; order of calls is precedence order.
    pub fn loader(mut self, loader: impl Loader + 'static) -> Self {
        self.loaders.push(Arc::new(loader));
        self
    }

    /// Append already shared loaders.
    pub fn loaders(mut self, loaders: impl IntoIterator<Item = Arc<dyn Loader>>) -> Self {
        self.loaders.extend(loaders);
        self
    }

    /// Route attempt and failure events to `sink`.
    pub fn sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn policy(mut self, policy: EnvironmentPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Cap the total time spent across all attempts.
    pub fn budget(mut self, budget: Duration) -> Self {
        self.budget = Some(budget);
        self
    }

    /// Build the Compose chain.
    pub fn build(self) -> Compose {
        Compose::from_parts(self.name, self.loaders, self.sink, self.policy, self.budget)
    }
}

impl Default for ComposeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

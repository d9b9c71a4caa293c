// ABOUTME: The Loader capability every extraction strategy implements, plus the blocking-only variant.
// ABOUTME: Blocking<L> adapts a BlockingLoader to the async contract by offloading onto a worker thread.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::LoadError;

/// A fetch-and-extract strategy for one source or URL family.
///
/// Implementations hold configuration only. Any failure a loader cannot classify
/// must be returned as [`LoadError::Unexpected`]; loaders never panic on bad input.
#[async_trait]
pub trait Loader: Send + Sync {
    /// Stable identity used in diagnostics and attempt records.
    fn name(&self) -> &str;

    /// Load `url` and return its extracted text.
    async fn load(&self, url: &str) -> Result<String, LoadError>;
}

#[async_trait]
impl<L: Loader + ?Sized> Loader for Arc<L> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn load(&self, url: &str) -> Result<String, LoadError> {
        (**self).load(url).await
    }
}

#[async_trait]
impl<L: Loader + ?Sized> Loader for Box<L> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn load(&self, url: &str) -> Result<String, LoadError> {
        (**self).load(url).await
    }
}

/// A strategy that only has a blocking implementation.
///
/// Call `load_blocking` directly from ordinary code; wrap it in [`Blocking`] to
/// use it in a chain.
pub trait BlockingLoader: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn load_blocking(&self, url: &str) -> Result<String, LoadError>;
}

/// Runs a [`BlockingLoader`] on tokio's blocking pool so it never stalls the scheduler.
pub struct Blocking<L> {
    inner: Arc<L>,
}

impl<L: BlockingLoader> Blocking<L> {
    pub fn new(loader: L) -> Self {
        Self {
            inner: Arc::new(loader),
        }
    }

    /// Borrow the wrapped loader.
    pub fn get_ref(&self) -> &L {
        &self.inner
    }
}

#[async_trait]
impl<L: BlockingLoader> Loader for Blocking<L> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn load(&self, url: &str) -> Result<String, LoadError> {
        let inner = Arc::clone(&self.inner);
        let url_owned = url.to_string();

        tokio::task::spawn_blocking(move || inner.load_blocking(&url_owned))
            .await
            .map_err(|e| {
                LoadError::unexpected(anyhow::anyhow!(
                    "{} worker thread failed: {}",
                    self.inner.name(),
                    e
                ))
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    struct ThreadName;

    impl BlockingLoader for ThreadName {
        fn name(&self) -> &str {
            "thread-name"
        }

        fn load_blocking(&self, _url: &str) -> Result<String, LoadError> {
            Ok(format!("{:?}", thread::current().id()))
        }
    }

    struct Panics;

    impl BlockingLoader for Panics {
        fn name(&self) -> &str {
            "panics"
        }

        fn load_blocking(&self, _url: &str) -> Result<String, LoadError> {
            panic!("boom");
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn blocking_loader_runs_off_the_scheduler_thread() {
        let loader = Blocking::new(ThreadName);
        let worker = loader.load("https://example.com").await.unwrap();
        let here = format!("{:?}", thread::current().id());
        assert_ne!(worker, here);
        assert_eq!(loader.name(), "thread-name");
    }

    #[tokio::test]
    async fn panicking_worker_becomes_unexpected() {
        let loader = Blocking::new(Panics);
        let err = loader.load("https://example.com").await.unwrap_err();
        assert_eq!(err.kind(), crate::error::FailureKind::Unexpected);
        assert!(err.to_string().contains("panics worker thread failed"));
    }

    #[test]
    fn blocking_loader_is_callable_directly() {
        let loader = Blocking::new(ThreadName);
        assert!(loader.get_ref().load_blocking("https://example.com").is_ok());
    }
}

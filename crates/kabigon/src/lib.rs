// ABOUTME: Main library entry point for kabigon, a URL-to-text fallback chain.
// ABOUTME: Re-exports the public API: Loader, Compose, LoadError, the leaf loaders and the registry.

//! Kabigon - turn a URL into text by trying loaders until one works.
//!
//! Each [`Loader`] knows how to extract text from one kind of source. A
//! [`Compose`] chain tries its loaders in order, skips the ones that do not
//! apply, records every failure, and returns the first non-empty result. When
//! nothing works the caller gets [`LoadError::Exhausted`] with one
//! [`AttemptRecord`] per loader tried.
//!
//! # Example
//!
//! ```no_run
//! use kabigon::{Compose, HttpOptions, LoadError};
//! use kabigon::loaders::{GitHubLoader, HttpLoader};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), LoadError> {
//!     let opts = HttpOptions::new();
//!     let chain = Compose::builder()
//!         .loader(GitHubLoader::new(opts.clone()))
//!         .loader(HttpLoader::new(opts))
//!         .build();
//!     let text = kabigon::Loader::load(&chain, "https://example.com").await?;
//!     println!("{}", text);
//!     Ok(())
//! }
//! ```
//!
//! From non-async code use [`LoaderExt::load_sync`] or [`load_url_sync`].

pub mod bridge;
pub mod compose;
pub mod diagnostics;
pub mod error;
pub mod formats;
pub mod loader;
pub mod loaders;
pub mod options;
pub mod registry;
pub mod resource;

pub use crate::bridge::{block_on, LoaderExt};
pub use crate::compose::{AttemptRecord, Compose};
pub use crate::diagnostics::{DiagnosticEvent, DiagnosticSink, MemorySink, NullSink, TracingSink};
pub use crate::error::{BlockingError, FailureKind, LoadError, Severity};
pub use crate::loader::{Blocking, BlockingLoader, Loader};
pub use crate::options::{ComposeBuilder, EnvironmentPolicy, HttpOptions};
pub use crate::registry::{build_chain, default_chain, LoaderSpec, RegistryError, LOADER_SPECS};

/// Load `url` with the default chain.
pub async fn load_url(url: &str) -> Result<String, LoadError> {
    default_chain(&HttpOptions::default()).load(url).await
}

/// Blocking [`load_url`]. Fails with [`BlockingError::NestedRuntime`] inside a runtime.
pub fn load_url_sync(url: &str) -> Result<String, BlockingError> {
    default_chain(&HttpOptions::default()).load_sync(url)
}

/// Load several URLs concurrently through one chain.
///
/// Results come back in input order. Each URL gets its own independent chain run.
pub async fn load_urls<L, I, S>(loader: &L, urls: I) -> Vec<Result<String, LoadError>>
where
    L: Loader + ?Sized,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let urls: Vec<S> = urls.into_iter().collect();
    futures::future::join_all(urls.iter().map(|url| loader.load(url.as_ref()))).await
}

// ABOUTME: Blocking entry points over the async loader API.
// ABOUTME: Drives futures on a private tokio runtime and refuses to nest inside an active one.

use std::future::Future;

use tokio::runtime::{Handle, Runtime};

use crate::error::BlockingError;
use crate::loader::Loader;

/// Run `fut` to completion on a private runtime that is torn down afterwards.
///
/// Fails with [`BlockingError::NestedRuntime`] when the calling thread is already
/// inside a tokio runtime, where blocking would stall or panic the outer scheduler.
pub fn block_on<F: Future>(fut: F) -> Result<F::Output, BlockingError> {
    if Handle::try_current().is_ok() {
        return Err(BlockingError::NestedRuntime);
    }

    let rt = Runtime::new().map_err(BlockingError::Runtime)?;
    Ok(rt.block_on(fut))
}

/// Blocking counterpart of [`Loader::load`], available on every loader and chain.
pub trait LoaderExt: Loader {
    /// Load `url` from ordinary, non-async code.
    fn load_sync(&self, url: &str) -> Result<String, BlockingError> {
        let content = block_on(self.load(url))??;
        Ok(content)
    }
}

impl<L: Loader + ?Sized> LoaderExt for L {}

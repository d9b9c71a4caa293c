// ABOUTME: Named loader registry and the default chain, shared by the library API and the CLI.
// ABOUTME: Resolves comma-separated loader names into instances in the order given.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::compose::Compose;
use crate::loader::{Blocking, Loader};
use crate::loaders::{
    BrowserLoader, FirecrawlLoader, GitHubLoader, HttpLoader, PdfLoader, PttLoader, RedditLoader,
    TruthSocialLoader, TwitterLoader, WaitUntil, YoutubeLoader, YtdlpLoader,
};
use crate::options::{ComposeBuilder, HttpOptions};

/// Transcription downloads whole audio tracks; never give them less than this.
const MIN_TRANSCRIBE_TIMEOUT: Duration = Duration::from_secs(300);

/// A loader that can be selected by name.
#[derive(Clone, Copy)]
pub struct LoaderSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub factory: fn(&HttpOptions) -> Arc<dyn Loader>,
}

impl std::fmt::Debug for LoaderSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoaderSpec")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

impl LoaderSpec {
    pub fn build(&self, opts: &HttpOptions) -> Arc<dyn Loader> {
        (self.factory)(opts)
    }
}

fn transcribe_timeout(opts: &HttpOptions) -> Duration {
    opts.timeout.max(MIN_TRANSCRIBE_TIMEOUT)
}

/// Every selectable loader, in listing order.
pub static LOADER_SPECS: &[LoaderSpec] = &[
    LoaderSpec {
        name: "browser",
        description: "Headless browser rendering for any website",
        factory: |opts| Arc::new(BrowserLoader::new(opts.clone())),
    },
    LoaderSpec {
        name: "http",
        description: "Simple HTTP fetch + HTML to markdown",
        factory: |opts| Arc::new(HttpLoader::new(opts.clone())),
    },
    LoaderSpec {
        name: "firecrawl",
        description: "Firecrawl-based web extraction",
        factory: |opts| Arc::new(FirecrawlLoader::new(opts.timeout)),
    },
    LoaderSpec {
        name: "youtube",
        description: "Extracts YouTube video transcripts",
        factory: |opts| Arc::new(YoutubeLoader::new(opts.clone())),
    },
    LoaderSpec {
        name: "twitter",
        description: "Extracts Twitter/X post content",
        factory: |opts| Arc::new(TwitterLoader::new(opts.clone())),
    },
    LoaderSpec {
        name: "truthsocial",
        description: "Extracts Truth Social posts",
        factory: |opts| Arc::new(TruthSocialLoader::new(opts.clone())),
    },
    LoaderSpec {
        name: "reel",
        description: "Instagram Reels audio transcription + metadata",
        factory: |opts| Arc::new(YtdlpLoader::reel(transcribe_timeout(opts))),
    },
    LoaderSpec {
        name: "youtube-ytdlp",
        description: "YouTube audio transcription via yt-dlp + Whisper",
        factory: |opts| Arc::new(YtdlpLoader::youtube(transcribe_timeout(opts))),
    },
    LoaderSpec {
        name: "ytdlp",
        description: "Audio transcription via yt-dlp + Whisper",
        factory: |opts| Arc::new(YtdlpLoader::new(transcribe_timeout(opts))),
    },
    LoaderSpec {
        name: "reddit",
        description: "Extracts Reddit posts and comments",
        factory: |opts| Arc::new(RedditLoader::new(opts.clone())),
    },
    LoaderSpec {
        name: "ptt",
        description: "Taiwan PTT forum posts",
        factory: |opts| Arc::new(PttLoader::new(opts.clone())),
    },
    LoaderSpec {
        name: "github",
        description: "Fetches GitHub pages and file content",
        factory: |opts| Arc::new(GitHubLoader::new(opts.clone())),
    },
    LoaderSpec {
        name: "pdf",
        description: "Extracts text from PDF files",
        factory: |opts| Arc::new(Blocking::new(PdfLoader::new(opts.clone()))),
    },
];

/// Errors from resolving loader names.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("loader list cannot be empty")]
    Empty,

    #[error("unknown loader(s): {}. Use --list to see supported loaders.", .0.join(", "))]
    Unknown(Vec<String>),
}

/// Look up a loader spec by name.
pub fn lookup(name: &str) -> Option<&'static LoaderSpec> {
    LOADER_SPECS.iter().find(|spec| spec.name == name)
}

/// Split a comma-separated list and check every name against the registry.
pub fn parse_loader_names(raw: &str) -> Result<Vec<String>, RegistryError> {
    let names: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .collect();
    if names.is_empty() {
        return Err(RegistryError::Empty);
    }

    let unknown: Vec<String> = names
        .iter()
        .filter(|n| lookup(n).is_none())
        .cloned()
        .collect();
    if !unknown.is_empty() {
        return Err(RegistryError::Unknown(unknown));
    }
    Ok(names)
}

/// Instantiate the named loaders in order.
pub fn build_loaders<S: AsRef<str>>(
    names: &[S],
    opts: &HttpOptions,
) -> Result<Vec<Arc<dyn Loader>>, RegistryError> {
    if names.is_empty() {
        return Err(RegistryError::Empty);
    }
    let mut unknown = Vec::new();
    let mut loaders = Vec::with_capacity(names.len());
    for name in names {
        match lookup(name.as_ref()) {
            Some(spec) => loaders.push(spec.build(opts)),
            None => unknown.push(name.as_ref().to_string()),
        }
    }
    if !unknown.is_empty() {
        return Err(RegistryError::Unknown(unknown));
    }
    Ok(loaders)
}

/// A default-settings chain over the named loaders. Start from
/// [`build_loaders`] and [`ComposeBuilder`] to change policy, budget or sink.
pub fn build_chain<S: AsRef<str>>(
    names: &[S],
    opts: &HttpOptions,
) -> Result<Compose, RegistryError> {
    Ok(ComposeBuilder::new().loaders(build_loaders(names, opts)?).build())
}

/// The general-purpose chain: site-specific loaders first, then a patient
/// browser pass, a quick browser pass and finally plain HTTP.
pub fn default_loaders(opts: &HttpOptions) -> Vec<Arc<dyn Loader>> {
    let loaders: [Arc<dyn Loader>; 11] = [
        Arc::new(PttLoader::new(opts.clone())),
        Arc::new(TwitterLoader::new(opts.clone())),
        Arc::new(TruthSocialLoader::new(opts.clone())),
        Arc::new(RedditLoader::new(opts.clone())),
        Arc::new(YoutubeLoader::new(opts.clone())),
        Arc::new(YtdlpLoader::reel(transcribe_timeout(opts))),
        Arc::new(YtdlpLoader::youtube(transcribe_timeout(opts))),
        Arc::new(Blocking::new(PdfLoader::new(opts.clone()))),
        Arc::new(
            BrowserLoader::new(opts.clone())
                .timeout(Duration::from_secs(50))
                .wait_until(WaitUntil::NetworkIdle),
        ),
        Arc::new(BrowserLoader::new(opts.clone()).timeout(Duration::from_secs(10))),
        Arc::new(HttpLoader::new(opts.clone())),
    ];
    loaders.into()
}

/// [`default_loaders`] as a chain with default settings.
pub fn default_chain(opts: &HttpOptions) -> Compose {
    Compose::new(default_loaders(opts))
}

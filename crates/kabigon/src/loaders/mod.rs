// ABOUTME: Leaf loaders, one per source or URL family.
// ABOUTME: Each maps its own failures into LoadError so chains can classify them.

pub mod browser;
pub mod firecrawl;
pub mod github;
pub mod http;
pub mod pdf;
pub(crate) mod process;
pub mod ptt;
pub mod reddit;
pub mod truthsocial;
pub mod twitter;
pub mod youtube;
pub mod ytdlp;

pub use browser::{BrowserLoader, WaitUntil};
pub use firecrawl::FirecrawlLoader;
pub use github::GitHubLoader;
pub use http::HttpLoader;
pub use pdf::PdfLoader;
pub use ptt::PttLoader;
pub use reddit::RedditLoader;
pub use truthsocial::TruthSocialLoader;
pub use twitter::TwitterLoader;
pub use youtube::YoutubeLoader;
pub use ytdlp::YtdlpLoader;

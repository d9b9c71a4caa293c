// ABOUTME: Browser loader: renders a page in headless Chromium and converts the DOM to Markdown.
// ABOUTME: The browser runs as a short-lived subprocess that is killed on timeout or drop.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::LoadError;
use crate::formats::html_to_markdown;
use crate::loader::Loader;
use crate::loaders::process::{require_executable, run_with_timeout};
use crate::options::{HttpOptions, DEFAULT_USER_AGENT};
use crate::resource::{guard_host, parse_http_url};

/// Executable names tried in order.
const BROWSER_CANDIDATES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
    "chrome",
];

/// When the rendered DOM is captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitUntil {
    /// Right after the load event.
    #[default]
    Load,
    /// After the page has been given time to settle its network activity.
    NetworkIdle,
}

/// Renders pages with a headless Chromium-family browser.
#[derive(Debug, Clone)]
pub struct BrowserLoader {
    timeout: Duration,
    wait_until: WaitUntil,
    user_agent: Option<String>,
    allow_private_networks: bool,
    executable: Option<PathBuf>,
}

impl Default for BrowserLoader {
    fn default() -> Self {
        Self::new(HttpOptions::default())
    }
}

impl BrowserLoader {
    /// Takes the timeout and private network rule from `opts`. A user agent
    /// other than the library default is handed to the browser as well.
    pub fn new(opts: HttpOptions) -> Self {
        let user_agent = (opts.user_agent != DEFAULT_USER_AGENT).then_some(opts.user_agent);
        Self {
            timeout: opts.timeout,
            wait_until: WaitUntil::Load,
            user_agent,
            allow_private_networks: opts.allow_private_networks,
            executable: None,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout_value(&self) -> Duration {
        self.timeout
    }

    pub fn wait_until(mut self, wait_until: WaitUntil) -> Self {
        self.wait_until = wait_until;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Use this browser binary instead of searching PATH.
    pub fn executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable = Some(path.into());
        self
    }

    fn locate(&self) -> Result<PathBuf, LoadError> {
        match self.executable {
            Some(ref path) => Ok(path.clone()),
            None => require_executable(
                BROWSER_CANDIDATES,
                "chromium",
                "install Chromium or Google Chrome and put it on PATH",
            ),
        }
    }

    /// Virtual time the browser lets the page run before dumping the DOM.
    fn settle_budget(&self) -> Duration {
        match self.wait_until {
            WaitUntil::Load => Duration::ZERO,
            WaitUntil::NetworkIdle => self.timeout / 2,
        }
    }

    fn args(&self, url: &str) -> Vec<String> {
        let mut args = vec![
            "--headless=new".to_string(),
            "--disable-gpu".to_string(),
            "--no-sandbox".to_string(),
            "--no-first-run".to_string(),
            "--hide-scrollbars".to_string(),
            "--mute-audio".to_string(),
        ];
        let settle = self.settle_budget();
        if !settle.is_zero() {
            args.push(format!("--virtual-time-budget={}", settle.as_millis()));
        }
        if let Some(ref ua) = self.user_agent {
            args.push(format!("--user-agent={}", ua));
        }
        args.push("--dump-dom".to_string());
        args.push(url.to_string());
        args
    }
}

#[async_trait]
impl Loader for BrowserLoader {
    fn name(&self) -> &str {
        "browser"
    }

    async fn load(&self, url: &str) -> Result<String, LoadError> {
        let target = parse_http_url(url)?;
        if !self.allow_private_networks {
            guard_host(&target, url).await?;
        }
        let browser = self.locate()?;

        let mut cmd = Command::new(browser);
        cmd.args(self.args(url));
        let output = run_with_timeout(cmd, url, self.timeout, "browser").await?;

        let html = String::from_utf8_lossy(&output.stdout);
        if html.trim().is_empty() {
            return Err(LoadError::content(
                url,
                "browser returned an empty document",
                Some("The page may require interaction or block headless browsers.".to_string()),
            ));
        }
        Ok(html_to_markdown(&html))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_idle_adds_virtual_time_budget() {
        let loader = BrowserLoader::default()
            .timeout(Duration::from_secs(50))
            .wait_until(WaitUntil::NetworkIdle);
        let args = loader.args("https://example.com");
        assert!(args.contains(&"--virtual-time-budget=25000".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("https://example.com"));
    }

    #[test]
    fn load_wait_has_no_budget() {
        let args = BrowserLoader::default()
            .timeout(Duration::from_secs(10))
            .args("https://example.com");
        assert!(!args.iter().any(|a| a.starts_with("--virtual-time-budget")));
        assert!(args.contains(&"--dump-dom".to_string()));
    }

    #[tokio::test]
    async fn non_http_url_is_not_applicable() {
        let err = BrowserLoader::default()
            .load("mailto:someone@example.com")
            .await
            .unwrap_err();
        assert!(err.is_not_applicable());
    }

    #[test]
    fn only_a_custom_user_agent_reaches_the_browser() {
        let default_args = BrowserLoader::default().args("https://example.com");
        assert!(!default_args.iter().any(|a| a.starts_with("--user-agent")));

        let custom = BrowserLoader::new(HttpOptions::new().user_agent("Mozilla/5.0 test"));
        assert!(custom
            .args("https://example.com")
            .contains(&"--user-agent=Mozilla/5.0 test".to_string()));
    }

    /// Writes an executable shell script that prints `html` and ignores its arguments.
    #[cfg(unix)]
    fn fake_browser(dir: &std::path::Path, html: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("chromium");
        std::fs::write(&path, format!("#!/bin/sh\ncat <<'HTML'\n{}\nHTML\n", html)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn private_hosts_are_refused_before_spawning() {
        let dir = tempfile::tempdir().unwrap();
        let browser = fake_browser(dir.path(), "<html><body><p>internal admin page</p></body></html>");

        let err = BrowserLoader::default()
            .executable(&browser)
            .load("http://127.0.0.1:9/admin")
            .await
            .unwrap_err();
        assert!(err.is_not_applicable(), "got: {}", err);
        assert!(err.to_string().contains("private network"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn private_hosts_render_when_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let browser = fake_browser(dir.path(), "<html><body><p>internal admin page</p></body></html>");

        let text = BrowserLoader::new(HttpOptions::new().allow_private_networks(true))
            .executable(&browser)
            .load("http://127.0.0.1:9/admin")
            .await
            .unwrap();
        assert!(text.contains("internal admin page"), "got: {}", text);
    }
}

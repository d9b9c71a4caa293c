// ABOUTME: Audio transcription loaders: yt-dlp downloads the audio track and Whisper transcribes it.
// ABOUTME: Work happens in a scoped temp directory; missing tools surface as MissingDependency.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;
use url::Url;

use crate::error::LoadError;
use crate::loader::Loader;
use crate::loaders::process::{require_executable, run_with_timeout};
use crate::loaders::youtube::check_youtube_url;
use crate::resource::parse_http_url;

const AUDIO_STEM: &str = "audio";
const DEFAULT_WHISPER_MODEL: &str = "tiny";

pub const INSTAGRAM_HOSTS: &[&str] = &["instagram.com", "www.instagram.com", "m.instagram.com"];

/// Require an Instagram Reel URL (`/reel/<id>` or `/reels/<id>`).
pub fn check_reel_url(url: &str) -> Result<Url, LoadError> {
    let parsed = parse_http_url(url)?;
    let host = parsed.host_str().unwrap_or("").to_ascii_lowercase();
    let is_reel = parsed
        .path_segments()
        .and_then(|mut segments| segments.next())
        .map(|first| first == "reel" || first == "reels")
        .unwrap_or(false);
    if !INSTAGRAM_HOSTS.contains(&host.as_str()) || !is_reel {
        return Err(LoadError::not_applicable(url, "Not an Instagram Reel URL"));
    }
    Ok(parsed)
}

/// Which URLs a transcription loader accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Scope {
    #[default]
    Any,
    Youtube,
    Reel,
}

/// Transcribes the audio of any yt-dlp supported page.
#[derive(Debug, Clone)]
pub struct YtdlpLoader {
    timeout: Duration,
    whisper_model: String,
    scope: Scope,
}

impl Default for YtdlpLoader {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            whisper_model: DEFAULT_WHISPER_MODEL.to_string(),
            scope: Scope::Any,
        }
    }
}

impl YtdlpLoader {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            ..Default::default()
        }
    }

    /// Same pipeline restricted to YouTube URLs.
    pub fn youtube(timeout: Duration) -> Self {
        Self {
            scope: Scope::Youtube,
            ..Self::new(timeout)
        }
    }

    /// Instagram Reels only; the transcript is preceded by the reel's title,
    /// uploader and caption.
    pub fn reel(timeout: Duration) -> Self {
        Self {
            scope: Scope::Reel,
            ..Self::new(timeout)
        }
    }

    pub fn whisper_model(mut self, model: impl Into<String>) -> Self {
        self.whisper_model = model.into();
        self
    }

    fn check_url(&self, url: &str) -> Result<(), LoadError> {
        match self.scope {
            Scope::Any => parse_http_url(url).map(drop),
            Scope::Youtube => check_youtube_url(url).map(drop),
            Scope::Reel => check_reel_url(url).map(drop),
        }
    }

    async fn download_audio(
        &self,
        ytdlp: &Path,
        dir: &Path,
        url: &str,
    ) -> Result<PathBuf, LoadError> {
        let template = dir.join(format!("{}.%(ext)s", AUDIO_STEM));
        let mut cmd = Command::new(ytdlp);
        cmd.args(["--no-playlist", "--quiet", "-x", "--audio-format", "mp3"]);
        if self.scope == Scope::Reel {
            cmd.arg("--write-info-json");
        }
        cmd.arg("-o").arg(&template).arg(url);
        run_with_timeout(cmd, url, self.timeout, "yt-dlp").await?;

        find_with_stem(dir, AUDIO_STEM, None)
            .ok_or_else(|| LoadError::content(url, "yt-dlp produced no audio file", None))
    }

    async fn transcribe(
        &self,
        whisper: &Path,
        dir: &Path,
        audio: &Path,
        url: &str,
    ) -> Result<String, LoadError> {
        let mut cmd = Command::new(whisper);
        cmd.arg(audio)
            .args(["--model", self.whisper_model.as_str()])
            .args(["--output_format", "txt", "--output_dir"])
            .arg(dir);
        run_with_timeout(cmd, url, self.timeout, "whisper").await?;

        let transcript = find_with_stem(dir, AUDIO_STEM, Some("txt"))
            .ok_or_else(|| LoadError::content(url, "whisper produced no transcript", None))?;
        tokio::fs::read_to_string(&transcript)
            .await
            .map_err(|e| LoadError::unexpected(anyhow::anyhow!("failed to read transcript: {}", e)))
    }
}

/// Reads the info JSON yt-dlp wrote next to the audio, if any.
fn read_metadata(dir: &Path) -> Option<serde_json::Value> {
    let raw = std::fs::read(dir.join(format!("{}.info.json", AUDIO_STEM))).ok()?;
    serde_json::from_slice(&raw).ok()
}

/// Prefix `transcript` with whatever title, uploader and caption `info` carries.
fn with_metadata(info: &serde_json::Value, transcript: &str) -> String {
    let field = |key: &str| {
        info.get(key)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let mut out = String::new();
    if let Some(title) = field("title") {
        out.push_str(&format!("# {}\n\n", title));
    }
    if let Some(uploader) = field("uploader").or_else(|| field("channel")) {
        out.push_str(&format!("Uploader: {}\n\n", uploader));
    }
    if let Some(caption) = field("description") {
        out.push_str(caption);
        out.push_str("\n\n");
    }
    if out.is_empty() {
        return transcript.to_string();
    }
    out.push_str("## Transcript\n\n");
    out.push_str(transcript);
    out
}

/// First file in `dir` named `<stem>.<ext>`, any extension when `ext` is None.
fn find_with_stem(dir: &Path, stem: &str, ext: Option<&str>) -> Option<PathBuf> {
    std::fs::read_dir(dir)
        .ok()?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .find(|path| {
            let stem_ok = path.file_stem().and_then(|s| s.to_str()) == Some(stem);
            let ext_ok = match ext {
                Some(want) => path.extension().and_then(|e| e.to_str()) == Some(want),
                None => path.extension().map(|e| e != "txt").unwrap_or(false),
            };
            stem_ok && ext_ok
        })
}

#[async_trait]
impl Loader for YtdlpLoader {
    fn name(&self) -> &str {
        match self.scope {
            Scope::Any => "ytdlp",
            Scope::Youtube => "youtube-ytdlp",
            Scope::Reel => "reel",
        }
    }

    async fn load(&self, url: &str) -> Result<String, LoadError> {
        self.check_url(url)?;
        let ytdlp = require_executable(&["yt-dlp"], "yt-dlp", "pip install yt-dlp")?;
        let whisper =
            require_executable(&["whisper"], "openai-whisper", "pip install openai-whisper")?;

        let workdir = tempfile::tempdir().map_err(|e| {
            LoadError::unexpected(anyhow::anyhow!("failed to create temp dir: {}", e))
        })?;

        let audio = self.download_audio(&ytdlp, workdir.path(), url).await?;
        debug!(url, audio = %audio.display(), "downloaded audio");
        let text = self.transcribe(&whisper, workdir.path(), &audio, url).await?;
        let text = text.trim();
        if self.scope == Scope::Reel {
            if let Some(info) = read_metadata(workdir.path()) {
                return Ok(with_metadata(&info, text));
            }
        }
        Ok(text.to_string())
    }
}

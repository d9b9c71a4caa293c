// ABOUTME: YouTube transcript loader: finds caption tracks on the watch page and joins their lines.
// ABOUTME: Also owns YouTube URL recognition and video ID parsing used by the yt-dlp loader.

use std::borrow::Cow;

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::LoadError;
use crate::loader::Loader;
use crate::loaders::http::fetch_page;
use crate::options::HttpOptions;

pub const DEFAULT_LANGUAGES: &[&str] = &["zh-TW", "zh-Hant", "zh", "zh-Hans", "ja", "en", "ko"];

pub const ALLOWED_HOSTS: &[&str] = &[
    "youtu.be",
    "m.youtube.com",
    "youtube.com",
    "www.youtube.com",
    "www.youtube-nocookie.com",
    "vid.plus",
];

const DEFAULT_WATCH_BASE: &str = "https://www.youtube.com";
const VIDEO_ID_LEN: usize = 11;

/// Require an http(s) URL on one of the YouTube hosts.
pub fn check_youtube_url(url: &str) -> Result<Url, LoadError> {
    let parsed =
        Url::parse(url).map_err(|e| LoadError::not_applicable(url, format!("invalid URL: {}", e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(LoadError::not_applicable(
            url,
            format!("unsupported URL scheme: {}", parsed.scheme()),
        ));
    }
    let host = parsed.host_str().unwrap_or("");
    if !ALLOWED_HOSTS.contains(&host) {
        return Err(LoadError::not_applicable(
            url,
            format!("unsupported URL host: {}", host),
        ));
    }
    Ok(parsed)
}

/// Extract the 11-character video ID from a YouTube URL.
///
/// `/watch` paths take the `v` query parameter; anything else uses the last
/// path segment (`youtu.be/<id>`, `/shorts/<id>`, `vid.plus/<id>`).
pub fn parse_video_id(url: &str) -> Result<String, LoadError> {
    let parsed = check_youtube_url(url)?;

    let video_id = if parsed.path().ends_with("/watch") {
        parsed
            .query_pairs()
            .find(|(k, _)| k == "v")
            .map(|(_, v)| v.into_owned())
            .ok_or_else(|| LoadError::not_applicable(url, "no video found in URL"))?
    } else {
        parsed
            .path()
            .trim_start_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or("")
            .to_string()
    };

    if video_id.chars().count() != VIDEO_ID_LEN {
        return Err(LoadError::not_applicable(
            url,
            format!("invalid video ID: {}", video_id),
        ));
    }
    Ok(video_id)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptionTrack {
    base_url: String,
    language_code: String,
    #[serde(default)]
    kind: Option<String>,
}

impl CaptionTrack {
    fn is_generated(&self) -> bool {
        self.kind.as_deref() == Some("asr")
    }
}

/// Pull the `captionTracks` array out of a watch page.
fn extract_caption_tracks(html: &str) -> Vec<CaptionTrack> {
    const MARKER: &str = "\"captionTracks\":";
    let Some(start) = html.find(MARKER) else {
        return Vec::new();
    };
    let rest = &html[start + MARKER.len()..];
    serde_json::Deserializer::from_str(rest)
        .into_iter::<Vec<CaptionTrack>>()
        .next()
        .and_then(Result::ok)
        .unwrap_or_default()
}

/// Pick a track by language preference, manual captions before generated ones.
fn select_track<'a>(tracks: &'a [CaptionTrack], languages: &[String]) -> Option<&'a CaptionTrack> {
    for generated in [false, true] {
        for lang in languages {
            if let Some(track) = tracks
                .iter()
                .find(|t| t.language_code == *lang && t.is_generated() == generated)
            {
                return Some(track);
            }
        }
    }
    None
}

fn unescape_text(raw: &str) -> String {
    quick_xml::escape::unescape(raw)
        .map(Cow::into_owned)
        .unwrap_or_else(|_| raw.to_string())
}

/// Parse transcript XML (`<text>` or `<p>` cues) into non-empty lines.
pub(crate) fn parse_transcript_xml(xml: &str) -> Result<Vec<String>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut lines = Vec::new();
    let mut current: Option<String> = None;

    loop {
        match reader.read_event()? {
            Event::Start(ref e) if matches!(e.name().as_ref(), b"text" | b"p") => {
                current = Some(String::new());
            }
            Event::Text(ref e) => {
                if let Some(ref mut cue) = current {
                    let text = e.decode().map(|s| s.into_owned()).unwrap_or_default();
                    cue.push_str(&text);
                }
            }
            Event::GeneralRef(ref e) => {
                if let Some(ref mut cue) = current {
                    let name = e.decode().map(|s| s.into_owned()).unwrap_or_default();
                    cue.push_str(&unescape_text(&format!("&{};", name)));
                }
            }
            Event::End(ref e) if matches!(e.name().as_ref(), b"text" | b"p") => {
                if let Some(cue) = current.take() {
                    // captions are frequently escaped twice
                    let line = unescape_text(&cue);
                    let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
                    if !line.is_empty() {
                        lines.push(line);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(lines)
}

/// Loads the caption transcript of a YouTube video.
#[derive(Debug, Clone)]
pub struct YoutubeLoader {
    opts: HttpOptions,
    languages: Vec<String>,
    watch_base: String,
}

impl Default for YoutubeLoader {
    fn default() -> Self {
        Self::new(HttpOptions::default())
    }
}

impl YoutubeLoader {
    pub fn new(opts: HttpOptions) -> Self {
        Self {
            opts,
            languages: DEFAULT_LANGUAGES.iter().map(|s| s.to_string()).collect(),
            watch_base: DEFAULT_WATCH_BASE.to_string(),
        }
    }

    /// Replace the language preference list.
    pub fn languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.languages = languages.into_iter().map(Into::into).collect();
        self
    }

    /// Host serving watch pages.
    pub fn watch_base(mut self, base: impl Into<String>) -> Self {
        self.watch_base = base.into();
        self
    }

    async fn fetch_transcript(&self, url: &str, video_id: &str) -> Result<String, LoadError> {
        let watch_url = format!(
            "{}/watch?v={}",
            self.watch_base.trim_end_matches('/'),
            video_id
        );
        let page = fetch_page(&self.opts, &watch_url).await?;
        let tracks = extract_caption_tracks(&page.text());
        if tracks.is_empty() {
            return Err(LoadError::content(
                url,
                "no captions available for this video",
                Some("Try the youtube-ytdlp loader to transcribe the audio.".to_string()),
            ));
        }

        let track = select_track(&tracks, &self.languages).ok_or_else(|| {
            let available: Vec<&str> = tracks.iter().map(|t| t.language_code.as_str()).collect();
            LoadError::content(
                url,
                format!(
                    "no transcript in {} (available: {})",
                    self.languages.join(", "),
                    available.join(", ")
                ),
                None,
            )
        })?;
        debug!(url, language = %track.language_code, generated = track.is_generated(), "caption track");

        let xml = fetch_page(&self.opts, &track.base_url).await?.text();
        let lines = parse_transcript_xml(&xml).map_err(|e| {
            LoadError::content(url, format!("malformed transcript: {}", e), None)
        })?;
        Ok(lines.join("\n"))
    }
}

#[async_trait]
impl Loader for YoutubeLoader {
    fn name(&self) -> &str {
        "youtube"
    }

    async fn load(&self, url: &str) -> Result<String, LoadError> {
        let video_id = parse_video_id(url)?;
        self.fetch_transcript(url, &video_id).await
    }
}

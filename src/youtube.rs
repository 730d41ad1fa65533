use async_trait::async_trait;
use eyre::bail;
use log::{debug, warn};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use regex::Regex;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::language::{PageSignals, TrackHint};
use crate::transport::Transport;
use crate::{CaptionTrack, RawCaption};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerResponse {
    captions: Option<CaptionsData>,
    video_details: Option<VideoDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoDetails {
    title: Option<String>,
    short_description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptionsData {
    player_captions_tracklist_renderer: Option<CaptionTracklistRenderer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CaptionTracklistRenderer {
    caption_tracks: Option<Vec<PlayerCaptionTrack>>,
    audio_tracks: Option<Vec<AudioTrack>>,
    default_audio_track_index: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AudioTrack {
    default_caption_track_index: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerCaptionTrack {
    base_url: String,
    language_code: String,
    kind: Option<String>,
    name: Option<TrackName>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrackName {
    simple_text: Option<String>,
    runs: Option<Vec<TextRun>>,
}

#[derive(Debug, Deserialize)]
struct TextRun {
    text: String,
}

impl TrackName {
    fn text(&self) -> Option<String> {
        if let Some(ref text) = self.simple_text {
            return Some(text.clone());
        }
        let joined: String = self.runs.iter().flatten().map(|r| r.text.as_str()).collect();
        (!joined.is_empty()).then_some(joined)
    }
}

/// What one fetch of the watch page tells us: the caption catalog plus the
/// signals the language detector reads.
#[derive(Debug, Clone, Default)]
pub struct WatchPage {
    pub has_player_data: bool,
    pub tracks: Vec<CaptionTrack>,
    pub signals: PageSignals,
}

impl WatchPage {
    /// Parse a watch page. Never fails: a missing or malformed player blob
    /// yields an empty catalog.
    pub fn from_html(html: &str) -> Self {
        let player = extract_player_response(html);
        let has_player_data = player.is_some();
        let player = player.unwrap_or_default();

        let renderer = player.captions.and_then(|c| c.player_captions_tracklist_renderer);
        let default_index = renderer.as_ref().and_then(default_caption_index);
        let raw_tracks = renderer.and_then(|r| r.caption_tracks).unwrap_or_default();

        let tracks: Vec<CaptionTrack> = raw_tracks
            .iter()
            .enumerate()
            .map(|(i, t)| CaptionTrack {
                language_code: t.language_code.clone(),
                name: t.name.as_ref().and_then(TrackName::text),
                is_generated: t.kind.as_deref() == Some("asr"),
                is_default: default_index == Some(i),
                base_url: t.base_url.clone(),
            })
            .collect();

        let player_tracks = tracks
            .iter()
            .map(|t| TrackHint {
                code: t.language_code.clone(),
                name: t.name.clone(),
            })
            .collect();

        let details = player.video_details;
        let title = details
            .as_ref()
            .and_then(|d| d.title.clone())
            .or_else(|| meta_content(html, "title"))
            .or_else(|| document_title(html));
        let description = details
            .and_then(|d| d.short_description)
            .or_else(|| meta_content(html, "description"));

        let meta_locales = ["og:locale", "content-language"]
            .iter()
            .filter_map(|key| meta_content(html, key))
            .collect();

        Self {
            has_player_data,
            tracks,
            signals: PageSignals {
                player_tracks,
                title: title.filter(|t| !t.trim().is_empty()),
                description: description.filter(|d| !d.trim().is_empty()),
                html_lang: html_lang(html),
                meta_locales,
            },
        }
    }
}

fn default_caption_index(renderer: &CaptionTracklistRenderer) -> Option<usize> {
    let audio_tracks = renderer.audio_tracks.as_ref()?;
    let audio = renderer
        .default_audio_track_index
        .and_then(|i| audio_tracks.get(i))
        .or_else(|| audio_tracks.first())?;
    audio.default_caption_track_index
}

fn extract_player_response(html: &str) -> Option<PlayerResponse> {
    let re = Regex::new(r"ytInitialPlayerResponse\s*=\s*").ok()?;
    let start = re.find(html)?.end();

    // The blob is followed by more script; only the first JSON value is ours
    let mut stream = serde_json::Deserializer::from_str(&html[start..]).into_iter::<PlayerResponse>();
    match stream.next()? {
        Ok(player) => Some(player),
        Err(e) => {
            warn!("Could not parse embedded player data: {e}");
            None
        }
    }
}

/// Content of the first `<meta>` tag whose name, property, itemprop or
/// http-equiv equals `key` (case-insensitive)
fn meta_content(html: &str, key: &str) -> Option<String> {
    let tag_re = Regex::new(r"(?is)<meta\b[^>]*>").ok()?;
    let attr_re = Regex::new(r#"(?is)([a-z:-]+)\s*=\s*"([^"]*)""#).ok()?;

    for tag in tag_re.find_iter(html) {
        let mut matched = false;
        let mut content = None;
        for caps in attr_re.captures_iter(tag.as_str()) {
            let name = caps[1].to_ascii_lowercase();
            let value = &caps[2];
            match name.as_str() {
                "name" | "property" | "itemprop" | "http-equiv" if value.eq_ignore_ascii_case(key) => {
                    matched = true;
                }
                "content" => content = Some(html_escape::decode_html_entities(value).to_string()),
                _ => {}
            }
        }
        if matched {
            return content;
        }
    }
    None
}

fn document_title(html: &str) -> Option<String> {
    let re = Regex::new(r"(?is)<title[^>]*>(.*?)</title>").ok()?;
    let raw = re.captures(html)?.get(1)?.as_str();
    let title = html_escape::decode_html_entities(raw.trim()).to_string();
    let title = title.strip_suffix(" - YouTube").unwrap_or(&title).trim().to_string();
    (!title.is_empty()).then_some(title)
}

fn html_lang(html: &str) -> Option<String> {
    let re = Regex::new(r#"(?is)<html\b[^>]*\slang\s*=\s*"([^"]+)""#).ok()?;
    re.captures(html).map(|caps| caps[1].trim().to_string())
}

/// Parse a timed-text document. Accepts the legacy `<text start="s" dur="s">`
/// form and the `srv3` `<p t="ms" d="ms">` form.
pub fn parse_timed_text(xml: &str) -> eyre::Result<Vec<RawCaption>> {
    let mut reader = Reader::from_str(xml);
    let mut captions = Vec::new();
    let mut current: Option<RawCaption> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if is_cue(e.name().as_ref()) => {
                current = Some(cue_timing(e));
            }
            Ok(Event::Empty(ref e)) if e.name().as_ref() == b"br" => {
                if let Some(cue) = current.as_mut() {
                    cue.text.push(' ');
                }
            }
            Ok(Event::Text(ref e)) => {
                if let Some(cue) = current.as_mut() {
                    let raw_text = e.unescape().unwrap_or_default();
                    cue.text.push_str(&html_escape::decode_html_entities(&raw_text));
                }
            }
            Ok(Event::End(ref e)) if is_cue(e.name().as_ref()) => {
                if let Some(cue) = current.take() {
                    captions.push(cue);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => bail!("error parsing timed text at {}: {e}", reader.buffer_position()),
            _ => {}
        }
    }

    Ok(captions)
}

fn is_cue(name: &[u8]) -> bool {
    name == b"text" || name == b"p"
}

fn cue_timing(e: &BytesStart<'_>) -> RawCaption {
    let in_seconds = e.name().as_ref() == b"text";
    let mut start_ms = None;
    let mut duration_ms = None;

    for attr in e.attributes().flatten() {
        let value = String::from_utf8_lossy(&attr.value);
        let parsed = if in_seconds {
            value.trim().parse::<f64>().ok().filter(|v| *v >= 0.0).map(|v| (v * 1000.0).round() as u64)
        } else {
            value.trim().parse::<u64>().ok()
        };
        match (attr.key.as_ref(), in_seconds) {
            (b"start", true) | (b"t", false) => start_ms = parsed,
            (b"dur", true) | (b"d", false) => duration_ms = parsed,
            _ => {}
        }
    }

    RawCaption {
        text: String::new(),
        start_ms,
        duration_ms,
    }
}

/// Where caption catalogs and caption payloads come from
#[async_trait]
pub trait CaptionSource: Send + Sync {
    /// Fetch and parse the watch page. Fails only when the page cannot be fetched.
    async fn watch_page(&self, video_id: &str) -> Result<WatchPage>;

    /// Fetch one track from the catalog
    async fn fetch_track(&self, track: &CaptionTrack) -> eyre::Result<Vec<RawCaption>>;

    /// Fetch whatever the platform serves by default for `lang`, without the catalog
    async fn fetch_default(&self, video_id: &str, lang: &str) -> eyre::Result<Vec<RawCaption>>;
}

/// Load the watch page and require a non-empty caption catalog
pub async fn load_catalog<S: CaptionSource + ?Sized>(source: &S, video_id: &str) -> Result<WatchPage> {
    let page = source.watch_page(video_id).await?;
    if !page.has_player_data {
        return Err(Error::no_captions(video_id, "player data missing or malformed"));
    }
    if page.tracks.is_empty() {
        return Err(Error::no_captions(video_id, "caption catalog is empty"));
    }
    debug!("Found {} caption tracks for {video_id}", page.tracks.len());
    Ok(page)
}

/// The caption track catalog for a video
pub async fn list_tracks<S: CaptionSource + ?Sized>(source: &S, video_id: &str) -> Result<Vec<CaptionTrack>> {
    Ok(load_catalog(source, video_id).await?.tracks)
}

/// `CaptionSource` that talks to youtube.com
pub struct YoutubeSource<T> {
    transport: T,
}

impl<T: Transport> YoutubeSource<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl<T: Transport> CaptionSource for YoutubeSource<T> {
    async fn watch_page(&self, video_id: &str) -> Result<WatchPage> {
        let watch_url = format!("https://www.youtube.com/watch?v={video_id}");
        debug!("Fetching watch page: {watch_url}");

        let html = self
            .transport
            .get_text(&watch_url)
            .await
            .map_err(|e| Error::no_captions(video_id, format!("failed to fetch watch page: {e}")))?;

        Ok(WatchPage::from_html(&html))
    }

    async fn fetch_track(&self, track: &CaptionTrack) -> eyre::Result<Vec<RawCaption>> {
        debug!("Fetching caption track: lang={} generated={}", track.language_code, track.is_generated);
        let xml = self.transport.get_text(&track.base_url).await?;
        parse_timed_text(&xml)
    }

    async fn fetch_default(&self, video_id: &str, lang: &str) -> eyre::Result<Vec<RawCaption>> {
        let url = format!("https://www.youtube.com/api/timedtext?v={video_id}&lang={lang}");
        debug!("Fetching default captions: {url}");
        let xml = self.transport.get_text(&url).await?;
        parse_timed_text(&xml)
    }
}

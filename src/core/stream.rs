//! Media streams and the context they share

use crate::error::RtubeError;
use crate::platform::cipher::Cipher;
use crate::platform::response::{FormatData, PlayerResponse};
use crate::platform::signing::{apply_descrambler, apply_signature};
use crate::utils::filename::to_safe_filename;
use crate::utils::mime::{mime_type_codec, parse_codecs};
use crate::utils::url::query_param;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

const OTF_STREAM_TYPE: &str = "FORMAT_STREAM_TYPE_OTF";

/// Data shared by every stream of one video
///
/// Built once per watch page and handed to each [`Stream`] as an
/// `Arc<StreamContext>`.
#[derive(Debug, Default, Serialize)]
pub struct StreamContext {
    pub video_id: String,
    pub title: String,
    pub author: String,
    pub length_seconds: Option<u64>,
    pub publish_date: Option<NaiveDate>,
    pub js_url: Option<String>,
    #[serde(skip)]
    cipher: Option<Arc<Cipher>>,
}

impl StreamContext {
    pub fn new(video_id: &str) -> Self {
        Self {
            video_id: video_id.to_string(),
            ..Default::default()
        }
    }

    /// Take video id, title, author and length from the player response
    pub fn from_response(response: &PlayerResponse) -> Self {
        let mut context = Self::default();
        if let Some(details) = &response.video_details {
            context.video_id = details.video_id.clone();
            context.title = details.title.clone();
            context.author = details.author.clone();
            context.length_seconds = details.length_seconds.as_deref().and_then(|s| s.parse().ok());
        }
        context
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn with_publish_date(mut self, date: Option<NaiveDate>) -> Self {
        self.publish_date = date;
        self
    }

    /// Attach the cipher derived from the player script at `js_url`
    pub fn with_cipher(mut self, js_url: &str, cipher: Arc<Cipher>) -> Self {
        self.js_url = Some(js_url.to_string());
        self.cipher = Some(cipher);
        self
    }

    pub fn cipher(&self) -> Option<&Cipher> {
        self.cipher.as_deref()
    }
}

/// One downloadable media stream
#[derive(Debug, Clone, Serialize)]
pub struct Stream {
    #[serde(skip)]
    context: Arc<StreamContext>,
    pub url: String,
    pub itag: u32,
    pub mime_type: String,
    pub codecs: Vec<String>,
    /// `video` or `audio`
    #[serde(rename = "type")]
    pub kind: String,
    /// Container, e.g. `mp4` or `webm`
    pub subtype: String,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
    pub is_otf: bool,
    pub bitrate: Option<u64>,
    /// Size in bytes, 0 when unknown
    pub filesize: u64,
    pub fps: Option<u32>,
    pub resolution: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl Stream {
    /// Build a stream from a signed manifest entry
    pub fn new(format: &FormatData, context: Arc<StreamContext>) -> Result<Self, RtubeError> {
        let url = format
            .url
            .clone()
            .ok_or_else(|| RtubeError::ExtractError(format!("stream itag {} has no url", format.itag)))?;

        let (mime_type, codecs) = mime_type_codec(&format.mime_type)?;
        let (kind, subtype) = mime_type
            .split_once('/')
            .map(|(k, s)| (k.to_string(), s.to_string()))
            .unwrap_or_else(|| (mime_type.clone(), String::new()));
        let (video_codec, audio_codec) = parse_codecs(&mime_type, &codecs);

        Ok(Self {
            context,
            url,
            itag: format.itag,
            mime_type,
            codecs,
            kind,
            subtype,
            video_codec,
            audio_codec,
            is_otf: format.stream_type.as_deref() == Some(OTF_STREAM_TYPE),
            bitrate: format.bitrate,
            filesize: format
                .content_length
                .as_deref()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            fps: format.fps,
            resolution: format.quality_label.clone(),
            width: format.width,
            height: format.height,
        })
    }

    pub fn context(&self) -> &StreamContext {
        &self.context
    }

    pub fn title(&self) -> &str {
        &self.context.title
    }

    /// Adaptive (DASH) streams carry a single track
    pub fn is_adaptive(&self) -> bool {
        self.codecs.len() % 2 == 1
    }

    /// Progressive streams carry audio and video together
    pub fn is_progressive(&self) -> bool {
        !self.is_adaptive()
    }

    pub fn includes_audio_track(&self) -> bool {
        self.is_progressive() || self.kind == "audio"
    }

    pub fn includes_video_track(&self) -> bool {
        self.is_progressive() || self.kind == "video"
    }

    pub fn filesize_kb(&self) -> f64 {
        round_up_thousandths(self.filesize as f64 / 1024.0)
    }

    pub fn filesize_mb(&self) -> f64 {
        round_up_thousandths(self.filesize as f64 / 1024.0 / 1024.0)
    }

    pub fn filesize_gb(&self) -> f64 {
        round_up_thousandths(self.filesize as f64 / 1024.0 / 1024.0 / 1024.0)
    }

    /// `<safe title>.<subtype>`
    pub fn default_filename(&self) -> String {
        to_safe_filename(self.title(), &self.subtype)
    }

    /// When the signed URL stops working, from its `expire` parameter
    pub fn expiration(&self) -> Option<DateTime<Utc>> {
        query_param(&self.url, "expire")
            .ok()
            .flatten()
            .and_then(|expire| expire.parse::<i64>().ok())
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }
}

fn round_up_thousandths(value: f64) -> f64 {
    (value * 1000.0).ceil() / 1000.0
}

/// Streams of one video, looked up by itag
#[derive(Debug, Clone, Default)]
pub struct StreamQuery {
    streams: Vec<Stream>,
}

impl StreamQuery {
    pub fn new(streams: Vec<Stream>) -> Self {
        Self { streams }
    }

    pub fn get_by_itag(&self, itag: u32) -> Option<&Stream> {
        self.streams.iter().find(|s| s.itag == itag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Stream> {
        self.streams.iter()
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    pub fn progressive(&self) -> impl Iterator<Item = &Stream> {
        self.streams.iter().filter(|s| s.is_progressive())
    }

    pub fn adaptive(&self) -> impl Iterator<Item = &Stream> {
        self.streams.iter().filter(|s| s.is_adaptive())
    }

    /// Audio-only stream with the highest bitrate
    pub fn best_audio(&self) -> Option<&Stream> {
        self.streams
            .iter()
            .filter(|s| s.kind == "audio")
            .max_by_key(|s| s.bitrate.unwrap_or(0))
    }
}

/// Descramble and sign the manifest of `response` and build its streams
///
/// Without a cipher in the context, ciphered streams keep their unsigned URLs.
pub fn build_streams(
    response: &PlayerResponse,
    context: Arc<StreamContext>,
) -> Result<StreamQuery, RtubeError> {
    let Some(streaming_data) = response.streaming_data.as_ref() else {
        if response.is_live() {
            return Err(RtubeError::LiveStreamUnavailable(context.video_id.clone()));
        }
        return Err(RtubeError::ExtractError(
            "player response has no streaming data".to_string(),
        ));
    };

    let mut manifest = apply_descrambler(streaming_data);
    match context.cipher() {
        Some(cipher) => apply_signature(&mut manifest, response, cipher)?,
        None => warn!("No cipher available, stream URLs are left unsigned"),
    }

    let streams = manifest
        .iter()
        .map(|format| Stream::new(format, Arc::clone(&context)))
        .collect::<Result<Vec<_>, _>>()?;

    debug!("Built {} streams for {}", streams.len(), context.video_id);
    Ok(StreamQuery::new(streams))
}

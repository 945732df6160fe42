//! Player response embedded in the watch page

use serde::{Deserialize, Serialize};

/// The `ytInitialPlayerResponse` object
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PlayerResponse {
    #[serde(rename = "playabilityStatus")]
    pub playability_status: Option<PlayabilityStatus>,
    #[serde(rename = "videoDetails")]
    pub video_details: Option<VideoDetails>,
    #[serde(rename = "streamingData")]
    pub streaming_data: Option<StreamingData>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PlayabilityStatus {
    #[serde(default)]
    pub status: String,
    pub reason: Option<String>,
    /// Present while the video is a live broadcast
    #[serde(rename = "liveStreamability")]
    pub live_streamability: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct VideoDetails {
    #[serde(rename = "videoId")]
    pub video_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(rename = "lengthSeconds")]
    pub length_seconds: Option<String>,
    #[serde(rename = "isLiveContent", default)]
    pub is_live_content: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StreamingData {
    pub formats: Option<Vec<FormatData>>,
    #[serde(rename = "adaptiveFormats")]
    pub adaptive_formats: Option<Vec<FormatData>>,
}

/// One entry of the stream manifest
///
/// `s` and `sp` are not part of the response; they are filled in from
/// `signatureCipher` when the manifest is descrambled.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FormatData {
    pub itag: u32,
    pub url: Option<String>,
    #[serde(rename = "mimeType", default)]
    pub mime_type: String,
    pub bitrate: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    #[serde(rename = "qualityLabel")]
    pub quality_label: Option<String>,
    #[serde(rename = "contentLength")]
    pub content_length: Option<String>,
    #[serde(rename = "signatureCipher")]
    pub signature_cipher: Option<String>,
    pub fps: Option<u32>,
    #[serde(rename = "audioSampleRate")]
    pub audio_sample_rate: Option<String>,
    #[serde(rename = "audioChannels")]
    pub audio_channels: Option<u32>,
    #[serde(rename = "approxDurationMs")]
    pub approx_duration_ms: Option<String>,
    /// `FORMAT_STREAM_TYPE_OTF` for streams delivered in fragments
    #[serde(rename = "type")]
    pub stream_type: Option<String>,
    #[serde(default)]
    pub s: Option<String>,
    #[serde(default)]
    pub sp: Option<String>,
}

impl PlayerResponse {
    /// Check if the response describes a live broadcast
    pub fn is_live(&self) -> bool {
        self.playability_status
            .as_ref()
            .map(|status| status.live_streamability.is_some())
            .unwrap_or(false)
    }

    pub fn video_id(&self) -> Option<&str> {
        self.video_details.as_ref().map(|d| d.video_id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_deserialization() {
        let json = r#"{
            "itag": 22,
            "url": "https://example.com/videoplayback?itag=22",
            "mimeType": "video/mp4; codecs=\"avc1.64001F, mp4a.40.2\"",
            "bitrate": 1000000,
            "fps": 30,
            "width": 1280,
            "height": 720,
            "qualityLabel": "720p",
            "contentLength": "1048576"
        }"#;

        let format: FormatData = serde_json::from_str(json).unwrap();
        assert_eq!(format.itag, 22);
        assert_eq!(format.url.as_deref(), Some("https://example.com/videoplayback?itag=22"));
        assert_eq!(format.mime_type, "video/mp4; codecs=\"avc1.64001F, mp4a.40.2\"");
        assert_eq!(format.bitrate, Some(1000000));
        assert_eq!(format.fps, Some(30));
        assert_eq!(format.quality_label.as_deref(), Some("720p"));
        assert!(format.s.is_none());
        assert!(format.signature_cipher.is_none());
    }

    #[test]
    fn test_live_detection() {
        let live: PlayerResponse = serde_json::from_str(
            r#"{"playabilityStatus":{"status":"OK","liveStreamability":{"liveStreamabilityRenderer":{}}}}"#,
        )
        .unwrap();
        assert!(live.is_live());

        let vod: PlayerResponse =
            serde_json::from_str(r#"{"playabilityStatus":{"status":"OK"}}"#).unwrap();
        assert!(!vod.is_live());
        assert!(!PlayerResponse::default().is_live());
    }
}

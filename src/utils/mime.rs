//! MIME type and codec parsing for stream manifests

use crate::error::RtubeError;
use regex::Regex;

/// Split a manifest `mimeType` such as `video/mp4; codecs="avc1.64001F, mp4a.40.2"`
/// into the MIME type and its codec list
pub fn mime_type_codec(mime_type_codec: &str) -> Result<(String, Vec<String>), RtubeError> {
    let pattern = r#"(\w+/\w+);\s*codecs="([a-zA-Z0-9.,\s-]*)""#;
    let captures = Regex::new(pattern)?
        .captures(mime_type_codec)
        .ok_or_else(|| RtubeError::pattern_not_found("mime_type_codec", pattern))?;

    let codecs = captures[2]
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(String::from)
        .collect();

    Ok((captures[1].to_string(), codecs))
}

/// Split a codec list into its video and audio codec.
///
/// A single codec belongs to the track type named by the MIME type; two
/// codecs are `video, audio`.
pub fn parse_codecs(mime_type: &str, codecs: &[String]) -> (Option<String>, Option<String>) {
    match codecs {
        [single] if is_audio_mime(mime_type) => (None, Some(single.clone())),
        [single] => (Some(single.clone()), None),
        [video, audio, ..] => (Some(video.clone()), Some(audio.clone())),
        [] => (None, None),
    }
}

/// Check if MIME type is a video format
pub fn is_video_mime(mime_type: &str) -> bool {
    mime_type.starts_with("video/")
}

/// Check if MIME type is an audio format
pub fn is_audio_mime(mime_type: &str) -> bool {
    mime_type.starts_with("audio/")
}

/// Get file extension from MIME type
pub fn ext_from_mime(mime_type: &str) -> &'static str {
    match mime_type {
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "video/3gpp" => "3gp",
        "audio/mp4" => "m4a",
        "audio/webm" => "weba",
        "audio/mpeg" => "mp3",
        "audio/ogg" => "ogg",
        "audio/opus" => "opus",
        _ => "bin",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_type_codec() {
        let (mime, codecs) = mime_type_codec("audio/webm; codecs=\"opus\"").unwrap();
        assert_eq!(mime, "audio/webm");
        assert_eq!(codecs, vec!["opus"]);

        let (mime, codecs) = mime_type_codec("video/mp4; codecs=\"avc1.64001F, mp4a.40.2\"").unwrap();
        assert_eq!(mime, "video/mp4");
        assert_eq!(codecs, vec!["avc1.64001F", "mp4a.40.2"]);
    }

    #[test]
    fn test_mime_type_codec_no_match() {
        assert!(matches!(
            mime_type_codec("video/mp4"),
            Err(RtubeError::PatternNotFound { .. })
        ));
    }

    #[test]
    fn test_parse_codecs() {
        let two = vec!["avc1.42001E".to_string(), "mp4a.40.2".to_string()];
        assert_eq!(
            parse_codecs("video/mp4", &two),
            (Some("avc1.42001E".to_string()), Some("mp4a.40.2".to_string()))
        );

        let audio = vec!["opus".to_string()];
        assert_eq!(parse_codecs("audio/webm", &audio), (None, Some("opus".to_string())));

        let video = vec!["vp9".to_string()];
        assert_eq!(parse_codecs("video/webm", &video), (Some("vp9".to_string()), None));

        assert_eq!(parse_codecs("video/webm", &[]), (None, None));
    }

    #[test]
    fn test_ext_from_mime() {
        assert_eq!(ext_from_mime("video/mp4"), "mp4");
        assert_eq!(ext_from_mime("audio/mp4"), "m4a");
        assert_eq!(ext_from_mime("unknown/type"), "bin");
        assert!(is_video_mime("video/webm"));
        assert!(is_audio_mime("audio/webm"));
        assert!(!is_audio_mime("video/webm"));
    }
}

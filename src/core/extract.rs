//! Data extraction from the watch page

use crate::error::RtubeError;
use crate::platform::patterns::RuleList;
use crate::platform::response::PlayerResponse;
use crate::utils::parser::parse_object;
use crate::utils::url::absolute_url;
use chrono::NaiveDate;
use regex::Regex;
use tracing::debug;

/// Script asset URL of the player, made absolute against `base_url`
pub fn js_url(html: &str, base_url: &str) -> Result<String, RtubeError> {
    let path = RuleList::new("get_ytplayer_js")
        .with_rules(
            &[
                r#""jsUrl"\s*:\s*"([^"]+)""#,
                r#""PLAYER_JS_URL"\s*:\s*"([^"]+)""#,
                r#"<script\s+[^>]*src="([^"]+/base\.js)""#,
            ],
            |captures, _| Ok(captures.get(1).map(|m| m.as_str().replace("\\/", "/"))),
        )?
        .first_match(html)?;

    let url = absolute_url(base_url, &path)?;
    debug!("Player script URL: {}", url);
    Ok(url)
}

/// The `ytInitialPlayerResponse` object embedded in the page
pub fn initial_player_response(html: &str) -> Result<PlayerResponse, RtubeError> {
    let start = RuleList::new("initial_player_response")
        .with_rules(
            &[
                r#"window\[['"]ytInitialPlayerResponse['"]\]\s*=\s*\{"#,
                r#"ytInitialPlayerResponse\s*=\s*\{"#,
            ],
            |captures, _| Ok(captures.get(0).map(|m| m.end() - 1)),
        )?
        .first_match(html)?;

    let value = parse_object(html, start)?;
    Ok(serde_json::from_value(value)?)
}

/// Publication date from the page metadata, if present
pub fn publish_date(html: &str) -> Result<Option<NaiveDate>, RtubeError> {
    let regex = Regex::new(r#"itemprop="datePublished"\s+content="(\d{4}-\d{2}-\d{2})"#)?;
    let Some(date) = regex.captures(html).and_then(|c| c.get(1)) else {
        return Ok(None);
    };

    NaiveDate::parse_from_str(date.as_str(), "%Y-%m-%d")
        .map(Some)
        .map_err(|e| RtubeError::ParseError(format!("invalid publish date {}: {}", date.as_str(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const WATCH_HTML: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/watch.html"));

    #[test]
    fn test_js_url_from_player_context() {
        assert_eq!(
            js_url(WATCH_HTML, "https://www.youtube.com").unwrap(),
            "https://www.youtube.com/s/player/3a2b1c0d/player_ias.vflset/en_US/base.js"
        );
    }

    #[test]
    fn test_js_url_fallbacks() {
        let html = r#"ytcfg.set({"PLAYER_JS_URL":"/s/player/99/base.js"});"#;
        assert_eq!(
            js_url(html, "https://www.youtube.com").unwrap(),
            "https://www.youtube.com/s/player/99/base.js"
        );

        let html = r#"<script src="//static.example.com/s/player/77/base.js" nonce="n"></script>"#;
        assert_eq!(
            js_url(html, "https://www.youtube.com").unwrap(),
            "https://static.example.com/s/player/77/base.js"
        );

        let err = js_url("<html></html>", "https://www.youtube.com").unwrap_err();
        assert!(matches!(err, RtubeError::PatternNotFound { ref caller, .. } if caller == "get_ytplayer_js"));
    }

    #[test]
    fn test_initial_player_response() {
        let response = initial_player_response(WATCH_HTML).unwrap();
        let details = response.video_details.as_ref().unwrap();
        assert_eq!(details.video_id, "dQw4w9WgXcQ");
        assert_eq!(details.title, "Sample: Video / Title?");
        assert_eq!(details.length_seconds.as_deref(), Some("212"));

        let streaming = response.streaming_data.as_ref().unwrap();
        assert_eq!(streaming.formats.as_ref().unwrap().len(), 1);
        assert_eq!(streaming.adaptive_formats.as_ref().unwrap().len(), 3);
        assert!(!response.is_live());
    }

    #[test]
    fn test_initial_player_response_window_form() {
        let html = r#"<script>window["ytInitialPlayerResponse"] = {"videoDetails":{"videoId":"abcdefghijk"}};</script>"#;
        let response = initial_player_response(html).unwrap();
        assert_eq!(response.video_id(), Some("abcdefghijk"));
    }

    #[test]
    fn test_initial_player_response_missing() {
        assert!(matches!(
            initial_player_response("<html></html>"),
            Err(RtubeError::PatternNotFound { .. })
        ));
    }

    #[test]
    fn test_publish_date() {
        assert_eq!(
            publish_date(WATCH_HTML).unwrap(),
            NaiveDate::from_ymd_opt(2021, 3, 14)
        );
        assert_eq!(publish_date("<html></html>").unwrap(), None);
    }
}

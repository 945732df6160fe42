//! URL utilities for video IDs and stream query parameters

use crate::error::RtubeError;
use url::{form_urlencoded, Url};

const VIDEO_ID_LEN: usize = 11;

fn is_video_id(candidate: &str) -> bool {
    candidate.len() == VIDEO_ID_LEN
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Extract the 11 character video ID from a watch, short, embed or share URL.
/// A bare video ID is returned unchanged.
pub fn extract_video_id(url: &str) -> Result<String, RtubeError> {
    if is_video_id(url) {
        return Ok(url.to_string());
    }

    let parsed = Url::parse(url)?;

    let candidate = match parsed.host_str() {
        Some("youtu.be") => parsed.path().trim_start_matches('/').to_string(),
        Some(host) if host == "youtube.com" || host.ends_with(".youtube.com") => {
            let path = parsed.path();
            if path.starts_with("/watch") {
                parsed
                    .query_pairs()
                    .find(|(key, _)| key == "v")
                    .map(|(_, value)| value.to_string())
                    .ok_or_else(|| RtubeError::InvalidUrl("Missing v parameter".to_string()))?
            } else if let Some(rest) = ["/shorts/", "/embed/", "/live/", "/v/"]
                .iter()
                .find_map(|prefix| path.strip_prefix(prefix))
            {
                rest.split('/').next().unwrap_or_default().to_string()
            } else {
                return Err(RtubeError::InvalidUrl(
                    "Unsupported video URL format".to_string(),
                ));
            }
        }
        _ => {
            return Err(RtubeError::InvalidUrl(
                "Not a supported video platform URL".to_string(),
            ))
        }
    };

    if is_video_id(&candidate) {
        Ok(candidate)
    } else {
        Err(RtubeError::InvalidUrl(format!("Invalid video ID: {:?}", candidate)))
    }
}

/// Watch page URL for a video ID
pub fn watch_url(base_url: &str, video_id: &str) -> String {
    format!("{}/watch?v={}", base_url.trim_end_matches('/'), video_id)
}

/// Resolve `href` against `base_url`. Absolute and protocol-relative links are
/// handled by the URL parser.
pub fn absolute_url(base_url: &str, href: &str) -> Result<String, RtubeError> {
    Ok(Url::parse(base_url)?.join(href)?.to_string())
}

/// Decode an `application/x-www-form-urlencoded` string such as a
/// `signatureCipher` bundle
pub fn parse_query(query: &str) -> Vec<(String, String)> {
    form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// First value of a query parameter
pub fn query_param(url: &str, key: &str) -> Result<Option<String>, RtubeError> {
    let parsed = Url::parse(url)?;
    Ok(parsed
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned()))
}

/// Check if the URL carries a query parameter
pub fn has_query_param(url: &str, key: &str) -> Result<bool, RtubeError> {
    Ok(query_param(url, key)?.is_some())
}

/// Set query parameters, replacing existing ones in place and appending the
/// rest. Scheme, host and path are kept as they are.
pub fn set_query_params(url: &str, updates: &[(&str, &str)]) -> Result<String, RtubeError> {
    let mut parsed = Url::parse(url)?;
    let mut pairs: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();

    for (key, value) in updates {
        match pairs.iter_mut().find(|(k, _)| k == key) {
            Some(pair) => pair.1 = value.to_string(),
            None => pairs.push((key.to_string(), value.to_string())),
        }
    }

    parsed.query_pairs_mut().clear().extend_pairs(&pairs);
    Ok(parsed.to_string())
}

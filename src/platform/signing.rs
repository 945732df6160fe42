//! Stream manifest descrambling and signed URL reconstruction

use crate::error::RtubeError;
use crate::platform::cipher::Cipher;
use crate::platform::response::{FormatData, PlayerResponse, StreamingData};
use crate::utils::url::{has_query_param, parse_query, query_param, set_query_params};
use tracing::{debug, warn};

/// Default query parameter carrying the deciphered signature
pub const DEFAULT_SIGNATURE_PARAM: &str = "sig";

/// Collect progressive and adaptive formats into one manifest, expanding
/// `signatureCipher` bundles into `url`, `s` and `sp`.
pub fn apply_descrambler(streaming_data: &StreamingData) -> Vec<FormatData> {
    let mut manifest: Vec<FormatData> = streaming_data
        .formats
        .iter()
        .chain(streaming_data.adaptive_formats.iter())
        .flatten()
        .cloned()
        .collect();

    for format in manifest.iter_mut() {
        let Some(bundle) = format.signature_cipher.as_deref() else {
            continue;
        };
        for (key, value) in parse_query(bundle) {
            match key.as_str() {
                "url" => format.url = Some(value),
                "s" => format.s = Some(value),
                "sp" => format.sp = Some(value),
                _ => {}
            }
        }
    }

    debug!("Descrambled {} formats", manifest.len());
    manifest
}

/// Check if a stream URL is already signed and needs no deciphering
pub fn is_pre_signed(url: &str, ciphered_signature: Option<&str>) -> bool {
    url.contains("signature")
        || (ciphered_signature.is_none() && (url.contains("&sig=") || url.contains("&lsig=")))
}

/// Rebuild a stream URL with the deciphered signature and throttle parameter.
///
/// The signature goes into `signature_param` (default `sig`). The `n`
/// parameter is replaced unless the URL carries `ratebypass`.
pub fn sign_url(
    cipher: &Cipher,
    url: &str,
    ciphered_signature: Option<&str>,
    signature_param: Option<&str>,
) -> Result<String, RtubeError> {
    let signature = ciphered_signature.map(|s| cipher.decrypt_signature(s));
    let throttle = if has_query_param(url, "ratebypass")? {
        None
    } else {
        query_param(url, "n")?
            .map(|n| cipher.calculate_throttle_parameter(&n))
            .transpose()?
    };

    let mut updates = Vec::new();
    if let Some(signature) = signature.as_deref() {
        updates.push((signature_param.unwrap_or(DEFAULT_SIGNATURE_PARAM), signature));
    }
    if let Some(throttle) = throttle.as_deref() {
        updates.push(("n", throttle));
    }

    set_query_params(url, &updates)
}

/// Sign every stream of a descrambled manifest in place
pub fn apply_signature(
    manifest: &mut [FormatData],
    response: &PlayerResponse,
    cipher: &Cipher,
) -> Result<(), RtubeError> {
    for format in manifest.iter_mut() {
        let Some(url) = format.url.as_deref() else {
            if response.is_live() {
                return Err(RtubeError::LiveStreamUnavailable(
                    response.video_id().unwrap_or("unknown").to_string(),
                ));
            }
            return Err(RtubeError::ExtractError(format!(
                "stream itag {} has no url",
                format.itag
            )));
        };

        if is_pre_signed(url, format.s.as_deref()) {
            debug!("itag {} is already signed", format.itag);
            continue;
        }

        if format.s.is_none() {
            warn!("itag {} has neither a signature nor a cipher bundle", format.itag);
        }

        let signed = sign_url(cipher, url, format.s.as_deref(), format.sp.as_deref())?;
        debug!("Signed itag {}", format.itag);
        format.url = Some(signed);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    const BASE_JS: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/base.js"));

    fn cipher() -> Cipher {
        Cipher::from_js(BASE_JS).unwrap()
    }

    fn query(url: &str) -> Vec<(String, String)> {
        Url::parse(url).unwrap().query_pairs().into_owned().collect()
    }

    fn pair(k: &str, v: &str) -> (String, String) {
        (k.to_string(), v.to_string())
    }

    fn streaming_data() -> StreamingData {
        serde_json::from_str(
            r#"{
                "formats": [{
                    "itag": 18,
                    "mimeType": "video/mp4; codecs=\"avc1.42001E, mp4a.40.2\"",
                    "signatureCipher": "s=abcdef&sp=sig&url=https%3A%2F%2Fr1.example.com%2Fvideoplayback%3Fitag%3D18%26n%3Dvz6Q0Q4nXxk0YJPb"
                }],
                "adaptiveFormats": [{
                    "itag": 140,
                    "mimeType": "audio/mp4; codecs=\"mp4a.40.2\"",
                    "url": "https://r1.example.com/videoplayback?itag=140&n=O2aS_zbZ7pL1-eRz&ratebypass=yes"
                }]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_apply_descrambler() {
        let manifest = apply_descrambler(&streaming_data());
        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest[0].itag, 18);
        assert_eq!(manifest[0].s.as_deref(), Some("abcdef"));
        assert_eq!(manifest[0].sp.as_deref(), Some("sig"));
        assert_eq!(
            manifest[0].url.as_deref(),
            Some("https://r1.example.com/videoplayback?itag=18&n=vz6Q0Q4nXxk0YJPb")
        );
        assert_eq!(manifest[1].itag, 140);
        assert!(manifest[1].s.is_none());
    }

    #[test]
    fn test_apply_descrambler_empty() {
        assert!(apply_descrambler(&StreamingData::default()).is_empty());
    }

    #[test]
    fn test_apply_signature() {
        let mut manifest = apply_descrambler(&streaming_data());
        apply_signature(&mut manifest, &PlayerResponse::default(), &cipher()).unwrap();

        let signed = manifest[0].url.as_deref().unwrap();
        assert!(signed.starts_with("https://r1.example.com/videoplayback?"));
        assert_eq!(
            query(signed),
            vec![
                pair("itag", "18"),
                pair("n", "sZzffdLd7kHC39h7"),
                pair("sig", "abfd"),
            ]
        );

        // ratebypass keeps n as it is
        assert_eq!(
            query(manifest[1].url.as_deref().unwrap()),
            vec![
                pair("itag", "140"),
                pair("n", "O2aS_zbZ7pL1-eRz"),
                pair("ratebypass", "yes"),
            ]
        );
    }

    #[test]
    fn test_signature_param_name() {
        let signed = sign_url(
            &cipher(),
            "https://r1.example.com/videoplayback?itag=18&ratebypass=yes",
            Some("abcdef"),
            Some("lsig"),
        )
        .unwrap();
        assert_eq!(
            query(&signed),
            vec![pair("itag", "18"), pair("ratebypass", "yes"), pair("lsig", "abfd")]
        );
    }

    #[test]
    fn test_pre_signed_urls_are_untouched() {
        assert!(is_pre_signed("https://h/videoplayback?signature=XYZ", Some("abc")));
        assert!(is_pre_signed("https://h/videoplayback?itag=1&sig=XYZ", None));
        assert!(is_pre_signed("https://h/videoplayback?itag=1&lsig=XYZ", None));
        assert!(!is_pre_signed("https://h/videoplayback?itag=1&lsig=XYZ", Some("abc")));
        assert!(!is_pre_signed("https://h/videoplayback?itag=1&n=abc", None));

        let url = "https://h.example/videoplayback?itag=22&sig=ALREADY&n=vz6Q0Q4nXxk0YJPb";
        let mut manifest = vec![FormatData {
            itag: 22,
            url: Some(url.to_string()),
            ..Default::default()
        }];
        apply_signature(&mut manifest, &PlayerResponse::default(), &cipher()).unwrap();
        assert_eq!(manifest[0].url.as_deref(), Some(url));
    }

    #[test]
    fn test_missing_url_on_live_stream() {
        let response: PlayerResponse = serde_json::from_str(
            r#"{"playabilityStatus":{"status":"OK","liveStreamability":{}},"videoDetails":{"videoId":"liveVideo01"}}"#,
        )
        .unwrap();
        let mut manifest = vec![FormatData { itag: 91, ..Default::default() }];

        let err = apply_signature(&mut manifest, &response, &cipher()).unwrap_err();
        assert!(matches!(err, RtubeError::LiveStreamUnavailable(ref id) if id == "liveVideo01"));
        assert!(!err.is_extraction_error());
    }

    #[test]
    fn test_missing_url_on_regular_video() {
        let mut manifest = vec![FormatData { itag: 18, ..Default::default() }];
        let err = apply_signature(&mut manifest, &PlayerResponse::default(), &cipher()).unwrap_err();
        assert!(matches!(err, RtubeError::ExtractError(_)));
    }
}

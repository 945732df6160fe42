//! Signature cipher deciphering for the player script

use crate::error::RtubeError;
use crate::platform::patterns::find_initial_function_name;
use crate::platform::throttle::ThrottleProgram;
use crate::platform::transform::{build_plan_for, TransformPlan};
use tracing::debug;

/// Signature and throttle decipherer for one player script version
///
/// Everything is derived once in [`Cipher::from_js`]; afterwards the cipher is
/// read-only and can be shared between threads behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Cipher {
    initial_function: String,
    plan: TransformPlan,
    throttle: ThrottleProgram,
}

impl Cipher {
    /// Derive the transform plan and the throttle program from the player script
    pub fn from_js(js: &str) -> Result<Self, RtubeError> {
        let initial_function = find_initial_function_name(js)?;
        let plan = build_plan_for(js, &initial_function)?;
        let throttle = ThrottleProgram::from_js(js)?;

        debug!(
            "Cipher ready: signature function {} ({} steps), throttle function {}",
            initial_function,
            plan.len(),
            throttle
        );

        Ok(Self {
            initial_function,
            plan,
            throttle,
        })
    }

    /// Decipher the `s` signature of a stream
    pub fn decrypt_signature(&self, ciphered_signature: &str) -> String {
        self.plan.apply(ciphered_signature)
    }

    /// Compute the `n` throttle parameter of a stream URL
    pub fn calculate_throttle_parameter(&self, value: &str) -> Result<String, RtubeError> {
        let result = self.throttle.run(value)?;
        debug!("Throttle parameter {} -> {}", value, result);
        Ok(result)
    }

    /// Name of the signature function in the script
    pub fn initial_function_name(&self) -> &str {
        &self.initial_function
    }

    /// Operations deciphering the `s` signature
    pub fn plan(&self) -> &TransformPlan {
        &self.plan
    }

    /// Interpreter for the `n` throttle parameter
    pub fn throttle(&self) -> &ThrottleProgram {
        &self.throttle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::transform::TransformOp;
    use std::sync::Arc;

    const BASE_JS: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/base.js"));

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_cipher_creation() {
        let cipher = Cipher::from_js(BASE_JS).unwrap();
        assert_eq!(cipher.initial_function_name(), "DE");
        assert_eq!(cipher.throttle().name(), "iha");

        let ops: Vec<TransformOp> = cipher.plan().steps().iter().map(|s| s.op).collect();
        assert_eq!(
            ops,
            vec![
                TransformOp::Reverse,
                TransformOp::Swap,
                TransformOp::Splice,
                TransformOp::Reverse
            ]
        );
    }

    #[test]
    fn test_decrypt_signature() {
        let cipher = Cipher::from_js(BASE_JS).unwrap();
        assert_eq!(cipher.decrypt_signature("abcdef"), "abfd");
        assert_eq!(cipher.decrypt_signature("0123456789"), "01234597");
        assert_eq!(
            cipher.decrypt_signature(
                "AOq0QJ8wRQIhAK1qO8oy2yO0LkSyfdAjw6W5zP4ZJmgkE6jBz0iY0bRUAiBwFXkD5Prm_KcOzH-XkeMG2gbD3A5hDY-kjb3cq0Hy2w=="
            ),
            "AOq0QJ8wRQIhAK1qO8oy2yO0LkSyfdAjw6W5zP4ZJmgkE6jBz0iY0bRUAiBwFXkD5Prm_KcOzH-XkeMG2gbD3A5hDY-kjb3cq0Hy=w"
        );
    }

    #[test]
    fn test_calculate_throttle_parameter() {
        let cipher = Cipher::from_js(BASE_JS).unwrap();
        assert_eq!(
            cipher.calculate_throttle_parameter("vz6Q0Q4nXxk0YJPb").unwrap(),
            "sZzffdLd7kHC39h7"
        );
        // Same input, same output: nothing is consumed between calls
        assert_eq!(
            cipher.calculate_throttle_parameter("vz6Q0Q4nXxk0YJPb").unwrap(),
            "sZzffdLd7kHC39h7"
        );
    }

    #[test]
    fn test_missing_throttle_function() {
        let js = r#"var Xy={AB:function(a){a.reverse()}};
var DE=function(a){a=a.split("");Xy.AB(a,1);return a.join("")};
c&&d.set(b,encodeURIComponent(DE(c)));"#;
        let err = Cipher::from_js(js).unwrap_err();
        assert!(err.is_extraction_error());
        assert!(matches!(
            err,
            RtubeError::PatternNotFound { ref caller, .. } if caller == "get_throttling_function_name"
        ));
    }

    #[test]
    fn test_cipher_is_send_sync() {
        assert_send_sync::<Cipher>();
    }

    #[tokio::test]
    async fn test_shared_between_tasks() {
        let cipher = Arc::new(Cipher::from_js(BASE_JS).unwrap());

        let handles: Vec<_> = ["vz6Q0Q4nXxk0YJPb", "O2aS_zbZ7pL1-eRz", "AbCdEfGhIjKlMnOpQr"]
            .into_iter()
            .map(|n| {
                let cipher = Arc::clone(&cipher);
                tokio::spawn(async move {
                    (
                        cipher.decrypt_signature("abcdef"),
                        cipher.calculate_throttle_parameter(n).unwrap(),
                    )
                })
            })
            .collect();

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }

        assert!(results.iter().all(|(sig, _)| sig == "abfd"));
        let throttled: Vec<&str> = results.iter().map(|(_, n)| n.as_str()).collect();
        assert_eq!(
            throttled,
            vec!["sZzffdLd7kHC39h7", "YZ-QFhYjMKdc2QA7", "FZvsMNJiCeVq42Jm97"]
        );
    }
}

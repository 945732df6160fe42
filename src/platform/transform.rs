//! Signature transform catalog and transform plan
//!
//! The signature function splits its input into an array, calls helpers on a
//! container object (`Xy.AB(a,49);Xy.CD(a,3);...`) and joins the result. The
//! helpers are one of three array operations, identified here by the shape of
//! their bodies.

use crate::error::RtubeError;
use crate::platform::patterns::{find_function_body, find_initial_function_name, RuleList};
use crate::utils::parser::{find_object_bounds, split_top_level};
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// Canonical array operation behind an obfuscated helper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformOp {
    /// `function(a){a.reverse()}`; the argument is ignored
    Reverse,
    /// `function(a,b){a.splice(0,b)}`: drop the first `b` elements
    Splice,
    /// `function(a,b){var c=a[0];a[0]=a[b%a.length];a[b%a.length]=c}`
    ///
    /// A helper written with a bare `a[b]` index is read the same way, so an
    /// out-of-range index wraps around instead of growing the array.
    Swap,
}

impl TransformOp {
    /// Apply the operation in place
    pub fn apply<T>(self, items: &mut Vec<T>, argument: i64) {
        match self {
            TransformOp::Reverse => items.reverse(),
            TransformOp::Splice => {
                let count = usize::try_from(argument).unwrap_or(0).min(items.len());
                items.drain(..count);
            }
            TransformOp::Swap => {
                if !items.is_empty() {
                    let r = argument.rem_euclid(items.len() as i64) as usize;
                    items.swap(0, r);
                }
            }
        }
    }
}

const ID: &str = "[a-zA-Z0-9_$]+";

/// Map a helper body to its canonical operation
///
/// Fails with [`RtubeError::PatternNotFound`] when the body is not one of the
/// known shapes.
pub fn resolve(function_body: &str) -> Result<TransformOp, RtubeError> {
    let reverse = format!(r#"\{{\s*{ID}\.reverse\(\s*\)\s*;?\s*\}}"#);
    let splice = format!(r#"\{{\s*{ID}\.splice\(\s*0\s*,\s*{ID}\s*\)\s*;?\s*\}}"#);
    let swap_prefix = format!(
        r#"\{{\s*var\s+{ID}\s*=\s*{ID}\[\s*0\s*\]\s*;\s*{ID}\[\s*0\s*\]\s*=\s*{ID}\[\s*{ID}\s*%\s*{ID}\.length\s*\]\s*;\s*"#
    );
    let swap_modulo = format!(r#"{swap_prefix}{ID}\[\s*{ID}\s*%\s*{ID}\.length\s*\]\s*=\s*{ID}\s*;?\s*\}}"#);
    let swap_index = format!(r#"{swap_prefix}{ID}\[\s*{ID}\s*\]\s*=\s*{ID}\s*;?\s*\}}"#);

    RuleList::new("map_functions")
        .with_rule(&reverse, |_, _| Ok(Some(TransformOp::Reverse)))?
        .with_rule(&splice, |_, _| Ok(Some(TransformOp::Splice)))?
        .with_rules(&[swap_modulo.as_str(), swap_index.as_str()], |_, _| Ok(Some(TransformOp::Swap)))?
        .first_match(function_body)
}

/// Helper name to operation mapping for one container object
pub type TransformCatalog = HashMap<String, TransformOp>;

/// Build the catalog from the container object literal `var <var>={...};`
pub fn build_catalog(js: &str, container: &str) -> Result<TransformCatalog, RtubeError> {
    let pattern = format!(r#"(?:var|let|const)\s+{}\s*=\s*\{{"#, regex::escape(container));
    let start = Regex::new(&pattern)?
        .find(js)
        .map(|m| m.end() - 1)
        .ok_or_else(|| RtubeError::pattern_not_found("get_transform_object", pattern.clone()))?;

    let object = find_object_bounds(js, start)?;
    let mut catalog = TransformCatalog::new();

    for entry in split_top_level(&object[1..object.len() - 1]) {
        let (name, function) = entry.split_once(':').ok_or_else(|| {
            RtubeError::ParseError(format!("transform object entry without a name: {}", entry))
        })?;
        let name = name.trim().trim_matches(|c| c == '"' || c == '\'');
        catalog.insert(name.to_string(), resolve(function)?);
    }

    debug!("Transform catalog for {} has {} entries", container, catalog.len());
    Ok(catalog)
}

/// One call of the signature function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransformStep {
    pub op: TransformOp,
    pub argument: i64,
}

/// Ordered list of operations deciphering a signature
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransformPlan {
    steps: Vec<TransformStep>,
}

impl TransformPlan {
    /// Plan running `steps` in order
    pub fn new(steps: Vec<TransformStep>) -> Self {
        Self { steps }
    }

    /// Steps in execution order
    pub fn steps(&self) -> &[TransformStep] {
        &self.steps
    }

    /// Number of steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// True when the plan leaves signatures unchanged
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step, in order, over the characters of `signature`
    pub fn apply(&self, signature: &str) -> String {
        let mut chars: Vec<char> = signature.chars().collect();
        for step in &self.steps {
            step.op.apply(&mut chars, step.argument);
        }
        chars.into_iter().collect()
    }
}

/// The raw statements of the signature function, e.g. `["Xy.AB(a,49)", ...]`
pub fn raw_transform_plan(js: &str, function_name: &str) -> Result<Vec<String>, RtubeError> {
    let body = find_function_body(js, function_name)?;
    let pattern = r#"(?s)^\{[a-z=\.\(")]*;(.*);(?:.+)\}$"#;
    let statements = Regex::new(pattern)?
        .captures(body)
        .and_then(|c| c.get(1))
        .ok_or_else(|| RtubeError::pattern_not_found("get_transform_plan", pattern))?;

    Ok(statements
        .as_str()
        .split(';')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

/// Build the plan for the signature function found in `js`
pub fn build_plan(js: &str) -> Result<TransformPlan, RtubeError> {
    let name = find_initial_function_name(js)?;
    build_plan_for(js, &name)
}

/// Build the plan for the named signature function
pub fn build_plan_for(js: &str, function_name: &str) -> Result<TransformPlan, RtubeError> {
    let calls = raw_transform_plan(js, function_name)?;
    let first = calls
        .first()
        .ok_or_else(|| RtubeError::ExtractError("empty transform plan".to_string()))?;

    let container_regex = Regex::new(&format!(r#"^({ID})(?:\.|\[)"#))?;
    let container = container_regex
        .captures(first)
        .and_then(|c| c.get(1))
        .ok_or_else(|| {
            RtubeError::pattern_not_found("transform_plan_container", container_regex.as_str())
        })?
        .as_str();

    let catalog = build_catalog(js, container)?;
    let member_call = format!(r#"^{ID}\.({ID})\(\s*{ID}\s*(?:,\s*(-?\d+)\s*)?\)$"#);
    let index_call = format!(r#"^{ID}\[["']({ID})["']\]\(\s*{ID}\s*(?:,\s*(-?\d+)\s*)?\)$"#);
    let call_rules = RuleList::new("parse_function")
        .with_rules(
            &[member_call.as_str(), index_call.as_str()],
            |captures, _| {
                let Some(name) = captures.get(1) else {
                    return Ok(None);
                };
                let argument = match captures.get(2) {
                    Some(arg) => arg.as_str().parse::<i64>().map_err(|_| {
                        RtubeError::ParseError(format!("invalid transform argument: {}", arg.as_str()))
                    })?,
                    None => 0,
                };
                Ok(Some((name.as_str().to_string(), argument)))
            },
        )?;

    let mut steps = Vec::with_capacity(calls.len());
    for call in &calls {
        let (name, argument) = call_rules.first_match(call)?;
        let op = *catalog
            .get(&name)
            .ok_or_else(|| RtubeError::pattern_not_found("transform_catalog", name.clone()))?;
        steps.push(TransformStep { op, argument });
    }

    debug!("Transform plan for {} has {} steps", function_name, steps.len());
    Ok(TransformPlan::new(steps))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE_JS: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/base.js"));
    const LONG_SIGNATURE: &str = "AOq0QJ8wRQIhAK1qO8oy2yO0LkSyfdAjw6W5zP4ZJmgkE6jBz0iY0bRUAiBwFXkD5Prm_KcOzH-XkeMG2gbD3A5hDY-kjb3cq0Hy2w==";

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn test_resolve_known_shapes() {
        assert_eq!(resolve("function(a){a.reverse()}").unwrap(), TransformOp::Reverse);
        assert_eq!(resolve("function(a,b){ a.splice( 0, b ); }").unwrap(), TransformOp::Splice);
        assert_eq!(
            resolve("function(a,b){var c=a[0];a[0]=a[b%a.length];a[b%a.length]=c}").unwrap(),
            TransformOp::Swap
        );
        assert_eq!(
            resolve("function(a,b){var c=a[0];a[0]=a[b%a.length];a[b]=c}").unwrap(),
            TransformOp::Swap
        );
        assert_eq!(
            resolve("function(a, b) {\n  var c = a[0];\n  a[0] = a[b % a.length];\n  a[b] = c;\n}").unwrap(),
            TransformOp::Swap
        );
    }

    #[test]
    fn test_resolve_unknown_shape() {
        let err = resolve("function(a){a.sort()}").unwrap_err();
        assert!(matches!(err, RtubeError::PatternNotFound { ref caller, .. } if caller == "map_functions"));
    }

    #[test]
    fn test_apply_operations() {
        let mut items = chars("abcdef");
        TransformOp::Reverse.apply(&mut items, 99);
        assert_eq!(items, chars("fedcba"));

        let mut items = chars("abcdef");
        TransformOp::Splice.apply(&mut items, 2);
        assert_eq!(items, chars("cdef"));

        let mut items = chars("abc");
        TransformOp::Splice.apply(&mut items, 10);
        assert!(items.is_empty());

        let mut items = chars("abcdef");
        TransformOp::Swap.apply(&mut items, 9);
        assert_eq!(items, chars("dbcaef"));
    }

    #[test]
    fn test_swap_twice_restores() {
        let original = chars("signature");
        let mut items = original.clone();
        TransformOp::Swap.apply(&mut items, 22);
        assert_ne!(items, original);
        TransformOp::Swap.apply(&mut items, 22);
        assert_eq!(items, original);
    }

    #[test]
    fn test_swap_empty_is_noop() {
        let mut items: Vec<char> = Vec::new();
        TransformOp::Swap.apply(&mut items, 3);
        assert!(items.is_empty());
    }

    #[test]
    fn test_build_catalog_compact_object() {
        let js = "var X={AB:function(a){a.reverse()},CD:function(a,b){a.splice(0,b)}};";
        let catalog = build_catalog(js, "X").unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog["AB"], TransformOp::Reverse);
        assert_eq!(catalog["CD"], TransformOp::Splice);
    }

    #[test]
    fn test_build_catalog_missing_object() {
        let err = build_catalog("var Y={};", "X").unwrap_err();
        match err {
            RtubeError::PatternNotFound { caller, pattern } => {
                assert_eq!(caller, "get_transform_object");
                assert!(pattern.contains('X'));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_raw_transform_plan_fixture() {
        assert_eq!(
            raw_transform_plan(BASE_JS, "DE").unwrap(),
            vec!["Xy.AB(a,49)", "Xy.CD(a,3)", "Xy.EF(a,2)", "Xy.AB(a,1)"]
        );
    }

    #[test]
    fn test_build_plan_fixture() {
        let plan = build_plan(BASE_JS).unwrap();
        let expected = vec![
            TransformStep { op: TransformOp::Reverse, argument: 49 },
            TransformStep { op: TransformOp::Swap, argument: 3 },
            TransformStep { op: TransformOp::Splice, argument: 2 },
            TransformStep { op: TransformOp::Reverse, argument: 1 },
        ];
        assert_eq!(plan.steps(), expected.as_slice());
    }

    #[test]
    fn test_four_step_plan_by_hand() {
        // fedcba -> cedfba -> dfba -> abfd
        let plan = build_plan(BASE_JS).unwrap();
        assert_eq!(plan.apply("abcdef"), "abfd");
    }

    #[test]
    fn test_plan_with_dollar_names_and_index_swap() {
        let plan = build_plan_for(BASE_JS, "Tw").unwrap();
        assert_eq!(plan.len(), 7);
        assert_eq!(
            plan.apply(LONG_SIGNATURE),
            "Rq0QJ8wOQIhAK1qOAoy2yO0LkSyfdAjw6W5zP4ZJmgkE6jBz0iY0bRUAiBw2XkD5Prm_KcOzH-XkeMG2gbD3A5hDY-kjb3cq0HyF"
        );
    }

    #[test]
    fn test_bracket_call_form() {
        let js = r#"var Qt={xy:function(a){a.reverse()},zw:function(a,b){a.splice(0,b)}};
Pn=function(a){a=a.split("");Qt["zw"](a,1);Qt["xy"](a,0);return a.join("")};"#;
        let plan = build_plan_for(js, "Pn").unwrap();
        assert_eq!(plan.apply("abcd"), "dcb");
    }
}

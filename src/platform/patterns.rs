//! Ordered pattern families for locating functions in the player script
//!
//! Every lookup here is a [`RuleList`]: patterns are tried in the order they
//! were added and the first one that yields a value wins, even when a later
//! pattern would also match. Lists go from most specific to most general, so
//! reordering them changes which function is found.

use crate::error::RtubeError;
use crate::utils::parser::find_object_bounds;
use regex::{Captures, Regex};
use tracing::debug;

/// Turns a successful match into a value. `Ok(None)` means the match was not
/// usable and evaluation moves on to the next rule.
pub type Extractor<T> = fn(&Captures<'_>, &str) -> Result<Option<T>, RtubeError>;

/// Prioritized list of (pattern, extractor) rules
pub struct RuleList<T> {
    caller: &'static str,
    rules: Vec<(Regex, Extractor<T>)>,
}

impl<T> RuleList<T> {
    /// Create an empty rule list reporting failures as `caller`
    pub fn new(caller: &'static str) -> Self {
        Self {
            caller,
            rules: Vec::new(),
        }
    }

    /// Append a rule with lower priority than every rule already present
    pub fn with_rule(mut self, pattern: &str, extract: Extractor<T>) -> Result<Self, RtubeError> {
        self.rules.push((Regex::new(pattern)?, extract));
        Ok(self)
    }

    /// Append several rules sharing one extractor, keeping their order
    pub fn with_rules(self, patterns: &[&str], extract: Extractor<T>) -> Result<Self, RtubeError> {
        patterns
            .iter()
            .try_fold(self, |list, pattern| list.with_rule(pattern, extract))
    }

    /// Number of rules in the list
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Check if the list has no rules
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Evaluate the rules in order and return the first extracted value
    pub fn first_match(&self, text: &str) -> Result<T, RtubeError> {
        for (pattern, extract) in &self.rules {
            if let Some(captures) = pattern.captures(text) {
                if let Some(value) = extract(&captures, text)? {
                    debug!("{}: matched {}", self.caller, pattern.as_str());
                    return Ok(value);
                }
            }
        }

        Err(RtubeError::pattern_not_found(self.caller, "multiple"))
    }
}

/// Call-site and definition shapes of the signature function, most specific first
const INITIAL_FUNCTION_PATTERNS: &[&str] = &[
    r#"\b[a-zA-Z0-9_$]+&&\([a-zA-Z0-9_$]+=(?P<sig>[a-zA-Z0-9_$]{2,})\(decodeURIComponent\([a-zA-Z0-9_$]+\)\)"#,
    r#"\b[cs]\s*&&\s*[adf]\.set\([^,]+\s*,\s*encodeURIComponent\s*\(\s*(?P<sig>[a-zA-Z0-9$]+)\("#,
    r#"\b[a-zA-Z0-9]+\s*&&\s*[a-zA-Z0-9]+\.set\([^,]+\s*,\s*encodeURIComponent\s*\(\s*(?P<sig>[a-zA-Z0-9$]+)\("#,
    r#"(?:\b|[^a-zA-Z0-9$])(?P<sig>[a-zA-Z0-9$]{2})\s*=\s*function\(\s*a\s*\)\s*\{\s*a\s*=\s*a\.split\(\s*""\s*\)"#,
    r#"(?P<sig>[a-zA-Z0-9$]+)\s*=\s*function\(\s*a\s*\)\s*\{\s*a\s*=\s*a\.split\(\s*""\s*\)"#,
    r#"["']signature["']\s*,\s*(?P<sig>[a-zA-Z0-9$]+)\("#,
    r#"\.sig\|\|(?P<sig>[a-zA-Z0-9$]+)\("#,
    r#"yt\.akamaized\.net/\)\s*\|\|\s*.*?\s*[cs]\s*&&\s*[adf]\.set\([^,]+\s*,\s*(?:encodeURIComponent\s*\()?\s*(?P<sig>[a-zA-Z0-9$]+)\("#,
    r#"\b[cs]\s*&&\s*[adf]\.set\([^,]+\s*,\s*(?P<sig>[a-zA-Z0-9$]+)\("#,
    r#"\b[a-zA-Z0-9]+\s*&&\s*[a-zA-Z0-9]+\.set\([^,]+\s*,\s*(?P<sig>[a-zA-Z0-9$]+)\("#,
    r#"\bc\s*&&\s*a\.set\([^,]+\s*,\s*\([^)]*\)\s*\(\s*(?P<sig>[a-zA-Z0-9$]+)\("#,
    r#"\bc\s*&&\s*[a-zA-Z0-9]+\.set\([^,]+\s*,\s*\([^)]*\)\s*\(\s*(?P<sig>[a-zA-Z0-9$]+)\("#,
];

/// Call-site shapes of the throttle function. `idx` is set when the name is
/// an array of functions rather than the function itself.
const THROTTLE_FUNCTION_PATTERNS: &[&str] = &[
    r#"a\.[a-zA-Z]\s*&&\s*\([a-z]\s*=\s*a\.get\("n"\)\)\s*&&\s*\([a-z]\s*=\s*(?P<nfunc>[a-zA-Z0-9$]+)(?:\[(?P<idx>\d+)\])?\([a-z]\)"#,
    r#"\.get\("n"\)\)&&\(b=(?P<nfunc>[a-zA-Z0-9$]+)(?:\[(?P<idx>\d+)\])?\([a-zA-Z0-9]\)"#,
    r#"\([a-z]\s*=\s*(?P<nfunc>[a-zA-Z0-9$]+)\[(?P<idx>\d+)\]\([a-z]\)"#,
];

/// Find the name of the function that deciphers the `s` signature
pub fn find_initial_function_name(js: &str) -> Result<String, RtubeError> {
    debug!("Finding initial function name");
    RuleList::new("get_initial_function_name")
        .with_rules(INITIAL_FUNCTION_PATTERNS, |captures, _| {
            Ok(captures.name("sig").map(|m| m.as_str().to_string()))
        })?
        .first_match(js)
}

/// Find the name of the function that computes the `n` throttle parameter
///
/// When the call site indexes into an array (`Bpa[0](b)`), the array literal
/// `var Bpa=[...]` is looked up and the element at that index is returned.
pub fn find_throttle_function_name(js: &str) -> Result<String, RtubeError> {
    debug!("Finding throttle function name");
    RuleList::new("get_throttling_function_name")
        .with_rules(THROTTLE_FUNCTION_PATTERNS, |captures, js| {
            let Some(name) = captures.name("nfunc") else {
                return Ok(None);
            };
            match captures.name("idx") {
                None => Ok(Some(name.as_str().to_string())),
                Some(idx) => resolve_name_array(js, name.as_str(), idx.as_str()),
            }
        })?
        .first_match(js)
}

fn resolve_name_array(js: &str, array_name: &str, idx: &str) -> Result<Option<String>, RtubeError> {
    let index: usize = idx
        .parse()
        .map_err(|_| RtubeError::ParseError(format!("invalid array index: {}", idx)))?;

    let array_regex = Regex::new(&format!(
        r#"var\s+{}\s*=\s*(\[.+?\]);"#,
        regex::escape(array_name)
    ))?;

    let Some(array) = array_regex.captures(js).and_then(|c| c.get(1)) else {
        debug!("Name array {} not found", array_name);
        return Ok(None);
    };

    let names: Vec<&str> = array
        .as_str()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .map(str::trim)
        .collect();

    Ok(names.get(index).map(|name| name.to_string()))
}

/// Find the body of the function `name`, braces included
///
/// Accepts `name=function(a){...}` and `function name(a){...}` definitions.
pub fn find_function_body<'a>(js: &'a str, name: &str) -> Result<&'a str, RtubeError> {
    let escaped = regex::escape(name);
    let definitions = [
        format!(r#"(?:^|[^a-zA-Z0-9$]){}\s*=\s*function\s*\([^)]*\)\s*\{{"#, escaped),
        format!(r#"\bfunction\s+{}\s*\([^)]*\)\s*\{{"#, escaped),
    ];
    let patterns: Vec<&str> = definitions.iter().map(String::as_str).collect();

    let start = RuleList::new("find_function_body")
        .with_rules(&patterns, |captures, _| {
            Ok(captures.get(0).map(|m| m.end() - 1))
        })?
        .first_match(js)?;

    find_object_bounds(js, start)
}

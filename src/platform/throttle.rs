//! Interpreter for the `n` throttle parameter function
//!
//! The throttle function declares a table literal holding integers, strings,
//! the split input array, a reference to the table itself and a set of helper
//! functions, then runs a `try{...}` block of calls such as
//! `c[3](c[4],c[7])`. Any other statement in that block is rejected.
//! Helpers are identified by the shape of their source. Calls are resolved
//! against the table as it is at the time of the call, because some calls
//! rearrange the table itself.

use crate::error::RtubeError;
use crate::platform::patterns::{find_function_body, find_throttle_function_name, RuleList};
use crate::utils::parser::{find_object_bounds, split_top_level};
use regex::Regex;
use std::fmt;
use tracing::{debug, warn};

const DEFAULT_ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";
const DEFAULT_COUNTER: i64 = 96;
const MAX_ALPHABET_ITERATIONS: usize = 1024;

/// `((e % len) + len) % len`, so negative operands land in `0..len`.
///
/// Returns 0 for an empty array.
pub fn modulo(e: i64, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let len = len as i64;
    (((e % len) + len) % len) as usize
}

/// Entry of the throttle table or of the array being transformed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Str(String),
    /// The table itself (`null` slots are overwritten with it by the script)
    SelfRef,
    /// The input split into characters
    Input,
    /// Index into the program's helper list
    Helper(usize),
    /// Anything the interpreter does not model, kept as source text
    Raw(String),
}

/// Symbols and starting counter of a substitution cipher helper
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alphabet {
    symbols: Vec<char>,
    counter: i64,
}

impl Default for Alphabet {
    fn default() -> Self {
        Self {
            symbols: DEFAULT_ALPHABET.chars().collect(),
            counter: DEFAULT_COUNTER,
        }
    }
}

enum Statement {
    Stop,
    Set(i64),
    Add(i64),
    Sub(i64),
    Push,
}

struct Clause {
    label: Option<i64>,
    statements: Vec<Statement>,
}

impl Alphabet {
    pub fn symbols(&self) -> &[char] {
        &self.symbols
    }

    pub fn counter(&self) -> i64 {
        self.counter
    }

    /// Recover the alphabet a cipher helper builds.
    ///
    /// Helpers generate it with a loop of the form
    /// `for(var f=64,h=[];++f-h.length-32;){switch(f){...}}`, which is
    /// simulated here. Helpers without such a loop use the fixed 64-symbol
    /// alphabet.
    pub fn derive(source: &str) -> Result<Self, RtubeError> {
        let header = Regex::new(r"for\(var (\w+)=(\d+),(\w+)=\[\];\+\+\w+-\w+\.length-(\d+);\)")?;
        let Some(captures) = header.captures(source) else {
            return Ok(Self::default());
        };

        let mut counter = parse_int(&captures[2])?;
        let offset = parse_int(&captures[4])?;
        let header_end = captures.get(0).map(|m| m.end()).unwrap_or(0);

        let switch = Regex::new(r"switch\(\w+\)\s*\{")?;
        let switch_start = switch
            .find_at(source, header_end)
            .map(|m| m.end() - 1)
            .ok_or_else(|| RtubeError::pattern_not_found("cipher_alphabet", switch.as_str()))?;
        let switch_body = find_object_bounds(source, switch_start)?;
        let clauses = parse_clauses(&switch_body[1..switch_body.len() - 1])?;

        let mut symbols = Vec::new();
        for _ in 0..MAX_ALPHABET_ITERATIONS {
            counter += 1;
            if counter - symbols.len() as i64 - offset == 0 {
                return Ok(Self { symbols, counter });
            }

            let entry = clauses
                .iter()
                .position(|c| c.label == Some(counter))
                .or_else(|| clauses.iter().position(|c| c.label.is_none()));
            let Some(entry) = entry else {
                continue;
            };

            'clauses: for clause in &clauses[entry..] {
                for statement in &clause.statements {
                    match statement {
                        Statement::Stop => break 'clauses,
                        Statement::Set(n) => counter = *n,
                        Statement::Add(n) => counter += n,
                        Statement::Sub(n) => counter -= n,
                        Statement::Push => {
                            let symbol = u32::try_from(counter)
                                .ok()
                                .and_then(char::from_u32)
                                .ok_or_else(|| {
                                    RtubeError::ExtractError(format!("invalid char code {}", counter))
                                })?;
                            symbols.push(symbol);
                        }
                    }
                }
            }
        }

        Err(RtubeError::ExtractError(
            "cipher alphabet loop did not terminate".to_string(),
        ))
    }

    fn position(&self, value: Option<&Value>) -> i64 {
        let Some(Value::Str(s)) = value else {
            return -1;
        };
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => self
                .symbols
                .iter()
                .position(|&symbol| symbol == c)
                .map(|p| p as i64)
                .unwrap_or(-1),
            _ => -1,
        }
    }

    /// Substitute every element in place. Each output symbol is appended to
    /// the key, so later positions are keyed by earlier output.
    fn encode(&self, items: &mut [Value], key: &str) {
        let len = self.symbols.len() as i64;
        if len == 0 {
            return;
        }

        let mut key: Vec<Value> = key.chars().map(|c| Value::Str(c.to_string())).collect();
        let mut counter = self.counter;

        for (m, item) in items.iter_mut().enumerate() {
            let index = (self.position(Some(&*item)) - self.position(key.get(m)) + m as i64 - 32 + counter)
                .rem_euclid(len);
            counter -= 1;

            let symbol = Value::Str(self.symbols[index as usize].to_string());
            key.push(symbol.clone());
            *item = symbol;
        }
    }
}

fn parse_int(text: &str) -> Result<i64, RtubeError> {
    text.parse()
        .map_err(|_| RtubeError::ParseError(format!("invalid integer: {}", text)))
}

fn parse_clauses(switch_body: &str) -> Result<Vec<Clause>, RtubeError> {
    let labels = Regex::new(r"(?:case\s*(\d+)|default)\s*:")?;
    let assignment = Regex::new(r"^\w+\s*([-+]?=)\s*(\d+)$")?;

    let found: Vec<_> = labels.captures_iter(switch_body).collect();
    let mut clauses = Vec::with_capacity(found.len());

    for (i, captures) in found.iter().enumerate() {
        let start = captures.get(0).map(|m| m.end()).unwrap_or(0);
        let end = found
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map(|m| m.start())
            .unwrap_or(switch_body.len());

        let label = captures.get(1).map(|m| parse_int(m.as_str())).transpose()?;
        let mut statements = Vec::new();

        for statement in switch_body[start..end].split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let parsed = match statement {
                "continue" | "break" => Statement::Stop,
                s if s.contains(".push(") => Statement::Push,
                s => {
                    let captures = assignment.captures(s).ok_or_else(|| {
                        RtubeError::pattern_not_found("cipher_alphabet", s.to_string())
                    })?;
                    let n = parse_int(&captures[2])?;
                    match &captures[1] {
                        "=" => Statement::Set(n),
                        "+=" => Statement::Add(n),
                        _ => Statement::Sub(n),
                    }
                }
            };
            statements.push(parsed);
        }

        clauses.push(Clause { label, statements });
    }

    Ok(clauses)
}

/// Canonical helper operations. The second call argument is `e` below.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThrottleOp {
    /// Move the last `modulo(e)` elements to the front
    Rotate,
    Reverse,
    /// Append `e`, whatever it is
    Push,
    /// Swap element 0 with element `modulo(e)`
    Swap,
    /// Remove element `modulo(e)`
    Remove,
    /// Substitution cipher keyed by the string `e`
    Cipher(Alphabet),
}

impl ThrottleOp {
    pub fn name(&self) -> &'static str {
        match self {
            ThrottleOp::Rotate => "rotate",
            ThrottleOp::Reverse => "reverse",
            ThrottleOp::Push => "push",
            ThrottleOp::Swap => "swap",
            ThrottleOp::Remove => "remove",
            ThrottleOp::Cipher(_) => "cipher",
        }
    }

    fn apply(&self, items: &mut Vec<Value>, argument: Option<Value>) -> Result<(), RtubeError> {
        match self {
            ThrottleOp::Reverse => items.reverse(),
            ThrottleOp::Push => items.push(argument.ok_or_else(|| {
                RtubeError::ExtractError("push called without an element".to_string())
            })?),
            ThrottleOp::Rotate => {
                let e = int_argument(argument)?;
                let len = items.len();
                items.rotate_right(modulo(e, len));
            }
            ThrottleOp::Swap => {
                let e = int_argument(argument)?;
                if !items.is_empty() {
                    let index = modulo(e, items.len());
                    items.swap(0, index);
                }
            }
            ThrottleOp::Remove => {
                let e = int_argument(argument)?;
                if !items.is_empty() {
                    let index = modulo(e, items.len());
                    items.remove(index);
                }
            }
            ThrottleOp::Cipher(alphabet) => match argument {
                Some(Value::Str(key)) => alphabet.encode(items, &key),
                other => {
                    return Err(RtubeError::ExtractError(format!(
                        "cipher key must be a string, got {:?}",
                        other
                    )))
                }
            },
        }
        Ok(())
    }
}

fn int_argument(argument: Option<Value>) -> Result<i64, RtubeError> {
    match argument {
        Some(Value::Int(n)) => Ok(n),
        other => Err(RtubeError::ExtractError(format!(
            "expected an integer argument, got {:?}",
            other
        ))),
    }
}

/// Helper shapes, first match wins. New shapes go here.
fn helper_rules() -> Result<RuleList<ThrottleOp>, RtubeError> {
    RuleList::new("throttle_helper")
        .with_rule(
            r"\{for\(\w=\(\w%\w\.length\+\w\.length\)%\w\.length;\w--;\)\w\.unshift\(\w\.pop\(\)\)\}",
            |_, _| Ok(Some(ThrottleOp::Rotate)),
        )?
        .with_rule(r"\{\w\.reverse\(\)\}", |_, _| Ok(Some(ThrottleOp::Reverse)))?
        .with_rule(r"\{\w\.push\(\w\)\}", |_, _| Ok(Some(ThrottleOp::Push)))?
        .with_rule(r";var\s\w=\w\[0\];\w\[0\]=\w\[\w\];\w\[\w\]=\w\}", |_, _| {
            Ok(Some(ThrottleOp::Swap))
        })?
        .with_rule(r"case\s*\d+", |_, source| match Alphabet::derive(source) {
            Ok(alphabet) => Ok(Some(ThrottleOp::Cipher(alphabet))),
            Err(e) => {
                warn!("Could not derive cipher alphabet: {}", e);
                Ok(None)
            }
        })?
        .with_rule(r"\w\.splice\(0,1,\w\.splice\(\w,1,\w\[0\]\)\[0\]\)", |_, _| {
            Ok(Some(ThrottleOp::Swap))
        })?
        .with_rule(r";\w\.splice\(\w,1\)\}", |_, _| Ok(Some(ThrottleOp::Remove)))?
        .with_rule(
            r"\w\.splice\(-\w\)\.reverse\(\)\.forEach\(function\(\w\)\{\w\.unshift\(\w\)\}\)",
            |_, _| Ok(Some(ThrottleOp::Rotate)),
        )?
        .with_rule(
            r"for\(var \w=\w\.length;\w;\)\w\.push\(\w\.splice\(--\w,1\)\[0\]\)\}",
            |_, _| Ok(Some(ThrottleOp::Reverse)),
        )
}

/// A helper function from the table. `op` is `None` for shapes the
/// interpreter does not know; invoking one is an error.
#[derive(Debug, Clone)]
pub struct Helper {
    op: Option<ThrottleOp>,
    source: String,
}

impl Helper {
    pub fn op(&self) -> Option<&ThrottleOp> {
        self.op.as_ref()
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

/// `table[function](table[target], table[argument])`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleStep {
    pub function: usize,
    pub target: usize,
    pub argument: Option<usize>,
}

/// Parsed throttle function, ready to run any number of times
#[derive(Debug, Clone)]
pub struct ThrottleProgram {
    name: String,
    body: String,
    table: Vec<Value>,
    helpers: Vec<Helper>,
    steps: Vec<ThrottleStep>,
}

impl ThrottleProgram {
    /// Locate the throttle function in the player script and parse it
    pub fn from_js(js: &str) -> Result<Self, RtubeError> {
        let name = find_throttle_function_name(js)?;
        let body = find_function_body(js, &name)?;
        Self::parse(&name, body)
    }

    /// Parse a throttle function body, braces included
    pub fn parse(name: &str, body: &str) -> Result<Self, RtubeError> {
        let input_pattern = r#"var\s+([a-zA-Z0-9_$]+)\s*=\s*[a-zA-Z0-9_$]+\.split\(\s*""\s*\)"#;
        let input_name = Regex::new(input_pattern)?
            .captures(body)
            .and_then(|c| c.get(1))
            .ok_or_else(|| RtubeError::pattern_not_found("throttle_input", input_pattern))?
            .as_str();

        let table_pattern = r"(?:,|\bvar\s+)([a-zA-Z0-9_$]+)\s*=\s*\[";
        let table_match = Regex::new(table_pattern)?
            .captures(body)
            .ok_or_else(|| RtubeError::pattern_not_found("throttle_table", table_pattern))?;
        let table_name = table_match.get(1).map(|m| m.as_str()).unwrap_or_default();
        let table_start = table_match.get(0).map(|m| m.end() - 1).unwrap_or_default();
        let literal = find_object_bounds(body, table_start)?;

        let rules = helper_rules()?;
        let mut helpers = Vec::new();
        let mut table = Vec::new();

        for element in split_top_level(&literal[1..literal.len() - 1]) {
            let value = if let Ok(n) = element.parse::<i64>() {
                Value::Int(n)
            } else if element == "null" || element == table_name {
                Value::SelfRef
            } else if element == input_name {
                Value::Input
            } else if element.starts_with('"') {
                Value::Str(serde_json::from_str(element).unwrap_or_else(|_| {
                    element.trim_matches('"').to_string()
                }))
            } else if element.len() >= 2 && element.starts_with('\'') && element.ends_with('\'') {
                Value::Str(element[1..element.len() - 1].to_string())
            } else if element.starts_with("function") {
                let op = match rules.first_match(element) {
                    Ok(op) => Some(op),
                    Err(RtubeError::PatternNotFound { .. }) => {
                        debug!("Unrecognized throttle helper: {}", element);
                        None
                    }
                    Err(e) => return Err(e),
                };
                helpers.push(Helper {
                    op,
                    source: element.to_string(),
                });
                Value::Helper(helpers.len() - 1)
            } else {
                Value::Raw(element.to_string())
            };
            table.push(value);
        }

        let table_ref = regex::escape(table_name);
        let self_assignment = Regex::new(&format!(
            r"(?:^|[^a-zA-Z0-9_$]){t}\[(\d+)\]\s*=\s*{t}\s*[;,}}]",
            t = table_ref
        ))?;
        for captures in self_assignment.captures_iter(body) {
            let index: usize = captures[1]
                .parse()
                .map_err(|_| RtubeError::ParseError(format!("invalid table index: {}", &captures[1])))?;
            match table.get_mut(index) {
                Some(slot) => *slot = Value::SelfRef,
                None => debug!("Self assignment past the end of the table: {}", index),
            }
        }

        let try_start = body
            .find("try{")
            .map(|i| i + 3)
            .ok_or_else(|| RtubeError::pattern_not_found("throttle_steps", "try{"))?;
        let try_block = find_object_bounds(body, try_start)?;

        // Every statement in the block must be a step
        let step_regex = Regex::new(&format!(
            r"^{t}\s*\[\s*(\d+)\s*\]\s*\(\s*{t}\s*\[\s*(\d+)\s*\]\s*(?:,\s*{t}\s*\[\s*(\d+)\s*\]\s*)?\)$",
            t = table_ref
        ))?;
        let statements = split_top_level(&try_block[1..try_block.len() - 1])
            .into_iter()
            .flat_map(|piece| piece.split(';'))
            .map(str::trim)
            .filter(|statement| !statement.is_empty());

        let mut steps = Vec::new();
        for statement in statements {
            let captures = step_regex
                .captures(statement)
                .ok_or_else(|| RtubeError::pattern_not_found("throttle_steps", statement))?;
            let index = |i: usize| -> Result<Option<usize>, RtubeError> {
                captures
                    .get(i)
                    .map(|m| {
                        m.as_str().parse::<usize>().map_err(|_| {
                            RtubeError::ParseError(format!("invalid table index: {}", m.as_str()))
                        })
                    })
                    .transpose()
            };
            let (Some(function), Some(target)) = (index(1)?, index(2)?) else {
                return Err(RtubeError::pattern_not_found("throttle_steps", statement));
            };
            steps.push(ThrottleStep {
                function,
                target,
                argument: index(3)?,
            });
        }

        if steps.is_empty() {
            return Err(RtubeError::pattern_not_found(
                "throttle_steps",
                step_regex.as_str(),
            ));
        }

        debug!(
            "Throttle program {}: {} table entries, {} helpers, {} steps",
            name,
            table.len(),
            helpers.len(),
            steps.len()
        );

        Ok(Self {
            name: name.to_string(),
            body: body.to_string(),
            table,
            helpers,
            steps,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn table(&self) -> &[Value] {
        &self.table
    }

    pub fn helpers(&self) -> &[Helper] {
        &self.helpers
    }

    pub fn steps(&self) -> &[ThrottleStep] {
        &self.steps
    }

    /// Compute the throttle parameter for `value`
    pub fn run(&self, value: &str) -> Result<String, RtubeError> {
        let mut table = self.table.clone();
        let mut input: Vec<Value> = value.chars().map(|c| Value::Str(c.to_string())).collect();

        for (position, step) in self.steps.iter().enumerate() {
            let helper = match table.get(step.function) {
                Some(Value::Helper(i)) => self.helpers.get(*i),
                _ => None,
            }
            .ok_or_else(|| {
                RtubeError::ExtractError(format!(
                    "step {}: table entry {} is not callable",
                    position, step.function
                ))
            })?;

            let op = helper.op.as_ref().ok_or_else(|| {
                let preview: String = helper.source.chars().take(60).collect();
                RtubeError::pattern_not_found("throttle_helper", preview)
            })?;

            let argument = match step.argument {
                Some(i) => Some(table.get(i).cloned().ok_or_else(|| {
                    RtubeError::ExtractError(format!("step {}: no table entry {}", position, i))
                })?),
                None => None,
            };

            let on_table = match table.get(step.target) {
                Some(Value::Input) => false,
                Some(Value::SelfRef) => true,
                other => {
                    return Err(RtubeError::ExtractError(format!(
                        "step {}: {:?} is not an array",
                        position, other
                    )))
                }
            };
            if on_table {
                op.apply(&mut table, argument)?;
            } else {
                op.apply(&mut input, argument)?;
            }
        }

        Ok(input.iter().map(|v| self.render(v)).collect())
    }

    fn render(&self, value: &Value) -> String {
        match value {
            Value::Int(n) => n.to_string(),
            Value::Str(s) | Value::Raw(s) => s.clone(),
            Value::Helper(i) => self
                .helpers
                .get(*i)
                .map(|h| h.source.clone())
                .unwrap_or_default(),
            Value::SelfRef | Value::Input => String::new(),
        }
    }
}

impl fmt::Display for ThrottleProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} steps, {} helpers)",
            self.name,
            self.steps.len(),
            self.helpers.len()
        )
    }
}

/// Parse `body` and run it over `value`
pub fn run(body: &str, value: &[char]) -> Result<Vec<char>, RtubeError> {
    let input: String = value.iter().collect();
    let output = ThrottleProgram::parse("anonymous", body)?.run(&input)?;
    Ok(output.chars().collect())
}

//! Textual argument encoding understood by the ledger tool's argument parser

use std::fmt;

/// A typed argument for a canister call
#[derive(Debug, Clone, PartialEq)]
pub enum CandidArg {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Principal(String),
}

impl fmt::Display for CandidArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidArg::Text(s) => f.write_str(&text(s)),
            CandidArg::Int(i) => write!(f, "{}", i),
            CandidArg::Float(x) => f.write_str(&float(*x)),
            CandidArg::Bool(b) => f.write_str(if *b { "true" } else { "false" }),
            CandidArg::Principal(p) => f.write_str(&principal(p)),
        }
    }
}

/// Encode an argument tuple, e.g. `("ETH","price",1834.250000)`
pub fn encode_args(args: &[CandidArg]) -> String {
    let inner: Vec<String> = args.iter().map(ToString::to_string).collect();
    format!("({})", inner.join(","))
}

/// Quote and escape a text value
pub fn text(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\'' => out.push_str("\\'"),
            ' '..='~' => out.push(c),
            other => out.push_str(&format!("\\u{{{:X}}}", other as u32)),
        }
    }
    out.push('"');
    out
}

/// Fixed-point float with six fractional digits
pub fn float(value: f64) -> String {
    float_with_precision(value, 6)
}

pub fn float_with_precision(value: f64, precision: usize) -> String {
    format!("{:.*}", precision, value)
}

pub fn principal(value: &str) -> String {
    format!("principal {}", text(value))
}

// ── Polymorphic input values ──
//
// The hub accepts bool/int/float/string inputs uniformly; `RawValue`
// carries exactly one of those shapes into a typed `Value::set`.

use serde_json::Value as Json;

/// A raw scalar with exactly one of the supported shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl RawValue {
    /// Classify a JSON scalar. Arrays, objects and null have no raw form.
    pub fn from_json(json: &Json) -> Option<Self> {
        match json {
            Json::Bool(b) => Some(Self::Bool(*b)),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Self::Int(i))
                } else if let Some(u) = n.as_u64() {
                    Some(Self::Int(i64::try_from(u).unwrap_or(i64::MAX)))
                } else {
                    n.as_f64().map(Self::Float)
                }
            }
            Json::String(s) => Some(Self::String(s.clone())),
            Json::Null | Json::Array(_) | Json::Object(_) => None,
        }
    }

    pub fn to_json(&self) -> Json {
        match self {
            Self::Bool(b) => Json::Bool(*b),
            Self::Int(i) => Json::from(*i),
            Self::Float(f) => Json::from(*f),
            Self::String(s) => Json::String(s.clone()),
        }
    }
}

impl From<bool> for RawValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for RawValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for RawValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for RawValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for RawValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<String> for RawValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

// ── Text conversions shared by the typed setters ─────────────────────

pub(crate) fn bool_to_text(b: bool) -> &'static str {
    if b { "True" } else { "False" }
}

pub(crate) fn text_to_bool(s: &str) -> bool {
    !s.is_empty() && s != "False"
}

/// Parse the leading integer of `s`, skipping leading whitespace.
///
/// `"42abc"` parses as 42; `"abc"` and out-of-range numbers do not parse.
pub(crate) fn parse_int_prefix(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let digits_start = end;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    if end == digits_start {
        return None;
    }
    s.get(..end)?.parse().ok()
}

/// Parse the longest leading float of `s`, skipping leading whitespace.
///
/// The prefix is scanned once (sign, digits, fraction, exponent, or one
/// of the `inf`/`infinity`/`nan` words) and parsed once.
pub(crate) fn parse_float_prefix(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let sign = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));

    let int_digits = count_digits(bytes, sign);
    let mut end = sign + int_digits;
    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = count_digits(bytes, end + 1);
        if int_digits > 0 || frac_digits > 0 {
            end += 1 + frac_digits;
        }
    }

    if int_digits == 0 && frac_digits == 0 {
        let rest = s.get(sign..)?;
        let word = ["infinity", "inf", "nan"].into_iter().find(|word| {
            rest.get(..word.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(word))
        })?;
        return s.get(..sign + word.len())?.parse().ok();
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let exp_start = end + 1 + usize::from(matches!(bytes.get(end + 1), Some(b'+' | b'-')));
        let exp_digits = count_digits(bytes, exp_start);
        if exp_digits > 0 {
            end = exp_start + exp_digits;
        }
    }
    s.get(..end)?.parse().ok()
}

fn count_digits(bytes: &[u8], from: usize) -> usize {
    bytes
        .get(from..)
        .map_or(0, |rest| rest.iter().take_while(|b| b.is_ascii_digit()).count())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classifies_json_scalars() {
        assert_eq!(RawValue::from_json(&json!(true)), Some(RawValue::Bool(true)));
        assert_eq!(RawValue::from_json(&json!(7)), Some(RawValue::Int(7)));
        assert_eq!(RawValue::from_json(&json!(2.5)), Some(RawValue::Float(2.5)));
        assert_eq!(
            RawValue::from_json(&json!("x")),
            Some(RawValue::String("x".into()))
        );
        assert_eq!(RawValue::from_json(&json!(null)), None);
        assert_eq!(RawValue::from_json(&json!([1])), None);
        assert_eq!(RawValue::from_json(&json!({"a": 1})), None);
    }

    #[test]
    fn int_prefix_behaves_like_stoi() {
        assert_eq!(parse_int_prefix("42"), Some(42));
        assert_eq!(parse_int_prefix("  -7xyz"), Some(-7));
        assert_eq!(parse_int_prefix("+3"), Some(3));
        assert_eq!(parse_int_prefix("abc"), None);
        assert_eq!(parse_int_prefix("-"), None);
        assert_eq!(parse_int_prefix(""), None);
        assert_eq!(parse_int_prefix("99999999999999999999999"), None);
    }

    #[test]
    fn float_prefix_takes_longest_match() {
        assert_eq!(parse_float_prefix("1.5"), Some(1.5));
        assert_eq!(parse_float_prefix(" 2.25volts"), Some(2.25));
        assert_eq!(parse_float_prefix("1e3"), Some(1000.0));
        assert_eq!(parse_float_prefix("volts"), None);
    }

    #[test]
    fn float_prefix_edge_forms() {
        assert_eq!(parse_float_prefix("-.5x"), Some(-0.5));
        assert_eq!(parse_float_prefix("3.e"), Some(3.0));
        assert_eq!(parse_float_prefix("2e+2m"), Some(200.0));
        assert_eq!(parse_float_prefix("7e"), Some(7.0));
        assert_eq!(parse_float_prefix("1.5.2"), Some(1.5));
        assert_eq!(parse_float_prefix("-inFinity!"), Some(f64::NEG_INFINITY));
        assert_eq!(parse_float_prefix("inf"), Some(f64::INFINITY));
        assert!(parse_float_prefix("nan%").is_some_and(f64::is_nan));
        assert_eq!(parse_float_prefix("."), None);
        assert_eq!(parse_float_prefix("-"), None);
        assert_eq!(parse_float_prefix(""), None);
    }

    #[test]
    fn float_prefix_is_linear_on_long_input() {
        let input = format!("{}{}", "1".repeat(200_000), "x".repeat(200_000));
        let started = std::time::Instant::now();
        let parsed = parse_float_prefix(&input);
        assert!(parsed.is_some_and(|f| f > 1e300 || f.is_infinite()));
        assert!(started.elapsed() < std::time::Duration::from_secs(2));
    }

    #[test]
    fn text_truthiness() {
        assert!(text_to_bool("True"));
        assert!(text_to_bool("anything"));
        assert!(!text_to_bool("False"));
        assert!(!text_to_bool(""));
    }
}

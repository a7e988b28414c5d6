//! Lenient monetary amount parsing.
//!
//! Journal forms submit amounts as JSON numbers or as raw input strings.
//! Anything that does not start with a number counts as zero, and trailing
//! garbage after a numeric prefix is ignored (`"12.5 GHS"` reads as 12.5).

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::str::FromStr;

static NUMERIC_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([+-]?(?:\d+\.?\d*|\.\d+))(?:[eE]([+-]?\d+))?").expect("valid amount regex")
});

/// Parses the leading numeric part of `raw`, falling back to zero.
pub fn parse_amount(raw: &str) -> Decimal {
    let Some(caps) = NUMERIC_PREFIX.captures(raw) else {
        return Decimal::ZERO;
    };
    let mantissa = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    let mantissa = mantissa.trim_end_matches('.');

    match caps.get(2) {
        Some(exp) => Decimal::from_scientific(&format!("{}e{}", mantissa, exp.as_str()))
            .unwrap_or(Decimal::ZERO),
        None => Decimal::from_str(mantissa).unwrap_or(Decimal::ZERO),
    }
}

/// Leading number of `raw` as a float, or `None` when it does not start with one.
///
/// Same prefix rules as [`parse_amount`], without the range limits of `Decimal`.
pub fn parse_leading_f64(raw: &str) -> Option<f64> {
    let caps = NUMERIC_PREFIX.captures(raw)?;
    let mantissa = caps.get(1)?.as_str().trim_end_matches('.');
    let text = match caps.get(2) {
        Some(exp) => format!("{}e{}", mantissa, exp.as_str()),
        None => mantissa.to_string(),
    };
    text.parse().ok()
}

/// Serde adapter for amounts arriving as numbers, strings or null
pub fn deserialize_lenient<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => parse_amount(&n.to_string()),
        Some(Value::String(s)) => parse_amount(&s),
        _ => Decimal::ZERO,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case("100", dec!(100))]
    #[case("  250.75", dec!(250.75))]
    #[case("12.5 GHS", dec!(12.5))]
    #[case("1e3", dec!(1000))]
    #[case(".5", dec!(0.5))]
    #[case("7.", dec!(7))]
    #[case("-40", dec!(-40))]
    #[case("", dec!(0))]
    #[case("abc", dec!(0))]
    #[case("GHS 10", dec!(0))]
    fn parses_like_a_form_field(#[case] raw: &str, #[case] expected: Decimal) {
        assert_eq!(parse_amount(raw), expected);
    }

    #[rstest]
    #[case("12.5 km", Some(12.5))]
    #[case(" -3e2", Some(-300.0))]
    #[case("1e400", Some(f64::INFINITY))]
    #[case("abc", None)]
    #[case("", None)]
    fn leading_float_prefix(#[case] raw: &str, #[case] expected: Option<f64>) {
        assert_eq!(parse_leading_f64(raw), expected);
    }

    #[derive(Deserialize)]
    struct Holder {
        #[serde(default, deserialize_with = "deserialize_lenient")]
        amount: Decimal,
    }

    #[test]
    fn deserializes_numbers_strings_and_nulls() {
        let cases = [
            (r#"{"amount": 217391.30}"#, dec!(217391.3)),
            (r#"{"amount": "32608.70"}"#, dec!(32608.70)),
            (r#"{"amount": null}"#, dec!(0)),
            (r#"{"amount": true}"#, dec!(0)),
            (r#"{}"#, dec!(0)),
        ];
        for (json, expected) in cases {
            let holder: Holder = serde_json::from_str(json).unwrap();
            assert_eq!(holder.amount, expected, "input {json}");
        }
    }
}

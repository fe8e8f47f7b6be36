//! Small parsers for inline CSS: declarations, percentages, `rotate()` and
//! CSS time values.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

lazy_static! {
    static ref ROTATE_RE: Regex = Regex::new(r"(?i)rotate\(\s*(-?[0-9]*\.?[0-9]+)\s*(deg)?\s*\)").unwrap();
    static ref LEADING_NUMBER_RE: Regex = Regex::new(r"^\s*([+-]?[0-9]*\.?[0-9]+)").unwrap();
    static ref URL_RE: Regex = Regex::new(r#"(?i)url\(\s*['"]?([^'")]*)['"]?\s*\)"#).unwrap();
}

/// Splits `a: b; c: d` into a lowercase-keyed map. Later declarations win.
pub fn parse_inline_style(style: &str) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for decl in style.split(';') {
        let Some((prop, value)) = decl.split_once(':') else {
            continue;
        };
        let prop = prop.trim().to_ascii_lowercase();
        let value = value.trim();
        if !prop.is_empty() && !value.is_empty() {
            out.insert(prop, value.to_string());
        }
    }
    out
}

/// Leading numeric part of a CSS value, like PHP's `floatval`.
pub fn leading_number(value: &str) -> Option<f64> {
    LEADING_NUMBER_RE
        .captures(value)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// `"25%"` → `0.25`. Values without a unit are read as percentages too.
pub fn percent_fraction(value: &str) -> Option<f64> {
    leading_number(value).map(|n| n / 100.0)
}

/// Angle in degrees from a `transform` value containing `rotate(Ndeg)`.
pub fn rotation_degrees(transform: &str) -> Option<f64> {
    ROTATE_RE
        .captures(transform)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// CSS time to whole milliseconds: `"1s"` → 1000, `"500ms"` → 500.
///
/// A bare number with no unit is taken as milliseconds. Real CSS rejects
/// unitless times; exporters in the wild emit them anyway.
pub fn parse_css_time(value: &str) -> u32 {
    let v = value.trim().to_ascii_lowercase();
    if v.is_empty() {
        return 0;
    }
    let Some(n) = leading_number(&v) else {
        return 0;
    };
    let ms = if v.ends_with("ms") {
        n
    } else if v.ends_with('s') {
        n * 1000.0
    } else {
        n
    };
    if ms <= 0.0 {
        0
    } else {
        ms.trunc() as u32
    }
}

/// Rewrites each `url(...)` whose target `map` resolves, leaving others as
/// written. Rewritten targets are single-quoted.
pub fn replace_style_urls<F>(style: &str, mut map: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    URL_RE
        .replace_all(style, |caps: &regex::Captures| {
            let target = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");
            match map(target) {
                Some(new_url) => format!("url('{new_url}')"),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Numeric font weight from a CSS value.
pub fn font_weight(value: &str) -> Option<u32> {
    match value.trim().to_ascii_lowercase().as_str() {
        "normal" => Some(400),
        "bold" => Some(700),
        "lighter" => Some(300),
        "bolder" => Some(800),
        other => other.parse::<u32>().ok(),
    }
}

/// First family in a `font-family` list, unquoted.
pub fn primary_font_family(value: &str) -> Option<String> {
    value
        .split(',')
        .next()
        .map(|f| f.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
        .filter(|f| !f.is_empty())
}

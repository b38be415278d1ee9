//! セル値の数値・単位分解
//!
//! "45 MPa" → (45.0, "MPa")、"190-220 °C" → (190.0, "°C") のように
//! 先頭の数値と末尾の単位トークンを取り出す。

use crate::tabular::Cell;
use crate::units;
use lazy_static::lazy_static;
use regex::Regex;

/// 単位として記録するトークンの上限
const MAX_UNIT_CHARS: usize = 12;

/// 分解済みの値
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedValue {
    pub value: f64,
    /// セル内に単位が無ければ空文字
    pub unit: String,
}

lazy_static! {
    static ref VALUE_RE: Regex = Regex::new(
        r"^(?P<num>[-+]?(?:\d+(?:[.,]\d+)?|[.,]\d+)(?:[eE][-+]?\d+)?)\s*(?:(?:±|\+/-|\+-|-|–|~|to)\s*[-+]?(?:\d+(?:[.,]\d+)?|[.,]\d+))?\s*(?P<unit>.*?)$"
    ).unwrap();
    static ref THOUSANDS_RE: Regex =
        Regex::new(r"^(?P<grouped>[-+]?\d{1,3}(?:,\d{3})+)(?:[^\d,]|$)").unwrap();
    static ref BRACKETED_RE: Regex = Regex::new(r"[\(\[]\s*([^\(\)\[\]]+?)\s*[\)\]]").unwrap();
}

/// 数値文字列をf64に（小数点のないカンマは小数点として扱う）
fn parse_number(raw: &str) -> Option<f64> {
    let normalized = if raw.contains(',') && !raw.contains('.') {
        raw.replace(',', ".")
    } else {
        raw.replace(',', "")
    };
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// 先頭の数値が3桁区切り（"1,240"、"12,500.5"）ならカンマを除く
fn strip_thousands(text: &str) -> String {
    match THOUSANDS_RE.captures(text).and_then(|caps| caps.name("grouped")) {
        Some(grouped) => format!("{}{}", grouped.as_str().replace(',', ""), &text[grouped.end()..]),
        None => text.to_string(),
    }
}

/// テキストから数値と単位を取り出す
pub fn parse_text_value(text: &str) -> Option<ParsedValue> {
    let cleaned = strip_thousands(&text.trim().replace('−', "-"));
    if cleaned.is_empty() {
        return None;
    }
    let caps = VALUE_RE.captures(&cleaned)?;
    let value = parse_number(&caps["num"])?;
    let unit = caps
        .name("unit")
        .map(|m| strip_brackets(m.as_str()))
        .unwrap_or_default();
    Some(ParsedValue { value, unit })
}

/// セルから数値と単位を取り出す（数値にできないセルは `None`）
pub fn parse_value(cell: &Cell) -> Option<ParsedValue> {
    match cell {
        Cell::Number(n) if n.is_finite() => Some(ParsedValue {
            value: *n,
            unit: String::new(),
        }),
        Cell::Text(text) => parse_text_value(text),
        _ => None,
    }
}

/// 数値として読めるセルか
pub fn is_numeric_cell(cell: &Cell) -> bool {
    parse_value(cell).is_some()
}

fn strip_brackets(unit: &str) -> String {
    unit.trim()
        .trim_start_matches(['(', '['])
        .trim_end_matches([')', ']'])
        .trim()
        .to_string()
}

/// 単位だけのセルらしいか
pub fn looks_like_unit(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.chars().count() > MAX_UNIT_CHARS {
        return false;
    }
    if units::is_known_unit(trimmed) {
        return true;
    }
    trimmed.contains('/')
        && !trimmed.contains(char::is_whitespace)
        && trimmed.chars().any(|c| c.is_alphabetic())
}

/// ヘッダー/ラベルの括弧内単位: "Tensile Strength (MPa)" → "MPa"
pub fn header_unit(label: &str) -> Option<String> {
    BRACKETED_RE
        .captures_iter(label)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().trim().to_string()))
        .filter(|candidate| looks_like_unit(candidate))
        .last()
}

/// 検出単位として記録してよいトークンか
pub fn is_reportable_unit(unit: &str) -> bool {
    let trimmed = unit.trim();
    if trimmed == "%" {
        return true;
    }
    !trimmed.is_empty()
        && trimmed.chars().count() <= MAX_UNIT_CHARS
        && !trimmed.chars().all(|c| c.is_ascii_digit() || c.is_ascii_punctuation())
}

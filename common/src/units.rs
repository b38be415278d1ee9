//! 単位変換（SI正規化）
//!
//! `(数値, 単位トークン)` をSI表現に変換する純粋関数群。
//! トークンは大文字小文字・空白・上付き数字の揺れを吸収して照合する。
//!
//! 変換式は `si = (value + pre) × scale + post` の形で持ち、逆変換も厳密に行う。

use crate::error::ConversionFailure;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 物理量の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantityKind {
    Temperature,
    Pressure,
    Length,
    Density,
    DimensionlessPercentage,
}

impl QuantityKind {
    /// SI側の単位表記
    pub fn si_unit(self) -> &'static str {
        match self {
            QuantityKind::Temperature => "K",
            QuantityKind::Pressure => "Pa",
            QuantityKind::Length => "m",
            QuantityKind::Density => "kg/m3",
            QuantityKind::DimensionlessPercentage => "%",
        }
    }
}

impl std::fmt::Display for QuantityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuantityKind::Temperature => write!(f, "temperature"),
            QuantityKind::Pressure => write!(f, "pressure"),
            QuantityKind::Length => write!(f, "length"),
            QuantityKind::Density => write!(f, "density"),
            QuantityKind::DimensionlessPercentage => write!(f, "dimensionless_percentage"),
        }
    }
}

/// 単位定義
#[derive(Debug, Clone, Copy)]
struct UnitDef {
    kind: QuantityKind,
    pre: f64,
    scale: f64,
    post: f64,
}

const fn linear(kind: QuantityKind, scale: f64) -> UnitDef {
    UnitDef { kind, pre: 0.0, scale, post: 0.0 }
}

const PSI_IN_PA: f64 = 6_894.757_293_168_361;
const LB_FT3_IN_KG_M3: f64 = 16.018_463_373_960_138;
const CELSIUS_OFFSET: f64 = 273.15;

/// 受理するトークン（正規化済み表記）と定義
static UNIT_TABLE: &[(&[&str], UnitDef)] = &[
    // 圧力・応力 → Pa
    (&["pa", "n/m2"], linear(QuantityKind::Pressure, 1.0)),
    (&["kpa"], linear(QuantityKind::Pressure, 1e3)),
    (&["mpa", "n/mm2"], linear(QuantityKind::Pressure, 1e6)),
    (&["gpa", "kn/mm2"], linear(QuantityKind::Pressure, 1e9)),
    (&["bar"], linear(QuantityKind::Pressure, 1e5)),
    (&["psi"], linear(QuantityKind::Pressure, PSI_IN_PA)),
    (&["ksi"], linear(QuantityKind::Pressure, PSI_IN_PA * 1e3)),
    // 温度 → K
    (&["k", "kelvin"], linear(QuantityKind::Temperature, 1.0)),
    (
        &["°c", "c", "degc", "deg.c", "celsius"],
        UnitDef { kind: QuantityKind::Temperature, pre: 0.0, scale: 1.0, post: CELSIUS_OFFSET },
    ),
    (
        &["°f", "f", "degf", "deg.f", "fahrenheit"],
        UnitDef { kind: QuantityKind::Temperature, pre: -32.0, scale: 5.0 / 9.0, post: CELSIUS_OFFSET },
    ),
    // 長さ → m
    (&["m"], linear(QuantityKind::Length, 1.0)),
    (&["cm"], linear(QuantityKind::Length, 1e-2)),
    (&["mm"], linear(QuantityKind::Length, 1e-3)),
    (&["um", "micron", "microns"], linear(QuantityKind::Length, 1e-6)),
    (&["in", "inch", "inches", "\""], linear(QuantityKind::Length, 0.0254)),
    (&["ft", "feet", "foot"], linear(QuantityKind::Length, 0.3048)),
    // 密度 → kg/m3
    (&["kg/m3", "g/l"], linear(QuantityKind::Density, 1.0)),
    (&["g/cm3", "g/cc", "g/ml", "kg/l", "kg/dm3"], linear(QuantityKind::Density, 1e3)),
    (&["lb/ft3"], linear(QuantityKind::Density, LB_FT3_IN_KG_M3)),
    // 百分率
    (&["%", "percent", "pct"], linear(QuantityKind::DimensionlessPercentage, 1.0)),
];

lazy_static! {
    static ref UNITS: HashMap<String, UnitDef> = {
        let mut map = HashMap::new();
        for (tokens, def) in UNIT_TABLE {
            for token in tokens.iter() {
                map.insert(token.to_string(), *def);
            }
        }
        map
    };
}

/// 単位トークンを照合用に正規化
///
/// 小文字化・空白除去・上付き数字/`^`/µ/℃ の表記揺れを統一する。
pub fn normalize_token(token: &str) -> String {
    let mut out = String::with_capacity(token.len());
    for ch in token.trim().chars() {
        match ch {
            c if c.is_whitespace() => {}
            '²' => out.push('2'),
            '³' => out.push('3'),
            '^' => {}
            'µ' | 'μ' => out.push('u'),
            'º' | '˚' => out.push('°'),
            '℃' => out.push_str("°c"),
            '℉' => out.push_str("°f"),
            c => out.extend(c.to_lowercase()),
        }
    }
    out.trim_end_matches('.').to_string()
}

fn lookup(unit_token: &str) -> Option<&'static UnitDef> {
    UNITS.get(&normalize_token(unit_token))
}

/// トークンが属する物理量（表にない場合は `None`）
pub fn kind_of(unit_token: &str) -> Option<QuantityKind> {
    lookup(unit_token).map(|def| def.kind)
}

/// 単位表に載っているトークンか
pub fn is_known_unit(unit_token: &str) -> bool {
    lookup(unit_token).is_some()
}

/// SIへ変換する
pub fn convert(
    value: f64,
    unit_token: &str,
    kind: QuantityKind,
) -> Result<(f64, &'static str), ConversionFailure> {
    let def = lookup(unit_token).ok_or(ConversionFailure::UnrecognizedUnit)?;
    if def.kind != kind {
        return Err(ConversionFailure::UnitKindMismatch);
    }
    Ok(((value + def.pre) * def.scale + def.post, kind.si_unit()))
}

/// SI値を元の単位へ戻す（`convert` の逆変換）
pub fn from_si(si_value: f64, unit_token: &str, kind: QuantityKind) -> Result<f64, ConversionFailure> {
    let def = lookup(unit_token).ok_or(ConversionFailure::UnrecognizedUnit)?;
    if def.kind != kind {
        return Err(ConversionFailure::UnitKindMismatch);
    }
    Ok((si_value - def.post) / def.scale - def.pre)
}

/// 受理する全トークン（テスト・語彙確認用）
pub fn supported_tokens() -> Vec<(&'static str, QuantityKind)> {
    UNIT_TABLE
        .iter()
        .flat_map(|(tokens, def)| tokens.iter().map(move |t| (*t, def.kind)))
        .collect()
}

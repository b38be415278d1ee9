//! 物性名の語彙テーブル
//!
//! 正規キー（`tensile_strength` など）→ 表記揺れのリスト。
//! 抽出ロジックに手を入れずに拡張できるよう、JSONファイルからも読み込める。

use crate::error::{Error, Result};
use crate::units::QuantityKind;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// ラベルとして扱うセル文字列の上限
const MAX_LABEL_CHARS: usize = 60;

/// 物性エントリ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyEntry {
    /// 正規キー
    pub key: String,
    /// 測定される物理量（固定できない場合は `None`）
    #[serde(default)]
    pub kind: Option<QuantityKind>,
    /// 受理する表記（小文字・空白正規化済みで照合）
    pub synonyms: Vec<String>,
}

/// 語彙テーブル
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vocabulary {
    /// バージョン（解析結果・レポートに記録）
    pub version: u32,
    pub properties: Vec<PropertyEntry>,
    /// ヘッダー判定用の汎用キーワード
    #[serde(default)]
    pub keywords: Vec<String>,
    /// 素材名ラベル（"Material", "Filament" など）
    #[serde(default)]
    pub material_labels: Vec<String>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::builtin()
    }
}

fn entry(key: &str, kind: Option<QuantityKind>, synonyms: &[&str]) -> PropertyEntry {
    PropertyEntry {
        key: key.to_string(),
        kind,
        synonyms: synonyms.iter().map(|s| s.to_string()).collect(),
    }
}

impl Vocabulary {
    pub const BUILTIN_VERSION: u32 = 1;

    /// 組み込み語彙
    pub fn builtin() -> Self {
        use QuantityKind::*;

        let properties = vec![
            entry("tensile_strength", Some(Pressure), &[
                "tensile strength", "ultimate tensile strength", "ultimate tensile",
                "uts", "tensile stress at break", "tensile strength at break",
                "max tensile strength", "strength at break",
            ]),
            entry("yield_strength", Some(Pressure), &[
                "yield strength", "tensile strength at yield", "tensile yield strength",
                "yield stress", "tensile stress at yield",
            ]),
            entry("elastic_modulus", Some(Pressure), &[
                "elastic modulus", "young's modulus", "youngs modulus", "young modulus",
                "tensile modulus", "modulus of elasticity", "e-modulus",
            ]),
            entry("flexural_strength", Some(Pressure), &[
                "flexural strength", "bending strength", "flexural stress",
            ]),
            entry("flexural_modulus", Some(Pressure), &[
                "flexural modulus", "bending modulus",
            ]),
            entry("compressive_strength", Some(Pressure), &[
                "compressive strength", "compression strength",
            ]),
            entry("elongation_at_break", Some(DimensionlessPercentage), &[
                "elongation at break", "elongation", "strain at break",
                "elongation at failure", "breaking elongation",
            ]),
            entry("elongation_at_yield", Some(DimensionlessPercentage), &[
                "elongation at yield", "strain at yield",
            ]),
            entry("impact_strength", None, &[
                "impact strength", "charpy impact", "izod impact", "charpy", "izod",
                "notched impact strength",
            ]),
            entry("density", Some(Density), &["density", "specific density"]),
            entry("glass_transition_temperature", Some(Temperature), &[
                "glass transition temperature", "glass transition", "tg",
            ]),
            entry("heat_deflection_temperature", Some(Temperature), &[
                "heat deflection temperature", "heat distortion temperature", "hdt",
            ]),
            entry("vicat_softening_temperature", Some(Temperature), &[
                "vicat softening temperature", "vicat softening point", "vicat",
            ]),
            entry("melting_temperature", Some(Temperature), &[
                "melting temperature", "melting point", "melt temperature", "tm",
            ]),
            entry("print_temperature", Some(Temperature), &[
                "print temperature", "printing temperature", "nozzle temperature",
                "extruder temperature", "hotend temperature",
            ]),
            entry("bed_temperature", Some(Temperature), &[
                "bed temperature", "build plate temperature", "heated bed temperature",
            ]),
            entry("layer_height", Some(Length), &["layer height", "layer thickness"]),
            entry("filament_diameter", Some(Length), &["filament diameter", "diameter"]),
            entry("hardness", None, &["hardness", "shore hardness", "shore d", "shore a"]),
            entry("shrinkage", Some(DimensionlessPercentage), &["shrinkage", "mold shrinkage"]),
            entry("layer_adhesion", Some(Pressure), &[
                "layer adhesion", "interlayer adhesion", "layer adhesion strength",
                "z strength",
            ]),
        ];

        let keywords = [
            "strength", "modulus", "density", "elongation", "temperature", "hardness",
            "impact", "tensile", "flexural", "young", "elastic", "yield", "shrinkage",
            "stress", "strain", "adhesion", "deflection", "vicat", "tg", "hdt", "uts",
        ];

        let material_labels = [
            "material", "materials", "filament", "name", "product", "sample", "specimen",
            "brand",
        ];

        Self {
            version: Self::BUILTIN_VERSION,
            properties,
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            material_labels: material_labels.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// JSONファイルから読み込み
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// JSON文字列から読み込み
    pub fn from_json(json: &str) -> Result<Self> {
        let vocabulary: Self = serde_json::from_str(json)?;
        vocabulary.validate()?;
        Ok(vocabulary)
    }

    fn validate(&self) -> Result<()> {
        if self.properties.is_empty() {
            return Err(Error::Vocabulary("no property entries".into()));
        }
        for prop in &self.properties {
            if prop.key.trim().is_empty() {
                return Err(Error::Vocabulary("empty canonical key".into()));
            }
            if prop.synonyms.iter().all(|s| s.trim().is_empty()) {
                return Err(Error::Vocabulary(format!("{}: empty synonym list", prop.key)));
            }
        }
        Ok(())
    }

    /// ラベル文字列を正規キーに変換（語彙にない場合は `None`）
    ///
    /// 単語単位で照合し、最長一致の表記を採用する。同じ長さなら語彙の並び順。
    pub fn canonical_key(&self, label: &str) -> Option<&str> {
        let normalized = normalize_label(label);
        if normalized.is_empty() {
            return None;
        }
        let padded = format!(" {} ", normalized);

        let mut best: Option<(&str, usize)> = None;
        for prop in &self.properties {
            for synonym in &prop.synonyms {
                let syn = normalize_label(synonym);
                if syn.is_empty() || !padded.contains(&format!(" {} ", syn)) {
                    continue;
                }
                if best.map_or(true, |(_, len)| syn.len() > len) {
                    best = Some((prop.key.as_str(), syn.len()));
                }
            }
        }
        best.map(|(key, _)| key)
    }

    /// 物性ラベルらしいセルか
    pub fn is_property_label(&self, text: &str) -> bool {
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed.chars().count() > MAX_LABEL_CHARS {
            return false;
        }
        if trimmed.parse::<f64>().is_ok() {
            return false;
        }
        if self.canonical_key(trimmed).is_some() {
            return true;
        }
        let normalized = normalize_label(trimmed);
        let padded = format!(" {} ", normalized);
        self.keywords.iter().any(|kw| {
            let kw = kw.to_lowercase();
            if kw.chars().count() <= 3 {
                padded.contains(&format!(" {} ", kw))
            } else {
                normalized.contains(&kw)
            }
        })
    }

    /// 素材名ラベルか（"Material:" など）
    pub fn is_material_label(&self, text: &str) -> bool {
        let normalized = normalize_label(text);
        !normalized.is_empty() && self.material_labels.iter().any(|l| normalized == l.to_lowercase())
    }

    /// 正規キーの物理量
    pub fn quantity_kind(&self, key: &str) -> Option<QuantityKind> {
        self.properties
            .iter()
            .find(|p| p.key == key)
            .and_then(|p| p.kind)
    }

    /// 語彙に存在する正規キーか
    pub fn contains_key(&self, key: &str) -> bool {
        self.properties.iter().any(|p| p.key == key)
    }

    /// ラベルのキー: 語彙一致があれば正規キー、なければスラグ
    pub fn key_for_label(&self, label: &str) -> String {
        match self.canonical_key(label) {
            Some(key) => key.to_string(),
            None => slug(label),
        }
    }
}

/// ラベル正規化: 小文字化、括弧内の単位除去、空白の圧縮、末尾の `:` 除去
pub fn normalize_label(label: &str) -> String {
    lazy_static! {
        static ref BRACKETED: Regex = Regex::new(r"[\(\[\{][^\)\]\}]*[\)\]\}]").unwrap();
        static ref SPACES: Regex = Regex::new(r"\s+").unwrap();
    }

    let lower = label.to_lowercase().replace('’', "'");
    let stripped = BRACKETED.replace_all(&lower, " ");
    let collapsed = SPACES.replace_all(stripped.trim(), " ");
    collapsed
        .trim_end_matches(|c: char| c == ':' || c == '=' || c.is_whitespace())
        .trim()
        .to_string()
}

/// 語彙外ラベル用のキー（`[^a-z0-9]` → `_`）
pub fn slug(label: &str) -> String {
    let normalized = normalize_label(label);
    let mut out = String::with_capacity(normalized.len());
    let mut last_underscore = false;
    for ch in normalized.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
            last_underscore = false;
        } else if !last_underscore && !out.is_empty() {
            out.push('_');
            last_underscore = true;
        }
    }
    let trimmed = out.trim_end_matches('_');
    if trimmed.is_empty() {
        "unnamed_property".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_key_synonyms() {
        let vocab = Vocabulary::builtin();
        assert_eq!(vocab.canonical_key("Tensile Strength"), Some("tensile_strength"));
        assert_eq!(vocab.canonical_key("UTS"), Some("tensile_strength"));
        assert_eq!(vocab.canonical_key("Ultimate Tensile"), Some("tensile_strength"));
        assert_eq!(vocab.canonical_key("Tensile Strength (MPa)"), Some("tensile_strength"));
        assert_eq!(vocab.canonical_key("  density [g/cm3]: "), Some("density"));
        assert_eq!(vocab.canonical_key("Young’s Modulus"), Some("elastic_modulus"));
    }

    #[test]
    fn test_longest_synonym_wins() {
        let vocab = Vocabulary::builtin();
        assert_eq!(vocab.canonical_key("Tensile strength at yield"), Some("yield_strength"));
        assert_eq!(vocab.canonical_key("Elongation at yield"), Some("elongation_at_yield"));
        assert_eq!(vocab.canonical_key("Elongation at break"), Some("elongation_at_break"));
    }

    #[test]
    fn test_short_synonyms_need_whole_words() {
        let vocab = Vocabulary::builtin();
        assert_eq!(vocab.canonical_key("Tg"), Some("glass_transition_temperature"));
        assert_eq!(vocab.canonical_key("Settings"), None);
    }

    #[test]
    fn test_is_property_label() {
        let vocab = Vocabulary::builtin();
        assert!(vocab.is_property_label("Tensile Strength"));
        assert!(vocab.is_property_label("Tensile strength XY direction"));
        assert!(vocab.is_property_label("Peel strength"));
        assert!(!vocab.is_property_label("PLA"));
        assert!(!vocab.is_property_label("45"));
        assert!(!vocab.is_property_label(""));
        assert!(!vocab.is_property_label(
            "This sentence mentions strength but is far too long to be a header label"
        ));
    }

    #[test]
    fn test_material_label() {
        let vocab = Vocabulary::builtin();
        assert!(vocab.is_material_label("Material:"));
        assert!(vocab.is_material_label("Filament"));
        assert!(!vocab.is_material_label("Material cost"));
    }

    #[test]
    fn test_slug() {
        assert_eq!(slug("Print Speed (mm/s)"), "print_speed");
        assert_eq!(slug("  Heat--Resistance "), "heat_resistance");
        assert_eq!(slug("()"), "unnamed_property");
    }

    #[test]
    fn test_key_for_label() {
        let vocab = Vocabulary::builtin();
        assert_eq!(vocab.key_for_label("Density"), "density");
        assert_eq!(vocab.key_for_label("Printing speed"), "printing_speed");
    }

    #[test]
    fn test_quantity_kind() {
        let vocab = Vocabulary::builtin();
        assert_eq!(vocab.quantity_kind("tensile_strength"), Some(QuantityKind::Pressure));
        assert_eq!(vocab.quantity_kind("impact_strength"), None);
        assert_eq!(vocab.quantity_kind("not_a_key"), None);
    }

    #[test]
    fn test_from_json_roundtrip_and_validation() {
        let vocab = Vocabulary::builtin();
        let json = serde_json::to_string(&vocab).unwrap();
        let loaded = Vocabulary::from_json(&json).unwrap();
        assert_eq!(loaded, vocab);

        let bad = r#"{"version": 2, "properties": []}"#;
        assert!(matches!(Vocabulary::from_json(bad), Err(Error::Vocabulary(_))));
    }

    #[test]
    fn test_custom_vocabulary() {
        let json = r#"{
            "version": 7,
            "properties": [
                {"key": "peel_strength", "kind": "pressure", "synonyms": ["peel strength"]}
            ]
        }"#;
        let vocab = Vocabulary::from_json(json).unwrap();
        assert_eq!(vocab.version, 7);
        assert_eq!(vocab.canonical_key("Peel Strength"), Some("peel_strength"));
        assert!(vocab.keywords.is_empty());
    }
}

//! データモデル
//!
//! - StructureAnalysis: Phase 1（構造解析）の出力。ファイルごとに1つ、以後不変
//! - DiscoveryReport: バッチ全体の集約結果
//! - MaterialRecord: Phase 2（抽出・正規化）の出力。(ファイル, 素材) ごとに1つ

use crate::error::ConversionFailure;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// レイアウト分類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutClassification {
    /// 物性名が1列、値が隣の1列
    SingleMaterialVertical,
    /// 複数素材が物性を共有する表
    MultiMaterialTable,
    /// 複数シート・複数ブロック
    TestResultsMatrix,
    Unknown,
}

impl LayoutClassification {
    pub const ALL: [LayoutClassification; 4] = [
        LayoutClassification::SingleMaterialVertical,
        LayoutClassification::MultiMaterialTable,
        LayoutClassification::TestResultsMatrix,
        LayoutClassification::Unknown,
    ];
}

impl std::fmt::Display for LayoutClassification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayoutClassification::SingleMaterialVertical => write!(f, "single_material_vertical"),
            LayoutClassification::MultiMaterialTable => write!(f, "multi_material_table"),
            LayoutClassification::TestResultsMatrix => write!(f, "test_results_matrix"),
            LayoutClassification::Unknown => write!(f, "unknown"),
        }
    }
}

/// 列の意味的役割
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    MaterialName,
    PropertyName,
    PropertyValue,
    Unit,
    Unknown,
}

/// 物性ラベルの並び方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// ラベルが1列に縦に並ぶ（値は右側の列）
    PropertiesInRows,
    /// ラベルがヘッダー行に横に並ぶ（素材は行方向）
    PropertiesInColumns,
}

/// 抽出戦略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    PropertyValueParser,
    TableRowParser,
    MatrixParser,
    GenericParser,
}

impl Strategy {
    /// レイアウト → 戦略の固定表
    pub fn for_layout(layout: LayoutClassification) -> Self {
        match layout {
            LayoutClassification::SingleMaterialVertical => Strategy::PropertyValueParser,
            LayoutClassification::MultiMaterialTable => Strategy::TableRowParser,
            LayoutClassification::TestResultsMatrix => Strategy::MatrixParser,
            LayoutClassification::Unknown => Strategy::GenericParser,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Strategy::PropertyValueParser => "property_value_parser",
            Strategy::TableRowParser => "table_row_parser",
            Strategy::MatrixParser => "matrix_parser",
            Strategy::GenericParser => "generic_parser",
        }
    }

    /// 永続化された戦略名から復元（未知の名前は `None`）
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim() {
            "property_value_parser" => Some(Strategy::PropertyValueParser),
            "table_row_parser" => Some(Strategy::TableRowParser),
            "matrix_parser" => Some(Strategy::MatrixParser),
            "generic_parser" => Some(Strategy::GenericParser),
            _ => None,
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// シート内の連続した非空白行ブロック
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockStructure {
    pub sheet_index: usize,
    /// 先頭行（含む）
    pub first_row: usize,
    /// 最終行（含む）
    pub last_row: usize,
    pub layout: LayoutClassification,
    #[serde(default)]
    pub orientation: Option<Orientation>,
    #[serde(default)]
    pub header_row_index: Option<usize>,
    #[serde(default)]
    pub data_start_row_index: Option<usize>,
    /// 物性ラベル列（PropertiesInRows）
    #[serde(default)]
    pub label_column: Option<usize>,
    /// 値の列（縦型は1列、素材が列方向の表は素材ごと）
    #[serde(default)]
    pub value_columns: Vec<usize>,
    #[serde(default)]
    pub unit_column: Option<usize>,
    /// ヘッダー直下の単位行（PropertiesInColumns）
    #[serde(default)]
    pub unit_row: Option<usize>,
    /// 素材名の列（PropertiesInColumns）
    #[serde(default)]
    pub material_column: Option<usize>,
    #[serde(default)]
    pub column_roles: BTreeMap<usize, ColumnRole>,
    /// ブロック直上のタイトルセル
    #[serde(default)]
    pub title: Option<String>,
}

impl BlockStructure {
    /// 解析可能なブロックか
    pub fn is_analyzable(&self) -> bool {
        self.layout != LayoutClassification::Unknown
    }

    pub fn contains_row(&self, row: usize) -> bool {
        row >= self.first_row && row <= self.last_row
    }
}

/// シートごとの構造
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetStructure {
    pub index: usize,
    pub name: String,
    #[serde(default)]
    pub header_row_index: Option<usize>,
    #[serde(default)]
    pub data_start_row_index: Option<usize>,
    #[serde(default)]
    pub blocks: Vec<BlockStructure>,
}

/// 構造解析結果（ファイルごと）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureAnalysis {
    /// ファイル内容のハッシュ
    pub file_identifier: String,
    pub sheet_identifiers: Vec<String>,
    pub layout_classification: LayoutClassification,
    #[serde(default)]
    pub sheets: Vec<SheetStructure>,
    /// 主ブロックの列位置 → 役割
    #[serde(default)]
    pub column_role_map: BTreeMap<usize, ColumnRole>,
    #[serde(default)]
    pub detected_units: BTreeSet<String>,
    /// property_name 役割に対応したヘッダー文字列
    #[serde(default)]
    pub property_labels: Vec<String>,
    pub confidence_score: u8,
    #[serde(default)]
    pub vocabulary_version: u32,
}

impl StructureAnalysis {
    /// 解析不能時の結果
    pub fn unknown(file_identifier: impl Into<String>, sheet_identifiers: Vec<String>) -> Self {
        Self {
            file_identifier: file_identifier.into(),
            sheet_identifiers,
            layout_classification: LayoutClassification::Unknown,
            sheets: Vec::new(),
            column_role_map: BTreeMap::new(),
            detected_units: BTreeSet::new(),
            property_labels: Vec::new(),
            confidence_score: 0,
            vocabulary_version: 0,
        }
    }

    /// 解析可能ブロック（シート順・行順）
    pub fn analyzable_blocks(&self) -> impl Iterator<Item = &BlockStructure> {
        self.sheets
            .iter()
            .flat_map(|s| s.blocks.iter())
            .filter(|b| b.is_analyzable())
    }

    /// 主ブロック（最初の解析可能ブロック）
    pub fn primary_block(&self) -> Option<&BlockStructure> {
        self.analyzable_blocks().next()
    }

    /// 役割が解決された列数
    pub fn resolved_role_count(&self) -> usize {
        self.column_role_map
            .values()
            .filter(|r| **r != ColumnRole::Unknown)
            .count()
    }
}

/// バッチ全体の集約レポート
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryReport {
    pub pattern_frequencies: BTreeMap<LayoutClassification, usize>,
    /// 正規キー → 観測されたヘッダー表記
    pub column_synonyms: BTreeMap<String, BTreeSet<String>>,
    pub strategy_recommendations: BTreeMap<LayoutClassification, Strategy>,
    /// 語彙にない物性ヘッダー（語彙拡張の候補）
    #[serde(default)]
    pub unmatched_headers: BTreeSet<String>,
    #[serde(default)]
    pub total_files: usize,
    #[serde(default)]
    pub vocabulary_version: u32,
    pub generation_timestamp: DateTime<Utc>,
}

impl DiscoveryReport {
    /// レイアウトに対する推奨戦略（未登録なら固定表）
    pub fn strategy_for(&self, layout: LayoutClassification) -> Strategy {
        self.strategy_recommendations
            .get(&layout)
            .copied()
            .unwrap_or_else(|| Strategy::for_layout(layout))
    }

    pub fn frequency(&self, layout: LayoutClassification) -> usize {
        self.pattern_frequencies.get(&layout).copied().unwrap_or(0)
    }
}

/// 品質評価
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QualityRating {
    /// 正規化できた物性が少ない（生データのみ）
    Raw,
    /// 一部のみ正規化
    Warn,
    /// ほぼ全て正規化
    Ok,
}

impl std::fmt::Display for QualityRating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QualityRating::Ok => write!(f, "OK"),
            QualityRating::Warn => write!(f, "WARN"),
            QualityRating::Raw => write!(f, "RAW"),
        }
    }
}

/// 変換前の物性値
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawProperty {
    pub value: f64,
    /// 元の単位（無ければ空）
    pub unit: String,
    /// 元のラベル文字列
    #[serde(default)]
    pub label: String,
    /// `Sheet1!B3` 形式のセル位置
    #[serde(default)]
    pub cell: String,
}

/// SI変換後の値
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedProperty {
    pub value: f64,
    pub unit: String,
}

/// 素材レコード
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialRecord {
    /// 判定できない場合は空
    pub material_name: String,
    pub raw_properties: BTreeMap<String, RawProperty>,
    pub normalized_properties: BTreeMap<String, NormalizedProperty>,
    /// 変換できなかったキーと理由
    #[serde(default)]
    pub conversion_failures: BTreeMap<String, ConversionFailure>,
    pub quality_rating: QualityRating,
    pub source_file_identifier: String,
    pub parsing_strategy_used: Strategy,
    pub extraction_confidence: u8,
}

impl MaterialRecord {
    pub fn new(
        material_name: impl Into<String>,
        source_file_identifier: impl Into<String>,
        strategy: Strategy,
        extraction_confidence: u8,
    ) -> Self {
        Self {
            material_name: material_name.into(),
            raw_properties: BTreeMap::new(),
            normalized_properties: BTreeMap::new(),
            conversion_failures: BTreeMap::new(),
            quality_rating: QualityRating::Raw,
            source_file_identifier: source_file_identifier.into(),
            parsing_strategy_used: strategy,
            extraction_confidence,
        }
    }

    /// 物性を追加する。同じキーが既にあれば `key_2`, `key_3` … に退避し、上書きしない
    pub fn insert_raw(&mut self, key: &str, property: RawProperty) -> String {
        let mut candidate = key.to_string();
        let mut n = 2;
        while self.raw_properties.contains_key(&candidate) {
            candidate = format!("{}_{}", key, n);
            n += 1;
        }
        self.raw_properties.insert(candidate.clone(), property);
        candidate
    }

    /// 同一素材の別レコードを取り込む
    pub fn absorb(&mut self, other: MaterialRecord) {
        for (key, property) in other.raw_properties {
            let base = base_key(&key);
            self.insert_raw(base, property);
        }
        self.extraction_confidence = self.extraction_confidence.max(other.extraction_confidence);
    }

    /// 素材名の比較キー（大文字小文字を無視）
    pub fn name_key(&self) -> String {
        self.material_name.trim().to_lowercase()
    }

    pub fn with_normalized(
        mut self,
        normalized: BTreeMap<String, NormalizedProperty>,
        failures: BTreeMap<String, ConversionFailure>,
    ) -> Self {
        self.normalized_properties = normalized;
        self.conversion_failures = failures;
        self
    }

    pub fn with_quality(mut self, rating: QualityRating) -> Self {
        self.quality_rating = rating;
        self
    }
}

/// 退避サフィックスを除いたキー: `tensile_strength_2` → `tensile_strength`
pub fn base_key(key: &str) -> &str {
    match key.rsplit_once('_') {
        Some((base, suffix))
            if !base.is_empty()
                && suffix.len() <= 3
                && suffix.chars().all(|c| c.is_ascii_digit())
                && suffix.parse::<u32>().map_or(false, |n| n >= 2) =>
        {
            base
        }
        _ => key,
    }
}

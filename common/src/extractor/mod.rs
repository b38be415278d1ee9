//! 戦略別の素材レコード抽出
//!
//! 構造解析結果と戦略を受け取り、セルを走査して変換前の物性値を持つ
//! MaterialRecord を返す。読めないセルはスキップして数え、抽出全体は止めない。

mod generic;
mod matrix;
mod table;
mod vertical;

use crate::error::ExtractionFailure;
use crate::tabular::{cell_ref, TabularFile};
use crate::types::{MaterialRecord, RawProperty, Strategy, StructureAnalysis};
use crate::values::{self, ParsedValue};
use crate::vocabulary::{normalize_label, Vocabulary};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 素材名が判定できない場合の汎用パーサーの素材名
pub const UNSPECIFIED_MATERIAL: &str = "unspecified";

/// 抽出パラメータ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorOptions {
    /// これ未満の信頼度では汎用パーサーを使う
    pub min_confidence: u8,
}

impl Default for ExtractorOptions {
    fn default() -> Self {
        Self { min_confidence: 10 }
    }
}

/// 抽出結果
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionOutcome {
    pub records: Vec<MaterialRecord>,
    pub strategy_used: Strategy,
    /// 読めなかった値セルの数
    pub skipped_cells: usize,
}

/// 戦略別抽出器
pub struct StrategyExtractor<'a> {
    vocabulary: &'a Vocabulary,
    options: ExtractorOptions,
}

impl<'a> StrategyExtractor<'a> {
    pub fn new(vocabulary: &'a Vocabulary, options: ExtractorOptions) -> Self {
        Self { vocabulary, options }
    }

    /// 実際に使う戦略を決める
    ///
    /// 戦略が無い、信頼度が閾値未満、解析可能なブロックが無い場合は汎用パーサー
    pub fn resolve_strategy(
        &self,
        requested: Option<Strategy>,
        analysis: &StructureAnalysis,
    ) -> Strategy {
        match requested {
            Some(strategy)
                if analysis.confidence_score >= self.options.min_confidence
                    && (strategy == Strategy::GenericParser
                        || analysis.primary_block().is_some()) =>
            {
                strategy
            }
            _ => Strategy::GenericParser,
        }
    }

    pub fn extract(
        &self,
        file: &dyn TabularFile,
        analysis: &StructureAnalysis,
        requested: Option<Strategy>,
    ) -> Result<ExtractionOutcome, ExtractionFailure> {
        check_access(file, analysis)?;

        let strategy = self.resolve_strategy(requested, analysis);
        let mut ctx = Context::new(file, analysis, self.vocabulary, strategy);

        let records = match strategy {
            Strategy::PropertyValueParser => vertical::extract(&mut ctx),
            Strategy::TableRowParser => table::extract(&mut ctx),
            Strategy::MatrixParser => matrix::extract(&mut ctx),
            Strategy::GenericParser => generic::extract(&mut ctx),
        };

        tracing::debug!(
            "{}: {} -> {} records, {} skipped",
            analysis.file_identifier,
            strategy,
            records.len(),
            ctx.skipped
        );

        Ok(ExtractionOutcome {
            records,
            strategy_used: strategy,
            skipped_cells: ctx.skipped,
        })
    }
}

/// 既定パラメータで抽出する
pub fn extract(
    file: &dyn TabularFile,
    analysis: &StructureAnalysis,
    strategy: Option<Strategy>,
    vocabulary: &Vocabulary,
) -> Result<ExtractionOutcome, ExtractionFailure> {
    StrategyExtractor::new(vocabulary, ExtractorOptions::default()).extract(file, analysis, strategy)
}

/// 解析結果が参照するシートがファイルに存在するか
fn check_access(file: &dyn TabularFile, analysis: &StructureAnalysis) -> Result<(), ExtractionFailure> {
    if file.sheet_count() == 0 {
        return Err(ExtractionFailure::UnreadableFile("file has no sheets".into()));
    }
    let names = file.sheet_names();
    for sheet in &analysis.sheets {
        if names.get(sheet.index) != Some(&sheet.name) {
            return Err(ExtractionFailure::UnreadableFile(format!(
                "sheet '{}' not found",
                sheet.name
            )));
        }
    }
    Ok(())
}

/// 抽出中の共有状態
pub(crate) struct Context<'a> {
    pub file: &'a dyn TabularFile,
    pub analysis: &'a StructureAnalysis,
    pub vocabulary: &'a Vocabulary,
    pub strategy: Strategy,
    pub skipped: usize,
    sheet_names: Vec<String>,
}

impl<'a> Context<'a> {
    fn new(
        file: &'a dyn TabularFile,
        analysis: &'a StructureAnalysis,
        vocabulary: &'a Vocabulary,
        strategy: Strategy,
    ) -> Self {
        Self {
            file,
            analysis,
            vocabulary,
            strategy,
            skipped: 0,
            sheet_names: file.sheet_names(),
        }
    }

    pub fn sheet_name(&self, sheet: usize) -> &str {
        self.sheet_names.get(sheet).map(String::as_str).unwrap_or("")
    }

    pub fn new_record(&self, name: impl Into<String>) -> MaterialRecord {
        MaterialRecord::new(
            name,
            self.analysis.file_identifier.clone(),
            self.strategy,
            self.analysis.confidence_score,
        )
    }

    /// 読めなかった値セルを記録
    pub fn skip(&mut self, sheet: usize, row: usize, col: usize) {
        self.skipped += 1;
        tracing::debug!(
            "skipped unparseable cell {}",
            cell_ref(self.sheet_name(sheet), row, col)
        );
    }

    /// 物性値を作る
    ///
    /// 単位はセル内 → 単位セル → ラベルの括弧内 の順に探す
    pub fn raw_property(
        &self,
        sheet: usize,
        row: usize,
        col: usize,
        label: &str,
        parsed: ParsedValue,
        unit_cell: Option<&str>,
    ) -> RawProperty {
        let unit = if !parsed.unit.is_empty() {
            parsed.unit
        } else if let Some(text) = unit_cell.filter(|t| values::looks_like_unit(t)) {
            text.to_string()
        } else {
            values::header_unit(label).unwrap_or_default()
        };
        RawProperty {
            value: parsed.value,
            unit,
            label: label.to_string(),
            cell: cell_ref(self.sheet_name(sheet), row, col),
        }
    }

    /// 素材名の候補: ブロックタイトル → シート名（既定名以外）→ ファイル名
    pub fn fallback_name(&self, title: Option<&str>, sheet: usize, allow_sheet_name: bool) -> String {
        if let Some(title) = title.filter(|t| !t.trim().is_empty()) {
            return title.trim().to_string();
        }
        if allow_sheet_name {
            let name = self.sheet_name(sheet);
            if !name.trim().is_empty() && !is_default_sheet_name(name) {
                return name.trim().to_string();
            }
        }
        self.file
            .display_name()
            .and_then(|name| Path::new(name).file_stem())
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// セル文字列を素材名として使ってよいか
    pub fn is_name_candidate(&self, text: &str) -> bool {
        !text.trim().is_empty()
            && !is_placeholder_header(text)
            && !self.vocabulary.is_property_label(text)
    }
}

/// "Sheet1" のような自動命名のシート名か
fn is_default_sheet_name(name: &str) -> bool {
    let lower = name.trim().to_lowercase();
    ["sheet", "tabelle", "feuil", "hoja"].iter().any(|prefix| {
        lower
            .strip_prefix(prefix)
            .map_or(false, |rest| rest.trim().chars().all(|c| c.is_ascii_digit()))
    })
}

/// 値列の見出しとしてよく使われる語（素材名ではない）
fn is_placeholder_header(text: &str) -> bool {
    matches!(
        normalize_label(text).as_str(),
        "value" | "values" | "typical value" | "typical values" | "result" | "results"
            | "data" | "unit" | "units" | "property" | "properties"
    )
}

/// 素材名（大文字小文字を無視）で統合する。出現順を保つ
pub(crate) fn merge_by_name(records: Vec<MaterialRecord>) -> Vec<MaterialRecord> {
    let mut merged: Vec<MaterialRecord> = Vec::new();
    for record in records {
        match merged.iter_mut().find(|m| m.name_key() == record.name_key()) {
            Some(existing) => existing.absorb(record),
            None => merged.push(record),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::{AnalyzerOptions, StructureAnalyzer};
    use crate::tabular::{Sheet, Workbook};
    use crate::types::LayoutClassification;

    fn run(workbook: &Workbook, strategy: Option<Strategy>) -> ExtractionOutcome {
        let vocab = Vocabulary::builtin();
        let analysis = StructureAnalyzer::new(&vocab, AnalyzerOptions::default()).analyze(workbook, "hash");
        extract(workbook, &analysis, strategy, &vocab).unwrap()
    }

    fn auto(workbook: &Workbook) -> ExtractionOutcome {
        let vocab = Vocabulary::builtin();
        let analysis = StructureAnalyzer::new(&vocab, AnalyzerOptions::default()).analyze(workbook, "hash");
        let strategy = Strategy::for_layout(analysis.layout_classification);
        extract(workbook, &analysis, Some(strategy), &vocab).unwrap()
    }

    #[test]
    fn test_vertical_extraction() {
        let wb = Workbook::single(
            Some("pla_datasheet.xlsx".into()),
            Sheet::from_strings("Sheet1", &[&["Tensile Strength", "45 MPa"], &["Density", "1.24 g/cm3"]]),
        );
        let outcome = auto(&wb);
        assert_eq!(outcome.strategy_used, Strategy::PropertyValueParser);
        assert_eq!(outcome.records.len(), 1);

        let record = &outcome.records[0];
        assert_eq!(record.material_name, "pla_datasheet");
        assert_eq!(record.raw_properties["tensile_strength"].value, 45.0);
        assert_eq!(record.raw_properties["tensile_strength"].unit, "MPa");
        assert_eq!(record.raw_properties["tensile_strength"].cell, "Sheet1!B1");
        assert_eq!(record.raw_properties["density"].unit, "g/cm3");
        assert_eq!(record.source_file_identifier, "hash");
    }

    #[test]
    fn test_vertical_material_row_and_unit_column() {
        let wb = Workbook::single(
            None,
            Sheet::from_strings(
                "Specs",
                &[
                    &["Material", "PETG HF"],
                    &["Tensile Strength", "50", "MPa"],
                    &["Bed Temperature", "80", "°C"],
                    &["Density", "n/a", ""],
                ],
            ),
        );
        let outcome = auto(&wb);
        let record = &outcome.records[0];
        assert_eq!(record.material_name, "PETG HF");
        assert_eq!(record.raw_properties["bed_temperature"].unit, "°C");
        assert_eq!(record.raw_properties.len(), 2);
        assert_eq!(outcome.skipped_cells, 1);
    }

    #[test]
    fn test_duplicate_keys_are_kept() {
        let wb = Workbook::single(
            None,
            Sheet::from_strings(
                "Data",
                &[
                    &["Tensile Strength (XY)", "50 MPa"],
                    &["Tensile Strength (Z)", "30 MPa"],
                ],
            ),
        );
        let record = &auto(&wb).records[0];
        assert_eq!(record.raw_properties["tensile_strength"].value, 50.0);
        assert_eq!(record.raw_properties["tensile_strength_2"].value, 30.0);
    }

    #[test]
    fn test_table_rows_extraction() {
        let wb = Workbook::single(
            None,
            Sheet::from_strings(
                "Data",
                &[
                    &["Material", "Tensile Strength (MPa)", "Density (g/cm3)"],
                    &["PLA", "45", "1.24"],
                    &["PETG", "50", "n/a"],
                    &["pla", "", "1.25"],
                ],
            ),
        );
        let outcome = auto(&wb);
        assert_eq!(outcome.strategy_used, Strategy::TableRowParser);
        assert_eq!(outcome.records.len(), 2);

        let pla = &outcome.records[0];
        assert_eq!(pla.material_name, "PLA");
        assert_eq!(pla.raw_properties["tensile_strength"].unit, "MPa");
        assert_eq!(pla.raw_properties["density"].value, 1.24);
        assert_eq!(pla.raw_properties["density_2"].value, 1.25);

        let petg = &outcome.records[1];
        assert_eq!(petg.raw_properties.len(), 1);
        assert_eq!(outcome.skipped_cells, 1);
    }

    #[test]
    fn test_single_property_table_keeps_every_row() {
        let wb = Workbook::single(
            None,
            Sheet::from_strings(
                "Data",
                &[
                    &["Material", "Density (g/cm3)"],
                    &["PLA", "1.24"],
                    &["PETG", "1.27"],
                    &["ABS", "1.04"],
                ],
            ),
        );
        let outcome = auto(&wb);
        assert_eq!(outcome.strategy_used, Strategy::TableRowParser);
        let names: Vec<&str> = outcome.records.iter().map(|r| r.material_name.as_str()).collect();
        assert_eq!(names, vec!["PLA", "PETG", "ABS"]);
        assert_eq!(outcome.records[2].raw_properties["density"].value, 1.04);
        assert_eq!(outcome.records[2].raw_properties["density"].unit, "g/cm3");
        assert_eq!(outcome.records[2].raw_properties["density"].cell, "Data!B4");
    }

    #[test]
    fn test_materials_across_columns() {
        let wb = Workbook::single(
            None,
            Sheet::from_strings(
                "Data",
                &[
                    &["Property", "PLA", "PETG"],
                    &["Tensile Strength", "45 MPa", "50 MPa"],
                    &["Glass Transition (°C)", "60", "80"],
                ],
            ),
        );
        let outcome = auto(&wb);
        assert_eq!(outcome.strategy_used, Strategy::TableRowParser);
        let names: Vec<&str> = outcome.records.iter().map(|r| r.material_name.as_str()).collect();
        assert_eq!(names, vec!["PLA", "PETG"]);
        assert_eq!(outcome.records[1].raw_properties["glass_transition_temperature"].unit, "°C");
    }

    #[test]
    fn test_matrix_merges_across_sheets() {
        let wb = Workbook::new(
            Some("results.xlsx".into()),
            vec![
                Sheet::from_strings("PLA", &[&["Tensile Strength", "45 MPa"], &["Density", "1.24 g/cm3"]]),
                Sheet::from_strings(
                    "Thermal",
                    &[
                        &["Material", "Glass Transition Temperature (°C)", "HDT (°C)"],
                        &["pla", "60", "55"],
                        &["ABS", "105", "98"],
                    ],
                ),
            ],
        );
        let outcome = auto(&wb);
        assert_eq!(outcome.strategy_used, Strategy::MatrixParser);
        assert_eq!(outcome.records.len(), 2);
        let pla = &outcome.records[0];
        assert_eq!(pla.material_name, "PLA");
        assert_eq!(pla.raw_properties.len(), 4);
        assert_eq!(outcome.records[1].material_name, "ABS");
    }

    #[test]
    fn test_matrix_blocks_on_one_sheet() {
        let wb = Workbook::single(
            Some("pla.xlsx".into()),
            Sheet::from_strings(
                "Sheet1",
                &[
                    &["Tensile Strength", "45 MPa"],
                    &["Density", "1.24 g/cm3"],
                    &[],
                    &["Annealed"],
                    &[],
                    &["Tensile Strength", "55 MPa"],
                    &["Flexural Strength", "80 MPa"],
                    &[],
                    &["Material", "Tensile Strength (MPa)", "HDT (°C)"],
                    &["PLA", "46", "55"],
                    &["annealed", "56", "65"],
                ],
            ),
        );
        let outcome = auto(&wb);
        assert_eq!(outcome.strategy_used, Strategy::MatrixParser);

        let names: Vec<&str> = outcome.records.iter().map(|r| r.material_name.as_str()).collect();
        assert_eq!(names, vec!["pla", "Annealed"]);

        let pla = &outcome.records[0];
        assert_eq!(pla.raw_properties["tensile_strength"].value, 45.0);
        assert_eq!(pla.raw_properties["tensile_strength_2"].value, 46.0);
        assert_eq!(pla.raw_properties["tensile_strength_2"].cell, "Sheet1!B10");
        assert_eq!(pla.raw_properties.len(), 4);

        let annealed = &outcome.records[1];
        assert_eq!(annealed.raw_properties["tensile_strength"].value, 55.0);
        assert_eq!(annealed.raw_properties["flexural_strength"].value, 80.0);
        assert_eq!(annealed.raw_properties["tensile_strength_2"].value, 56.0);
        assert_eq!(annealed.raw_properties.len(), 4);
    }

    #[test]
    fn test_generic_reads_value_columns_under_labels() {
        let wb = Workbook::single(
            None,
            Sheet::from_strings(
                "Notes",
                &[
                    &["Tensile Strength", "Density"],
                    &["45 MPa", "1.24 g/cm3"],
                    &["50 MPa", "n/a"],
                    &["48 MPa", "1.27 g/cm3"],
                ],
            ),
        );
        let vocab = Vocabulary::builtin();
        let mut analysis = StructureAnalyzer::new(&vocab, AnalyzerOptions::default()).analyze(&wb, "hash");
        analysis.confidence_score = 0;
        let outcome = extract(&wb, &analysis, None, &vocab).unwrap();

        assert_eq!(outcome.strategy_used, Strategy::GenericParser);
        let record = &outcome.records[0];
        assert_eq!(record.raw_properties["tensile_strength"].value, 45.0);
        assert_eq!(record.raw_properties["tensile_strength_2"].value, 50.0);
        assert_eq!(record.raw_properties["tensile_strength_3"].value, 48.0);
        assert_eq!(record.raw_properties["density_2"].cell, "Notes!B4");
        assert_eq!(record.raw_properties.len(), 5);
        assert_eq!(outcome.skipped_cells, 1);
    }

    #[test]
    fn test_generic_fallback_without_structure() {
        let wb = Workbook::single(
            None,
            Sheet::from_strings(
                "Notes",
                &[&["random text"], &["Tensile strength: 48 MPa"], &["", "other"]],
            ),
        );
        let vocab = Vocabulary::builtin();
        let mut analysis = StructureAnalyzer::new(&vocab, AnalyzerOptions::default()).analyze(&wb, "hash");
        analysis.confidence_score = 0;
        let outcome = extract(&wb, &analysis, Some(Strategy::PropertyValueParser), &vocab).unwrap();
        assert_eq!(outcome.strategy_used, Strategy::GenericParser);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].material_name, UNSPECIFIED_MATERIAL);
        assert_eq!(outcome.records[0].raw_properties["tensile_strength"].value, 48.0);
    }

    #[test]
    fn test_missing_strategy_uses_generic() {
        let wb = Workbook::single(None, Sheet::from_strings("S", &[&["Density", "1.2 g/cm3"]]));
        let outcome = run(&wb, None);
        assert_eq!(outcome.strategy_used, Strategy::GenericParser);
        assert_eq!(outcome.records[0].raw_properties["density"].value, 1.2);
    }

    #[test]
    fn test_unknown_layout_yields_nothing_from_generic() {
        let wb = Workbook::single(None, Sheet::from_strings("S", &[&["foo", "bar"], &["1", "2"]]));
        let vocab = Vocabulary::builtin();
        let analysis = StructureAnalyzer::new(&vocab, AnalyzerOptions::default()).analyze(&wb, "hash");
        assert_eq!(analysis.layout_classification, LayoutClassification::Unknown);
        let outcome = extract(&wb, &analysis, Some(Strategy::GenericParser), &vocab).unwrap();
        assert_eq!(outcome.strategy_used, Strategy::GenericParser);
        assert!(outcome.records.is_empty());
    }

    #[test]
    fn test_unreadable_when_sheets_missing() {
        let vocab = Vocabulary::builtin();
        let wb = Workbook::single(None, Sheet::from_strings("Data", &[&["Density", "1.2"]]));
        let analysis = StructureAnalyzer::new(&vocab, AnalyzerOptions::default()).analyze(&wb, "hash");

        let empty = Workbook::new(None, Vec::new());
        assert!(matches!(
            extract(&empty, &analysis, None, &vocab),
            Err(ExtractionFailure::UnreadableFile(_))
        ));

        let renamed = Workbook::single(None, Sheet::from_strings("Other", &[&["Density", "1.2"]]));
        assert!(matches!(
            extract(&renamed, &analysis, None, &vocab),
            Err(ExtractionFailure::UnreadableFile(_))
        ));
    }

    #[test]
    fn test_default_sheet_names() {
        assert!(is_default_sheet_name("Sheet1"));
        assert!(is_default_sheet_name("sheet 2"));
        assert!(is_default_sheet_name("Tabelle1"));
        assert!(!is_default_sheet_name("PLA"));
        assert!(!is_default_sheet_name("Sheet metal"));
    }
}

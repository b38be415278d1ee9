//! 構造解析
//!
//! スキーマを知らない表形式ファイルから、レイアウト分類・ヘッダー位置・
//! 列の役割・単位・信頼度を推定する。
//!
//! シートは空白行で区切られたブロックに分割し、ブロックごとに
//! 物性ラベルの並び方向（縦/横）を判定する。

use crate::tabular::{Cell, TabularFile};
use crate::types::{
    BlockStructure, ColumnRole, LayoutClassification, Orientation, SheetStructure,
    StructureAnalysis,
};
use crate::values;
use crate::vocabulary::{normalize_label, Vocabulary};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};

/// 解析パラメータ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerOptions {
    /// ブロック先頭から走査する行数
    pub header_scan_rows: usize,
    /// 横並びヘッダーとみなす最小ラベル数
    pub header_keyword_threshold: usize,
    /// 1シートあたりの最大ブロック数
    pub max_blocks_per_sheet: usize,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self {
            header_scan_rows: 20,
            header_keyword_threshold: 2,
            max_blocks_per_sheet: 64,
        }
    }
}

/// 信頼度スコア
///
/// ヘッダー(物性ラベル)検出 +30、レイアウト判定 +30、役割解決 +20、単位検出 +20
pub fn confidence_score(
    anchor_found: bool,
    layout_known: bool,
    resolved_roles: usize,
    detected_units: usize,
) -> u8 {
    let mut score: u32 = 0;
    if anchor_found {
        score += 30;
    }
    if layout_known {
        score += 30;
    }
    if resolved_roles > 0 {
        score += 20;
    }
    if detected_units > 0 {
        score += 20;
    }
    score.min(100) as u8
}

/// ブロック解析の中間結果
struct BlockScan {
    block: BlockStructure,
    units: BTreeSet<String>,
    labels: Vec<String>,
}

/// 構造解析器
pub struct StructureAnalyzer<'a> {
    vocabulary: &'a Vocabulary,
    options: AnalyzerOptions,
}

impl<'a> StructureAnalyzer<'a> {
    pub fn new(vocabulary: &'a Vocabulary, options: AnalyzerOptions) -> Self {
        Self { vocabulary, options }
    }

    /// ファイルを解析する（内容が壊れていても `unknown` を返し、失敗しない）
    pub fn analyze(&self, file: &dyn TabularFile, file_identifier: &str) -> StructureAnalysis {
        let never = AtomicBool::new(false);
        self.run(file, file_identifier, &never).unwrap_or_else(|| {
            StructureAnalysis::unknown(file_identifier, file.sheet_names())
        })
    }

    /// シート間で中断フラグを確認する版。中断時は `None`
    pub fn analyze_cancellable(
        &self,
        file: &dyn TabularFile,
        file_identifier: &str,
        cancel: &AtomicBool,
    ) -> Option<StructureAnalysis> {
        self.run(file, file_identifier, cancel)
    }

    fn run(
        &self,
        file: &dyn TabularFile,
        file_identifier: &str,
        cancel: &AtomicBool,
    ) -> Option<StructureAnalysis> {
        let sheet_identifiers = file.sheet_names();
        let mut sheets = Vec::with_capacity(sheet_identifiers.len());
        let mut units = BTreeSet::new();
        let mut labels: Vec<String> = Vec::new();

        for (index, name) in sheet_identifiers.iter().enumerate() {
            if cancel.load(Ordering::Relaxed) {
                tracing::debug!("analysis of {} cancelled at sheet {}", file_identifier, name);
                return None;
            }
            let (sheet, sheet_units, sheet_labels) = self.analyze_sheet(file, index, name);
            units.extend(sheet_units);
            for label in sheet_labels {
                if !labels.contains(&label) {
                    labels.push(label);
                }
            }
            sheets.push(sheet);
        }

        let analyzable: Vec<&BlockStructure> = sheets
            .iter()
            .flat_map(|s| s.blocks.iter())
            .filter(|b| b.is_analyzable())
            .collect();
        let layout = match analyzable.len() {
            0 => LayoutClassification::Unknown,
            1 => analyzable[0].layout,
            _ => LayoutClassification::TestResultsMatrix,
        };
        let column_role_map = analyzable
            .first()
            .map(|b| b.column_roles.clone())
            .unwrap_or_default();
        let anchor_found = sheets
            .iter()
            .flat_map(|s| s.blocks.iter())
            .any(|b| b.orientation.is_some());
        let resolved = column_role_map
            .values()
            .filter(|r| **r != ColumnRole::Unknown)
            .count();
        let confidence = confidence_score(
            anchor_found,
            layout != LayoutClassification::Unknown,
            resolved,
            units.len(),
        );

        tracing::debug!(
            "{}: layout={} blocks={} confidence={}",
            file_identifier,
            layout,
            analyzable.len(),
            confidence
        );

        Some(StructureAnalysis {
            file_identifier: file_identifier.to_string(),
            sheet_identifiers,
            layout_classification: layout,
            sheets,
            column_role_map,
            detected_units: units,
            property_labels: labels,
            confidence_score: confidence,
            vocabulary_version: self.vocabulary.version,
        })
    }

    fn analyze_sheet(
        &self,
        file: &dyn TabularFile,
        index: usize,
        name: &str,
    ) -> (SheetStructure, BTreeSet<String>, Vec<String>) {
        let (height, width) = file.sheet_dimensions(index);
        let mut blocks = Vec::new();
        let mut units = BTreeSet::new();
        let mut labels = Vec::new();
        let mut pending_title: Option<String> = None;

        for (first, last) in row_blocks(file, index, height)
            .into_iter()
            .take(self.options.max_blocks_per_sheet)
        {
            let BlockScan {
                mut block,
                units: block_units,
                labels: block_labels,
            } = self.analyze_block(file, index, first, last, width);

            if block.orientation.is_some() {
                units.extend(block_units);
                if block.title.is_none() {
                    block.title = pending_title.take();
                }
            }
            if block.is_analyzable() {
                labels.extend(block_labels);
            }
            pending_title = if block.orientation.is_none() && first == last {
                single_text_cell(file, index, first, width)
            } else {
                None
            };
            blocks.push(block);
        }

        let anchor = blocks
            .iter()
            .find(|b| b.is_analyzable())
            .or_else(|| blocks.iter().find(|b| b.orientation.is_some()));
        let sheet = SheetStructure {
            index,
            name: name.to_string(),
            header_row_index: anchor.and_then(|b| b.header_row_index),
            data_start_row_index: anchor.and_then(|b| b.data_start_row_index),
            blocks,
        };
        (sheet, units, labels)
    }

    fn is_label(&self, cell: &Cell) -> bool {
        cell.as_text()
            .map_or(false, |text| self.vocabulary.is_property_label(text))
    }

    fn analyze_block(
        &self,
        file: &dyn TabularFile,
        sheet: usize,
        first: usize,
        last: usize,
        width: usize,
    ) -> BlockScan {
        let block = empty_block(sheet, first, last);
        let scan_end = last.min(first + self.options.header_scan_rows.max(1) - 1);

        let mut row_hits = vec![0usize; scan_end - first + 1];
        let mut col_hits = vec![0usize; width];
        for row in first..=scan_end {
            for col in 0..width {
                if self.is_label(file.cell(sheet, row, col)) {
                    row_hits[row - first] += 1;
                    col_hits[col] += 1;
                }
            }
        }

        let rmax = row_hits.iter().copied().max().unwrap_or(0);
        let cmax = col_hits.iter().copied().max().unwrap_or(0);
        if rmax == 0 {
            return BlockScan {
                block,
                units: BTreeSet::new(),
                labels: Vec::new(),
            };
        }

        let threshold = self.options.header_keyword_threshold.max(1);
        // 最多ヒット行、同数なら最も上の行
        let header = first + row_hits.iter().position(|&h| h == rmax).unwrap_or(0);
        if (cmax >= rmax || rmax < threshold) && !self.is_header_row(file, sheet, header, last, width) {
            let label_col = col_hits.iter().position(|&h| h == cmax).unwrap_or(0);
            self.rows_block(file, block, label_col, width)
        } else {
            self.columns_block(file, block, header, width)
        }
    }

    /// 物性ラベルが1つしかなくてもヘッダー行とみなせるか
    ///
    /// 素材名の見出しを含む行、またはラベルの右に数値が無く下に数値がある行
    fn is_header_row(
        &self,
        file: &dyn TabularFile,
        sheet: usize,
        row: usize,
        last: usize,
        width: usize,
    ) -> bool {
        let label_cols: Vec<usize> = (0..width)
            .filter(|&c| self.is_label(file.cell(sheet, row, c)))
            .collect();
        if label_cols.is_empty() {
            return false;
        }
        let names_material = (0..width).filter(|c| !label_cols.contains(c)).any(|c| {
            file.cell(sheet, row, c)
                .as_text()
                .map_or(false, |t| self.vocabulary.is_material_label(t))
        });
        if names_material {
            return true;
        }
        // 単位行を挟むことがあるので2行下まで見る
        let below_end = last.min(row + 2);
        row < last
            && label_cols.iter().all(|&c| {
                let right = (c + 1..width).any(|cc| values::is_numeric_cell(file.cell(sheet, row, cc)));
                let below = (row + 1..=below_end).any(|r| values::is_numeric_cell(file.cell(sheet, r, c)));
                !right && below
            })
    }

    /// ラベルが縦に並ぶブロック
    fn rows_block(
        &self,
        file: &dyn TabularFile,
        mut block: BlockStructure,
        label_col: usize,
        width: usize,
    ) -> BlockScan {
        let sheet = block.sheet_index;
        let label_rows: Vec<usize> = (block.first_row..=block.last_row)
            .filter(|&r| self.is_label(file.cell(sheet, r, label_col)))
            .collect();
        let Some(&data_start) = label_rows.first() else {
            return BlockScan {
                block,
                units: BTreeSet::new(),
                labels: Vec::new(),
            };
        };

        block.orientation = Some(Orientation::PropertiesInRows);
        block.label_column = Some(label_col);
        block.data_start_row_index = Some(data_start);

        if data_start > block.first_row {
            let prev = data_start - 1;
            let has_text = (0..width).any(|c| file.cell(sheet, prev, c).as_text().is_some());
            let has_label = (0..width).any(|c| self.is_label(file.cell(sheet, prev, c)));
            let material_row = file
                .cell(sheet, prev, label_col)
                .as_text()
                .map_or(false, |t| self.vocabulary.is_material_label(t));
            if has_text && !has_label && !material_row {
                block.header_row_index = Some(prev);
            }
        }

        let need = (label_rows.len() + 1) / 2;
        block.value_columns = (label_col + 1..width)
            .filter(|&col| {
                let numeric = label_rows
                    .iter()
                    .filter(|&&r| values::is_numeric_cell(file.cell(sheet, r, col)))
                    .count();
                numeric > 0 && numeric >= need
            })
            .collect();

        block.unit_column = (label_col + 1..width)
            .filter(|col| !block.value_columns.contains(col))
            .find(|&col| {
                let header_says_unit = block
                    .header_row_index
                    .and_then(|h| file.cell(sheet, h, col).as_text())
                    .map_or(false, |t| matches!(normalize_label(t).as_str(), "unit" | "units"));
                let unit_cells = label_rows
                    .iter()
                    .filter(|&&r| {
                        file.cell(sheet, r, col)
                            .as_text()
                            .map_or(false, values::looks_like_unit)
                    })
                    .count();
                header_says_unit || (unit_cells > 0 && unit_cells >= need)
            });

        block.layout = match block.value_columns.len() {
            0 => LayoutClassification::Unknown,
            1 => LayoutClassification::SingleMaterialVertical,
            _ => LayoutClassification::MultiMaterialTable,
        };

        let title_end = block.header_row_index.unwrap_or(data_start);
        block.title = (block.first_row..title_end).find_map(|r| single_text_cell(file, sheet, r, width));

        let mut roles = BTreeMap::new();
        for col in occupied_columns(file, &block, width) {
            let role = if col == label_col {
                ColumnRole::PropertyName
            } else if block.value_columns.contains(&col) {
                ColumnRole::PropertyValue
            } else if block.unit_column == Some(col) {
                ColumnRole::Unit
            } else {
                ColumnRole::Unknown
            };
            roles.insert(col, role);
        }
        block.column_roles = roles;

        let mut units = BTreeSet::new();
        let mut labels = Vec::new();
        for &row in &label_rows {
            let Some(label) = file.cell(sheet, row, label_col).as_text() else {
                continue;
            };
            labels.push(label.to_string());
            if let Some(unit) = values::header_unit(label) {
                units.insert(unit);
            }
            for &col in &block.value_columns {
                if let Some(parsed) = values::parse_value(file.cell(sheet, row, col)) {
                    if values::is_reportable_unit(&parsed.unit) {
                        units.insert(parsed.unit);
                    }
                }
            }
            if let Some(col) = block.unit_column {
                if let Some(text) = file.cell(sheet, row, col).as_text() {
                    if values::looks_like_unit(text) {
                        units.insert(text.to_string());
                    }
                }
            }
        }

        BlockScan {
            block,
            units,
            labels,
        }
    }

    /// ラベルがヘッダー行に横に並ぶブロック
    fn columns_block(
        &self,
        file: &dyn TabularFile,
        mut block: BlockStructure,
        header: usize,
        width: usize,
    ) -> BlockScan {
        let sheet = block.sheet_index;
        let property_cols: Vec<usize> = (0..width)
            .filter(|&c| self.is_label(file.cell(sheet, header, c)))
            .collect();

        block.orientation = Some(Orientation::PropertiesInColumns);
        block.header_row_index = Some(header);

        let mut first_data = header + 1;
        if header < block.last_row {
            let next = header + 1;
            let unit_like = property_cols
                .iter()
                .filter(|&&c| {
                    file.cell(sheet, next, c)
                        .as_text()
                        .map_or(false, values::looks_like_unit)
                })
                .count();
            let numeric = property_cols
                .iter()
                .any(|&c| values::is_numeric_cell(file.cell(sheet, next, c)));
            if unit_like > 0 && !numeric {
                block.unit_row = Some(next);
                first_data = next + 1;
            }
        }

        let data_rows: Vec<usize> = (first_data..=block.last_row)
            .filter(|&r| {
                property_cols
                    .iter()
                    .any(|&c| values::is_numeric_cell(file.cell(sheet, r, c)))
            })
            .collect();
        block.data_start_row_index = data_rows.first().copied();

        let need = (data_rows.len() + 1) / 2;
        let candidates: Vec<usize> = (0..width).filter(|c| !property_cols.contains(c)).collect();
        block.material_column = candidates
            .iter()
            .copied()
            .find(|&c| {
                file.cell(sheet, header, c)
                    .as_text()
                    .map_or(false, |t| self.vocabulary.is_material_label(t))
            })
            .or_else(|| {
                candidates.iter().copied().find(|&c| {
                    let texts = data_rows
                        .iter()
                        .filter(|&&r| {
                            let cell = file.cell(sheet, r, c);
                            cell.as_text().is_some() && !values::is_numeric_cell(cell)
                        })
                        .count();
                    texts > 0 && texts >= need
                })
            });
        block.value_columns = property_cols.clone();

        block.layout = if data_rows.is_empty() {
            LayoutClassification::Unknown
        } else {
            LayoutClassification::MultiMaterialTable
        };

        block.title = (block.first_row..header).find_map(|r| single_text_cell(file, sheet, r, width));

        let mut roles = BTreeMap::new();
        for col in occupied_columns(file, &block, width) {
            let role = if block.material_column == Some(col) {
                ColumnRole::MaterialName
            } else if property_cols.contains(&col) {
                ColumnRole::PropertyValue
            } else {
                ColumnRole::Unknown
            };
            roles.insert(col, role);
        }
        block.column_roles = roles;

        let mut units = BTreeSet::new();
        let mut labels = Vec::new();
        for &col in &property_cols {
            if let Some(label) = file.cell(sheet, header, col).as_text() {
                labels.push(label.to_string());
                if let Some(unit) = values::header_unit(label) {
                    units.insert(unit);
                }
            }
            if let Some(row) = block.unit_row {
                if let Some(text) = file.cell(sheet, row, col).as_text() {
                    if values::looks_like_unit(text) {
                        units.insert(text.to_string());
                    }
                }
            }
            for &row in &data_rows {
                if let Some(parsed) = values::parse_value(file.cell(sheet, row, col)) {
                    if values::is_reportable_unit(&parsed.unit) {
                        units.insert(parsed.unit);
                    }
                }
            }
        }

        BlockScan {
            block,
            units,
            labels,
        }
    }
}

fn empty_block(sheet: usize, first: usize, last: usize) -> BlockStructure {
    BlockStructure {
        sheet_index: sheet,
        first_row: first,
        last_row: last,
        layout: LayoutClassification::Unknown,
        orientation: None,
        header_row_index: None,
        data_start_row_index: None,
        label_column: None,
        value_columns: Vec::new(),
        unit_column: None,
        unit_row: None,
        material_column: None,
        column_roles: BTreeMap::new(),
        title: None,
    }
}

/// 空白行で区切られた行範囲（両端含む）
fn row_blocks(file: &dyn TabularFile, sheet: usize, height: usize) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;
    for row in 0..height {
        if file.is_blank_row(sheet, row) {
            if let Some(s) = start.take() {
                spans.push((s, row - 1));
            }
        } else if start.is_none() {
            start = Some(row);
        }
    }
    if let Some(s) = start {
        spans.push((s, height - 1));
    }
    spans
}

/// 非空白セルが1つだけで、それが文字列なら返す
fn single_text_cell(file: &dyn TabularFile, sheet: usize, row: usize, width: usize) -> Option<String> {
    let mut occupied = (0..width)
        .map(|c| file.cell(sheet, row, c))
        .filter(|cell| !cell.is_blank());
    let only = occupied.next()?;
    if occupied.next().is_some() {
        return None;
    }
    only.as_text()
        .filter(|t| !values::is_numeric_cell(only) && t.chars().count() <= 120)
        .map(str::to_string)
}

/// ブロック内で値を持つ列
fn occupied_columns(file: &dyn TabularFile, block: &BlockStructure, width: usize) -> Vec<usize> {
    (0..width)
        .filter(|&c| {
            (block.first_row..=block.last_row)
                .any(|r| !file.cell(block.sheet_index, r, c).is_blank())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tabular::{Sheet, Workbook};

    fn analyze(workbook: &Workbook) -> StructureAnalysis {
        let vocab = Vocabulary::builtin();
        StructureAnalyzer::new(&vocab, AnalyzerOptions::default()).analyze(workbook, "hash")
    }

    fn one_sheet(rows: &[&[&str]]) -> Workbook {
        Workbook::single(Some("pla_datasheet.xlsx".into()), Sheet::from_strings("Data", rows))
    }

    #[test]
    fn test_vertical_layout() {
        let wb = one_sheet(&[&["Tensile Strength", "45 MPa"], &["Density", "1.24 g/cm3"]]);
        let analysis = analyze(&wb);

        assert_eq!(analysis.layout_classification, LayoutClassification::SingleMaterialVertical);
        assert_eq!(analysis.sheet_identifiers, vec!["Data".to_string()]);
        assert_eq!(analysis.column_role_map.get(&0), Some(&ColumnRole::PropertyName));
        assert_eq!(analysis.column_role_map.get(&1), Some(&ColumnRole::PropertyValue));
        assert!(analysis.detected_units.contains("MPa"));
        assert!(analysis.detected_units.contains("g/cm3"));
        assert_eq!(analysis.confidence_score, 100);
        assert_eq!(analysis.sheets[0].data_start_row_index, Some(0));
        assert_eq!(analysis.sheets[0].header_row_index, None);
        assert_eq!(
            analysis.property_labels,
            vec!["Tensile Strength".to_string(), "Density".to_string()]
        );
    }

    #[test]
    fn test_vertical_with_header_and_unit_column() {
        let wb = one_sheet(&[
            &["PLA Basic"],
            &["Property", "Value", "Unit"],
            &["Tensile Strength", "45", "MPa"],
            &["Elongation at Break", "6", "%"],
            &["Print Temperature", "210", "°C"],
        ]);
        let analysis = analyze(&wb);
        let block = analysis.primary_block().unwrap();

        assert_eq!(block.layout, LayoutClassification::SingleMaterialVertical);
        assert_eq!(block.header_row_index, Some(1));
        assert_eq!(block.data_start_row_index, Some(2));
        assert_eq!(block.unit_column, Some(2));
        assert_eq!(block.title.as_deref(), Some("PLA Basic"));
        assert_eq!(analysis.column_role_map.get(&2), Some(&ColumnRole::Unit));
        assert!(analysis.detected_units.contains("°C"));
    }

    #[test]
    fn test_properties_in_columns_table() {
        let wb = one_sheet(&[
            &["Material", "Tensile Strength (MPa)", "Density (g/cm3)"],
            &["PLA", "45", "1.24"],
            &["PETG", "50", "1.27"],
        ]);
        let analysis = analyze(&wb);
        let block = analysis.primary_block().unwrap();

        assert_eq!(analysis.layout_classification, LayoutClassification::MultiMaterialTable);
        assert_eq!(block.orientation, Some(Orientation::PropertiesInColumns));
        assert_eq!(block.header_row_index, Some(0));
        assert_eq!(block.data_start_row_index, Some(1));
        assert_eq!(block.material_column, Some(0));
        assert_eq!(analysis.column_role_map.get(&0), Some(&ColumnRole::MaterialName));
        assert!(analysis.detected_units.contains("MPa"));
        assert_eq!(analysis.property_labels.len(), 2);
    }

    #[test]
    fn test_single_property_table() {
        let wb = one_sheet(&[
            &["Material", "Density (g/cm3)"],
            &["PLA", "1.24"],
            &["PETG", "1.27"],
            &["ABS", "1.04"],
        ]);
        let analysis = analyze(&wb);
        let block = analysis.primary_block().unwrap();

        assert_eq!(analysis.layout_classification, LayoutClassification::MultiMaterialTable);
        assert_eq!(block.orientation, Some(Orientation::PropertiesInColumns));
        assert_eq!(block.header_row_index, Some(0));
        assert_eq!(block.material_column, Some(0));
        assert_eq!(block.value_columns, vec![1]);
        assert!(analysis.detected_units.contains("g/cm3"));
    }

    #[test]
    fn test_single_property_column_without_material_header() {
        let wb = one_sheet(&[&["", "Density"], &["PLA", "1.24"], &["PETG", "1.27"]]);
        let block = analyze(&wb).primary_block().cloned().unwrap();
        assert_eq!(block.orientation, Some(Orientation::PropertiesInColumns));
        assert_eq!(block.material_column, Some(0));
        assert_eq!(block.data_start_row_index, Some(1));
    }

    #[test]
    fn test_unit_row_below_header() {
        let wb = one_sheet(&[
            &["Name", "Tensile Strength", "Flexural Modulus"],
            &["", "MPa", "GPa"],
            &["PLA", "45", "3.1"],
        ]);
        let analysis = analyze(&wb);
        let block = analysis.primary_block().unwrap();
        assert_eq!(block.unit_row, Some(1));
        assert_eq!(block.data_start_row_index, Some(2));
        assert!(analysis.detected_units.contains("GPa"));
    }

    #[test]
    fn test_materials_across_columns() {
        let wb = one_sheet(&[
            &["Property", "PLA", "PETG", "ABS"],
            &["Tensile Strength", "45 MPa", "50 MPa", "40 MPa"],
            &["Density", "1.24", "1.27", "1.04"],
        ]);
        let analysis = analyze(&wb);
        let block = analysis.primary_block().unwrap();
        assert_eq!(analysis.layout_classification, LayoutClassification::MultiMaterialTable);
        assert_eq!(block.orientation, Some(Orientation::PropertiesInRows));
        assert_eq!(block.value_columns, vec![1, 2, 3]);
        assert_eq!(block.header_row_index, Some(0));
    }

    #[test]
    fn test_no_recognizable_labels_is_unknown() {
        let wb = one_sheet(&[&["foo", "bar"], &["1", "2 MPa"], &["3", "4"]]);
        let analysis = analyze(&wb);
        assert_eq!(analysis.layout_classification, LayoutClassification::Unknown);
        assert_eq!(analysis.confidence_score, 0);
        assert!(analysis.detected_units.is_empty());
        assert!(analysis.column_role_map.is_empty());
    }

    #[test]
    fn test_empty_sheet() {
        let wb = Workbook::single(None, Sheet::new("Empty", Vec::new()));
        let analysis = analyze(&wb);
        assert_eq!(analysis.layout_classification, LayoutClassification::Unknown);
        assert_eq!(analysis.confidence_score, 0);
        assert!(analysis.sheets[0].blocks.is_empty());
    }

    #[test]
    fn test_multiple_sheets_form_matrix() {
        let wb = Workbook::new(
            None,
            vec![
                Sheet::from_strings("PLA", &[&["Tensile Strength", "45 MPa"], &["Density", "1.24"]]),
                Sheet::from_strings("PETG", &[&["Tensile Strength", "50 MPa"], &["Density", "1.27"]]),
            ],
        );
        let analysis = analyze(&wb);
        assert_eq!(analysis.layout_classification, LayoutClassification::TestResultsMatrix);
        assert_eq!(analysis.analyzable_blocks().count(), 2);
    }

    #[test]
    fn test_disjoint_blocks_form_matrix() {
        let wb = one_sheet(&[
            &["Tensile Strength", "45 MPa"],
            &["Density", "1.24 g/cm3"],
            &[],
            &["Annealed"],
            &[],
            &["Material", "Tensile Strength", "Flexural Strength"],
            &["PLA", "55", "80"],
        ]);
        let analysis = analyze(&wb);
        assert_eq!(analysis.layout_classification, LayoutClassification::TestResultsMatrix);
        let blocks = &analysis.sheets[0].blocks;
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[2].title.as_deref(), Some("Annealed"));
    }

    #[test]
    fn test_header_precedes_data() {
        let wb = one_sheet(&[
            &["Material", "Tensile Strength", "Density"],
            &["PLA", "45", "1.24"],
        ]);
        let analysis = analyze(&wb);
        for sheet in &analysis.sheets {
            if let (Some(h), Some(d)) = (sheet.header_row_index, sheet.data_start_row_index) {
                assert!(d > h);
            }
        }
    }

    #[test]
    fn test_earliest_header_row_wins_on_tie() {
        let wb = one_sheet(&[
            &["Material", "Tensile Strength", "Density", "Flexural Modulus"],
            &["PLA", "45", "1.24", "3.1"],
            &["Material", "Tensile Strength", "Density", "Flexural Modulus"],
            &["PETG", "50", "1.27", "2.1"],
        ]);
        let analysis = analyze(&wb);
        let block = analysis.primary_block().unwrap();
        assert_eq!(block.orientation, Some(Orientation::PropertiesInColumns));
        assert_eq!(block.header_row_index, Some(0));
        assert_eq!(block.data_start_row_index, Some(1));
    }

    #[test]
    fn test_cancellation_between_sheets() {
        let vocab = Vocabulary::builtin();
        let analyzer = StructureAnalyzer::new(&vocab, AnalyzerOptions::default());
        let wb = one_sheet(&[&["Density", "1.24"]]);
        let cancel = AtomicBool::new(true);
        assert!(analyzer.analyze_cancellable(&wb, "hash", &cancel).is_none());
        let go = AtomicBool::new(false);
        assert!(analyzer.analyze_cancellable(&wb, "hash", &go).is_some());
    }

    #[test]
    fn test_confidence_monotonic_in_roles() {
        for anchor in [false, true] {
            for layout in [false, true] {
                for units in [0, 3] {
                    let mut previous = 0;
                    for roles in 0..5 {
                        let score = confidence_score(anchor, layout, roles, units);
                        assert!(score >= previous);
                        assert!(score <= 100);
                        previous = score;
                    }
                }
            }
        }
    }
}

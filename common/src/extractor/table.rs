//! table_row_parser: 複数素材が物性を共有する表
//!
//! - PropertiesInColumns: 1行 = 1素材、物性はヘッダー行に並ぶ
//! - PropertiesInRows: 値列ごとに1素材、素材名は見出し行か "Material" 行

use super::{merge_by_name, Context};
use crate::tabular::column_letter;
use crate::types::{BlockStructure, MaterialRecord, Orientation};
use crate::values;

pub(crate) fn extract(ctx: &mut Context<'_>) -> Vec<MaterialRecord> {
    let analysis = ctx.analysis;
    match analysis.primary_block() {
        Some(block) => extract_block(ctx, block, false),
        None => Vec::new(),
    }
}

pub(crate) fn extract_block(
    ctx: &mut Context<'_>,
    block: &BlockStructure,
    allow_sheet_name: bool,
) -> Vec<MaterialRecord> {
    let records = match block.orientation {
        Some(Orientation::PropertiesInColumns) => material_rows(ctx, block),
        Some(Orientation::PropertiesInRows) => material_columns(ctx, block, allow_sheet_name),
        None => Vec::new(),
    };
    merge_by_name(records)
}

/// ヘッダー行に物性、各行が素材
fn material_rows(ctx: &mut Context<'_>, block: &BlockStructure) -> Vec<MaterialRecord> {
    let Some(header) = block.header_row_index else {
        return Vec::new();
    };
    let Some(start) = block.data_start_row_index else {
        return Vec::new();
    };
    let sheet = block.sheet_index;
    let file = ctx.file;
    let vocabulary = ctx.vocabulary;

    let mut records = Vec::new();
    for row in start..=block.last_row {
        if Some(row) == block.unit_row {
            continue;
        }
        let name = match block.material_column {
            Some(col) => {
                let cell = file.cell(sheet, row, col);
                if cell.as_text().map_or(false, |t| vocabulary.is_material_label(t)) {
                    // 繰り返しヘッダー行
                    continue;
                }
                cell.display()
            }
            None => format!("row {}", row + 1),
        };

        let mut record = ctx.new_record(name);
        for &col in &block.value_columns {
            let Some(label) = file.cell(sheet, header, col).as_text() else {
                continue;
            };
            let cell = file.cell(sheet, row, col);
            let Some(parsed) = values::parse_value(cell) else {
                if !cell.is_blank() {
                    ctx.skip(sheet, row, col);
                }
                continue;
            };
            let unit_cell = block
                .unit_row
                .and_then(|unit_row| file.cell(sheet, unit_row, col).as_text());
            let property = ctx.raw_property(sheet, row, col, label, parsed, unit_cell);
            record.insert_raw(&vocabulary.key_for_label(label), property);
        }
        if !record.raw_properties.is_empty() {
            records.push(record);
        }
    }
    records
}

/// ラベル列に物性、値列が素材
fn material_columns(
    ctx: &mut Context<'_>,
    block: &BlockStructure,
    allow_sheet_name: bool,
) -> Vec<MaterialRecord> {
    let Some(label_col) = block.label_column else {
        return Vec::new();
    };
    let sheet = block.sheet_index;
    let file = ctx.file;
    let vocabulary = ctx.vocabulary;
    let start = block.data_start_row_index.unwrap_or(block.first_row);

    let material_row = (block.first_row..=block.last_row).find(|&row| {
        file.cell(sheet, row, label_col)
            .as_text()
            .map_or(false, |t| vocabulary.is_material_label(t))
    });

    let mut records = Vec::new();
    for &col in &block.value_columns {
        let named = material_row
            .into_iter()
            .chain(block.header_row_index)
            .filter_map(|row| file.cell(sheet, row, col).as_text())
            .find(|text| ctx.is_name_candidate(text))
            .map(str::to_string);
        let name = match named {
            Some(name) => name,
            None if block.value_columns.len() == 1 => {
                ctx.fallback_name(block.title.as_deref(), sheet, allow_sheet_name)
            }
            None => format!("column {}", column_letter(col)),
        };

        let mut record = ctx.new_record(name);
        for row in start..=block.last_row {
            if Some(row) == material_row {
                continue;
            }
            let cell = file.cell(sheet, row, col);
            let Some(label) = file.cell(sheet, row, label_col).as_text() else {
                if !cell.is_blank() {
                    ctx.skip(sheet, row, col);
                }
                continue;
            };
            let Some(parsed) = values::parse_value(cell) else {
                if !cell.is_blank() {
                    ctx.skip(sheet, row, col);
                }
                continue;
            };
            let unit_cell = block
                .unit_column
                .and_then(|unit_col| file.cell(sheet, row, unit_col).as_text());
            let property = ctx.raw_property(sheet, row, col, label, parsed, unit_cell);
            record.insert_raw(&vocabulary.key_for_label(label), property);
        }
        if !record.raw_properties.is_empty() {
            records.push(record);
        }
    }
    records
}

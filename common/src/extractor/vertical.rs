//! property_value_parser: 1素材の縦型リスト（ラベル列 + 値列）

use super::{table, Context};
use crate::types::{BlockStructure, MaterialRecord, Orientation};
use crate::values;

pub(crate) fn extract(ctx: &mut Context<'_>) -> Vec<MaterialRecord> {
    let analysis = ctx.analysis;
    let Some(block) = analysis.primary_block() else {
        return Vec::new();
    };
    match block.orientation {
        Some(Orientation::PropertiesInRows) => extract_block(ctx, block, false).into_iter().collect(),
        _ => table::extract_block(ctx, block, false),
    }
}

/// ブロックを1素材として読む。値が1つも取れなければ `None`
pub(crate) fn extract_block(
    ctx: &mut Context<'_>,
    block: &BlockStructure,
    allow_sheet_name: bool,
) -> Option<MaterialRecord> {
    let label_col = block.label_column?;
    let value_col = *block.value_columns.first()?;
    let sheet = block.sheet_index;
    let file = ctx.file;
    let vocabulary = ctx.vocabulary;
    let start = block.data_start_row_index.unwrap_or(block.first_row);

    let material_row_name = (block.first_row..=block.last_row).find_map(|row| {
        let label = file.cell(sheet, row, label_col).as_text()?;
        if !vocabulary.is_material_label(label) {
            return None;
        }
        file.cell(sheet, row, value_col)
            .as_text()
            .or_else(|| file.cell(sheet, row, label_col + 1).as_text())
            .map(str::to_string)
    });

    let mut record = ctx.new_record(String::new());
    for row in start..=block.last_row {
        let value_cell = file.cell(sheet, row, value_col);
        let Some(label) = file.cell(sheet, row, label_col).as_text() else {
            if !value_cell.is_blank() {
                ctx.skip(sheet, row, value_col);
            }
            continue;
        };
        if vocabulary.is_material_label(label) {
            continue;
        }
        let Some(parsed) = values::parse_value(value_cell) else {
            if !value_cell.is_blank() {
                ctx.skip(sheet, row, value_col);
            }
            continue;
        };
        let unit_cell = block
            .unit_column
            .and_then(|col| file.cell(sheet, row, col).as_text());
        let property = ctx.raw_property(sheet, row, value_col, label, parsed, unit_cell);
        record.insert_raw(&vocabulary.key_for_label(label), property);
    }

    if record.raw_properties.is_empty() {
        return None;
    }
    record.material_name = material_row_name
        .unwrap_or_else(|| ctx.fallback_name(block.title.as_deref(), sheet, allow_sheet_name));
    Some(record)
}

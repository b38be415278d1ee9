//! generic_parser: 構造が判定できないファイル用
//!
//! 物性キーワードを含むセルの右隣の数値、その下に続く値の列、または
//! "Tensile strength: 48 MPa" のような1セル内の組を拾う。

use super::{Context, UNSPECIFIED_MATERIAL};
use crate::types::MaterialRecord;
use crate::values;

pub(crate) fn extract(ctx: &mut Context<'_>) -> Vec<MaterialRecord> {
    let file = ctx.file;
    let vocabulary = ctx.vocabulary;
    let mut record = ctx.new_record(UNSPECIFIED_MATERIAL);

    for sheet in 0..file.sheet_count() {
        let (height, width) = file.sheet_dimensions(sheet);
        for row in 0..height {
            for col in 0..width {
                let Some(text) = file.cell(sheet, row, col).as_text() else {
                    continue;
                };

                if let Some((label, value)) = text.split_once(':') {
                    if vocabulary.is_property_label(label) {
                        if let Some(parsed) = values::parse_text_value(value) {
                            let property = ctx.raw_property(sheet, row, col, label.trim(), parsed, None);
                            record.insert_raw(&vocabulary.key_for_label(label), property);
                            continue;
                        }
                    }
                }

                if !vocabulary.is_property_label(text) {
                    continue;
                }
                if let Some(parsed) = values::parse_value(file.cell(sheet, row, col + 1)) {
                    let property = ctx.raw_property(sheet, row, col + 1, text, parsed, None);
                    record.insert_raw(&vocabulary.key_for_label(text), property);
                    continue;
                }

                // 見出しの下に続く値。空白か次のラベルで止める
                let key = vocabulary.key_for_label(text);
                let mut first = true;
                for r in row + 1..height {
                    let cell = file.cell(sheet, r, col);
                    if cell.is_blank() || cell.as_text().map_or(false, |t| vocabulary.is_property_label(t)) {
                        break;
                    }
                    match values::parse_value(cell) {
                        Some(parsed) => {
                            let property = ctx.raw_property(sheet, r, col, text, parsed, None);
                            record.insert_raw(&key, property);
                        }
                        None if first => break,
                        None => ctx.skip(sheet, r, col),
                    }
                    first = false;
                }
            }
        }
    }

    if record.raw_properties.is_empty() {
        Vec::new()
    } else {
        vec![record]
    }
}

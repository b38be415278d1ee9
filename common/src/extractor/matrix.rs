//! matrix_parser: 複数シート・複数ブロック
//!
//! ブロックごとに縦型/表型を選んで読み、素材名で統合する。

use super::{merge_by_name, table, vertical, Context};
use crate::types::{MaterialRecord, Orientation};

pub(crate) fn extract(ctx: &mut Context<'_>) -> Vec<MaterialRecord> {
    let analysis = ctx.analysis;
    let mut records = Vec::new();
    for block in analysis.analyzable_blocks() {
        let single_value_column = block.value_columns.len() == 1;
        match block.orientation {
            Some(Orientation::PropertiesInRows) if single_value_column => {
                records.extend(vertical::extract_block(ctx, block, true));
            }
            _ => records.extend(table::extract_block(ctx, block, true)),
        }
    }
    merge_by_name(records)
}

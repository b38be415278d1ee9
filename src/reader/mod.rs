//! 表形式ファイルの読み込み
//!
//! Excel/ODS は calamine、CSV は区切り文字を推定して読み、
//! コアの `Workbook`（`TabularFile` 実装）に変換する。

mod csv;
mod excel;

pub use self::csv::{parse_csv, read_csv};
pub use self::excel::read_workbook;

use crate::error::{NormalizerError, Result};
use mtf_common::Workbook;
use std::path::Path;

/// 拡張子で読み分ける
pub fn open_tabular(path: &Path) -> Result<Workbook> {
    if !path.exists() {
        return Err(NormalizerError::FileNotFound(path.display().to_string()));
    }
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "csv" => read_csv(path),
        "xlsx" | "xlsm" | "xls" | "ods" => read_workbook(path),
        _ => Err(NormalizerError::UnreadableFile(format!(
            "{}: 未対応の形式です",
            path.display()
        ))),
    }
}

fn display_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().to_string())
}

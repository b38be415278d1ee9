//! CSV読み込み
//!
//! 区切り文字（`,` `;` タブ）は先頭の数レコードから推定する。
//! 引用符内の改行は1セルとして読む。空行はブロックの区切りなので行として残す。

use super::display_name;
use crate::error::Result;
use mtf_common::{Cell, Sheet, Workbook};
use std::path::Path;

const DELIMITERS: [u8; 3] = [b',', b';', b'\t'];
const SNIFF_RECORDS: usize = 10;

pub fn read_csv(path: &Path) -> Result<Workbook> {
    let bytes = std::fs::read(path)?;
    let content = String::from_utf8_lossy(&bytes);
    let sheet_name = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "csv".to_string());
    Ok(Workbook::single(display_name(path), parse_csv(&sheet_name, &content)))
}

fn reader(content: &str, delimiter: u8) -> ::csv::Reader<&[u8]> {
    ::csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(content.as_bytes())
}

/// CSV文字列を1シートに変換
pub fn parse_csv(sheet_name: &str, content: &str) -> Sheet {
    let content = content.trim_start_matches('\u{feff}');
    let delimiter = sniff_delimiter(content);

    let mut rows: Vec<Vec<Cell>> = Vec::new();
    // 直前のレコードが終わった行（1始まり）
    let mut last_line = 0u64;
    for record in reader(content, delimiter).records() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("{}: CSVレコードを読めません: {}", sheet_name, e);
                continue;
            }
        };
        let line = record.position().map_or(last_line + 1, |p| p.line());
        // 読み飛ばされた空行を空行として戻す
        for _ in last_line + 1..line {
            rows.push(Vec::new());
        }
        let embedded = record.iter().map(|f| f.matches('\n').count() as u64).sum::<u64>();
        last_line = line + embedded;
        rows.push(record.iter().map(|field| Cell::from_raw_text(field)).collect());
    }
    Sheet::new(sheet_name, rows)
}

/// 引用符の外にある区切り文字が最も多いものを採用
fn sniff_delimiter(content: &str) -> u8 {
    let mut best = (b',', 0usize);
    for delimiter in DELIMITERS {
        let count: usize = reader(content, delimiter)
            .records()
            .filter_map(|r| r.ok())
            .take(SNIFF_RECORDS)
            .map(|r| r.len().saturating_sub(1))
            .sum();
        if count > best.1 {
            best = (delimiter, count);
        }
    }
    best.0
}

//! レビュー用Excel生成
//!
//! - Materials: 物性1件につき1行（元の値・単位とSI値を並べる）
//! - Summary  : 投稿ごとの件数と品質内訳

use crate::error::{NormalizerError, Result};
use crate::output::PostDocument;
use mtf_common::{MaterialRecord, QualityRating};
use rust_xlsxwriter::*;
use std::path::Path;

const MATERIAL_HEADERS: [(&str, f64); 12] = [
    ("投稿", 36.0),
    ("ファイル識別子", 18.0),
    ("素材名", 20.0),
    ("品質", 8.0),
    ("戦略", 22.0),
    ("物性", 24.0),
    ("元ラベル", 24.0),
    ("セル", 12.0),
    ("元の値", 12.0),
    ("元の単位", 10.0),
    ("SI値", 16.0),
    ("SI単位", 10.0),
];

const SUMMARY_HEADERS: [(&str, f64); 7] = [
    ("投稿", 36.0),
    ("保存キー", 18.0),
    ("ファイル数", 10.0),
    ("素材数", 10.0),
    ("OK", 8.0),
    ("WARN", 8.0),
    ("RAW", 8.0),
];

pub fn generate_excel(documents: &[PostDocument], output_path: &Path) -> Result<()> {
    let buffer = generate_excel_buffer(documents)
        .map_err(NormalizerError::ExcelGeneration)?;
    std::fs::write(output_path, buffer)?;
    Ok(())
}

/// Excelをバッファに生成
pub fn generate_excel_buffer(documents: &[PostDocument]) -> std::result::Result<Vec<u8>, String> {
    let mut workbook = Workbook::new();

    let header_format = Format::new()
        .set_bold()
        .set_background_color(Color::RGB(0xF5F5F5))
        .set_border(FormatBorder::Thin)
        .set_border_color(Color::RGB(0xAAAAAA));
    let number_format = Format::new().set_num_format("0.######");
    let failed_format = Format::new().set_font_color(Color::RGB(0xC00000));

    // Materials シート
    let sheet = workbook.add_worksheet();
    sheet
        .set_name("Materials")
        .map_err(|e| format!("シート名設定エラー: {}", e))?;
    write_headers(sheet, &MATERIAL_HEADERS, &header_format)?;

    let mut row: u32 = 1;
    for document in documents {
        let source = document_label(document);
        for record in &document.materials {
            row = write_record(sheet, row, &source, record, &number_format, &failed_format)?;
        }
    }
    sheet
        .set_freeze_panes(1, 0)
        .map_err(|e| format!("ウィンドウ枠固定エラー: {}", e))?;

    // Summary シート
    let sheet = workbook.add_worksheet();
    sheet
        .set_name("Summary")
        .map_err(|e| format!("シート名設定エラー: {}", e))?;
    write_headers(sheet, &SUMMARY_HEADERS, &header_format)?;

    for (i, document) in documents.iter().enumerate() {
        let r = i as u32 + 1;
        let summary = &document.summary;
        sheet
            .write_string(r, 0, document_label(document))
            .and_then(|s| s.write_string(r, 1, &document.provenance.storage_key))
            .and_then(|s| s.write_number(r, 2, document.provenance.file_count as f64))
            .and_then(|s| s.write_number(r, 3, document.provenance.material_count as f64))
            .and_then(|s| s.write_number(r, 4, summary.count(QualityRating::Ok) as f64))
            .and_then(|s| s.write_number(r, 5, summary.count(QualityRating::Warn) as f64))
            .and_then(|s| s.write_number(r, 6, summary.count(QualityRating::Raw) as f64))
            .map_err(|e| format!("セル書き込みエラー: {}", e))?;
    }

    workbook
        .save_to_buffer()
        .map_err(|e| format!("Excel保存エラー: {}", e))
}

fn write_headers(
    sheet: &mut Worksheet,
    headers: &[(&str, f64)],
    format: &Format,
) -> std::result::Result<(), String> {
    for (col, (title, width)) in headers.iter().enumerate() {
        let col = col as u16;
        sheet
            .write_string_with_format(0, col, *title, format)
            .map_err(|e| format!("ヘッダー書き込みエラー: {}", e))?;
        sheet
            .set_column_width(col, *width)
            .map_err(|e| format!("列幅設定エラー: {}", e))?;
    }
    Ok(())
}

/// 1素材分の行を書き、次の行番号を返す
fn write_record(
    sheet: &mut Worksheet,
    mut row: u32,
    source: &str,
    record: &MaterialRecord,
    number_format: &Format,
    failed_format: &Format,
) -> std::result::Result<u32, String> {
    let err = |e: XlsxError| format!("セル書き込みエラー: {}", e);

    for (key, raw) in &record.raw_properties {
        sheet
            .write_string(row, 0, source)
            .and_then(|s| s.write_string(row, 1, short_id(&record.source_file_identifier)))
            .and_then(|s| s.write_string(row, 2, &record.material_name))
            .and_then(|s| s.write_string(row, 3, record.quality_rating.to_string()))
            .and_then(|s| s.write_string(row, 4, record.parsing_strategy_used.name()))
            .and_then(|s| s.write_string(row, 5, key))
            .and_then(|s| s.write_string(row, 6, &raw.label))
            .and_then(|s| s.write_string(row, 7, &raw.cell))
            .and_then(|s| s.write_number_with_format(row, 8, raw.value, number_format))
            .and_then(|s| s.write_string(row, 9, &raw.unit))
            .map_err(err)?;

        match (
            record.normalized_properties.get(key),
            record.conversion_failures.get(key),
        ) {
            (Some(si), _) => {
                sheet
                    .write_number_with_format(row, 10, si.value, number_format)
                    .and_then(|s| s.write_string(row, 11, &si.unit))
                    .map_err(err)?;
            }
            (None, Some(reason)) => {
                sheet
                    .write_string_with_format(row, 10, reason.to_string(), failed_format)
                    .map_err(err)?;
            }
            (None, None) => {}
        }
        row += 1;
    }
    Ok(row)
}

fn document_label(document: &PostDocument) -> String {
    document
        .provenance
        .source_url
        .clone()
        .or_else(|| document.files.first().map(|f| f.file_name.clone()))
        .unwrap_or_default()
}

fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::FileEntry;
    use crate::output::{build_documents, ProcessedFile};
    use chrono::{TimeZone, Utc};
    use mtf_common::types::RawProperty;
    use mtf_common::{FileOutcome, Pipeline, Strategy};
    use std::collections::BTreeMap;

    fn documents() -> Vec<PostDocument> {
        let pipeline = Pipeline::default();
        let mut record = MaterialRecord::new("PLA", "abcdef0123456789", Strategy::PropertyValueParser, 90);
        record.insert_raw(
            "tensile_strength",
            RawProperty {
                value: 45.0,
                unit: "MPa".into(),
                label: "Tensile Strength".into(),
                cell: "Sheet1!B1".into(),
            },
        );
        record.insert_raw(
            "density",
            RawProperty {
                value: 1.24,
                unit: "lbf/in2".into(),
                label: "Density".into(),
                cell: "Sheet1!B2".into(),
            },
        );
        let record = pipeline.normalize_record(record);

        let mut entry = FileEntry::new("pla.xlsx", "/in/pla.xlsx");
        entry.file_identifier = Some("abcdef0123456789".into());
        build_documents(
            vec![ProcessedFile {
                entry,
                outcome: Some(FileOutcome {
                    file_identifier: "abcdef0123456789".into(),
                    strategy_used: Strategy::PropertyValueParser,
                    records: vec![record],
                    skipped_cells: 0,
                    conversion_failures: BTreeMap::new(),
                }),
                error: None,
            }],
            &[],
            Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_generate_excel_buffer() {
        let buffer = generate_excel_buffer(&documents()).unwrap();
        // xlsx は zip
        assert_eq!(&buffer[..2], b"PK");
    }

    #[test]
    fn test_generate_excel_readable() {
        use calamine::{open_workbook_auto, Data, Reader};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("materials.xlsx");
        generate_excel(&documents(), &path).unwrap();

        let mut book = open_workbook_auto(&path).unwrap();
        assert_eq!(book.sheet_names(), vec!["Materials".to_string(), "Summary".to_string()]);

        let range = book.worksheet_range("Materials").unwrap();
        // ヘッダー + 物性2行
        assert_eq!(range.height(), 3);
        let keys: Vec<String> = (1..3)
            .map(|r| match range.get((r, 5)) {
                Some(Data::String(s)) => s.clone(),
                other => panic!("unexpected cell {:?}", other),
            })
            .collect();
        assert_eq!(keys, vec!["density".to_string(), "tensile_strength".to_string()]);
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("abcdef0123456789"), "abcdef012345");
        assert_eq!(short_id("abc"), "abc");
    }
}

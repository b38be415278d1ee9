//! Excel/ODS読み込み（calamine）

use super::display_name;
use crate::error::{NormalizerError, Result};
use calamine::{open_workbook_auto, Data, Range, Reader};
use mtf_common::{Cell, Sheet, Workbook};
use std::path::Path;

pub fn read_workbook(path: &Path) -> Result<Workbook> {
    let unreadable = |e: calamine::Error| {
        NormalizerError::UnreadableFile(format!("{}: {}", path.display(), e))
    };

    let mut book = open_workbook_auto(path).map_err(unreadable)?;
    let names = book.sheet_names();

    let mut sheets = Vec::with_capacity(names.len());
    for name in names {
        let range = book.worksheet_range(&name).map_err(unreadable)?;
        sheets.push(sheet_from_range(&name, &range));
    }

    Ok(Workbook::new(display_name(path), sheets))
}

/// シート範囲を絶対位置のまま `Sheet` に変換
fn sheet_from_range(name: &str, range: &Range<Data>) -> Sheet {
    let Some((row0, col0)) = range.start() else {
        return Sheet::new(name, Vec::new());
    };

    let mut rows: Vec<Vec<Cell>> = vec![Vec::new(); row0 as usize];
    for row in range.rows() {
        let mut cells = vec![Cell::Empty; col0 as usize];
        cells.extend(row.iter().map(convert_cell));
        rows.push(cells);
    }
    Sheet::new(name, rows)
}

fn convert_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) if s.trim().is_empty() => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => Cell::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(e) => Cell::Text(format!("#{:?}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_cell() {
        assert_eq!(convert_cell(&Data::Int(3)), Cell::Number(3.0));
        assert_eq!(convert_cell(&Data::Float(1.24)), Cell::Number(1.24));
        assert_eq!(convert_cell(&Data::String("  ".into())), Cell::Empty);
        assert_eq!(
            convert_cell(&Data::String("45 MPa".into())),
            Cell::Text("45 MPa".into())
        );
        assert_eq!(convert_cell(&Data::Bool(true)), Cell::Bool(true));
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        let result = read_workbook(Path::new("/nonexistent/book.xlsx"));
        assert!(matches!(result, Err(NormalizerError::UnreadableFile(_))));
    }
}

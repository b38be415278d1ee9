//! 表形式ファイルの抽象ハンドル
//!
//! Excel/CSVリーダーはオーケストレーション側でこの形に変換する。
//! コアはシート列挙と (sheet, row, col) によるセル参照だけを使う。

use serde::{Deserialize, Serialize};

/// セル値
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Cell {
    /// 空白のみの文字列も空セル扱い
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// トリム済みテキスト（文字列セルのみ）
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed)
                }
            }
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) if n.is_finite() => Some(*n),
            _ => None,
        }
    }

    /// 表示用文字列
    pub fn display(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.trim().to_string(),
            Cell::Number(n) => n.to_string(),
            Cell::Bool(b) => b.to_string(),
        }
    }
}

static EMPTY: Cell = Cell::Empty;

/// シート列挙とセル参照を提供する表形式ファイル
pub trait TabularFile {
    /// 元ファイル名などのメタデータ（素材名の推定に使用）
    fn display_name(&self) -> Option<&str> {
        None
    }

    fn sheet_names(&self) -> Vec<String>;

    /// (行数, 列数)
    fn sheet_dimensions(&self, sheet: usize) -> (usize, usize);

    /// 範囲外は `Cell::Empty`
    fn cell(&self, sheet: usize, row: usize, col: usize) -> &Cell;

    fn sheet_count(&self) -> usize {
        self.sheet_names().len()
    }

    /// 行がすべて空白か
    fn is_blank_row(&self, sheet: usize, row: usize) -> bool {
        let (_, width) = self.sheet_dimensions(sheet);
        (0..width).all(|col| self.cell(sheet, row, col).is_blank())
    }
}

/// メモリ上のシート
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    /// 文字列グリッドから作成（数値に見える文字列は数値セルになる）
    pub fn from_strings(name: impl Into<String>, rows: &[&[&str]]) -> Self {
        let rows = rows
            .iter()
            .map(|row| row.iter().map(|s| Cell::from_raw_text(s)).collect())
            .collect();
        Self::new(name, rows)
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.rows.iter().map(|r| r.len()).max().unwrap_or(0)
    }
}

impl Cell {
    /// CSV等の生文字列からセルを作る
    pub fn from_raw_text(raw: &str) -> Cell {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Cell::Empty;
        }
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => Cell::Number(n),
            _ => Cell::Text(trimmed.to_string()),
        }
    }
}

/// メモリ上のワークブック
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workbook {
    pub name: Option<String>,
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new(name: Option<String>, sheets: Vec<Sheet>) -> Self {
        Self { name, sheets }
    }

    pub fn single(name: Option<String>, sheet: Sheet) -> Self {
        Self::new(name, vec![sheet])
    }
}

impl TabularFile for Workbook {
    fn display_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    fn sheet_dimensions(&self, sheet: usize) -> (usize, usize) {
        self.sheets
            .get(sheet)
            .map(|s| (s.height(), s.width()))
            .unwrap_or((0, 0))
    }

    fn cell(&self, sheet: usize, row: usize, col: usize) -> &Cell {
        self.sheets
            .get(sheet)
            .and_then(|s| s.rows.get(row))
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY)
    }

    fn sheet_count(&self) -> usize {
        self.sheets.len()
    }
}

/// 列番号 → 列記号（0 → A, 26 → AA）
pub fn column_letter(col: usize) -> String {
    let mut n = col + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// `Sheet1!B3` 形式のセル参照
pub fn cell_ref(sheet_name: &str, row: usize, col: usize) -> String {
    format!("{}!{}{}", sheet_name, column_letter(col), row + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_letter() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(27), "AB");
        assert_eq!(column_letter(701), "ZZ");
        assert_eq!(column_letter(702), "AAA");
    }

    #[test]
    fn test_cell_ref() {
        assert_eq!(cell_ref("Data", 2, 1), "Data!B3");
    }

    #[test]
    fn test_out_of_range_is_empty() {
        let wb = Workbook::single(None, Sheet::from_strings("S", &[&["a", "1"]]));
        assert_eq!(wb.cell(0, 5, 5), &Cell::Empty);
        assert_eq!(wb.cell(3, 0, 0), &Cell::Empty);
        assert_eq!(wb.sheet_dimensions(3), (0, 0));
    }

    #[test]
    fn test_from_raw_text() {
        assert_eq!(Cell::from_raw_text(" 12.5 "), Cell::Number(12.5));
        assert_eq!(Cell::from_raw_text("45 MPa"), Cell::Text("45 MPa".into()));
        assert_eq!(Cell::from_raw_text("   "), Cell::Empty);
    }

    #[test]
    fn test_blank_row() {
        let wb = Workbook::single(
            None,
            Sheet::new(
                "S",
                vec![
                    vec![Cell::Text("x".into())],
                    vec![Cell::Text("  ".into()), Cell::Empty],
                ],
            ),
        );
        assert!(!wb.is_blank_row(0, 0));
        assert!(wb.is_blank_row(0, 1));
    }
}

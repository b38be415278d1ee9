//! エラー型定義
//!
//! - `Error`: 語彙・設定ファイル読み込みの失敗
//! - `ConversionFailure`: 値/単位ペアをSIへ変換できない（ローカルで回復）
//! - `ExtractionFailure`: 抽出に必要なセル範囲へアクセスできない（該当ファイルのみ0件）

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 共通エラー型
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Vocabulary error: {0}")]
    Vocabulary(String),
}

/// Result型エイリアス
pub type Result<T> = std::result::Result<T, Error>;

/// 単位変換の失敗理由
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionFailure {
    /// 単位表に存在しないトークン
    #[error("unrecognized unit")]
    UnrecognizedUnit,
    /// 単位は既知だが要求された物理量と一致しない
    #[error("unit kind mismatch")]
    UnitKindMismatch,
}

/// 抽出の失敗
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionFailure {
    #[error("unreadable file: {0}")]
    UnreadableFile(String),
}

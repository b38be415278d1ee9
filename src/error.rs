use thiserror::Error;

#[derive(Error, Debug)]
pub enum NormalizerError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("フォルダが見つかりません: {0}")]
    FolderNotFound(String),

    #[error("ファイルを読み込めません: {0}")]
    UnreadableFile(String),

    #[error("スプレッドシートが見つかりません: {0}")]
    NoSpreadsheetsFound(String),

    #[error("探索結果が見つかりません（先に `mtf discover` を実行してください）: {0}")]
    DiscoveryNotFound(String),

    #[error("Excel生成エラー: {0}")]
    ExcelGeneration(String),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] mtf_common::Error),
}

pub type Result<T> = std::result::Result<T, NormalizerError>;

//! 素材スプレッドシート正規化ツール（CLI・I/O層）
//!
//! 解析・抽出・変換の本体は `mtf_common`。ここではファイル走査、
//! Excel/CSV の読み込み、成果物の保存、並列実行を扱う。

pub mod cli;
pub mod config;
pub mod discovery;
pub mod error;
pub mod export;
pub mod output;
pub mod reader;
pub mod runner;
pub mod scanner;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mtf")]
#[command(about = "素材スプレッドシートの構造解析・SI正規化ツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// 並列ワーカー数（デフォルト: 設定ファイル → CPU数）
    #[arg(short = 'j', long, global = true)]
    pub workers: Option<usize>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 入力フォルダを構造解析してディスカバリーレポートを作る
    Discover {
        /// スプレッドシートのフォルダ
        #[arg(required = true)]
        input: PathBuf,

        /// ディスカバリー出力ディレクトリ
        #[arg(short, long, default_value = "discovery")]
        output: PathBuf,

        /// 取得元マニフェスト（デフォルト: 入力フォルダ/manifest.json）
        #[arg(short, long)]
        manifest: Option<PathBuf>,

        /// 既存のレポートに追記する
        #[arg(long)]
        extend: bool,

        /// キャッシュを使用（同じ内容のファイルは再解析しない）
        #[arg(long)]
        use_cache: bool,
    },

    /// ディスカバリー結果に従って抽出・SI正規化する
    Normalize {
        /// ディスカバリーディレクトリ
        #[arg(short, long, default_value = "discovery")]
        discovery: PathBuf,

        /// 出力ディレクトリ
        #[arg(short, long, default_value = "processed")]
        output: PathBuf,
    },

    /// discover → normalize を一括実行
    Run {
        /// スプレッドシートのフォルダ
        #[arg(required = true)]
        input: PathBuf,

        /// 出力ディレクトリ（discovery/ と processed/ を作る）
        #[arg(short, long, default_value = "out")]
        output: PathBuf,
    },

    /// ディスカバリーレポートの概要を表示
    Report {
        /// ディスカバリーディレクトリ
        #[arg(short, long, default_value = "discovery")]
        discovery: PathBuf,
    },

    /// 正規化結果からレビュー用Excelを生成
    Export {
        /// 正規化結果ディレクトリ
        #[arg(required = true)]
        processed: PathBuf,

        /// 出力Excelファイル
        #[arg(short, long, default_value = "materials.xlsx")]
        output: PathBuf,
    },

    /// 設定を表示・初期化
    Config {
        /// 現在の設定を表示
        #[arg(long)]
        show: bool,

        /// デフォルト設定ファイルを書き出す
        #[arg(long)]
        init: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_discover() {
        let cli = Cli::parse_from(["mtf", "discover", "in", "--extend", "-j", "4"]);
        assert_eq!(cli.workers, Some(4));
        match cli.command {
            Commands::Discover { input, output, extend, use_cache, manifest } => {
                assert_eq!(input, PathBuf::from("in"));
                assert_eq!(output, PathBuf::from("discovery"));
                assert!(extend);
                assert!(!use_cache);
                assert!(manifest.is_none());
            }
            _ => panic!("expected discover"),
        }
    }
}

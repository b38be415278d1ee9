use anyhow::Result;
use clap::Parser;
use mtf_common::{LayoutClassification, Pipeline, QualityRating};
use mtf_normalizer::cli::{Cli, Commands};
use mtf_normalizer::config::Config;
use mtf_normalizer::discovery::DiscoveryDir;
use mtf_normalizer::runner::{self, DiscoverOptions, RunOptions};
use mtf_normalizer::{export, output};
use tracing::error;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli) {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let run_options = RunOptions {
        workers: config.worker_count(cli.workers),
        show_progress: true,
    };

    match cli.command {
        Commands::Discover { input, output, manifest, extend, use_cache } => {
            println!("🔎 mtf - 構造解析\n");
            let pipeline = Pipeline::new(config.load_vocabulary()?, config.pipeline);

            println!("[1/2] スプレッドシートを解析中...{}", if use_cache { " (キャッシュ有効)" } else { "" });
            let dir = DiscoveryDir::create(&output)?;
            let options = DiscoverOptions { manifest, extend, use_cache };
            let summary = runner::discover(&pipeline, &input, &dir, &options, run_options)?;
            println!(
                "✔ {}件を解析（キャッシュ {}件 / 読み込み失敗 {}件 / 重複 {}件）\n",
                summary.analyzed, summary.cache_hits, summary.unreadable, summary.duplicates
            );

            println!("[2/2] パターン集約");
            print_frequencies(&summary.report);
            println!("\n✅ 保存先: {}", dir.path().display());
        }

        Commands::Normalize { discovery, output } => {
            println!("🧪 mtf - 抽出・SI正規化\n");
            let pipeline = Pipeline::new(config.load_vocabulary()?, config.pipeline);

            println!("[1/1] 抽出・正規化中...");
            let summary = runner::normalize(&pipeline, &DiscoveryDir::new(&discovery), &output, run_options)?;
            print_normalize_summary(&summary);
            println!("\n✅ 保存先: {}", output.display());
        }

        Commands::Run { input, output } => {
            println!("🚀 mtf - 一括処理\n");
            let pipeline = Pipeline::new(config.load_vocabulary()?, config.pipeline);
            let dir = DiscoveryDir::create(output.join("discovery"))?;
            let processed = output.join("processed");

            println!("[1/2] 構造解析中...");
            let summary = runner::discover(&pipeline, &input, &dir, &DiscoverOptions::default(), run_options)?;
            println!(
                "✔ {}件を解析（読み込み失敗 {}件 / 重複 {}件）",
                summary.analyzed, summary.unreadable, summary.duplicates
            );
            print_frequencies(&summary.report);

            println!("\n[2/2] 抽出・正規化中...");
            let summary = runner::normalize(&pipeline, &dir, &processed, run_options)?;
            print_normalize_summary(&summary);
            println!("\n✅ 完了: {}", output.display());
        }

        Commands::Report { discovery } => {
            let report = DiscoveryDir::new(&discovery).load_report()?;
            println!("ディスカバリーレポート:");
            println!("  ファイル数: {}", report.total_files);
            println!("  語彙バージョン: {}", report.vocabulary_version);
            println!("  生成日時: {}", report.generation_timestamp.to_rfc3339());
            println!("\nレイアウト別:");
            print_frequencies(&report);
            println!("\nヘッダー表記:");
            for (key, labels) in &report.column_synonyms {
                let labels: Vec<&str> = labels.iter().map(String::as_str).collect();
                println!("  {}: {}", key, labels.join(", "));
            }
            if !report.unmatched_headers.is_empty() {
                println!("\n語彙にないヘッダー ({}件):", report.unmatched_headers.len());
                for header in &report.unmatched_headers {
                    println!("  - {}", header);
                }
            }
        }

        Commands::Export { processed, output } => {
            println!("📄 mtf - エクスポート\n");
            println!("- Excelを生成中...");
            let (path, materials) = export::export_materials(&processed, &output)?;
            println!("✔ {}素材を出力: {}", materials, path.display());
        }

        Commands::Config { show, init } => {
            if init {
                let path = Config::config_path()?;
                if path.exists() {
                    println!("設定ファイルは既に存在します: {}", path.display());
                } else {
                    let path = Config::default().save()?;
                    println!("✔ 設定ファイルを作成しました: {}", path.display());
                }
            }
            if show || !init {
                println!("設定:");
                println!("  パス: {}", Config::config_path()?.display());
                println!(
                    "  語彙: {}",
                    config
                        .vocabulary_source()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "組み込み".to_string())
                );
                println!("  ワーカー数: {}", config.worker_count(cli.workers));
                println!("{}", serde_json::to_string_pretty(&config.pipeline)?);
            }
        }
    }

    Ok(())
}

fn print_frequencies(report: &mtf_common::DiscoveryReport) {
    for layout in LayoutClassification::ALL {
        let count = report.frequency(layout);
        if count > 0 {
            println!("  {:<26} {:>4}件 → {}", layout.to_string(), count, report.strategy_for(layout));
        }
    }
}

fn print_normalize_summary(summary: &runner::NormalizeSummary) {
    let totals: output::Summary = summary.totals();
    println!(
        "✔ {}ファイル → {}素材（失敗 {}ファイル）",
        summary.processed_files,
        summary.material_count(),
        summary.failed_files
    );
    println!(
        "  品質: OK {} / WARN {} / RAW {}",
        totals.count(QualityRating::Ok),
        totals.count(QualityRating::Warn),
        totals.count(QualityRating::Raw)
    );
    println!(
        "  物性: {}件中 {}件をSI変換",
        totals.raw_property_count, totals.normalized_property_count
    );
    for (reason, count) in &totals.conversion_failures {
        println!("  変換失敗 ({}): {}件", reason, count);
    }
    println!("  出力: {}ファイル", summary.written.len());
}

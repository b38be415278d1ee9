//! バッチ実行
//!
//! ファイル単位の解析・抽出は rayon のワーカープールで並列に行い、
//! 集約（DiscoveryReport の構築）は並列処理の後に1回だけ行う。

use crate::discovery::{merge_file_entries, AnalysisCache, DiscoveryDir, FileEntry};
use crate::error::{NormalizerError, Result};
use crate::output::{self, PostDocument, ProcessedFile};
use crate::reader;
use crate::scanner::{self, Manifest, SpreadsheetInfo};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use mtf_common::{DiscoveryReport, Pipeline, StructureAnalysis};
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// 実行時の共通設定
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub workers: usize,
    pub show_progress: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            workers: 1,
            show_progress: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DiscoverOptions {
    pub manifest: Option<PathBuf>,
    /// 既存レポートに追記する
    pub extend: bool,
    /// 同じ内容のファイルは前回の解析結果を使う
    pub use_cache: bool,
}

#[derive(Debug, Clone)]
pub struct DiscoverSummary {
    pub files: Vec<FileEntry>,
    pub report: DiscoveryReport,
    pub analyzed: usize,
    pub cache_hits: usize,
    pub unreadable: usize,
    /// 内容が同じで集約・抽出から外したファイル数
    pub duplicates: usize,
}

#[derive(Debug, Clone)]
pub struct NormalizeSummary {
    pub documents: Vec<PostDocument>,
    pub written: Vec<PathBuf>,
    pub processed_files: usize,
    pub failed_files: usize,
}

impl NormalizeSummary {
    pub fn material_count(&self) -> usize {
        self.documents.iter().map(|d| d.materials.len()).sum()
    }

    pub fn totals(&self) -> output::Summary {
        let mut total = output::Summary::default();
        for document in &self.documents {
            total.merge(&document.summary);
        }
        total
    }
}

struct Discovered {
    entry: FileEntry,
    analysis: Option<StructureAnalysis>,
    cached: bool,
}

fn progress_bar(len: usize, show: bool) -> Result<ProgressBar> {
    if !show {
        return Ok(ProgressBar::hidden());
    }
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")
            .map_err(|e| NormalizerError::Config(format!("進捗表示の設定エラー: {}", e)))?
            .progress_chars("=> "),
    );
    Ok(pb)
}

fn thread_pool(workers: usize) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()
        .map_err(|e| NormalizerError::Config(format!("ワーカープールを作成できません: {}", e)))
}

/// Phase 1: 入力フォルダを走査・解析し、ディスカバリーディレクトリに保存する
pub fn discover(
    pipeline: &Pipeline,
    input: &Path,
    dir: &DiscoveryDir,
    options: &DiscoverOptions,
    run: RunOptions,
) -> Result<DiscoverSummary> {
    let files = scanner::scan_folder(input)?;
    if files.is_empty() {
        return Err(NormalizerError::NoSpreadsheetsFound(input.display().to_string()));
    }
    tracing::info!("{} spreadsheet(s) in {}", files.len(), input.display());

    let manifest = Manifest::locate(options.manifest.as_deref(), input)?;
    let vocabulary_version = pipeline.vocabulary().version;
    let mut cache = dir.load_cache(vocabulary_version);

    let pb = progress_bar(files.len(), run.show_progress)?;
    let pool = thread_pool(run.workers)?;
    let lookup = if options.use_cache { Some(&cache) } else { None };

    let discovered: Vec<Discovered> = pool.install(|| {
        files
            .par_iter()
            .map(|info| {
                let result = discover_file(pipeline, info, &manifest, lookup);
                pb.inc(1);
                result
            })
            .collect()
    });
    pb.finish_and_clear();

    let mut analyses = Vec::new();
    let mut entries = Vec::with_capacity(discovered.len());
    let mut cache_hits = 0;
    let mut unreadable = 0;
    let mut duplicates = 0;
    // 走査順で最初のファイルを残す
    let mut seen: HashMap<String, String> = HashMap::new();
    for mut item in discovered {
        if item.cached {
            cache_hits += 1;
        }
        match item.analysis {
            Some(analysis) => match seen.get(&analysis.file_identifier) {
                Some(first) => {
                    tracing::info!(file = %item.entry.file_name, first = %first, "duplicate content, skipped");
                    item.entry.duplicate_of = Some(first.clone());
                    duplicates += 1;
                }
                None => {
                    seen.insert(analysis.file_identifier.clone(), item.entry.file_name.clone());
                    cache.insert(item.entry.file_name.clone(), item.entry.file_size, analysis.clone());
                    analyses.push(analysis);
                }
            },
            None => unreadable += 1,
        }
        entries.push(item.entry);
    }

    let previous = if options.extend { dir.find_report()? } else { None };
    let report = pipeline.aggregate(&analyses, previous.as_ref(), Utc::now());

    let (entries, posts) = if options.extend {
        let mut posts = dir.load_posts()?;
        for post in &manifest.posts {
            if !posts.iter().any(|p| p.url == post.url) {
                posts.push(post.clone());
            }
        }
        (merge_file_entries(dir.load_files()?, entries), posts)
    } else {
        (entries, manifest.posts.clone())
    };

    dir.save_report(&report)?;
    dir.save_files(&entries)?;
    dir.save_posts(&posts)?;
    dir.save_cache(&cache)?;

    tracing::info!(
        "discovery: {} analysed, {} from cache, {} unreadable, {} duplicate",
        analyses.len(),
        cache_hits,
        unreadable,
        duplicates
    );

    Ok(DiscoverSummary {
        files: entries,
        report,
        analyzed: analyses.len(),
        cache_hits,
        unreadable,
        duplicates,
    })
}

fn discover_file(
    pipeline: &Pipeline,
    info: &SpreadsheetInfo,
    manifest: &Manifest,
    cache: Option<&AnalysisCache>,
) -> Discovered {
    let mut entry = FileEntry::new(&info.file_name, &info.path)
        .with_source(manifest.source_for(&info.file_name));

    match analyze_path(pipeline, &info.path, cache) {
        Ok((analysis, size, cached)) => {
            entry.file_identifier = Some(analysis.file_identifier.clone());
            entry.file_size = size;
            entry.layout = Some(analysis.layout_classification);
            entry.confidence = Some(analysis.confidence_score);
            Discovered {
                entry,
                analysis: Some(analysis),
                cached,
            }
        }
        Err(e) => {
            tracing::warn!(file = %info.file_name, error = %e, "skipping unreadable file");
            entry.error = Some(e.to_string());
            Discovered {
                entry,
                analysis: None,
                cached: false,
            }
        }
    }
}

/// ハッシュ計算 → キャッシュ参照 → 読み込み・解析
fn analyze_path(
    pipeline: &Pipeline,
    path: &Path,
    cache: Option<&AnalysisCache>,
) -> Result<(StructureAnalysis, u64, bool)> {
    let bytes = std::fs::read(path)?;
    let size = bytes.len() as u64;
    let file_identifier = scanner::hash_bytes(&bytes);

    if let Some(analysis) = cache.and_then(|c| c.get(&file_identifier)) {
        tracing::debug!("cache hit: {}", path.display());
        return Ok((analysis.clone(), size, true));
    }

    let workbook = reader::open_tabular(path)?;
    Ok((pipeline.analyze(&workbook, &file_identifier), size, false))
}

/// Phase 2: ディスカバリー結果に従って抽出・正規化し、投稿ごとに書き出す
pub fn normalize(
    pipeline: &Pipeline,
    dir: &DiscoveryDir,
    output_dir: &Path,
    run: RunOptions,
) -> Result<NormalizeSummary> {
    let report = dir.load_report()?;
    let entries: Vec<FileEntry> = dir
        .load_files()?
        .into_iter()
        .filter(|entry| !entry.is_duplicate())
        .collect();
    let posts = dir.load_posts()?;
    let cache = dir.load_cache(pipeline.vocabulary().version);

    let pb = progress_bar(entries.len(), run.show_progress)?;
    let pool = thread_pool(run.workers)?;

    let processed: Vec<ProcessedFile> = pool.install(|| {
        entries
            .par_iter()
            .map(|entry| {
                let result = normalize_file(pipeline, entry, &report, &cache);
                pb.inc(1);
                result
            })
            .collect()
    });
    pb.finish_and_clear();

    let failed_files = processed.iter().filter(|p| p.outcome.is_none()).count();
    let processed_files = processed.len() - failed_files;

    let documents = output::build_documents(processed, &posts, Utc::now());
    let written = output::write_documents(&documents, output_dir)?;

    tracing::info!(
        "normalize: {} file(s), {} failed, {} document(s)",
        processed_files,
        failed_files,
        documents.len()
    );

    Ok(NormalizeSummary {
        documents,
        written,
        processed_files,
        failed_files,
    })
}

fn normalize_file(
    pipeline: &Pipeline,
    entry: &FileEntry,
    report: &DiscoveryReport,
    cache: &AnalysisCache,
) -> ProcessedFile {
    let failed = |error: String| ProcessedFile {
        entry: entry.clone(),
        outcome: None,
        error: Some(error),
    };

    if let Some(error) = &entry.error {
        return failed(error.clone());
    }

    let workbook = match reader::open_tabular(&entry.path) {
        Ok(workbook) => workbook,
        Err(e) => {
            tracing::warn!(file = %entry.file_name, error = %e, "skipping unreadable file");
            return failed(e.to_string());
        }
    };

    // 解析後にファイルが差し替わっていれば再解析する
    let current_id = match scanner::compute_file_hash(&entry.path) {
        Ok(id) => id,
        Err(e) => return failed(e.to_string()),
    };
    let analysis = match cache.get(&current_id) {
        Some(analysis) if entry.file_identifier.as_deref() == Some(current_id.as_str()) => {
            analysis.clone()
        }
        _ => {
            tracing::warn!(file = %entry.file_name, "no matching analysis, re-analysing");
            pipeline.analyze(&workbook, &current_id)
        }
    };

    let mut entry = entry.clone();
    entry.file_identifier = Some(current_id);
    entry.layout = Some(analysis.layout_classification);
    entry.confidence = Some(analysis.confidence_score);

    match pipeline.process_file(&workbook, &analysis, Some(report)) {
        Ok(outcome) => {
            tracing::debug!(
                file = %entry.file_name,
                strategy = %outcome.strategy_used,
                records = outcome.records.len(),
                "extracted"
            );
            ProcessedFile {
                entry,
                outcome: Some(outcome),
                error: None,
            }
        }
        Err(e) => {
            tracing::warn!(file = %entry.file_name, error = %e, "extraction failed");
            ProcessedFile {
                entry,
                outcome: None,
                error: Some(e.to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discover_empty_folder_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let discovery = DiscoveryDir::create(dir.path().join("d")).unwrap();
        let result = discover(
            &Pipeline::default(),
            dir.path(),
            &discovery,
            &DiscoverOptions::default(),
            RunOptions::default(),
        );
        assert!(matches!(result, Err(NormalizerError::NoSpreadsheetsFound(_))));
    }

    #[test]
    fn test_normalize_without_discovery_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = normalize(
            &Pipeline::default(),
            &DiscoveryDir::new(dir.path()),
            &dir.path().join("out"),
            RunOptions::default(),
        );
        assert!(matches!(result, Err(NormalizerError::DiscoveryNotFound(_))));
    }
}

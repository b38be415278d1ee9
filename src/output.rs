//! 投稿単位の出力ドキュメント
//!
//! ファイルを `source_post_url` でまとめ（投稿が無いファイルは単独）、
//! 投稿メタデータ・素材レコード・来歴・集計を1つのJSONにして
//! `<storage_key>.json` として書き出す。

use crate::discovery::FileEntry;
use crate::error::Result;
use crate::scanner::{storage_key, PostEntry};
use chrono::{DateTime, Utc};
use mtf_common::{
    ConversionFailure, FileOutcome, LayoutClassification, MaterialRecord, QualityRating, Strategy,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 1ファイルの処理結果（読めなかった場合は outcome なし）
#[derive(Debug, Clone)]
pub struct ProcessedFile {
    pub entry: FileEntry,
    pub outcome: Option<FileOutcome>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostDocument {
    /// マニフェストの投稿メタデータ（そのまま）
    pub post: Option<PostEntry>,
    pub files: Vec<FileSummary>,
    pub materials: Vec<MaterialRecord>,
    pub provenance: Provenance,
    pub summary: Summary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSummary {
    pub file_name: String,
    pub file_identifier: Option<String>,
    pub url: Option<String>,
    pub download_timestamp: Option<String>,
    pub layout: Option<LayoutClassification>,
    pub strategy_used: Option<Strategy>,
    pub material_count: usize,
    pub skipped_cells: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    /// 投稿URL（投稿が無ければファイルの取得元URL）
    pub source_url: Option<String>,
    pub download_timestamp: Option<String>,
    pub storage_key: String,
    pub sha256_hashes: Vec<String>,
    pub generated_at: DateTime<Utc>,
    pub file_count: usize,
    pub material_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub materials_by_quality: BTreeMap<QualityRating, usize>,
    pub raw_property_count: usize,
    pub normalized_property_count: usize,
    pub conversion_failures: BTreeMap<ConversionFailure, usize>,
    pub skipped_cells: usize,
}

impl Summary {
    fn add_outcome(&mut self, outcome: &FileOutcome) {
        for record in &outcome.records {
            *self.materials_by_quality.entry(record.quality_rating).or_insert(0) += 1;
            self.raw_property_count += record.raw_properties.len();
            self.normalized_property_count += record.normalized_properties.len();
        }
        for (reason, count) in &outcome.conversion_failures {
            *self.conversion_failures.entry(*reason).or_insert(0) += count;
        }
        self.skipped_cells += outcome.skipped_cells;
    }

    pub fn count(&self, rating: QualityRating) -> usize {
        self.materials_by_quality.get(&rating).copied().unwrap_or(0)
    }

    /// 複数ドキュメントの集計を合算
    pub fn merge(&mut self, other: &Summary) {
        for (rating, count) in &other.materials_by_quality {
            *self.materials_by_quality.entry(*rating).or_insert(0) += count;
        }
        for (reason, count) in &other.conversion_failures {
            *self.conversion_failures.entry(*reason).or_insert(0) += count;
        }
        self.raw_property_count += other.raw_property_count;
        self.normalized_property_count += other.normalized_property_count;
        self.skipped_cells += other.skipped_cells;
    }
}

/// グループキー: 投稿URL → ファイル識別子 → ファイル名
fn grouping_key(entry: &FileEntry) -> String {
    entry
        .source_post_url
        .clone()
        .or_else(|| entry.file_identifier.clone())
        .unwrap_or_else(|| entry.file_name.clone())
}

/// 処理結果を投稿ごとのドキュメントにまとめる（初出順）
pub fn build_documents(
    processed: Vec<ProcessedFile>,
    posts: &[PostEntry],
    generated_at: DateTime<Utc>,
) -> Vec<PostDocument> {
    let mut groups: Vec<(String, Vec<ProcessedFile>)> = Vec::new();
    for file in processed {
        let key = grouping_key(&file.entry);
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, files)) => files.push(file),
            None => groups.push((key, vec![file])),
        }
    }

    groups
        .into_iter()
        .map(|(key, files)| build_document(&key, files, posts, generated_at))
        .collect()
}

fn build_document(
    key: &str,
    files: Vec<ProcessedFile>,
    posts: &[PostEntry],
    generated_at: DateTime<Utc>,
) -> PostDocument {
    let first = &files[0].entry;
    let post_url = first.source_post_url.clone();
    let post = post_url.as_deref().map(|url| {
        posts
            .iter()
            .find(|p| p.url == url)
            .cloned()
            .unwrap_or_else(|| PostEntry {
                url: url.to_string(),
                metadata: serde_json::Map::new(),
            })
    });
    let source_url = post_url.or_else(|| first.url.clone());
    let download_timestamp = files
        .iter()
        .filter_map(|f| f.entry.download_timestamp.clone())
        .max();

    let mut summary = Summary::default();
    let mut materials = Vec::new();
    let mut summaries = Vec::with_capacity(files.len());
    let mut hashes = Vec::new();

    for file in files {
        if let Some(id) = &file.entry.file_identifier {
            hashes.push(id.clone());
        }
        let (strategy_used, material_count, skipped_cells) = match &file.outcome {
            Some(outcome) => {
                summary.add_outcome(outcome);
                (
                    Some(outcome.strategy_used),
                    outcome.records.len(),
                    outcome.skipped_cells,
                )
            }
            None => (None, 0, 0),
        };
        summaries.push(FileSummary {
            file_name: file.entry.file_name.clone(),
            file_identifier: file.entry.file_identifier.clone(),
            url: file.entry.url.clone(),
            download_timestamp: file.entry.download_timestamp.clone(),
            layout: file.entry.layout,
            strategy_used,
            material_count,
            skipped_cells,
            error: file.error.clone().or_else(|| file.entry.error.clone()),
        });
        if let Some(outcome) = file.outcome {
            materials.extend(outcome.records);
        }
    }

    PostDocument {
        post,
        provenance: Provenance {
            source_url,
            download_timestamp,
            storage_key: storage_key(key),
            sha256_hashes: hashes,
            generated_at,
            file_count: summaries.len(),
            material_count: materials.len(),
        },
        files: summaries,
        materials,
        summary,
    }
}

/// ドキュメントを `<storage_key>.json` として書き出す
pub fn write_documents(documents: &[PostDocument], output_dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)?;

    let mut paths = Vec::with_capacity(documents.len());
    for document in documents {
        let path = output_dir.join(format!("{}.json", document.provenance.storage_key));
        let json = serde_json::to_string_pretty(document)?;
        std::fs::write(&path, json)?;
        paths.push(path);
    }
    Ok(paths)
}

/// 出力ディレクトリのドキュメントを読む（形式の違うJSONは飛ばす）
pub fn load_documents(output_dir: &Path) -> Result<Vec<PostDocument>> {
    let mut documents = Vec::new();

    for entry in WalkDir::new(output_dir)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        let is_json = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if !path.is_file() || !is_json {
            continue;
        }

        let content = std::fs::read_to_string(path)?;
        match serde_json::from_str::<PostDocument>(&content) {
            Ok(document) => documents.push(document),
            Err(e) => tracing::debug!("skip {}: {}", path.display(), e),
        }
    }

    Ok(documents)
}

//! ディスカバリーディレクトリ
//!
//! Phase 1 の成果物を置くディレクトリ。
//!
//! - `report.json`   : DiscoveryReport
//! - `analyses.json` : 構造解析キャッシュ（ファイル識別子キー）
//! - `files.json`    : 走査したファイルと取得元・解析結果の一覧
//! - `posts.json`    : マニフェストの投稿メタデータ

mod cache;

pub use cache::{AnalysisCache, CacheEntry, CACHE_FILE_NAME};

use crate::error::{NormalizerError, Result};
use crate::scanner::{FileSource, PostEntry};
use mtf_common::{DiscoveryReport, LayoutClassification};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const REPORT_FILE_NAME: &str = "report.json";
pub const FILES_FILE_NAME: &str = "files.json";
pub const POSTS_FILE_NAME: &str = "posts.json";

/// 走査したファイル1件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub file_name: String,
    pub path: PathBuf,
    /// 読めなかった場合は None
    #[serde(default)]
    pub file_identifier: Option<String>,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub source_post_url: Option<String>,
    #[serde(default)]
    pub download_timestamp: Option<String>,
    #[serde(default)]
    pub layout: Option<LayoutClassification>,
    #[serde(default)]
    pub confidence: Option<u8>,
    #[serde(default)]
    pub error: Option<String>,
    /// 同じ内容のファイルが先にあればそのファイル名（抽出対象外）
    #[serde(default)]
    pub duplicate_of: Option<String>,
}

impl FileEntry {
    pub fn new(file_name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            file_name: file_name.into(),
            path: path.into(),
            file_identifier: None,
            file_size: 0,
            url: None,
            source_post_url: None,
            download_timestamp: None,
            layout: None,
            confidence: None,
            error: None,
            duplicate_of: None,
        }
    }

    /// マニフェストの取得元情報を付与
    pub fn with_source(mut self, source: Option<&FileSource>) -> Self {
        if let Some(source) = source {
            self.url = source.url.clone();
            self.source_post_url = source.source_post_url.clone();
            self.download_timestamp = source.download_timestamp.clone();
        }
        self
    }

    pub fn is_analyzed(&self) -> bool {
        self.file_identifier.is_some() && self.error.is_none()
    }

    pub fn is_duplicate(&self) -> bool {
        self.duplicate_of.is_some()
    }
}

/// ディスカバリーディレクトリへの読み書き
#[derive(Debug, Clone)]
pub struct DiscoveryDir {
    root: PathBuf,
}

impl DiscoveryDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// ディレクトリを作成して開く
    pub fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let dir = Self::new(root);
        std::fs::create_dir_all(&dir.root)?;
        Ok(dir)
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn report_path(&self) -> PathBuf {
        self.root.join(REPORT_FILE_NAME)
    }

    pub fn save_report(&self, report: &DiscoveryReport) -> Result<()> {
        write_json(&self.report_path(), report)
    }

    /// レポートを読む（無ければ DiscoveryNotFound）
    pub fn load_report(&self) -> Result<DiscoveryReport> {
        self.find_report()?
            .ok_or_else(|| NormalizerError::DiscoveryNotFound(self.root.display().to_string()))
    }

    /// `--extend` 用: 無ければ None
    pub fn find_report(&self) -> Result<Option<DiscoveryReport>> {
        let path = self.report_path();
        if !path.exists() {
            return Ok(None);
        }
        read_json(&path).map(Some)
    }

    pub fn save_files(&self, files: &[FileEntry]) -> Result<()> {
        write_json(&self.root.join(FILES_FILE_NAME), &files)
    }

    pub fn load_files(&self) -> Result<Vec<FileEntry>> {
        read_json_or_default(&self.root.join(FILES_FILE_NAME))
    }

    pub fn save_posts(&self, posts: &[PostEntry]) -> Result<()> {
        write_json(&self.root.join(POSTS_FILE_NAME), &posts)
    }

    pub fn load_posts(&self) -> Result<Vec<PostEntry>> {
        read_json_or_default(&self.root.join(POSTS_FILE_NAME))
    }

    pub fn load_cache(&self, vocabulary_version: u32) -> AnalysisCache {
        AnalysisCache::load(&self.root, vocabulary_version)
    }

    pub fn save_cache(&self, cache: &AnalysisCache) -> Result<()> {
        cache.save(&self.root)
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if path.exists() {
        read_json(path)
    } else {
        Ok(T::default())
    }
}

/// 前回の一覧に今回の一覧を重ねる（同じパスは今回を優先）
pub fn merge_file_entries(previous: Vec<FileEntry>, current: Vec<FileEntry>) -> Vec<FileEntry> {
    let mut merged: Vec<FileEntry> = previous
        .into_iter()
        .filter(|old| !current.iter().any(|new| new.path == old.path))
        .collect();
    merged.extend(current);
    merged
}

//! 構造解析キャッシュ
//!
//! ファイル内容のSHA-256をキーに構造解析結果を保存し、
//! `--use-cache` 指定時は同じファイルの再解析をスキップする。

use crate::error::Result;
use mtf_common::StructureAnalysis;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

pub const CACHE_FILE_NAME: &str = "analyses.json";

/// キャッシュファイルの構造
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisCache {
    /// バージョン（互換性チェック用）
    version: u32,
    /// 語彙バージョン（異なれば再解析）
    #[serde(default)]
    vocabulary_version: u32,
    /// ファイルハッシュ → 解析結果のマップ
    entries: BTreeMap<String, CacheEntry>,
}

/// キャッシュエントリ
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// ファイル名
    pub file_name: String,
    /// ファイルサイズ
    pub file_size: u64,
    /// 解析結果
    pub analysis: StructureAnalysis,
}

impl AnalysisCache {
    const CURRENT_VERSION: u32 = 1;

    pub fn new(vocabulary_version: u32) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            vocabulary_version,
            entries: BTreeMap::new(),
        }
    }

    /// キャッシュファイルを読み込み（無い・壊れている・版が違う場合は空）
    pub fn load(dir: &Path, vocabulary_version: u32) -> Self {
        let cache_path = dir.join(CACHE_FILE_NAME);
        if !cache_path.exists() {
            return Self::new(vocabulary_version);
        }

        let file = match File::open(&cache_path) {
            Ok(f) => f,
            Err(_) => return Self::new(vocabulary_version),
        };

        let reader = BufReader::new(file);
        match serde_json::from_reader::<_, AnalysisCache>(reader) {
            Ok(cache) => {
                // バージョンチェック
                if cache.version != Self::CURRENT_VERSION
                    || cache.vocabulary_version != vocabulary_version
                {
                    tracing::warn!("analysis cache version mismatch, rebuilding");
                    return Self::new(vocabulary_version);
                }
                cache
            }
            Err(e) => {
                tracing::warn!("analysis cache unreadable ({}), rebuilding", e);
                Self::new(vocabulary_version)
            }
        }
    }

    /// キャッシュファイルを保存
    pub fn save(&self, dir: &Path) -> Result<()> {
        let cache_path = dir.join(CACHE_FILE_NAME);
        let file = File::create(cache_path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// キャッシュをルックアップ
    pub fn get(&self, hash: &str) -> Option<&StructureAnalysis> {
        self.entries.get(hash).map(|e| &e.analysis)
    }

    /// キャッシュに追加
    pub fn insert(&mut self, file_name: String, file_size: u64, analysis: StructureAnalysis) {
        self.entries.insert(
            analysis.file_identifier.clone(),
            CacheEntry {
                file_name,
                file_size,
                analysis,
            },
        );
    }

    /// キャッシュ件数
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

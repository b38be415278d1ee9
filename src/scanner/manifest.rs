//! 取得元マニフェスト
//!
//! フェッチャーが書き出す `manifest.json`。ファイルごとの取得元URL・投稿URL・
//! 取得時刻と、投稿ごとのメタデータ（そのまま出力へ渡す）を持つ。

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// ファイルの取得元
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileSource {
    pub file_name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub source_post_url: Option<String>,
    #[serde(default)]
    pub download_timestamp: Option<String>,
}

/// 投稿メタデータ（url 以外は解釈しない）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostEntry {
    pub url: String,
    #[serde(flatten)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub files: Vec<FileSource>,
    #[serde(default)]
    pub posts: Vec<PostEntry>,
}

impl Manifest {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// 明示パス → 入力フォルダ直下の manifest.json → 空
    pub fn locate(explicit: Option<&Path>, folder: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        let default_path = folder.join(MANIFEST_FILE_NAME);
        if default_path.exists() {
            Self::from_file(&default_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn source_for(&self, file_name: &str) -> Option<&FileSource> {
        self.files.iter().find(|f| f.file_name == file_name)
    }

    pub fn post(&self, url: &str) -> Option<&PostEntry> {
        self.posts.iter().find(|p| p.url == url)
    }
}

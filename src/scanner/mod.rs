mod manifest;

pub use manifest::{FileSource, Manifest, PostEntry};

use crate::error::{NormalizerError, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct SpreadsheetInfo {
    pub path: PathBuf,
    pub file_name: String,
}

const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "ods", "csv"];

pub fn scan_folder(folder: &Path) -> Result<Vec<SpreadsheetInfo>> {
    if !folder.exists() {
        return Err(NormalizerError::FolderNotFound(folder.display().to_string()));
    }

    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .max_depth(1)  // 直下のみ（再帰しない）
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        if let Some(ext) = path.extension() {
            if is_spreadsheet_extension(&ext.to_string_lossy()) {
                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();

                // Office のロックファイル
                if file_name.starts_with("~$") {
                    continue;
                }

                files.push(SpreadsheetInfo {
                    path: path.to_path_buf(),
                    file_name,
                });
            }
        }
    }

    // ファイル名でソート
    files.sort_by(|a, b| a.file_name.cmp(&b.file_name));

    Ok(files)
}

pub fn is_spreadsheet_extension(ext: &str) -> bool {
    let lower = ext.to_lowercase();
    SPREADSHEET_EXTENSIONS.contains(&lower.as_str())
}

/// バイト列のSHA-256（16進）
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// ファイル内容のSHA-256（ファイル識別子）
pub fn compute_file_hash(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(hash_bytes(&bytes))
}

/// 保存キー: グループキーのSHA-256先頭16文字
pub fn storage_key(grouping_key: &str) -> String {
    hash_bytes(grouping_key.as_bytes())[..16].to_string()
}

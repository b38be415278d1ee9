pub mod excel;

use crate::error::{NormalizerError, Result};
use crate::output;
use std::path::{Path, PathBuf};

/// 出力先がディレクトリ（または拡張子なし）なら既定のファイル名を付ける
fn output_path_for(output: &Path) -> PathBuf {
    if output.is_dir() || output.extension().is_none() {
        output.join("materials.xlsx")
    } else {
        output.to_path_buf()
    }
}

/// 正規化結果ディレクトリからレビュー用Excelを作る
pub fn export_materials(processed_dir: &Path, output: &Path) -> Result<(PathBuf, usize)> {
    if !processed_dir.is_dir() {
        return Err(NormalizerError::FolderNotFound(
            processed_dir.display().to_string(),
        ));
    }

    let documents = output::load_documents(processed_dir)?;
    let material_count = documents.iter().map(|d| d.materials.len()).sum();

    let output_path = output_path_for(output);
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    excel::generate_excel(&documents, &output_path)?;
    Ok((output_path, material_count))
}

use crate::error::{NormalizerError, Result};
use mtf_common::{PipelineOptions, Vocabulary};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 語彙ファイルのパスを上書きする環境変数
pub const VOCABULARY_ENV: &str = "MTF_VOCABULARY";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    /// 解析・抽出・品質評価のパラメータ
    pub pipeline: PipelineOptions,
    /// 語彙JSON（未指定なら組み込み語彙）
    pub vocabulary_path: Option<PathBuf>,
    /// 並列ワーカー数（未指定ならCPU数）
    pub workers: Option<usize>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Self::from_json(&content)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(content)?;
        config.pipeline.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(config_path)
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| NormalizerError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("mtf-normalizer").join("config.json"))
    }

    /// 語彙ファイルのパス（環境変数を優先）
    pub fn vocabulary_source(&self) -> Option<PathBuf> {
        if let Ok(path) = std::env::var(VOCABULARY_ENV) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }
        self.vocabulary_path.clone()
    }

    pub fn load_vocabulary(&self) -> Result<Vocabulary> {
        match self.vocabulary_source() {
            Some(path) => {
                if !path.exists() {
                    return Err(NormalizerError::FileNotFound(path.display().to_string()));
                }
                tracing::info!("vocabulary: {}", path.display());
                Ok(Vocabulary::from_file(&path)?)
            }
            None => Ok(Vocabulary::builtin()),
        }
    }

    /// CLI指定 → 設定 → CPU数
    pub fn worker_count(&self, cli_override: Option<usize>) -> usize {
        cli_override
            .or(self.workers)
            .filter(|n| *n > 0)
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
    }
}

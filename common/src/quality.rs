//! 品質評価
//!
//! 正規化率 = |normalized| / max(1, |raw|) から OK / WARN / RAW を決める。

use crate::error::{Error, Result};
use crate::types::{MaterialRecord, QualityRating};
use serde::{Deserialize, Serialize};

/// 品質区分の閾値
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityThresholds {
    /// これを超えると OK
    pub ok_above: f64,
    /// これ以上で WARN（未満は RAW）
    pub warn_at_least: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            ok_above: 0.8,
            warn_at_least: 0.2,
        }
    }
}

impl QualityThresholds {
    pub fn validate(&self) -> Result<()> {
        let in_range = |v: f64| (0.0..=1.0).contains(&v);
        if !in_range(self.ok_above) || !in_range(self.warn_at_least) {
            return Err(Error::Config("quality thresholds must be within 0.0..=1.0".into()));
        }
        if self.warn_at_least > self.ok_above {
            return Err(Error::Config(format!(
                "warn_at_least ({}) exceeds ok_above ({})",
                self.warn_at_least, self.ok_above
            )));
        }
        Ok(())
    }

    /// 件数から区分を決める
    pub fn rate(&self, normalized: usize, raw: usize) -> QualityRating {
        if raw == 0 {
            return QualityRating::Raw;
        }
        let ratio = normalized.min(raw) as f64 / raw as f64;
        if ratio > self.ok_above {
            QualityRating::Ok
        } else if ratio >= self.warn_at_least {
            QualityRating::Warn
        } else {
            QualityRating::Raw
        }
    }
}

/// 正規化できたキー数（raw に存在するもののみ数える）
fn normalized_count(record: &MaterialRecord) -> usize {
    record
        .normalized_properties
        .keys()
        .filter(|key| record.raw_properties.contains_key(*key))
        .count()
}

/// 正規化率
pub fn normalization_ratio(record: &MaterialRecord) -> f64 {
    normalized_count(record) as f64 / record.raw_properties.len().max(1) as f64
}

/// 既定の閾値で評価
pub fn assess(record: &MaterialRecord) -> QualityRating {
    assess_with(record, &QualityThresholds::default())
}

pub fn assess_with(record: &MaterialRecord, thresholds: &QualityThresholds) -> QualityRating {
    thresholds.rate(normalized_count(record), record.raw_properties.len())
}

//! 正規化パイプライン
//!
//! - Phase 1 (discover): 構造解析 → パターン集約
//! - Phase 2 (process_file): 抽出 → SI変換 → 品質評価
//!
//! パイプライン自体はバッチを越える状態を持たない。

use crate::discovery::Aggregator;
use crate::error::{ConversionFailure, ExtractionFailure, Result};
use crate::extractor::{ExtractorOptions, StrategyExtractor};
use crate::quality::{self, QualityThresholds};
use crate::structure::{AnalyzerOptions, StructureAnalyzer};
use crate::tabular::TabularFile;
use crate::types::{
    base_key, DiscoveryReport, MaterialRecord, NormalizedProperty, QualityRating, Strategy,
    StructureAnalysis,
};
use crate::units;
use crate::vocabulary::Vocabulary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// パイプライン設定
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    pub analyzer: AnalyzerOptions,
    pub extractor: ExtractorOptions,
    pub quality: QualityThresholds,
}

impl PipelineOptions {
    pub fn validate(&self) -> Result<()> {
        self.quality.validate()
    }
}

/// ファイル単位の処理結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileOutcome {
    pub file_identifier: String,
    pub strategy_used: Strategy,
    pub records: Vec<MaterialRecord>,
    pub skipped_cells: usize,
    /// 変換失敗の理由別件数
    pub conversion_failures: BTreeMap<ConversionFailure, usize>,
}

impl FileOutcome {
    pub fn count_by_quality(&self, rating: QualityRating) -> usize {
        self.records.iter().filter(|r| r.quality_rating == rating).count()
    }
}

/// 解析 → 集約 → 抽出 → 評価 をまとめる
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    vocabulary: Vocabulary,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(vocabulary: Vocabulary, options: PipelineOptions) -> Self {
        Self { vocabulary, options }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn analyzer(&self) -> StructureAnalyzer<'_> {
        StructureAnalyzer::new(&self.vocabulary, self.options.analyzer)
    }

    pub fn extractor(&self) -> StrategyExtractor<'_> {
        StrategyExtractor::new(&self.vocabulary, self.options.extractor)
    }

    /// 1ファイルの構造解析
    pub fn analyze(&self, file: &dyn TabularFile, file_identifier: &str) -> StructureAnalysis {
        self.analyzer().analyze(file, file_identifier)
    }

    /// Phase 1: 全ファイルを解析して集約する
    pub fn discover<'f, I>(
        &self,
        batch: I,
        generated_at: DateTime<Utc>,
    ) -> (Vec<StructureAnalysis>, DiscoveryReport)
    where
        I: IntoIterator<Item = (&'f dyn TabularFile, &'f str)>,
    {
        let analyses: Vec<StructureAnalysis> = batch
            .into_iter()
            .map(|(file, id)| self.analyze(file, id))
            .collect();
        let report = self.aggregate(&analyses, None, generated_at);
        (analyses, report)
    }

    /// 解析結果を集約する（`previous` があれば拡張）
    pub fn aggregate(
        &self,
        analyses: &[StructureAnalysis],
        previous: Option<&DiscoveryReport>,
        generated_at: DateTime<Utc>,
    ) -> DiscoveryReport {
        let mut aggregator = match previous {
            Some(report) => Aggregator::extend(&self.vocabulary, report),
            None => Aggregator::new(&self.vocabulary),
        };
        for analysis in analyses {
            aggregator.add(analysis);
        }
        aggregator.finish(generated_at)
    }

    /// SI変換と品質評価を適用した新しいレコードを返す
    pub fn normalize_record(&self, record: MaterialRecord) -> MaterialRecord {
        let mut normalized = BTreeMap::new();
        let mut failures = BTreeMap::new();

        for (key, raw) in &record.raw_properties {
            let kind = self
                .vocabulary
                .quantity_kind(base_key(key))
                .or_else(|| units::kind_of(&raw.unit));
            let converted = match kind {
                Some(kind) => units::convert(raw.value, &raw.unit, kind),
                None => Err(ConversionFailure::UnrecognizedUnit),
            };
            match converted {
                Ok((value, unit)) => {
                    normalized.insert(
                        key.clone(),
                        NormalizedProperty {
                            value,
                            unit: unit.to_string(),
                        },
                    );
                }
                Err(reason) => {
                    tracing::debug!("{} ({} {}): {}", key, raw.value, raw.unit, reason);
                    failures.insert(key.clone(), reason);
                }
            }
        }

        let record = record.with_normalized(normalized, failures);
        let rating = quality::assess_with(&record, &self.options.quality);
        record.with_quality(rating)
    }

    /// Phase 2: 1ファイルを抽出・正規化する
    ///
    /// 戦略はレポートの推奨（無ければ固定表）から決める
    pub fn process_file(
        &self,
        file: &dyn TabularFile,
        analysis: &StructureAnalysis,
        report: Option<&DiscoveryReport>,
    ) -> std::result::Result<FileOutcome, ExtractionFailure> {
        let layout = analysis.layout_classification;
        let strategy = report
            .map(|r| r.strategy_for(layout))
            .unwrap_or_else(|| Strategy::for_layout(layout));

        let outcome = self.extractor().extract(file, analysis, Some(strategy))?;

        let records: Vec<MaterialRecord> = outcome
            .records
            .into_iter()
            .map(|record| self.normalize_record(record))
            .collect();

        let mut conversion_failures = BTreeMap::new();
        for reason in records.iter().flat_map(|r| r.conversion_failures.values()) {
            *conversion_failures.entry(*reason).or_insert(0) += 1;
        }

        Ok(FileOutcome {
            file_identifier: analysis.file_identifier.clone(),
            strategy_used: outcome.strategy_used,
            records,
            skipped_cells: outcome.skipped_cells,
            conversion_failures,
        })
    }
}

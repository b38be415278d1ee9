//! パターン集約
//!
//! ファイルごとの構造解析結果をレイアウト分類で束ね、
//! 出現頻度・列名の同義語集合・推奨戦略をまとめた DiscoveryReport を作る。
//!
//! 集約器はバッチごとに生成し、単一の書き手だけが `add` する。

use crate::types::{DiscoveryReport, LayoutClassification, Strategy, StructureAnalysis};
use crate::vocabulary::{normalize_label, Vocabulary};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

/// バッチスコープの集約器
pub struct Aggregator<'a> {
    vocabulary: &'a Vocabulary,
    frequencies: BTreeMap<LayoutClassification, usize>,
    synonyms: BTreeMap<String, BTreeSet<String>>,
    unmatched: BTreeSet<String>,
    total_files: usize,
}

impl<'a> Aggregator<'a> {
    pub fn new(vocabulary: &'a Vocabulary) -> Self {
        Self {
            vocabulary,
            frequencies: BTreeMap::new(),
            synonyms: BTreeMap::new(),
            unmatched: BTreeSet::new(),
            total_files: 0,
        }
    }

    /// 既存レポートの頻度・同義語を引き継いで集約を続ける
    pub fn extend(vocabulary: &'a Vocabulary, previous: &DiscoveryReport) -> Self {
        Self {
            vocabulary,
            frequencies: previous.pattern_frequencies.clone(),
            synonyms: previous.column_synonyms.clone(),
            unmatched: previous.unmatched_headers.clone(),
            total_files: previous.total_files,
        }
    }

    /// 解析結果を1件取り込む
    pub fn add(&mut self, analysis: &StructureAnalysis) {
        *self
            .frequencies
            .entry(analysis.layout_classification)
            .or_insert(0) += 1;
        self.total_files += 1;

        for label in &analysis.property_labels {
            let observed = normalize_label(label);
            if observed.is_empty() {
                continue;
            }
            match self.vocabulary.canonical_key(label) {
                Some(key) => {
                    self.synonyms
                        .entry(key.to_string())
                        .or_default()
                        .insert(observed);
                }
                None => {
                    self.unmatched.insert(observed);
                }
            }
        }
    }

    pub fn total_files(&self) -> usize {
        self.total_files
    }

    /// レポートを確定する（生成時刻は呼び出し側が渡す）
    pub fn finish(self, generated_at: DateTime<Utc>) -> DiscoveryReport {
        let strategy_recommendations = self
            .frequencies
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(layout, _)| (*layout, Strategy::for_layout(*layout)))
            .collect();

        DiscoveryReport {
            pattern_frequencies: self.frequencies,
            column_synonyms: self.synonyms,
            strategy_recommendations,
            unmatched_headers: self.unmatched,
            total_files: self.total_files,
            vocabulary_version: self.vocabulary.version,
            generation_timestamp: generated_at,
        }
    }
}

/// 解析結果の一覧から DiscoveryReport を作る
pub fn aggregate(
    vocabulary: &Vocabulary,
    analyses: &[StructureAnalysis],
    generated_at: DateTime<Utc>,
) -> DiscoveryReport {
    let mut aggregator = Aggregator::new(vocabulary);
    for analysis in analyses {
        aggregator.add(analysis);
    }
    aggregator.finish(generated_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn analysis(layout: LayoutClassification, labels: &[&str]) -> StructureAnalysis {
        let mut a = StructureAnalysis::unknown("hash", vec!["Sheet1".into()]);
        a.layout_classification = layout;
        a.property_labels = labels.iter().map(|s| s.to_string()).collect();
        a
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_frequencies_and_recommendations() {
        let vocab = Vocabulary::builtin();
        let analyses = vec![
            analysis(LayoutClassification::SingleMaterialVertical, &["Density"]),
            analysis(LayoutClassification::SingleMaterialVertical, &["Density"]),
            analysis(LayoutClassification::Unknown, &[]),
        ];
        let report = aggregate(&vocab, &analyses, at());

        assert_eq!(report.frequency(LayoutClassification::SingleMaterialVertical), 2);
        assert_eq!(report.frequency(LayoutClassification::Unknown), 1);
        assert_eq!(report.frequency(LayoutClassification::MultiMaterialTable), 0);
        assert_eq!(report.total_files, 3);
        assert_eq!(
            report.strategy_recommendations.get(&LayoutClassification::SingleMaterialVertical),
            Some(&Strategy::PropertyValueParser)
        );
        assert_eq!(
            report.strategy_recommendations.get(&LayoutClassification::Unknown),
            Some(&Strategy::GenericParser)
        );
        assert!(!report
            .strategy_recommendations
            .contains_key(&LayoutClassification::MultiMaterialTable));
    }

    #[test]
    fn test_synonym_sets_merge_near_duplicates() {
        let vocab = Vocabulary::builtin();
        let analyses = vec![
            analysis(
                LayoutClassification::MultiMaterialTable,
                &["UTS", "Ultimate Tensile", "Tensile  Strength (MPa)", "tensile strength"],
            ),
            analysis(LayoutClassification::MultiMaterialTable, &["Nozzle size"]),
        ];
        let report = aggregate(&vocab, &analyses, at());

        let tensile = &report.column_synonyms["tensile_strength"];
        let expected: BTreeSet<String> = ["uts", "ultimate tensile", "tensile strength"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(tensile, &expected);
        assert!(report.unmatched_headers.contains("nozzle size"));
    }

    #[test]
    fn test_idempotent() {
        let vocab = Vocabulary::builtin();
        let analyses = vec![
            analysis(LayoutClassification::MultiMaterialTable, &["Density", "HDT"]),
            analysis(LayoutClassification::TestResultsMatrix, &["Tg"]),
        ];
        assert_eq!(aggregate(&vocab, &analyses, at()), aggregate(&vocab, &analyses, at()));
    }

    #[test]
    fn test_order_independent() {
        let vocab = Vocabulary::builtin();
        let a = analysis(LayoutClassification::MultiMaterialTable, &["Density"]);
        let b = analysis(LayoutClassification::SingleMaterialVertical, &["Yield Strength"]);
        let forward = aggregate(&vocab, &[a.clone(), b.clone()], at());
        let backward = aggregate(&vocab, &[b, a], at());
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_extend_appends() {
        let vocab = Vocabulary::builtin();
        let first = aggregate(
            &vocab,
            &[analysis(LayoutClassification::SingleMaterialVertical, &["Density"])],
            at(),
        );

        let mut aggregator = Aggregator::extend(&vocab, &first);
        aggregator.add(&analysis(
            LayoutClassification::SingleMaterialVertical,
            &["Specific Density"],
        ));
        let second = aggregator.finish(at());

        assert_eq!(second.frequency(LayoutClassification::SingleMaterialVertical), 2);
        assert_eq!(second.total_files, 2);
        let density = &second.column_synonyms["density"];
        assert!(density.contains("density"));
        assert!(density.contains("specific density"));
    }

    #[test]
    fn test_every_seen_layout_has_recommendation() {
        let vocab = Vocabulary::builtin();
        let analyses: Vec<_> = LayoutClassification::ALL
            .iter()
            .map(|l| analysis(*l, &[]))
            .collect();
        let report = aggregate(&vocab, &analyses, at());
        for layout in LayoutClassification::ALL {
            assert_eq!(report.strategy_for(layout), Strategy::for_layout(layout));
            assert!(report.strategy_recommendations.contains_key(&layout));
        }
    }
}

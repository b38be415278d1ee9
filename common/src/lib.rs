//! 素材スプレッドシート構造解析・正規化コア
//!
//! ファイルI/O・時刻取得・スレッドを持たない純粋なロジック。
//! CLI側が Excel/CSV を `TabularFile` に変換して渡す。

pub mod discovery;
pub mod error;
pub mod extractor;
pub mod pipeline;
pub mod quality;
pub mod structure;
pub mod tabular;
pub mod types;
pub mod units;
pub mod values;
pub mod vocabulary;

pub use discovery::{aggregate, Aggregator};
pub use error::{ConversionFailure, Error, ExtractionFailure, Result};
pub use extractor::{extract, ExtractionOutcome, ExtractorOptions, StrategyExtractor};
pub use pipeline::{FileOutcome, Pipeline, PipelineOptions};
pub use quality::{assess, QualityThresholds};
pub use structure::{AnalyzerOptions, StructureAnalyzer};
pub use tabular::{Cell, Sheet, TabularFile, Workbook};
pub use types::{
    DiscoveryReport, LayoutClassification, MaterialRecord, QualityRating, Strategy,
    StructureAnalysis,
};
pub use units::{convert, QuantityKind};
pub use vocabulary::Vocabulary;

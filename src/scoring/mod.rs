pub mod compensation;
pub mod config;
pub mod engine;
pub mod factors;
pub mod impute;
pub mod normalize;
pub mod pipeline;
pub mod rank;
pub mod validation;

pub use compensation::{compute_compensation, Compensation, CompensationTables};
pub use config::*;
pub use engine::{
    calculate_score, score_population, KpiContribution, ScoreBreakdown, ScoreResult, WeightTable,
};
pub use factors::{FactorRule, FactorTable, RangeOp};
pub use impute::impute_means;
pub use normalize::{normalize_min_max, ColumnRange};
pub use pipeline::{run_pipeline, FeatureStatistics, RankedRow, RankedTable};
pub use rank::rank_order;
pub use validation::validate_scoring;

pub mod formatter;

pub use formatter::{
    display_columns, format_breakdown, format_comparison, format_json, format_ranked_table,
    format_score, format_score_chart, format_tsv, format_value, should_use_colors,
};

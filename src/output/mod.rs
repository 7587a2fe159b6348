pub mod formatter;

pub use formatter::{
    format_assessment, format_assessment_table, format_generation_report, format_score,
    format_score_result, format_tier, should_use_colors,
};

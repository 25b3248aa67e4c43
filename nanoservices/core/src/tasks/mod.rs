//! The steps of the finance pipeline.

pub mod helpers;
pub mod load;
pub mod report;
pub mod reset;
pub mod traits;
pub mod transform;

pub const RESET_TABLES: &str = "reset_tables";
pub const LOAD_STAGING: &str = "load_staging";
pub const TRANSFORM_FACTS: &str = "transform_facts";
pub const REPORT_METRICS: &str = "report_metrics";

pub use eltflow_core as core;
pub use eltflow_utils as utils;

// Convenience re-exports for common usage
pub use eltflow_core::builder::PipelineBuilder;
pub use eltflow_core::config::types::RunConfig;
pub use eltflow_core::engine::EltFlow;
pub use eltflow_core::events::trigger::Trigger;
pub use eltflow_core::pipelines::finance::finance_pipeline;
pub use eltflow_core::scheduler::retry::RetryPolicy;
pub use eltflow_core::tasks::traits::{Task, TaskContext};
pub use eltflow_utils::{EltResult, Relation};

//! eltflow_core: scheduled CSV-to-fact-table ELT.
//!
//! A run resets the warehouse, loads every intake CSV into a staging table,
//! rebuilds the fact table from it and logs a summary. Steps run one at a time
//! under a retrying state machine and every attempt lands in a run-history
//! store.
//!
//! ```no_run
//! use std::sync::Arc;
//! use eltflow_core::config::loader::load_run_config;
//! use eltflow_core::engine::EltFlow;
//! use eltflow_core::pipelines::finance::finance_pipeline;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Arc::new(load_run_config("pipeline.yaml")?);
//! let (trigger, def) = finance_pipeline(config)?;
//! let state = EltFlow::new().add_pipeline(trigger, def).run_once("elt_duckdb_pipeline").await?;
//! println!("{}", state.status.as_str());
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod config;
pub mod dag;
pub mod destinations;
pub mod engine;
pub mod events;
pub mod pipelines;
pub mod router;
pub mod scheduler;
pub mod sources;
pub mod store;
pub mod tasks;
pub mod transforms;

pub mod logging;

pub mod metrics;

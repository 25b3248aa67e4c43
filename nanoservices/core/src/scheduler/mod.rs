pub mod retry;
pub mod runner;
pub mod state;

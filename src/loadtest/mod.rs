//! Loadtest command handlers.
//!
//! This module contains handlers for the run, fund and report commands.

pub mod fund;
pub mod report;
pub mod run;
pub mod setup;

pub use fund::{fund_accounts, run_loadtest_fund};
pub use report::run_loadtest_report;
pub use run::{execute_run, run_loadtest, RunReport};

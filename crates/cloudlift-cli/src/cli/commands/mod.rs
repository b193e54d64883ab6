//! CLI command handlers, one file per command.

mod add;
mod cancel;
mod clear;
mod destinations;
mod logs;
mod run;
mod status;

pub use add::run_add;
pub use cancel::run_cancel;
pub use clear::run_clear;
pub use destinations::run_destinations;
pub use logs::run_logs;
pub use run::run_process;
pub use status::run_status;

#[cfg(test)]
pub(crate) use status::{destination_summary, progress_column};

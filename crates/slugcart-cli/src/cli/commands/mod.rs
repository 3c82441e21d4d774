mod cache;
mod decide;
mod filter;
mod rewrite;

pub use cache::{run_reset, run_sweep, run_warm};
pub use decide::run_decide;
pub use filter::run_filter;
pub use rewrite::run_rewrite;

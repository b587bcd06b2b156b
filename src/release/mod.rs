//! Release state machine.
//!
//! A run walks the ordered [`Stage`] list. Each stage yields a
//! [`Transition`]: continue, pause for manual follow-up, or fail. The run
//! always ends with its work area removed and a [`RunReport`].

mod context;
mod result;
mod runner;
mod state;

pub use context::{build_diff_context, truncate_diff};
pub use result::{RunOutcome, RunReport, StageTiming};
pub use runner::{
    commit_message, pr_body, pr_title, release_branch_name, ReleaseRequest, ReleaseRunner,
};
pub use state::{RunContext, Stage, Transition};

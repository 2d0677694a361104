//! tpk-runtime
//!
//! One convergence run: load inputs, build the desired state, then list,
//! diff and (in apply mode) mutate each kind in the fixed order
//! users → policies → queues → exchanges → bindings.
//!
//! Single-threaded and synchronous. The first broker failure aborts the
//! run; rerunning converges from wherever it stopped.

mod error;
mod orchestrator;
mod report;
mod settings;

pub use error::RunError;
pub use orchestrator::{converge, load_inputs, Orchestrator, RunInputs};
pub use report::{KindReport, RunReport, SkippedEntry};
pub use settings::{RunMode, RunSettings};

pub mod config;
pub mod executor;
pub mod report;
pub mod scenario;
pub mod scheduler;
pub mod target;
pub mod user;

pub use config::Config;
pub use executor::{Executor, HttpExecutor};
pub use report::{Fanout, OutcomeSink, RunSummary, SummarySink, TracingSink};
pub use scheduler::{Pacing, RunReport, RunningLoad, Scheduler};
pub use target::{Endpoint, Target};

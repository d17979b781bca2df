mod error;
mod governor;
mod judge;
mod pipeline;
mod profile;
mod report;
mod runner;
mod workspace;

pub use error::{ErrorKind, JudgeError};
pub use governor::TimeoutGovernor;
pub use judge::judge;
pub use pipeline::Judger;
pub use profile::{LanguageProfile, LanguageRegistry};
pub use report::{
    ExecutionRequest, JudgeReport, NoopSink, ReportBuilder, ResultSink, TestCase, TestResult,
};
pub use runner::{ProcessRunner, RunOutcome, TerminalKind};
pub use workspace::Workspace;

use std::path::PathBuf;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream;
use futures::{FutureExt, StreamExt};

use crate::config::JudgeConfig;

use super::{
    ExecutionRequest, JudgeError, JudgeReport, LanguageProfile, LanguageRegistry, ProcessRunner,
    ReportBuilder, RunOutcome, TerminalKind, TestCase, TestResult, Workspace, judge,
};

/// Runs submissions end to end: workspace, compile once, run and judge every case
#[derive(Debug, Clone)]
pub struct Judger {
    registry: Arc<LanguageRegistry>,
    runner: ProcessRunner,
    workspace_root: PathBuf,
    max_parallel_cases: usize,
}

impl Judger {
    pub fn new(config: &JudgeConfig, registry: Arc<LanguageRegistry>) -> Self {
        Self {
            registry,
            runner: ProcessRunner::new(config),
            workspace_root: config.workspace_root(),
            max_parallel_cases: config.max_parallel_cases.max(1),
        }
    }

    pub async fn judge(&self, request: &ExecutionRequest) -> Result<JudgeReport, JudgeError> {
        let profile = self.registry.resolve(&request.language)?;

        let workspace = Workspace::open(&self.workspace_root, profile, &request.code)
            .await
            .map_err(JudgeError::Workspace)?;

        let report = self
            .judge_in_workspace(&workspace, profile, &request.test_cases)
            .await;

        let dir = workspace.dir().to_path_buf();
        if let Err(e) = workspace.close().await {
            log::warn!("Failed to remove workspace {}: {e}", dir.display());
        }

        report
    }

    async fn judge_in_workspace(
        &self,
        workspace: &Workspace,
        profile: &LanguageProfile,
        cases: &[TestCase],
    ) -> Result<JudgeReport, JudgeError> {
        let program = match self.runner.compile(workspace, profile).await? {
            Some(outcome) if !outcome.success() => {
                log::debug!("Compilation of {} submission failed", profile.name);
                return Ok(JudgeReport::compile_error(compile_detail(&outcome)));
            }
            _ => Program {
                runner: &self.runner,
                workspace,
                profile,
            },
        };

        // boxed so the request future stays Send across the borrowed cases
        let program = &program;
        let pending: Vec<BoxFuture<'_, (usize, Result<TestResult, JudgeError>)>> = cases
            .iter()
            .enumerate()
            .map(|(index, case)| async move { (index, program.judge_case(case).await) }.boxed())
            .collect();
        let mut judged = stream::iter(pending).buffer_unordered(self.max_parallel_cases);

        let mut builder = ReportBuilder::new(cases.len());
        while let Some((index, result)) = judged.next().await {
            builder.insert(index, result?)?;
        }

        Ok(builder.finish()?)
    }
}

/// A submission whose compile step, if any, has succeeded
struct Program<'a> {
    runner: &'a ProcessRunner,
    workspace: &'a Workspace,
    profile: &'a LanguageProfile,
}

/// Lifecycle of a single test case
enum CaseState<'c> {
    NotRun(&'c TestCase),
    Ran(&'c TestCase, RunOutcome),
    Judged(TestResult),
}

impl Program<'_> {
    async fn judge_case(&self, case: &TestCase) -> Result<TestResult, JudgeError> {
        let mut state = CaseState::NotRun(case);
        loop {
            state = match state {
                CaseState::NotRun(case) => {
                    let outcome = self
                        .runner
                        .run(self.workspace, self.profile, &case.input)
                        .await?;
                    CaseState::Ran(case, outcome)
                }
                CaseState::Ran(case, outcome) => CaseState::Judged(judge(case, &outcome)),
                CaseState::Judged(result) => return Ok(result),
            };
        }
    }
}

fn compile_detail(outcome: &RunOutcome) -> String {
    match outcome.kind {
        TerminalKind::TimedOut => "Compilation timed out".to_string(),
        TerminalKind::ProcessError => "Compiler was terminated by a signal".to_string(),
        TerminalKind::Completed => {
            // javac and gcc report on stderr, some toolchains use stdout
            let stderr = outcome.stderr.trim();
            if stderr.is_empty() {
                outcome.stdout.trim().to_string()
            } else {
                stderr.to_string()
            }
        }
    }
}

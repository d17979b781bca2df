use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::OneCaseConfig;

use super::ErrorKind;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub input: String,
    pub expected_output: String,
}

impl From<&OneCaseConfig> for TestCase {
    fn from(case: &OneCaseConfig) -> Self {
        Self {
            input: case.input.clone(),
            expected_output: case.expected_output.clone(),
        }
    }
}

/// One submission to judge: the code and the cases to run it against, in order
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub language: String,
    pub code: String,
    pub test_cases: Vec<TestCase>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub input: String,
    pub expected_output: String,
    pub user_output: Option<String>,
    pub test_passed: bool,
    pub error_kind: Option<ErrorKind>,
    pub error: Option<String>,
}

impl TestResult {
    pub fn passed(case: &TestCase, output: &str) -> Self {
        Self {
            input: case.input.clone(),
            expected_output: case.expected_output.clone(),
            user_output: Some(output.to_string()),
            test_passed: true,
            error_kind: None,
            error: None,
        }
    }

    pub fn failed(
        case: &TestCase,
        output: Option<&str>,
        kind: ErrorKind,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            input: case.input.clone(),
            expected_output: case.expected_output.clone(),
            user_output: output.map(str::to_string),
            test_passed: false,
            error_kind: Some(kind),
            error: Some(detail.into()),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JudgeReport {
    pub test_results: Vec<TestResult>,
    pub overall_passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JudgeReport {
    /// A request that never got past compilation: no case was run
    pub fn compile_error(detail: impl Into<String>) -> Self {
        Self {
            test_results: Vec::new(),
            overall_passed: false,
            error_kind: Some(ErrorKind::CompileError),
            error: Some(detail.into()),
        }
    }

    /// Hands every result to the sink; failures are logged and otherwise ignored
    pub async fn forward(&self, sink: &dyn ResultSink, problem_title: &str, user_code: &str) {
        for result in &self.test_results {
            if let Err(e) = sink.record(problem_title, user_code, result).await {
                log::error!("Failed to record test result for {problem_title:?}: {e:#}");
            }
        }
    }
}

/// Collects per-case results into input order, whatever order they finish in
#[derive(Debug)]
pub struct ReportBuilder {
    slots: Vec<Option<TestResult>>,
}

impl ReportBuilder {
    pub fn new(case_count: usize) -> Self {
        Self {
            slots: vec![None; case_count],
        }
    }

    pub fn insert(&mut self, index: usize, result: TestResult) -> Result<()> {
        let slot = self
            .slots
            .get_mut(index)
            .ok_or_else(|| anyhow!("Test case index {index} out of range"))?;
        if slot.is_some() {
            return Err(anyhow!("Test case {index} judged twice"));
        }
        *slot = Some(result);
        Ok(())
    }

    pub fn finish(self) -> Result<JudgeReport> {
        let test_results = self
            .slots
            .into_iter()
            .enumerate()
            .map(|(i, slot)| slot.ok_or_else(|| anyhow!("Test case {i} was never judged")))
            .collect::<Result<Vec<_>>>()?;
        let overall_passed = test_results.iter().all(|r| r.test_passed);

        Ok(JudgeReport {
            test_results,
            overall_passed,
            error_kind: None,
            error: None,
        })
    }
}

/// Best-effort destination for judged results
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn record(&self, problem_title: &str, user_code: &str, result: &TestResult)
    -> Result<()>;
}

/// Sink used when persistence is disabled
#[derive(Debug, Default)]
pub struct NoopSink;

#[async_trait]
impl ResultSink for NoopSink {
    async fn record(&self, _: &str, _: &str, _: &TestResult) -> Result<()> {
        Ok(())
    }
}

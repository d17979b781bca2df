use super::{ErrorKind, RunOutcome, TerminalKind, TestCase, TestResult};

/// Classifies one run against its test case
///
/// Checked in order: timeout, abnormal exit, empty output, then an exact
/// comparison of both sides with surrounding whitespace trimmed.
pub fn judge(case: &TestCase, outcome: &RunOutcome) -> TestResult {
    let expected = case.expected_output.trim();

    match (outcome.kind, outcome.exit_code) {
        (TerminalKind::TimedOut, _) => {
            return TestResult::failed(case, None, ErrorKind::Timeout, "Execution timed out");
        }
        (TerminalKind::ProcessError, _) => {
            let detail = runtime_detail(outcome, "Process was terminated by a signal");
            return TestResult::failed(case, None, ErrorKind::RuntimeError, detail);
        }
        (TerminalKind::Completed, code) if code != Some(0) => {
            let fallback = format!("Process exited with code {}", code.unwrap_or(-1));
            let detail = runtime_detail(outcome, &fallback);
            return TestResult::failed(case, None, ErrorKind::RuntimeError, detail);
        }
        _ => {}
    }

    let actual = outcome.stdout.trim();
    if actual.is_empty() {
        return if expected.is_empty() {
            TestResult::passed(case, actual)
        } else {
            TestResult::failed(
                case,
                Some(actual),
                ErrorKind::EmptyOutput,
                "Program produced no output",
            )
        };
    }

    if actual == expected {
        TestResult::passed(case, actual)
    } else {
        TestResult::failed(
            case,
            Some(actual),
            ErrorKind::OutputMismatch,
            "Output does not match the expected output",
        )
    }
}

fn runtime_detail(outcome: &RunOutcome, fallback: &str) -> String {
    let stderr = outcome.stderr.trim();
    if stderr.is_empty() {
        fallback.to_string()
    } else {
        stderr.to_string()
    }
}

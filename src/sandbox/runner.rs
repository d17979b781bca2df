use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};

use crate::config::JudgeConfig;

use super::{JudgeError, LanguageProfile, TimeoutGovernor, Workspace};

/// How a supervised process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalKind {
    Completed,
    TimedOut,
    /// Killed by a signal before it could report an exit status
    ProcessError,
}

/// Raw result of one compile or run invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub elapsed: Duration,
    pub kind: TerminalKind,
}

impl RunOutcome {
    pub fn success(&self) -> bool {
        self.kind == TerminalKind::Completed && self.exit_code == Some(0)
    }
}

/// Spawns the compile and run commands of a profile inside a workspace
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    compile_governor: TimeoutGovernor,
    run_governor: TimeoutGovernor,
}

impl ProcessRunner {
    pub fn new(config: &JudgeConfig) -> Self {
        Self {
            compile_governor: TimeoutGovernor::new(
                config.compile_time_limit(),
                config.output_limit_bytes,
            ),
            run_governor: TimeoutGovernor::new(config.time_limit(), config.output_limit_bytes),
        }
    }

    /// Runs the compile step, if the language has one, with no stdin
    pub async fn compile(
        &self,
        workspace: &Workspace,
        profile: &LanguageProfile,
    ) -> Result<Option<RunOutcome>, JudgeError> {
        let Some(command) = profile.compile_command() else {
            return Ok(None);
        };

        let child = spawn(workspace.dir(), command, Stdio::null())?;
        let outcome = self
            .compile_governor
            .supervise(child, "")
            .await
            .map_err(|e| launch_error(command, e))?;

        log::debug!(
            "Compiled {} in {} ms, exit code {:?}",
            profile.name,
            outcome.elapsed.as_millis(),
            outcome.exit_code
        );
        Ok(Some(outcome))
    }

    /// Runs the program once against `input`; every call gets a fresh process
    pub async fn run(
        &self,
        workspace: &Workspace,
        profile: &LanguageProfile,
        input: &str,
    ) -> Result<RunOutcome, JudgeError> {
        let command = profile.run_command();
        let child = spawn(workspace.dir(), command, Stdio::piped())?;

        let mut input = input.to_string();
        if !input.ends_with('\n') {
            input.push('\n');
        }

        self.run_governor
            .supervise(child, &input)
            .await
            .map_err(|e| launch_error(command, e))
    }
}

fn spawn(dir: &Path, command: &[String], stdin: Stdio) -> Result<Child, JudgeError> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| anyhow::anyhow!("Empty command"))?;

    let mut cmd = std::process::Command::new(resolve_program(dir, program));
    cmd.args(args)
        .current_dir(dir)
        .stdin(stdin)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        // own group, so the governor can kill the whole tree
        .process_group(0);

    Command::from(cmd)
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| launch_error(command, e))
}

/// Relative paths such as `./main` point into the workspace, bare names go through PATH
fn resolve_program(dir: &Path, program: &str) -> PathBuf {
    let path = Path::new(program);
    if path.is_relative() && program.contains('/') {
        dir.join(path)
    } else {
        path.to_path_buf()
    }
}

fn launch_error(command: &[String], source: std::io::Error) -> JudgeError {
    JudgeError::Launch {
        program: command.first().cloned().unwrap_or_default(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config(time_limit_ms: u64) -> JudgeConfig {
        JudgeConfig {
            time_limit_ms,
            ..JudgeConfig::default()
        }
    }

    fn sh_profile() -> LanguageProfile {
        LanguageProfile::new(
            "sh",
            "main.sh",
            Some(vec!["sh".into(), "-n".into(), "%INPUT%".into()]),
            vec!["sh".into(), "%INPUT%".into()],
        )
        .unwrap()
    }

    #[test]
    fn test_resolve_program() {
        let dir = Path::new("/ws");
        assert_eq!(resolve_program(dir, "./main"), PathBuf::from("/ws/./main"));
        assert_eq!(resolve_program(dir, "python3"), PathBuf::from("python3"));
        assert_eq!(resolve_program(dir, "/usr/bin/java"), PathBuf::from("/usr/bin/java"));
    }

    #[tokio::test]
    async fn test_compile_and_run_sum() {
        let root = tempfile::tempdir().unwrap();
        let profile = sh_profile();
        let workspace = Workspace::open(root.path(), &profile, "read a b\necho $((a + b))\n")
            .await
            .unwrap();
        let runner = ProcessRunner::new(&config(5_000));

        let compiled = runner.compile(&workspace, &profile).await.unwrap().unwrap();
        assert!(compiled.success());

        let outcome = runner.run(&workspace, &profile, "3 5").await.unwrap();
        assert_eq!(outcome.kind, TerminalKind::Completed);
        assert_eq!(outcome.exit_code, Some(0));
        assert_eq!(outcome.stdout, "8\n");

        workspace.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_syntax_error_fails_compilation() {
        let root = tempfile::tempdir().unwrap();
        let profile = sh_profile();
        let workspace = Workspace::open(root.path(), &profile, "if then fi (\n")
            .await
            .unwrap();

        let compiled = ProcessRunner::new(&config(5_000))
            .compile(&workspace, &profile)
            .await
            .unwrap()
            .unwrap();
        assert!(!compiled.success());
        assert!(!compiled.stderr.is_empty());
    }

    #[tokio::test]
    async fn test_interpreted_language_has_no_compile_step() {
        let root = tempfile::tempdir().unwrap();
        let profile =
            LanguageProfile::new("sh", "main.sh", None, vec!["sh".into(), "%INPUT%".into()])
                .unwrap();
        let workspace = Workspace::open(root.path(), &profile, "echo hi\n")
            .await
            .unwrap();

        let runner = ProcessRunner::new(&config(5_000));
        assert_eq!(runner.compile(&workspace, &profile).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_runs_are_isolated_from_each_other() {
        let root = tempfile::tempdir().unwrap();
        let profile =
            LanguageProfile::new("sh", "main.sh", None, vec!["sh".into(), "%INPUT%".into()])
                .unwrap();
        // a leftover background process must not write into the next run's output
        let workspace = Workspace::open(
            root.path(),
            &profile,
            "read x\n(sleep 1; echo late) &\necho $x\n",
        )
        .await
        .unwrap();
        let runner = ProcessRunner::new(&config(5_000));

        let first = runner.run(&workspace, &profile, "one").await.unwrap();
        let second = runner.run(&workspace, &profile, "two").await.unwrap();
        assert_eq!(first.stdout, "one\n");
        assert_eq!(second.stdout, "two\n");
    }

    #[tokio::test]
    async fn test_missing_interpreter_is_a_launch_error() {
        let root = tempfile::tempdir().unwrap();
        let profile = LanguageProfile::new(
            "ghost",
            "main.ghost",
            None,
            vec!["definitely-not-an-interpreter".into(), "%INPUT%".into()],
        )
        .unwrap();
        let workspace = Workspace::open(root.path(), &profile, "").await.unwrap();

        let err = ProcessRunner::new(&config(5_000))
            .run(&workspace, &profile, "")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            JudgeError::Launch { program, .. } if program == "definitely-not-an-interpreter"
        ));
    }
}

use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Child;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use super::{RunOutcome, TerminalKind};

/// How long to wait for the output pipes to close once the process group is gone
const PIPE_GRACE: Duration = Duration::from_secs(1);

/// Bounds the wall-clock time of a spawned process and collects what it printed
///
/// The child must have been spawned as the leader of its own process group so
/// that the whole tree can be killed at once.
#[derive(Debug, Clone)]
pub struct TimeoutGovernor {
    limit: Duration,
    output_limit: usize,
}

impl TimeoutGovernor {
    pub fn new(limit: Duration, output_limit: usize) -> Self {
        Self {
            limit,
            output_limit,
        }
    }

    /// Feeds `input` to the child, waits for it within the limit and kills its
    /// process group afterwards, whether it finished or not
    pub async fn supervise(&self, mut child: Child, input: &str) -> io::Result<RunOutcome> {
        let start = Instant::now();
        let pgid = child.id();

        let writer = child.stdin.take().map(|mut stdin| {
            let input = input.as_bytes().to_vec();
            tokio::spawn(async move {
                if let Err(e) = stdin.write_all(&input).await
                    && e.kind() != io::ErrorKind::BrokenPipe
                {
                    log::debug!("Failed to write stdin: {e}");
                }
                // stdin is dropped here, the child sees EOF
            })
        });
        let stdout = child
            .stdout
            .take()
            .map(|pipe| Capture::spawn(pipe, self.output_limit));
        let stderr = child
            .stderr
            .take()
            .map(|pipe| Capture::spawn(pipe, self.output_limit));

        // The leader stays a zombie until `child.wait` below, which keeps its
        // pid, and so the group id, from being reused while the group is killed
        let exited = match pgid {
            Some(pid) => {
                let exit = tokio::task::spawn_blocking(move || wait_exited(pid));
                timeout(self.limit, exit).await.is_ok()
            }
            None => true,
        };
        let elapsed = start.elapsed();
        kill_process_group(pgid);

        let (exit_code, kind) = if exited {
            match child.wait().await?.code() {
                Some(code) => (Some(code), TerminalKind::Completed),
                None => (None, TerminalKind::ProcessError),
            }
        } else {
            log::info!(
                "Process {} exceeded {} ms, killed",
                pgid.unwrap_or_default(),
                self.limit.as_millis()
            );
            if let Err(e) = child.kill().await {
                log::debug!("Failed to reap timed out process: {e}");
            }
            (None, TerminalKind::TimedOut)
        };

        if let Some(writer) = writer {
            writer.abort();
        }

        Ok(RunOutcome {
            stdout: Capture::collect(stdout).await,
            stderr: Capture::collect(stderr).await,
            exit_code,
            elapsed,
            kind,
        })
    }
}

/// Blocks until the child has exited without reaping it
fn wait_exited(pid: u32) -> io::Result<()> {
    loop {
        // SAFETY: siginfo_t is plain data, all zeroes is a valid value
        let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
        // SAFETY: `info` outlives the call
        let ret = unsafe {
            libc::waitid(
                libc::P_PID,
                pid as libc::id_t,
                &mut info,
                libc::WEXITED | libc::WNOWAIT,
            )
        };
        if ret == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

/// One output stream, drained in the background into a shared buffer
struct Capture {
    buf: Arc<Mutex<Vec<u8>>>,
    reader: JoinHandle<io::Result<()>>,
}

impl Capture {
    fn spawn<R>(pipe: R, limit: usize) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let reader = tokio::spawn(read_capped(pipe, limit, buf.clone()));
        Self { buf, reader }
    }

    /// Waits for the stream to close and returns what was read, even if a
    /// process outside the group keeps the pipe open past the grace period
    async fn collect(capture: Option<Self>) -> String {
        let Some(Self { buf, mut reader }) = capture else {
            return String::new();
        };
        match timeout(PIPE_GRACE, &mut reader).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => log::warn!("Failed to read process output: {e}"),
            Ok(Err(e)) => log::warn!("Output reader task failed: {e}"),
            Err(_) => {
                log::warn!("Output pipe still open after the process group was killed");
                reader.abort();
            }
        }
        let bytes = buf.lock();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

/// Reads the stream to its end, keeping at most `limit` bytes
async fn read_capped<R: AsyncRead + Unpin>(
    mut reader: R,
    limit: usize,
    buf: Arc<Mutex<Vec<u8>>>,
) -> io::Result<()> {
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        let mut buf = buf.lock();
        let room = limit.saturating_sub(buf.len());
        buf.extend_from_slice(&chunk[..n.min(room)]);
    }
}

fn kill_process_group(pgid: Option<u32>) {
    let Some(pgid) = pgid else {
        return;
    };
    // SAFETY: killpg has no memory-safety preconditions
    let ret = unsafe { libc::killpg(pgid as libc::pid_t, libc::SIGKILL) };
    if ret != 0 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            log::debug!("killpg({pgid}) failed: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::process::CommandExt;
    use std::process::Stdio;
    use tokio::process::Command;

    fn spawn_sh(script: &str) -> Child {
        let mut cmd = std::process::Command::new("sh");
        cmd.args(["-c", script])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0);
        Command::from(cmd).kill_on_drop(true).spawn().unwrap()
    }

    fn governor(limit_ms: u64) -> TimeoutGovernor {
        TimeoutGovernor::new(Duration::from_millis(limit_ms), 1 << 20)
    }

    #[tokio::test]
    async fn test_completed_process_reports_streams_and_exit_code() {
        let outcome = governor(5_000)
            .supervise(spawn_sh("cat; echo oops >&2; exit 3"), "hello")
            .await
            .unwrap();

        assert_eq!(outcome.kind, TerminalKind::Completed);
        assert_eq!(outcome.exit_code, Some(3));
        assert_eq!(outcome.stdout, "hello");
        assert_eq!(outcome.stderr, "oops\n");
    }

    #[tokio::test]
    async fn test_infinite_loop_is_killed_at_the_limit() {
        let outcome = governor(300)
            .supervise(spawn_sh("while :; do :; done"), "")
            .await
            .unwrap();

        assert_eq!(outcome.kind, TerminalKind::TimedOut);
        assert_eq!(outcome.exit_code, None);
        assert!(outcome.elapsed >= Duration::from_millis(300));
        assert!(outcome.elapsed < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_timeout_kills_background_children_too() {
        let start = Instant::now();
        let outcome = governor(300)
            .supervise(spawn_sh("sleep 30 & sleep 30; wait"), "")
            .await
            .unwrap();

        assert_eq!(outcome.kind, TerminalKind::TimedOut);
        // the pipes only close once every sleep is dead
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_signal_death_is_a_process_error() {
        let outcome = governor(5_000)
            .supervise(spawn_sh("kill -9 $$"), "")
            .await
            .unwrap();

        assert_eq!(outcome.kind, TerminalKind::ProcessError);
        assert_eq!(outcome.exit_code, None);
    }

    #[tokio::test]
    async fn test_output_is_capped() {
        let script = "i=0; while [ $i -lt 500 ]; do echo 0123456789; i=$((i+1)); done";
        let outcome = TimeoutGovernor::new(Duration::from_secs(5), 1000)
            .supervise(spawn_sh(script), "")
            .await
            .unwrap();

        assert_eq!(outcome.kind, TerminalKind::Completed);
        assert_eq!(outcome.stdout.len(), 1000);
    }

    #[tokio::test]
    async fn test_program_ignoring_stdin_still_completes() {
        let input = "x".repeat(1 << 20);
        let outcome = governor(5_000)
            .supervise(spawn_sh("echo done"), &input)
            .await
            .unwrap();

        assert_eq!(outcome.kind, TerminalKind::Completed);
        assert_eq!(outcome.stdout, "done\n");
    }

    #[tokio::test]
    async fn test_exit_is_observed_without_reaping() {
        let mut child = spawn_sh("exit 7");
        let pid = child.id().unwrap();

        tokio::task::spawn_blocking(move || wait_exited(pid))
            .await
            .unwrap()
            .unwrap();

        // still a zombie: the pid is not free for reuse and the status is intact
        // SAFETY: signal 0 only checks that the pid exists
        assert_eq!(unsafe { libc::kill(pid as libc::pid_t, 0) }, 0);
        assert_eq!(child.wait().await.unwrap().code(), Some(7));
    }

    #[tokio::test]
    async fn test_output_survives_a_descendant_holding_the_pipe() {
        // setsid moves the sleeper out of the process group, so killpg misses it
        let outcome = governor(5_000)
            .supervise(spawn_sh("echo partial; setsid sleep 3 & exit 0"), "")
            .await
            .unwrap();

        assert_eq!(outcome.kind, TerminalKind::Completed);
        assert_eq!(outcome.stdout, "partial\n");
    }
}

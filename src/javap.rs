use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::error::TaskError;

pub const VERBOSE_FLAG: &str = "-v";
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct Javap {
    program: PathBuf,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl Javap {
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: vec![VERBOSE_FLAG.to_string()],
            timeout: None,
        }
    }

    /// Replaces the arguments placed before the artifact path.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout.filter(|t| !t.is_zero());
        self
    }

    /// Starts the disassembler on `class_file`. Output is consumed by
    /// iterating the returned [`Disassembly`]; call [`Disassembly::finish`]
    /// afterwards to reap the child.
    pub fn spawn(&self, class_file: &Path) -> Result<Disassembly, TaskError> {
        let target = std::path::absolute(class_file).unwrap_or_else(|_| class_file.to_path_buf());

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(&target)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| TaskError::ToolInvocation {
                program: self.program.display().to_string(),
                source,
            })?;

        let (tx, rx) = std::sync::mpsc::channel();
        let stdout_reader = child.stdout.take().map(|stdout| {
            std::thread::spawn(move || {
                let mut reader = BufReader::new(stdout);
                let mut buf = Vec::new();
                loop {
                    buf.clear();
                    let line = match reader.read_until(b'\n', &mut buf) {
                        Ok(0) => break,
                        Ok(_) => Ok(decode_line(&buf)),
                        Err(err) => Err(err),
                    };
                    let failed = line.is_err();
                    if tx.send(line).is_err() || failed {
                        break;
                    }
                }
            })
        });
        let stderr_reader = child.stderr.take().map(|mut stderr| {
            std::thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = stderr.read_to_end(&mut buf);
                String::from_utf8_lossy(&buf).into_owned()
            })
        });

        Ok(Disassembly {
            child,
            lines: rx,
            stdout_reader,
            stderr_reader,
            deadline: self.timeout.map(|t| Instant::now() + t),
            timeout: self.timeout,
            exhausted: false,
        })
    }
}

/// Strips the line terminator and decodes leniently; bytes that are not
/// UTF-8 become U+FFFD.
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

#[derive(Debug)]
pub struct ToolExit {
    pub status: ExitStatus,
    pub stderr: String,
}

impl ToolExit {
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// A running disassembler. Yields stdout one line at a time.
pub struct Disassembly {
    child: Child,
    lines: Receiver<io::Result<String>>,
    stdout_reader: Option<JoinHandle<()>>,
    stderr_reader: Option<JoinHandle<String>>,
    deadline: Option<Instant>,
    timeout: Option<Duration>,
    exhausted: bool,
}

impl Disassembly {
    /// Waits for the child to exit, within whatever remains of the timeout.
    pub fn finish(mut self) -> Result<ToolExit, TaskError> {
        let status = loop {
            match self.child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if self.expired() {
                        return Err(self.abort());
                    }
                    std::thread::sleep(EXIT_POLL_INTERVAL);
                }
                Err(err) => return Err(TaskError::ExtractionIo(err)),
            }
        };

        if let Some(handle) = self.stdout_reader.take() {
            let _ = handle.join();
        }
        let stderr = self
            .stderr_reader
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        Ok(ToolExit { status, stderr })
    }

    fn expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    fn abort(&mut self) -> TaskError {
        let _ = self.child.kill();
        let _ = self.child.wait();
        self.exhausted = true;
        TaskError::Timeout(self.timeout.unwrap_or_default())
    }
}

impl Iterator for Disassembly {
    type Item = Result<String, TaskError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }

        let received = match self.deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                match self.lines.recv_timeout(remaining) {
                    Ok(line) => Ok(line),
                    Err(RecvTimeoutError::Timeout) => return Some(Err(self.abort())),
                    Err(RecvTimeoutError::Disconnected) => Err(()),
                }
            }
            None => self.lines.recv().map_err(|_| ()),
        };

        match received {
            Ok(Ok(line)) => Some(Ok(line)),
            Ok(Err(err)) => {
                self.exhausted = true;
                Some(Err(TaskError::ExtractionIo(err)))
            }
            Err(()) => {
                self.exhausted = true;
                None
            }
        }
    }
}

impl Drop for Disassembly {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;

    fn fake_javap(dir: &Path, body: &str) -> Javap {
        let script = dir.join("javap.sh");
        fs::write(&script, format!("#!/bin/sh\n{body}\n")).unwrap();
        Javap::new(PathBuf::from("sh")).with_args(vec![
            script.to_string_lossy().into_owned(),
            VERBOSE_FLAG.to_string(),
        ])
    }

    #[test]
    fn streams_stdout_lines_and_passes_verbose_flag_and_path() -> Result<(), TaskError> {
        let dir = tempfile::tempdir().unwrap();
        let javap = fake_javap(
            dir.path(),
            r#"echo "flag=$1"
echo "target=$2"
cat <<'EOF'
  public void foo();
  private int bar;
EOF"#,
        );
        let class_file = dir.path().join("Foo.class");
        fs::write(&class_file, b"").unwrap();

        let mut run = javap.spawn(&class_file)?;
        let lines: Vec<String> = run.by_ref().collect::<Result<_, _>>()?;
        let exit = run.finish()?;

        assert!(exit.success());
        assert_eq!(lines[0], "flag=-v");
        assert_eq!(lines[1], format!("target={}", class_file.display()));
        assert_eq!(&lines[2..], ["  public void foo();", "  private int bar;"]);
        Ok(())
    }

    #[test]
    fn non_zero_exit_keeps_partial_output() -> Result<(), TaskError> {
        let dir = tempfile::tempdir().unwrap();
        let javap = fake_javap(
            dir.path(),
            r#"echo "  public void partial();"
echo "boom from fake javap" >&2
exit 3"#,
        );

        let mut run = javap.spawn(&dir.path().join("Broken.class"))?;
        let lines: Vec<String> = run.by_ref().collect::<Result<_, _>>()?;
        let exit = run.finish()?;

        assert_eq!(lines, vec!["  public void partial();"]);
        assert!(!exit.success());
        assert_eq!(exit.status.code(), Some(3));
        assert!(exit.stderr.contains("boom from fake javap"));
        Ok(())
    }

    #[test]
    fn non_utf8_output_is_decoded_lossily() -> Result<(), TaskError> {
        let dir = tempfile::tempdir().unwrap();
        let javap = fake_javap(
            dir.path(),
            r#"echo "  public void foo();"
printf '  const \351t\351 // com.example.Widget\n'
printf '  private int bar;\r\n'"#,
        );

        let mut run = javap.spawn(&dir.path().join("Latin.class"))?;
        let lines: Vec<String> = run.by_ref().collect::<Result<_, _>>()?;
        let exit = run.finish()?;

        assert!(exit.success());
        assert_eq!(
            lines,
            vec![
                "  public void foo();",
                "  const \u{FFFD}t\u{FFFD} // com.example.Widget",
                "  private int bar;",
            ]
        );
        Ok(())
    }

    #[test]
    fn decode_line_strips_lf_and_crlf_only() {
        assert_eq!(decode_line(b"abc\n"), "abc");
        assert_eq!(decode_line(b"abc\r\n"), "abc");
        assert_eq!(decode_line(b"abc"), "abc");
        assert_eq!(decode_line(b"a\rb\n"), "a\rb");
    }

    #[test]
    fn missing_executable_is_a_tool_invocation_error() {
        let dir = tempfile::tempdir().unwrap();
        let javap = Javap::new(dir.path().join("no-such-javap"));
        let err = javap.spawn(&dir.path().join("A.class")).err().unwrap();
        assert_eq!(err.kind(), "ToolInvocationError");
    }

    #[test]
    fn hung_process_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let javap = fake_javap(dir.path(), "echo started\nexec sleep 30")
            .with_timeout(Some(Duration::from_millis(300)));

        let started = Instant::now();
        let mut run = javap.spawn(&dir.path().join("Slow.class")).unwrap();
        assert_eq!(run.next().unwrap().unwrap(), "started");
        let err = run.next().unwrap().unwrap_err();
        assert_eq!(err.kind(), "ToolTimeout");
        assert!(run.next().is_none());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn zero_timeout_means_unbounded() {
        let javap = Javap::new(PathBuf::from("javap")).with_timeout(Some(Duration::ZERO));
        assert!(javap.timeout.is_none());
    }
}

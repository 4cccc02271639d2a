//! Append-only transcript of raw disassembler output.
//!
//! A single writer thread owns the destination. Workers never touch the
//! writer directly: they send whole [`TranscriptBlock`]s (or single lines)
//! over a channel, so lines are never spliced and one artifact's lines stay
//! contiguous in the log.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::thread::JoinHandle;

/// One artifact's share of the transcript: a header followed by every line
/// the disassembler printed, matched or not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscriptBlock {
    lines: Vec<String>,
}

impl TranscriptBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_artifact(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self {
            lines: vec![format!("Class: {name}")],
        }
    }

    pub fn push_line(&mut self, line: &str) {
        self.lines.push(line.to_string());
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct LogSinkHandle {
    tx: Sender<TranscriptBlock>,
    submitted: Arc<AtomicU64>,
}

impl LogSinkHandle {
    pub fn append_line(&self, text: &str) {
        let mut block = TranscriptBlock::new();
        block.push_line(text);
        self.append_block(block);
    }

    pub fn append_block(&self, block: TranscriptBlock) {
        if block.is_empty() {
            return;
        }
        let count = block.len() as u64;
        if self.tx.send(block).is_ok() {
            self.submitted.fetch_add(count, Ordering::Relaxed);
        }
    }
}

pub struct LogSink<W: Write + Send + 'static> {
    tx: Sender<TranscriptBlock>,
    submitted: Arc<AtomicU64>,
    writer: JoinHandle<io::Result<W>>,
}

impl LogSink<BufWriter<File>> {
    pub fn open(path: &Path, append: bool) -> io::Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write + Send + 'static> LogSink<W> {
    pub fn new(writer: W) -> Self {
        let (tx, rx) = std::sync::mpsc::channel::<TranscriptBlock>();
        Self {
            tx,
            submitted: Arc::new(AtomicU64::new(0)),
            writer: spawn_writer(rx, writer),
        }
    }

    pub fn handle(&self) -> LogSinkHandle {
        LogSinkHandle {
            tx: self.tx.clone(),
            submitted: Arc::clone(&self.submitted),
        }
    }

    pub fn submitted_lines(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    /// Closes the channel, waits for every queued block to be written and
    /// hands back the flushed writer. Outstanding handles must be dropped
    /// first or this blocks.
    pub fn shutdown_and_flush(self) -> io::Result<W> {
        let Self { tx, writer, .. } = self;
        drop(tx);
        writer
            .join()
            .map_err(|_| io::Error::other("transcript writer thread panicked"))?
    }
}

fn spawn_writer<W: Write + Send + 'static>(
    rx: Receiver<TranscriptBlock>,
    mut writer: W,
) -> JoinHandle<io::Result<W>> {
    std::thread::spawn(move || {
        let mut failure: Option<io::Error> = None;

        // Keep draining after a failure so senders never block on a dead sink.
        for block in rx.iter() {
            if failure.is_some() {
                continue;
            }
            for line in block.lines() {
                if let Err(err) = writeln!(writer, "{line}") {
                    failure = Some(err);
                    break;
                }
            }
        }

        if let Some(err) = failure {
            return Err(err);
        }
        writer.flush()?;
        Ok(writer)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn written(sink: LogSink<Vec<u8>>) -> Vec<String> {
        let bytes = sink.shutdown_and_flush().unwrap();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn block_starts_with_artifact_header() {
        let mut block = TranscriptBlock::for_artifact(Path::new("/tmp/x/com/a/Widget.class"));
        block.push_line("  public void foo();");
        assert_eq!(block.lines(), ["Class: Widget.class", "  public void foo();"]);
    }

    #[test]
    fn concurrent_writers_never_splice_lines() {
        let sink = LogSink::new(Vec::new());
        let writers = 8;
        let per_writer = 500;
        let mut known = HashSet::new();
        for w in 0..writers {
            for i in 0..per_writer {
                known.insert(format!("worker-{w} line-{i} {}", "x".repeat(i % 97)));
            }
        }

        std::thread::scope(|scope| {
            for w in 0..writers {
                let handle = sink.handle();
                scope.spawn(move || {
                    for i in 0..per_writer {
                        handle.append_line(&format!("worker-{w} line-{i} {}", "x".repeat(i % 97)));
                    }
                });
            }
        });

        assert_eq!(sink.submitted_lines(), (writers * per_writer) as u64);
        let lines = written(sink);
        assert_eq!(lines.len(), writers * per_writer);
        for line in &lines {
            assert!(known.contains(line), "corrupted line: {line:?}");
        }
    }

    #[test]
    fn blocks_from_concurrent_tasks_stay_contiguous() {
        let sink = LogSink::new(Vec::new());
        let tasks = 6;
        let lines_per_task = 200;

        std::thread::scope(|scope| {
            for t in 0..tasks {
                let handle = sink.handle();
                scope.spawn(move || {
                    let mut block = TranscriptBlock::for_artifact(Path::new(&format!("T{t}.class")));
                    for i in 0..lines_per_task {
                        block.push_line(&format!("T{t}:{i}"));
                    }
                    handle.append_block(block);
                });
            }
        });

        let lines = written(sink);
        assert_eq!(lines.len(), tasks * (lines_per_task + 1));
        for chunk in lines.chunks(lines_per_task + 1) {
            let header = &chunk[0];
            let task = header
                .strip_prefix("Class: T")
                .and_then(|rest| rest.strip_suffix(".class"))
                .unwrap();
            for (i, line) in chunk[1..].iter().enumerate() {
                assert_eq!(line, &format!("T{task}:{i}"));
            }
        }
    }

    #[test]
    fn open_appends_when_requested() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/javap_output.log");

        let sink = LogSink::open(&path, false).unwrap();
        sink.handle().append_line("first run");
        sink.shutdown_and_flush().unwrap();

        let sink = LogSink::open(&path, true).unwrap();
        sink.handle().append_line("second run");
        sink.shutdown_and_flush().unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "first run\nsecond run\n"
        );

        let sink = LogSink::open(&path, false).unwrap();
        sink.handle().append_line("fresh");
        sink.shutdown_and_flush().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "fresh\n");
    }

    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::StorageFull, "no space left"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_failure_surfaces_at_shutdown_without_blocking_senders() {
        let sink = LogSink::new(FullDisk);
        let handle = sink.handle();
        for i in 0..100 {
            handle.append_line(&format!("line {i}"));
        }
        drop(handle);

        assert_eq!(sink.submitted_lines(), 100);
        let err = sink.shutdown_and_flush().err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::StorageFull);
    }
}

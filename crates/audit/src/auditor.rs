use crate::{
    entry::{AuditEntry, current_timestamp_ms, format_csv_line},
    stage::ChallengeStage,
};

use crossbeam_channel::{Receiver, Sender, bounded};
use std::{
    fs::{self, File, OpenOptions},
    io::{self, BufWriter, Write},
    path::PathBuf,
    sync::{Arc, mpsc},
    thread,
    time::{Duration, Instant},
};

/// Rows buffered between the decision path and the writer thread. Rows that
/// do not fit are dropped rather than stalling a challenge.
const CHANNEL_CAPACITY: usize = 16_384;

/// Rows written between forced flushes.
const FLUSH_EVERY_ROWS: u64 = 100;

/// Maximum age of unflushed rows.
const FLUSH_EVERY: Duration = Duration::from_secs(1);

/// Default audit file.
pub const DEFAULT_AUDIT_PATH: &str = "/data/logs/challenger-audit.csv";

type Ack = mpsc::Sender<io::Result<()>>;

enum Command {
    Row(String),
    Flush(Ack),
    Sync(Ack),
}

#[derive(Debug)]
struct AuditLogInner {
    enabled: bool,
    tx: Sender<Command>,
}

/// Append-only CSV log of challenge decisions.
///
/// Cheap to clone. Rows are handed to a dedicated writer thread; `record`
/// never blocks and never fails.
#[derive(Debug, Clone)]
pub struct AuditLog {
    inner: Arc<AuditLogInner>,
}

impl AuditLog {
    /// Open the log at `path`, or [`DEFAULT_AUDIT_PATH`] when `None`. A path
    /// without an extension is treated as a directory.
    pub fn new(enabled: bool, path: Option<PathBuf>) -> Self {
        let path = path.unwrap_or_else(|| PathBuf::from(DEFAULT_AUDIT_PATH));
        let file_path = if path.extension().is_none() && !path.is_file() {
            path.join("challenger-audit.csv")
        } else {
            path
        };

        let (tx, rx) = bounded(CHANNEL_CAPACITY);
        if enabled {
            spawn_writer(rx, file_path);
        }

        Self { inner: Arc::new(AuditLogInner { enabled, tx }) }
    }

    /// A log that records nothing.
    pub fn disabled() -> Self {
        Self::new(false, None)
    }

    /// Whether rows are being written.
    pub fn is_enabled(&self) -> bool {
        self.inner.enabled
    }

    /// Record `stage` with its context at the current time.
    pub fn record(&self, stage: ChallengeStage, entry: &AuditEntry) {
        self.record_at(stage, current_timestamp_ms(), entry);
    }

    /// Record `stage` with an explicit millisecond timestamp.
    pub fn record_at(&self, stage: ChallengeStage, timestamp_ms: u128, entry: &AuditEntry) {
        if !self.inner.enabled {
            return;
        }
        let row = format_csv_line(stage, timestamp_ms, entry);
        if self.inner.tx.try_send(Command::Row(row)).is_err() {
            tracing::warn!(target: "challenger_audit", stage = stage.as_str(), "Audit row dropped");
        }
    }

    /// Flush buffered rows to the OS.
    pub fn flush(&self) -> io::Result<()> {
        self.request(Command::Flush)
    }

    /// Flush buffered rows and fsync the file.
    pub fn sync_all(&self) -> io::Result<()> {
        self.request(Command::Sync)
    }

    fn request(&self, command: impl FnOnce(Ack) -> Command) -> io::Result<()> {
        if !self.inner.enabled {
            return Ok(());
        }
        let (ack_tx, ack_rx) = mpsc::channel();
        self.inner
            .tx
            .send(command(ack_tx))
            .map_err(|_| io::Error::other("audit writer thread is gone"))?;
        ack_rx.recv().map_err(|_| io::Error::other("audit writer thread did not acknowledge"))?
    }
}

fn open_append(file_path: &PathBuf) -> Option<BufWriter<File>> {
    if let Some(parent) = file_path.parent()
        && let Err(e) = fs::create_dir_all(parent)
    {
        tracing::warn!(
            target: "challenger_audit",
            ?parent,
            error = %e,
            "Failed to create audit log directory"
        );
    }

    match OpenOptions::new().create(true).append(true).open(file_path) {
        Ok(file) => {
            tracing::info!(target: "challenger_audit", ?file_path, "Audit log opened");
            Some(BufWriter::new(file))
        }
        Err(e) => {
            tracing::warn!(
                target: "challenger_audit",
                ?file_path,
                error = %e,
                "Failed to open audit log, rows will be discarded"
            );
            None
        }
    }
}

fn spawn_writer(rx: Receiver<Command>, file_path: PathBuf) {
    thread::spawn(move || {
        let mut writer = open_append(&file_path);
        let mut rows: u64 = 0;
        let mut last_flush = Instant::now();

        while let Ok(command) = rx.recv() {
            match command {
                Command::Row(row) => {
                    let Some(w) = writer.as_mut() else { continue };
                    if let Err(e) = writeln!(w, "{row}") {
                        tracing::warn!(target: "challenger_audit", error = %e, "Audit write failed");
                        continue;
                    }
                    rows += 1;
                    if rows.is_multiple_of(FLUSH_EVERY_ROWS) || last_flush.elapsed() >= FLUSH_EVERY
                    {
                        if let Err(e) = w.flush() {
                            tracing::warn!(target: "challenger_audit", error = %e, "Audit flush failed");
                        }
                        last_flush = Instant::now();
                    }
                }
                Command::Flush(ack) => {
                    let result = writer.as_mut().map_or(Ok(()), |w| w.flush());
                    let _ = ack.send(result);
                }
                Command::Sync(ack) => {
                    let result = writer
                        .as_mut()
                        .map_or(Ok(()), |w| w.flush().and_then(|()| w.get_ref().sync_all()));
                    let _ = ack.send(result);
                }
            }
        }
    });
}

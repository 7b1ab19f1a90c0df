//! Implements dumps of a PostgreSQL database using [PgDump].

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use flate2::write::GzEncoder;
use flate2::Compression;
use wait_timeout::ChildExt;

use super::{ConnectionString, DumpError, Dumper};
use crate::config::DumpConfig;
use crate::util::naming::DumpFormat;

/// Dumps a PostgreSQL database with `pg_dump`, streaming its output into the backup file.
#[derive(Debug, Clone)]
pub struct PgDump {
    program: PathBuf,
    args: Vec<String>,
    format: DumpFormat,
    timeout: Duration,
}

impl PgDump {
    pub fn from_config(config: &DumpConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            format: config.format,
            timeout: config.timeout(),
        }
    }
}

impl Dumper for PgDump {
    fn dump(&self, connection: &ConnectionString, out_path: &Path) -> Result<(), DumpError> {
        let dest_dir = out_path.parent().unwrap_or(Path::new("."));
        if !dest_dir.as_os_str().is_empty() && !dest_dir.is_dir() {
            return Err(DumpError::MissingDirectory(dest_dir.to_path_buf()));
        }

        log::info!(target: "backend::postgres", "Starting local backup to {}", out_path.display());
        let sink = DumpSink::create(out_path, self.format)?;

        let result = self.run(connection, sink);
        if result.is_err() {
            log::debug!(target: "backend::postgres", "Discarding incomplete dump {}", out_path.display());
            if let Err(e) = fs::remove_file(out_path) {
                log::warn!(target: "backend::postgres", "Removing incomplete dump {} failed: {e}", out_path.display());
            }
        }
        result?;

        log::info!(target: "backend::postgres", "Local backup successful.");
        Ok(())
    }
}

impl PgDump {
    fn run(&self, connection: &ConnectionString, mut sink: DumpSink) -> Result<(), DumpError> {
        let deadline = Instant::now().checked_add(self.timeout);
        // the command itself is never logged, it carries the connection string
        let mut dump_process = Command::new(&self.program)
            .args(&self.args)
            .arg(format!("--dbname={}", connection.expose()))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| DumpError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        log::trace!(target: "backend::postgres", "Started {} process.", self.program.display());

        let (Some(stdout), Some(stderr)) = (dump_process.stdout.take(), dump_process.stderr.take())
        else {
            kill(&mut dump_process);
            return Err(io::Error::other("dump process output not captured").into());
        };

        // readers are never joined: descendants of the tool may hold the pipes open
        let writer = spawn_reader(move || {
            let mut reader = BufReader::new(stdout);
            io::copy(&mut reader, &mut sink)?;
            sink.finish()
        });
        let stderr_reader = spawn_reader(move || {
            let mut buf = Vec::new();
            BufReader::new(stderr).read_to_end(&mut buf)?;
            Ok(buf)
        });

        let status = match dump_process.wait_timeout(self.timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                log::error!(target: "backend::postgres", "Dump exceeded {:?}, killing it", self.timeout);
                kill(&mut dump_process);
                return Err(DumpError::TimedOut(self.timeout));
            }
            Err(e) => {
                kill(&mut dump_process);
                return Err(e.into());
            }
        };

        let (Some(written), Some(stderr)) = (receive(&writer, deadline), receive(&stderr_reader, deadline))
        else {
            log::error!(target: "backend::postgres", "Dump output still open after {:?}, giving up", self.timeout);
            return Err(DumpError::TimedOut(self.timeout));
        };
        let stderr = stderr.unwrap_or_default();
        let stderr = String::from_utf8_lossy(&stderr);
        let stderr = connection.redact(stderr.trim());

        if !status.success() {
            return Err(DumpError::Failed {
                status,
                stderr: stderr.into_owned(),
            });
        }
        // relay stderr
        if !stderr.is_empty() {
            log::warn!(target: "backend::postgres", "{stderr}");
        }

        written.map_err(DumpError::from)
    }
}

fn kill(process: &mut Child) {
    if let Err(e) = process.kill() {
        log::debug!(target: "backend::postgres", "Killing dump process failed: {e}");
    }
    if let Err(e) = process.wait() {
        log::warn!(target: "backend::postgres", "Reaping dump process failed: {e}");
    }
}

fn spawn_reader<T, F>(read: F) -> Receiver<io::Result<T>>
where
    T: Send + 'static,
    F: FnOnce() -> io::Result<T> + Send + 'static,
{
    let (tx, rx) = mpsc::sync_channel(1);
    thread::spawn(move || {
        // the receiver is gone once the dump was given up
        let _ = tx.send(read());
    });
    rx
}

/// Waits for a reader until `deadline`, [None] if it is still busy by then.
fn receive<T>(rx: &Receiver<io::Result<T>>, deadline: Option<Instant>) -> Option<io::Result<T>> {
    let received = match deadline {
        Some(deadline) => rx.recv_timeout(deadline.saturating_duration_since(Instant::now())),
        None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
    };
    match received {
        Ok(result) => Some(result),
        Err(RecvTimeoutError::Timeout) => None,
        Err(RecvTimeoutError::Disconnected) => Some(Err(io::Error::other("dump output reader panicked"))),
    }
}

/// Destination of the dump tool's stdout.
enum DumpSink {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl DumpSink {
    fn create(path: &Path, format: DumpFormat) -> io::Result<Self> {
        let file = BufWriter::new(File::create_new(path)?);
        Ok(match format {
            DumpFormat::Plain => Self::Plain(file),
            DumpFormat::Gzip => Self::Gzip(GzEncoder::new(file, Compression::default())),
        })
    }

    fn finish(self) -> io::Result<()> {
        let file = match self {
            Self::Plain(writer) => writer,
            Self::Gzip(encoder) => encoder.finish()?,
        };
        file.into_inner().map_err(|e| e.into_error())?.sync_all()
    }
}

impl Write for DumpSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(writer) => writer.write(buf),
            Self::Gzip(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(writer) => writer.flush(),
            Self::Gzip(encoder) => encoder.flush(),
        }
    }
}

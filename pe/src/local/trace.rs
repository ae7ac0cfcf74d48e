//! Trace sinks: named append-only text outputs

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::{EngineError, EngineResult, PrimitiveId};

/// Identifiers that trace to the standard streams without being opened
const STDOUT_ID: &str = "out";
const STDERR_ID: &str = "err";

#[derive(Debug)]
struct TraceFile {
    path: PathBuf,
    writer: BufWriter<File>,
}

#[derive(Debug, Default)]
pub(crate) struct Traces {
    base_dir: Option<PathBuf>,
    files: Mutex<HashMap<PrimitiveId, TraceFile>>,
}

impl Traces {
    pub(crate) fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
            files: Mutex::default(),
        }
    }

    fn resolve(&self, file_name: &str) -> PathBuf {
        let path = Path::new(file_name);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    pub(crate) fn open(&self, id: &PrimitiveId, file_name: &str) -> EngineResult<bool> {
        if file_name.trim().is_empty() {
            return Err(EngineError::InvalidArgument {
                id: id.clone(),
                reason: "empty trace file name".to_string(),
            });
        }

        let mut files = self.files.lock();
        if files.contains_key(id) {
            return Ok(false);
        }

        let path = self.resolve(file_name);
        debug!(%id, path = %path.display(), "Traces::open: opening");
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| EngineError::TraceIo {
                id: id.clone(),
                path: path.clone(),
                source,
            })?;

        files.insert(
            id.clone(),
            TraceFile {
                path,
                writer: BufWriter::new(file),
            },
        );
        Ok(true)
    }

    pub(crate) fn close(&self, id: &PrimitiveId) -> bool {
        let Some(mut file) = self.files.lock().remove(id) else {
            return false;
        };
        if let Err(e) = file.writer.flush() {
            warn!(%id, path = %file.path.display(), error = %e, "Traces::close: flush failed");
        }
        true
    }

    pub(crate) fn write(&self, id: &PrimitiveId, message: &str, newline: bool) -> EngineResult<bool> {
        let mut files = self.files.lock();
        if let Some(file) = files.get_mut(id) {
            write_message(&mut file.writer, message, newline).map_err(|source| EngineError::TraceIo {
                id: id.clone(),
                path: file.path.clone(),
                source,
            })?;
            return Ok(true);
        }
        drop(files);

        let result = match id.as_str() {
            STDOUT_ID => write_message(&mut io::stdout().lock(), message, newline),
            STDERR_ID => write_message(&mut io::stderr().lock(), message, newline),
            _ => {
                debug!(%id, "Traces::write: trace not open");
                return Ok(false);
            }
        };
        result.map_err(|source| EngineError::TraceIo {
            id: id.clone(),
            path: PathBuf::from(id.as_str()),
            source,
        })?;
        Ok(true)
    }
}

fn write_message(writer: &mut impl Write, message: &str, newline: bool) -> io::Result<()> {
    writer.write_all(message.as_bytes())?;
    if newline {
        writer.write_all(b"\n")?;
    }
    writer.flush()
}

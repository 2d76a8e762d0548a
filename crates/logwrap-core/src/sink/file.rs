//! File sink.
//!
//! The file is not opened when the sink is constructed. Attaching it to a
//! logger resolves the final path (optionally with a capture-time suffix),
//! creates the parent directory and opens the file.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::LogSink;
use crate::format::dated_file_name;
use crate::record::LogRecord;

/// How an existing file is treated when opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileMode {
    #[default]
    Append,
    Truncate,
}

/// Appends formatted lines to a file.
pub struct FileSink {
    path: PathBuf,
    mode: FileMode,
    writer: Mutex<Option<BufWriter<File>>>,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>, mode: FileMode) -> Self {
        Self {
            path: path.into(),
            mode,
            writer: Mutex::new(None),
        }
    }

    /// Path of the file. Absolute once the sink has been attached.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> FileMode {
        self.mode
    }

    /// True once the file handle has been opened.
    pub fn is_open(&self) -> bool {
        self.writer.lock().is_some()
    }

    /// Resolve the final path and open the file.
    pub(crate) fn open(self, date_filename: bool, at: NaiveDateTime) -> io::Result<Self> {
        let path = if date_filename {
            dated_file_name(&self.path, at)
        } else {
            self.path.clone()
        };
        let path = std::path::absolute(&path)?;
        let file = open_file(&path, self.mode)?;

        Ok(Self {
            path,
            mode: self.mode,
            writer: Mutex::new(Some(BufWriter::new(file))),
        })
    }
}

fn open_file(path: &Path, mode: FileMode) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut options = OpenOptions::new();
    match mode {
        FileMode::Append => options.create(true).append(true),
        FileMode::Truncate => options.create(true).write(true).truncate(true),
    };
    options.open(path)
}

impl LogSink for FileSink {
    fn emit(&self, _record: &LogRecord, line: &str) -> io::Result<()> {
        let mut guard = self.writer.lock();
        if guard.is_none() {
            *guard = Some(BufWriter::new(open_file(&self.path, self.mode)?));
        }
        if let Some(writer) = guard.as_mut() {
            writeln!(writer, "{}", line)?;
            writer.flush()?;
        }
        Ok(())
    }

    fn flush(&self) -> io::Result<()> {
        match self.writer.lock().as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }

    fn destination(&self) -> String {
        self.path.display().to_string()
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

//! Optional plain-text transcript of the conversation, toggled with `/log`.

use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::core::message::{Message, Role};

#[derive(Debug, thiserror::Error)]
pub enum TranscriptError {
    #[error("No log file specified. Use /log <filename> to enable logging first.")]
    NoFile,

    #[error("cannot write transcript {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
}

#[derive(Debug, Default)]
pub struct TranscriptLog {
    path: Option<PathBuf>,
    active: bool,
}

impl TranscriptLog {
    pub fn new(path: Option<PathBuf>) -> Self {
        let active = path.is_some();
        Self { path, active }
    }

    /// Start appending to `path`. The file is opened once up front so an
    /// unwritable location is reported immediately.
    pub fn set_log_file(&mut self, path: impl Into<PathBuf>) -> Result<String, TranscriptError> {
        let path = path.into();
        open_append(&path)?;
        let message = format!("Logging enabled to: {}", path.display());
        self.path = Some(path);
        self.active = true;
        Ok(message)
    }

    /// Pause or resume logging to the current file.
    pub fn toggle(&mut self) -> Result<String, TranscriptError> {
        let path = self.path.as_ref().ok_or(TranscriptError::NoFile)?;
        if self.active {
            let message = format!("Logging paused (file: {})", path.display());
            self.write_lines(&format!("## {message}"))?;
            self.active = false;
            Ok(message)
        } else {
            self.active = true;
            Ok(format!("Logging resumed to: {}", path.display()))
        }
    }

    pub fn is_active(&self) -> bool {
        self.active && self.path.is_some()
    }

    pub fn status(&self) -> String {
        let name = |path: &Path| {
            path.file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .into_owned()
        };
        match (&self.path, self.active) {
            (None, _) => "disabled".to_string(),
            (Some(path), true) => format!("active ({})", name(path)),
            (Some(path), false) => format!("paused ({})", name(path)),
        }
    }

    pub fn log_message(&self, message: &Message, user_name: &str) -> Result<(), TranscriptError> {
        if !self.is_active() {
            return Ok(());
        }
        self.write_lines(&format_entry(message, user_name))
    }

    /// Replace the file contents with the whole transcript, e.g. after a saved
    /// session is loaded.
    pub fn rewrite(&self, messages: &[Message], user_name: &str) -> Result<(), TranscriptError> {
        let Some(path) = self.path.as_ref().filter(|_| self.active) else {
            return Ok(());
        };
        let io_err = |source| TranscriptError::Io {
            path: path.clone(),
            source,
        };
        let parent = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut temp = NamedTempFile::new_in(parent).map_err(io_err)?;
        for message in messages {
            write_block(&mut temp, &format_entry(message, user_name)).map_err(io_err)?;
        }
        temp.as_file().sync_all().map_err(io_err)?;
        temp.persist(path).map_err(|err| io_err(err.error))?;
        Ok(())
    }

    fn write_lines(&self, content: &str) -> Result<(), TranscriptError> {
        let Some(path) = &self.path else {
            return Err(TranscriptError::NoFile);
        };
        let file = open_append(path)?;
        let mut writer = BufWriter::new(file);
        write_block(&mut writer, content)
            .and_then(|_| writer.flush())
            .map_err(|source| TranscriptError::Io {
                path: path.clone(),
                source,
            })
    }
}

fn open_append(path: &Path) -> Result<std::fs::File, TranscriptError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| TranscriptError::Io {
            path: path.to_path_buf(),
            source,
        })
}

fn format_entry(message: &Message, user_name: &str) -> String {
    match message.role {
        Role::User => format!("{user_name}: {}", message.content),
        Role::Assistant => message.content.clone(),
    }
}

fn write_block(writer: &mut impl Write, content: &str) -> io::Result<()> {
    for line in content.lines() {
        writeln!(writer, "{line}")?;
    }
    writeln!(writer)
}

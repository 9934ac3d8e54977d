//! Metadata extractor boundary
//!
//! The engine that parses a title's descriptor lives outside this crate.
//! [`MetadataExtractor`] is the seam the scan pipeline calls through, and
//! [`CommandExtractor`] adapts an external program to it.

use crate::record::TitleRecord;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Extractor did not produce a record")]
    NoRecord,

    #[error("Extractor exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("Invalid extractor output: {0}")]
    InvalidOutput(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Produces title records from descriptors
pub trait MetadataExtractor: Send + Sync {
    /// Extract the record of a title directory
    fn extract_dir(&self, path: &Path) -> Result<TitleRecord, ExtractError>;

    /// Extract the record of a disc image read from `reader`
    ///
    /// `Ok(None)` means the image holds no recognizable title.
    fn extract_stream(
        &self,
        reader: Box<dyn Read + Send>,
        display_name: &str,
    ) -> Result<Option<TitleRecord>, ExtractError>;
}

/// Runs an external program that prints a JSON title record
///
/// Invoked as `<program> <args..> dir <path>` for directories and
/// `<program> <args..> stream <display name>` with the image on stdin.
/// The program prints a record object, or `null` for no record.
#[derive(Debug, Clone)]
pub struct CommandExtractor {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandExtractor {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Add fixed arguments placed before the mode argument
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    fn command(&self, mode: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(mode)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    fn parse_output(output: std::process::Output) -> Result<Option<TitleRecord>, ExtractError> {
        if !output.status.success() {
            return Err(ExtractError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(serde_json::from_slice(&output.stdout)?)
    }
}

impl MetadataExtractor for CommandExtractor {
    fn extract_dir(&self, path: &Path) -> Result<TitleRecord, ExtractError> {
        tracing::debug!("Extracting {}", path.display());
        let output = self.command("dir").arg(path).stdin(Stdio::null()).output()?;
        Self::parse_output(output)?.ok_or(ExtractError::NoRecord)
    }

    fn extract_stream(
        &self,
        mut reader: Box<dyn Read + Send>,
        display_name: &str,
    ) -> Result<Option<TitleRecord>, ExtractError> {
        tracing::debug!("Extracting {}", display_name);
        let mut child = self
            .command("stream")
            .arg(display_name)
            .stdin(Stdio::piped())
            .spawn()?;

        // Feed stdin from its own thread so a full stdout pipe cannot stall us
        let feeder = child.stdin.take().map(|mut stdin| {
            thread::spawn(move || io::copy(&mut reader, &mut stdin))
        });

        let output = child.wait_with_output()?;

        if let Some(feeder) = feeder {
            match feeder.join() {
                Ok(Ok(_)) => {}
                // The extractor may stop reading once it has the header
                Ok(Err(e)) if e.kind() == io::ErrorKind::BrokenPipe => {}
                Ok(Err(e)) => tracing::debug!("Feeding {} failed: {}", display_name, e),
                Err(_) => tracing::warn!("Feeder thread for {} panicked", display_name),
            }
        }

        Self::parse_output(output)
    }
}

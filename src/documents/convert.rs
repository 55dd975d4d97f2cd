//! DOCX → PDF conversion through external programs.
//!
//! The primary converter (`docx2pdf`) drives a desktop office suite and
//! usually fails on a headless server; the fallback is LibreOffice in
//! headless mode. Both are plain child processes.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::config::RenderConfig;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with status {code}")]
    Exit { program: String, code: i32 },
    #[error("{program} did not finish within {}s", .timeout.as_secs())]
    TimedOut { program: String, timeout: Duration },
    #[error("converter reported success but {} was not written", .0.display())]
    MissingOutput(PathBuf),
    #[error("conversion I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("all converters failed: {0}")]
    AllFailed(String),
}

pub trait PdfConverter: Send + Sync {
    fn name(&self) -> &str;

    /// Write a PDF rendition of `docx` to `pdf`.
    fn convert(&self, docx: &Path, pdf: &Path) -> Result<(), ConversionError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Invocation {
    /// `program <input> <output>`
    InputOutput,
    /// `program --headless --convert-to pdf --outdir <dir> <input>`
    LibreOffice,
}

/// Converter backed by an external command.
#[derive(Debug, Clone)]
pub struct CommandConverter {
    program: String,
    invocation: Invocation,
    timeout: Option<Duration>,
}

impl CommandConverter {
    pub fn docx2pdf(program: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            program: program.into(),
            invocation: Invocation::InputOutput,
            timeout,
        }
    }

    pub fn libreoffice(program: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            program: program.into(),
            invocation: Invocation::LibreOffice,
            timeout,
        }
    }

    fn command(&self, docx: &Path, pdf: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        match self.invocation {
            Invocation::InputOutput => {
                cmd.arg(docx).arg(pdf);
            }
            Invocation::LibreOffice => {
                let outdir = pdf.parent().unwrap_or_else(|| Path::new("."));
                cmd.arg("--headless")
                    .arg("--convert-to")
                    .arg("pdf")
                    .arg("--outdir")
                    .arg(outdir)
                    .arg(docx);
            }
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        cmd
    }

    fn wait(&self, mut cmd: Command) -> Result<ExitStatus, ConversionError> {
        let mut child = cmd.spawn().map_err(|source| ConversionError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        let Some(timeout) = self.timeout else {
            return Ok(child.wait()?);
        };

        let started = Instant::now();
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if started.elapsed() >= timeout {
                log::warn!("{} exceeded {:?}, killing it", self.program, timeout);
                let _ = child.kill();
                let _ = child.wait();
                return Err(ConversionError::TimedOut {
                    program: self.program.clone(),
                    timeout,
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl PdfConverter for CommandConverter {
    fn name(&self) -> &str {
        &self.program
    }

    fn convert(&self, docx: &Path, pdf: &Path) -> Result<(), ConversionError> {
        remove_stale(pdf)?;
        let status = self.wait(self.command(docx, pdf))?;
        if !status.success() {
            return Err(ConversionError::Exit {
                program: self.program.clone(),
                code: status.code().unwrap_or(-1),
            });
        }

        if self.invocation == Invocation::LibreOffice {
            // LibreOffice names the output after the input's stem.
            let outdir = pdf.parent().unwrap_or_else(|| Path::new("."));
            let produced = docx
                .file_stem()
                .map(|stem| outdir.join(stem).with_extension("pdf"))
                .unwrap_or_else(|| pdf.to_path_buf());
            if produced != pdf && produced.exists() {
                fs::rename(&produced, pdf)?;
            }
        }

        if !pdf.exists() {
            return Err(ConversionError::MissingOutput(pdf.to_path_buf()));
        }
        Ok(())
    }
}

/// A PDF left at `pdf` by an earlier render must not count as output.
fn remove_stale(pdf: &Path) -> Result<(), ConversionError> {
    match fs::remove_file(pdf) {
        Ok(()) => {
            log::debug!("Removed stale {}", pdf.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Tries each converter in order until one succeeds.
pub struct FallbackConverter {
    converters: Vec<Arc<dyn PdfConverter>>,
}

impl FallbackConverter {
    pub fn new(converters: Vec<Arc<dyn PdfConverter>>) -> Self {
        Self { converters }
    }

    /// docx2pdf first, LibreOffice second, as configured.
    pub fn from_config(config: &RenderConfig) -> Self {
        let primary: Arc<dyn PdfConverter> = Arc::new(CommandConverter::docx2pdf(
            config.primary_converter.clone(),
            config.convert_timeout,
        ));
        let fallback: Arc<dyn PdfConverter> = Arc::new(CommandConverter::libreoffice(
            config.fallback_converter.clone(),
            config.convert_timeout,
        ));
        Self::new(vec![primary, fallback])
    }
}

impl PdfConverter for FallbackConverter {
    fn name(&self) -> &str {
        "fallback-chain"
    }

    fn convert(&self, docx: &Path, pdf: &Path) -> Result<(), ConversionError> {
        remove_stale(pdf)?;
        let mut failures = Vec::with_capacity(self.converters.len());
        for converter in &self.converters {
            let result = converter.convert(docx, pdf).and_then(|()| {
                if pdf.exists() {
                    Ok(())
                } else {
                    Err(ConversionError::MissingOutput(pdf.to_path_buf()))
                }
            });
            match result {
                Ok(()) => {
                    log::info!("Converted {} with {}", docx.display(), converter.name());
                    return Ok(());
                }
                Err(e) => {
                    log::warn!("{} conversion failed: {}", converter.name(), e);
                    failures.push(format!("{}: {}", converter.name(), e));
                }
            }
        }
        Err(ConversionError::AllFailed(failures.join("; ")))
    }
}

use std::fs::{self, File};
use std::io::{self, IsTerminal, Read, Write};
use std::path::PathBuf;

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::{CliError, CliResult};

/// How a sink's output file should be compressed. `Default` mirrors the
/// ordinary on-disk compression level; `Level1` is what run files always
/// use (fast to write, read exactly once); `Uncompressed` is the `-u` CLI
/// flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMode {
    Default,
    Uncompressed,
    Level1,
}

impl CompressionMode {
    fn level(self) -> Option<Compression> {
        match self {
            CompressionMode::Uncompressed => None,
            CompressionMode::Level1 => Some(Compression::new(1)),
            CompressionMode::Default => Some(Compression::default()),
        }
    }
}

/// Resolves a CLI-facing path (`None`/`"-"` meaning stdin or stdout) to an
/// actual reader or writer, auto-detecting gzip input by its `.gz` suffix.
#[derive(Debug, Clone)]
pub struct Config {
    pub path: Option<PathBuf>,
}

impl Config {
    pub fn new(path: &Option<String>) -> Config {
        let path = match path {
            None => None,
            Some(s) if s == "-" => None,
            Some(s) => Some(PathBuf::from(s)),
        };
        Config { path }
    }

    pub fn is_std(&self) -> bool {
        self.path.is_none()
    }

    pub fn display_path(&self) -> String {
        self.path
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| "<stdin>".to_string())
    }

    pub fn reader(&self) -> CliResult<Box<dyn Read>> {
        match &self.path {
            None => {
                if io::stdin().is_terminal() {
                    return Err(CliError::Io(io::Error::new(
                        io::ErrorKind::NotFound,
                        "failed to read from stdin; did you forget to give a path?",
                    )));
                }
                Ok(Box::new(io::stdin()))
            }
            Some(p) => {
                let file = File::open(p)
                    .map_err(|e| CliError::Other(format!("failed to open {}: {}", p.display(), e)))?;
                if p.extension().map(|e| e == "gz").unwrap_or(false) {
                    Ok(Box::new(MultiGzDecoder::new(file)))
                } else {
                    Ok(Box::new(file))
                }
            }
        }
    }

    pub fn writer(&self, compression: CompressionMode) -> CliResult<Box<dyn Write>> {
        let raw: Box<dyn Write> = match &self.path {
            None => Box::new(io::stdout()),
            Some(p) => Box::new(
                File::create(p)
                    .map_err(|e| CliError::Other(format!("failed to create {}: {}", p.display(), e)))?,
            ),
        };

        Ok(match compression.level() {
            Some(level) => Box::new(GzEncoder::new(raw, level)),
            None => raw,
        })
    }

    /// Fails with `OutputExists` unless `force` is set, mirroring the
    /// pre-work existence check the CLI performs before touching anything.
    pub fn refuse_overwrite(&self, force: bool) -> CliResult<()> {
        if force {
            return Ok(());
        }
        if let Some(p) = &self.path {
            if p.exists() {
                return Err(CliError::Other(format!(
                    "{} already exists! Use -f/--force to overwrite.",
                    p.display()
                )));
            }
        }
        Ok(())
    }
}

/// Opens a plain (uncompressed) reader for an input path, used to reopen a
/// just-written run file for the merge step.
pub fn open_plain_reader(path: &str) -> io::Result<Box<dyn Read>> {
    Ok(Box::new(File::open(path)?))
}

/// Opens a level-1-compressed writer for a run file at `path`.
pub fn open_run_writer(path: &str) -> io::Result<Box<dyn Write>> {
    let file = File::create(path)?;
    Ok(Box::new(GzEncoder::new(file, Compression::new(1))))
}

/// Opens a level-1-compressed reader for a run file, mirroring
/// `open_run_writer`.
pub fn open_run_reader(path: &str) -> io::Result<Box<dyn Read>> {
    let file = File::open(path)?;
    Ok(Box::new(MultiGzDecoder::new(file)))
}

pub fn remove_run(path: &str) -> io::Result<()> {
    fs::remove_file(path)
}

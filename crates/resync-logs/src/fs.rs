use std::fs::{self, File};
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use resync_core::{OutputLogger, OutputSinks};
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{LogError, Result};

pub const STDOUT_FILE: &str = "stdout.log";
pub const STDERR_FILE: &str = "stderr.log";

/// [`OutputLogger`] writing one directory per sync under `root`.
///
/// Every operation holds `lock`, so a rotation never races an export or
/// another rotation.
pub struct FsLogger {
    root: PathBuf,
    retention: i64,
    lock: Mutex<()>,
}

impl FsLogger {
    pub fn new(root: impl Into<PathBuf>, retention: i64) -> Self {
        Self {
            root: root.into(),
            retention,
            lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_enabled(&self) -> bool {
        self.retention > 0
    }

    fn job_dir(&self, name: &str) -> Result<PathBuf> {
        let bad = name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(['/', '\\']);
        if bad {
            return Err(LogError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(name))
    }

    fn rotate_files(&self, name: &str) -> Result<Option<OutputSinks>> {
        if !self.is_enabled() {
            return Ok(None);
        }
        let dir = self.job_dir(name)?;
        let _guard = self.lock.lock().unwrap();

        fs::create_dir_all(&dir)?;
        shift(&dir, STDOUT_FILE, self.retention)?;
        shift(&dir, STDERR_FILE, self.retention)?;

        let sinks = OutputSinks {
            stdout: File::create(dir.join(STDOUT_FILE))?,
            stderr: File::create(dir.join(STDERR_FILE))?,
        };
        debug!(job = %name, dir = %dir.display(), "rotated output logs");
        Ok(Some(sinks))
    }

    fn open_latest(&self, name: &str, file: &str) -> Result<File> {
        if !self.is_enabled() {
            return Err(LogError::Disabled);
        }
        let path = self.job_dir(name)?.join(file);
        let _guard = self.lock.lock().unwrap();
        Ok(File::open(path)?)
    }

    fn zip_all(&self) -> Result<Vec<u8>> {
        if !self.is_enabled() {
            return Err(LogError::Disabled);
        }
        let _guard = self.lock.lock().unwrap();

        let mut files = Vec::new();
        if self.root.is_dir() {
            collect_files(&self.root, &mut files)?;
        }
        files.sort();

        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for path in &files {
            let Some(entry) = entry_name(&self.root, path) else {
                continue;
            };
            zip.start_file(entry, options)?;
            io::copy(&mut File::open(path)?, &mut zip)?;
        }
        let bytes = zip.finish()?.into_inner();
        debug!(files = files.len(), bytes = bytes.len(), "exported logs");
        Ok(bytes)
    }
}

impl OutputLogger for FsLogger {
    fn rotate(&self, name: &str) -> resync_core::Result<Option<OutputSinks>> {
        Ok(self.rotate_files(name)?)
    }

    fn stdout(&self, name: &str) -> resync_core::Result<File> {
        Ok(self.open_latest(name, STDOUT_FILE)?)
    }

    fn stderr(&self, name: &str) -> resync_core::Result<File> {
        Ok(self.open_latest(name, STDERR_FILE)?)
    }

    fn export(&self) -> resync_core::Result<Vec<u8>> {
        Ok(self.zip_all()?)
    }
}

/// `file.(n-1)` → `file.n` down to `file` → `file.1`, dropping `file.<keep>`.
fn shift(dir: &Path, file: &str, keep: i64) -> io::Result<()> {
    let numbered = |n: i64| dir.join(format!("{file}.{n}"));

    remove_if_exists(&numbered(keep))?;
    for n in (1..keep).rev() {
        rename_if_exists(&numbered(n), &numbered(n + 1))?;
    }
    rename_if_exists(&dir.join(file), &numbered(1))
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

fn rename_if_exists(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else if path.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

/// Archive path relative to `root`, always `/`-separated.
fn entry_name(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<_> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

//! Size-rotated log file.
//!
//! When the next write would push the file past `max_bytes`, the current
//! file is renamed to `<stem>-<unix millis>.<ext>` (gzip-compressed when
//! enabled) and a fresh file is opened under the original name.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use flate2::write::GzEncoder;
use flate2::Compression;

/// Append-only writer that rolls the file over by size.
#[derive(Debug)]
pub struct RotatingFile {
    path: PathBuf,
    max_bytes: u64,
    compress: bool,
    file: File,
    written: u64,
}

impl RotatingFile {
    /// Open (or create) `path`, creating parent directories as needed.
    /// A `max_bytes` of 0 disables rotation.
    pub fn open(path: impl Into<PathBuf>, max_bytes: u64, compress: bool) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = open_append(&path)?;
        let written = file.metadata()?.len();
        Ok(Self {
            path,
            max_bytes,
            compress,
            file,
            written,
        })
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;
        let backup = self.backup_path();
        fs::rename(&self.path, &backup)?;
        self.file = open_append(&self.path)?;
        self.written = 0;

        if self.compress {
            if let Err(e) = compress_in_place(&backup) {
                tracing::warn!(path = %backup.display(), error = %e, "Failed to compress rotated log");
            }
        }
        Ok(())
    }

    fn backup_path(&self) -> PathBuf {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = match self.path.extension() {
            Some(ext) => format!("{stem}-{millis}.{}", ext.to_string_lossy()),
            None => format!("{stem}-{millis}"),
        };
        let mut backup = self.path.with_file_name(&name);
        // two rotations within the same millisecond
        let mut n = 1;
        while backup.exists() || gz_path(&backup).exists() {
            backup = self.path.with_file_name(format!("{name}.{n}"));
            n += 1;
        }
        backup
    }
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.max_bytes > 0 && self.written > 0 && self.written + buf.len() as u64 > self.max_bytes {
            self.rotate()?;
        }
        let n = self.file.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn gz_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".gz");
    PathBuf::from(name)
}

/// Replace `path` with `path.gz`.
fn compress_in_place(path: &Path) -> io::Result<()> {
    let mut input = File::open(path)?;
    let output = File::create(gz_path(path))?;
    let mut encoder = GzEncoder::new(output, Compression::default());
    io::copy(&mut input, &mut encoder)?;
    encoder.finish()?;
    fs::remove_file(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    fn backups(dir: &Path) -> Vec<PathBuf> {
        let mut found: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.file_name().unwrap() != "access.log")
            .collect();
        found.sort();
        found
    }

    #[test]
    fn test_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/nested/access.log");
        let mut file = RotatingFile::open(&path, 0, false).unwrap();
        file.write_all(b"line\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "line\n");
    }

    #[test]
    fn test_rotates_when_full() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("access.log");
        let mut file = RotatingFile::open(&path, 10, false).unwrap();

        file.write_all(b"0123456789").unwrap();
        file.write_all(b"abc").unwrap();
        file.flush().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "abc");
        let rotated = backups(dir.path());
        assert_eq!(rotated.len(), 1);
        assert_eq!(fs::read_to_string(&rotated[0]).unwrap(), "0123456789");
    }

    #[test]
    fn test_rotated_file_is_compressed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("access.log");
        let mut file = RotatingFile::open(&path, 4, true).unwrap();

        file.write_all(b"first").unwrap();
        file.write_all(b"second").unwrap();

        let rotated = backups(dir.path());
        assert_eq!(rotated.len(), 1);
        assert_eq!(rotated[0].extension().unwrap(), "gz");

        let mut text = String::new();
        GzDecoder::new(File::open(&rotated[0]).unwrap())
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "first");
        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
    }

    #[test]
    fn test_zero_limit_never_rotates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("access.log");
        let mut file = RotatingFile::open(&path, 0, true).unwrap();
        for _ in 0..100 {
            file.write_all(b"0123456789").unwrap();
        }
        assert!(backups(dir.path()).is_empty());
        assert_eq!(fs::metadata(&path).unwrap().len(), 1000);
    }

    #[test]
    fn test_existing_size_counts_toward_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("access.log");
        fs::write(&path, b"12345678").unwrap();

        let mut file = RotatingFile::open(&path, 10, false).unwrap();
        file.write_all(b"xyz").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "xyz");
    }
}

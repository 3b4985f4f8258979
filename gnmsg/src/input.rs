//! Input traversal.
//!
//! A path argument is either a log file or a directory holding a rolled log
//! set. A native client rolls `client.log` into `client-1.log`,
//! `client-2.log`, ... so the numbered files are older than the live one.

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use miette::{IntoDiagnostic, Result, WrapErr};

/// Rolling index of a file name, `None` for the live log.
fn rolling_index(path: &Path) -> Option<u64> {
    let stem = path.file_stem()?.to_str()?;
    let (_, suffix) = stem.rsplit_once('-')?;
    suffix.parse().ok()
}

/// Expand directories into their `*.log` files, oldest first.
pub fn expand(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if !path.is_dir() {
            files.push(path.clone());
            continue;
        }
        let mut logs = Vec::new();
        for entry in fs::read_dir(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("Cannot read directory {}", path.display()))?
        {
            let entry = entry.into_diagnostic()?;
            let p = entry.path();
            if p.is_file() && p.extension().is_some_and(|e| e == "log") {
                logs.push(p);
            }
        }
        logs.sort_by_key(|p| (rolling_index(p).unwrap_or(u64::MAX), p.clone()));
        log::debug!("{}: {} log files", path.display(), logs.len());
        files.extend(logs);
    }
    Ok(files)
}

/// Read every line of every file, in order. Lines that are not valid UTF-8
/// are decoded lossily.
pub fn read_lines(files: &[PathBuf]) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    for path in files {
        let file = File::open(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("Cannot open {}", path.display()))?;
        let mut reader = BufReader::new(file);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let n = reader
                .read_until(b'\n', &mut buf)
                .into_diagnostic()
                .wrap_err_with(|| format!("Cannot read {}", path.display()))?;
            if n == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&buf);
            lines.push(line.trim_end_matches(['\r', '\n']).to_string());
        }
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(text.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_rolling_index() {
        assert_eq!(rolling_index(Path::new("gemfire-12.log")), Some(12));
        assert_eq!(rolling_index(Path::new("gemfire.log")), None);
        assert_eq!(rolling_index(Path::new("my-client.log")), None);
    }

    #[test]
    fn test_directory_in_rolling_order() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "client.log", "c\n");
        write(dir.path(), "client-10.log", "b\n");
        write(dir.path(), "client-2.log", "a\n");
        write(dir.path(), "notes.txt", "x\n");

        let files = expand(&[dir.path().to_path_buf()]).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, ["client-2.log", "client-10.log", "client.log"]);
        assert_eq!(read_lines(&files).unwrap(), ["a", "b", "c"]);
    }

    #[test]
    fn test_lines_keep_file_order() {
        let dir = tempfile::tempdir().unwrap();
        let second = write(dir.path(), "z.log", "3\r\n4");
        let first = write(dir.path(), "a.log", "1\n2\n");
        assert_eq!(read_lines(&[second, first]).unwrap(), ["3", "4", "1", "2"]);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.log");
        let files = expand(&[missing]).unwrap();
        assert!(read_lines(&files).is_err());
    }
}

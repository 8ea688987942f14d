//! Utility functions for reading tabular data files.

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Open a buffered reader over a data file, transparently handling gzip.
///
/// Files whose path ends with ".gz" are wrapped in a `GzDecoder`; everything
/// else is read as plain text.
pub fn open_table(path: &Path) -> Result<Box<dyn BufRead + Send>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    if path.to_string_lossy().ends_with(".gz") {
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_open_plain_table() {
        let mut tmp = NamedTempFile::new().unwrap();
        writeln!(tmp, "a\tb").unwrap();
        tmp.flush().unwrap();

        let mut reader = open_table(tmp.path()).unwrap();
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        assert_eq!(line.trim_end(), "a\tb");
    }

    #[test]
    fn test_open_missing_table_errors() {
        assert!(open_table(Path::new("/nonexistent/data.csv")).is_err());
    }
}

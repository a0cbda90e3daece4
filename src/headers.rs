//! Column header extraction for data files.
//!
//! Only a best-effort reader exists today: it takes the first line of the file,
//! splits it on commas and strips whitespace and double quotes from each field.
//! Quoted commas and multi-line headers are not handled. Anything smarter (a
//! real CSV or Parquet reader) can be dropped in behind [`HeaderReader`].

use std::{
    error::Error,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};
use tracing::debug;

/// Source of a data file's column names.
pub trait HeaderReader {
    fn read_header_fields(&self, path: &Path) -> Result<Vec<String>, Box<dyn Error>>;
}

/// First-line, comma-split header reader.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstLineHeaders;

impl HeaderReader for FirstLineHeaders {
    fn read_header_fields(&self, path: &Path) -> Result<Vec<String>, Box<dyn Error>> {
        let mut reader = BufReader::new(File::open(path)?);
        let mut line = String::new();
        reader.read_line(&mut line)?;

        let fields = split_header_line(&line);
        debug!("Read {} header fields from {}", fields.len(), path.display());
        Ok(fields)
    }
}

/// Split a header line into cleaned field names. Fields that are empty after
/// cleaning are dropped.
pub fn split_header_line(line: &str) -> Vec<String> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Vec::new();
    }

    line.split(',')
        .map(|field| field.trim().replace('"', ""))
        .filter(|field| !field.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_split_strips_quotes_and_whitespace() {
        assert_eq!(
            split_header_line("\"region\", amount ,\"order date\"\r\n"),
            vec!["region", "amount", "order date"]
        );
    }

    #[test]
    fn test_split_empty_line() {
        assert!(split_header_line("\n").is_empty());
        assert!(split_header_line("").is_empty());
    }

    #[test]
    fn test_split_drops_empty_fields() {
        assert_eq!(split_header_line("a,,b, ,\"\"\n"), vec!["a", "b"]);
        assert!(split_header_line(",,").is_empty());
    }

    #[test]
    fn test_quoted_commas_are_not_special() {
        assert_eq!(split_header_line("\"a,b\",c"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_reads_only_first_line() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "id,name,price").unwrap();
        writeln!(file, "1,apple,0.5").unwrap();

        let fields = FirstLineHeaders.read_header_fields(file.path()).unwrap();
        assert_eq!(fields, vec!["id", "name", "price"]);
    }

    #[test]
    fn test_missing_file_errors() {
        let result = FirstLineHeaders.read_header_fields(Path::new("/no/such/file.csv"));
        assert!(result.is_err());
    }
}

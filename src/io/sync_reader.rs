//! Synchronous CSV reader with iterator interface
//!
//! Streams ledger operations from a CSV file, one row at a time. Format
//! concerns live in the csv_format module.
//!
//! ```no_run
//! use rust_ledger_engine::io::sync_reader::SyncReader;
//! use std::path::Path;
//!
//! let reader = SyncReader::new(Path::new("operations.csv")).unwrap();
//! for result in reader {
//!     match result {
//!         Ok(operation) => println!("{:?}", operation),
//!         Err(e) => eprintln!("Error: {}", e),
//!     }
//! }
//! ```
//!
//! # Error Handling
//!
//! - Fatal errors (file not found, I/O errors) are returned from `new()`
//! - Row errors are yielded as `Err` items carrying the line number

use crate::io::csv_format::{convert_csv_record, CsvRecord};
use crate::types::{LedgerError, Operation};
use csv::{ReaderBuilder, Trim};
use std::fs::File;
use std::path::Path;

/// Streaming iterator over the operations in a CSV file
#[derive(Debug)]
pub struct SyncReader {
    reader: csv::Reader<File>,
    line_num: usize,
}

impl SyncReader {
    /// Open `path` for reading
    ///
    /// The reader trims whitespace, accepts short rows (trailing optional
    /// columns may be omitted) and uses an 8KB buffer.
    pub fn new(path: &Path) -> Result<Self, String> {
        let file = File::open(path).map_err(|e| {
            format!(
                "Failed to open file '{}': {}",
                path.display(),
                LedgerError::from(e)
            )
        })?;

        let reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .buffer_capacity(8 * 1024)
            .from_reader(file);

        Ok(Self {
            reader,
            line_num: 1,
        })
    }
}

impl Iterator for SyncReader {
    type Item = Result<Operation, String>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut deserializer = self.reader.deserialize::<CsvRecord>();
        let row = deserializer.next()?;
        self.line_num += 1;

        Some(match row {
            Ok(csv_record) => convert_csv_record(csv_record)
                .map_err(|e| format!("Line {}: {}", self.line_num, e)),
            Err(e) => Err(LedgerError::from(e).to_string()),
        })
    }
}

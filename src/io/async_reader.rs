//! Asynchronous CSV reader with batch interface
//!
//! Reads ledger operations from any `futures` `AsyncRead` in batches, for
//! the concurrent replay strategy.
//!
//! ```text
//! AsyncRead → csv-async deserializer → CsvRecord → Operation batches
//! ```
//!
//! Rows that fail to parse are logged and skipped; they never end a batch
//! early.

use crate::io::csv_format::{convert_csv_record, CsvRecord};
use crate::types::Operation;
use csv_async::AsyncReaderBuilder;
use futures::io::AsyncRead;
use futures::stream::StreamExt;
use tracing::warn;

pub struct AsyncReader<R: AsyncRead + Unpin> {
    csv_reader: csv_async::AsyncDeserializer<R>,
}

impl<R: AsyncRead + Unpin + Send + 'static> AsyncReader<R> {
    pub fn new(reader: R) -> Self {
        let csv_reader = AsyncReaderBuilder::new()
            .flexible(true)
            .trim(csv_async::Trim::All)
            .create_deserializer(reader);

        Self { csv_reader }
    }

    /// Read up to `batch_size` valid operations
    ///
    /// An empty batch means the input is exhausted.
    pub async fn read_batch(&mut self, batch_size: usize) -> Vec<Operation> {
        let mut batch = Vec::with_capacity(batch_size);
        let mut records = self.csv_reader.deserialize::<CsvRecord>();

        while batch.len() < batch_size {
            match records.next().await {
                Some(Ok(csv_record)) => match convert_csv_record(csv_record) {
                    Ok(operation) => batch.push(operation),
                    Err(e) => warn!(error = %e, "Skipping invalid operation"),
                },
                Some(Err(e)) => warn!(error = %e, "Skipping unparseable CSV row"),
                None => break,
            }
        }

        batch
    }
}

//! CSV export of running-maximum improvements.

use std::{fs::File, io, path::Path};

use parking_lot::Mutex;

use crate::{error::Result, reducer::BestResult};

/// Writes each [`BestResult`] it is given as a `start,length` record.
///
/// Meant to be called from a reducer observer, which cannot return errors:
/// the first write error is kept and surfaced by [`CsvSink::flush`].
pub struct CsvSink<W: io::Write> {
    writer: Mutex<csv::Writer<W>>,
    error: Mutex<Option<csv::Error>>,
}

impl CsvSink<File> {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::from_writer(File::create(path)?))
    }
}

impl<W: io::Write> CsvSink<W> {
    pub fn from_writer(inner: W) -> Self {
        Self {
            writer: Mutex::new(csv::Writer::from_writer(inner)),
            error: Mutex::new(None),
        }
    }

    pub fn record(&self, best: BestResult) {
        if let Err(e) = self.writer.lock().serialize(best) {
            let mut error = self.error.lock();
            if error.is_none() {
                *error = Some(e);
            }
        }
    }

    pub fn flush(&self) -> Result<()> {
        if let Some(e) = self.error.lock().take() {
            return Err(e.into());
        }
        self.writer.lock().flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> Result<W> {
        self.flush()?;
        self.writer
            .into_inner()
            .into_inner()
            .map_err(|e| e.into_error().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_have_header_and_rows() {
        let sink = CsvSink::from_writer(Vec::new());
        sink.record(BestResult { start: 13, length: 9 });
        sink.record(BestResult { start: 11, length: 14 });
        sink.record(BestResult { start: 9, length: 19 });
        let out = String::from_utf8(sink.into_inner().unwrap()).unwrap();
        assert_eq!(out, "start,length\n13,9\n11,14\n9,19\n");
    }

    #[test]
    fn test_empty_sink_writes_nothing() {
        let sink = CsvSink::from_writer(Vec::new());
        assert!(sink.into_inner().unwrap().is_empty());
    }
}

use anyhow::{Context, Result};
use std::io::Write;

use super::generator::SyntheticTransaction;

/// Receives generated rows in index order, one chunk at a time.
///
/// A chunk counts as emitted only once `write_chunk` returns `Ok`. A sink may
/// block to apply backpressure.
pub trait TransactionSink {
    fn write_chunk(&mut self, first_index: u64, rows: &[SyntheticTransaction]) -> Result<()>;
}

/// Writes rows as CSV, one chunk per write.
///
/// Each chunk is encoded in memory and handed to the inner writer with a
/// single `write_all`, so the output never holds part of an accepted chunk
/// after a later one fails. `committed_bytes` is the length of the output
/// that belongs to accepted chunks; anything past it is a torn tail.
pub struct CsvSink<W: Write> {
    inner: W,
    header_pending: bool,
    committed: u64,
}

impl<W: Write> CsvSink<W> {
    /// `with_header` should be false when appending to an earlier partial run.
    pub fn new(inner: W, with_header: bool) -> Self {
        Self {
            inner,
            header_pending: with_header,
            committed: 0,
        }
    }

    /// Bytes written by this sink for accepted chunks, header included.
    pub fn committed_bytes(&self) -> u64 {
        self.committed
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> Result<W> {
        let mut inner = self.inner;
        inner.flush().context("failed to flush CSV output")?;
        Ok(inner)
    }

    fn encode(&self, rows: &[SyntheticTransaction]) -> Result<Vec<u8>> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(self.header_pending)
            .from_writer(Vec::new());
        for row in rows {
            writer
                .serialize(row)
                .with_context(|| format!("failed to encode row {}", row.index))?;
        }
        writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("failed to encode CSV rows: {}", e.error()))
    }
}

impl<W: Write> TransactionSink for CsvSink<W> {
    fn write_chunk(&mut self, first_index: u64, rows: &[SyntheticTransaction]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let bytes = self.encode(rows)?;
        self.inner
            .write_all(&bytes)
            .and_then(|()| self.inner.flush())
            .with_context(|| format!("failed to write chunk starting at {}", first_index))?;
        self.committed += bytes.len() as u64;
        self.header_pending = false;
        Ok(())
    }
}

/// Keeps every row in memory.
#[derive(Debug, Default)]
pub struct VecSink {
    pub rows: Vec<SyntheticTransaction>,
}

impl TransactionSink for VecSink {
    fn write_chunk(&mut self, _first_index: u64, rows: &[SyntheticTransaction]) -> Result<()> {
        self.rows.extend_from_slice(rows);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::config::GenerationSettings;
    use crate::synth::generator::TransactionGenerator;
    use crate::synth::spec::GenerationSpec;

    fn generator(count: u64) -> TransactionGenerator {
        let spec = GenerationSpec {
            tenant_id: "t".to_string(),
            job_id: "j".to_string(),
            count,
            fraud_rate: 0.1,
            seed: Some(7),
            amount_mu: 3.0,
            amount_sigma: 0.5,
        };
        TransactionGenerator::new(spec, GenerationSettings::default()).unwrap()
    }

    #[test]
    fn test_csv_header_and_columns() {
        let gen = generator(3);
        let mut sink = CsvSink::new(Vec::new(), true);
        sink.write_chunk(0, &gen.chunk(0..3)).unwrap();
        let text = String::from_utf8(sink.into_inner().unwrap()).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("index,transaction_id,account_id,timestamp,amount,merchant_category,is_fraud,fraud_pattern")
        );
        assert_eq!(lines.count(), 3);
    }

    #[test]
    fn test_headerless_append_matches_suffix() {
        let gen = generator(20);

        let mut full = CsvSink::new(Vec::new(), true);
        full.write_chunk(0, &gen.chunk(0..20)).unwrap();
        let full = String::from_utf8(full.into_inner().unwrap()).unwrap();

        let mut head = CsvSink::new(Vec::new(), true);
        head.write_chunk(0, &gen.chunk(0..12)).unwrap();
        let mut tail = CsvSink::new(head.into_inner().unwrap(), false);
        tail.write_chunk(12, &gen.chunk(12..20)).unwrap();
        let stitched = String::from_utf8(tail.into_inner().unwrap()).unwrap();

        assert_eq!(full, stitched);
    }

    /// Accepts bytes until `limit`, then fails every write.
    struct FullDisk {
        data: Vec<u8>,
        limit: usize,
    }

    impl Write for FullDisk {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            let room = self.limit.saturating_sub(self.data.len());
            if room == 0 {
                return Err(std::io::Error::other("disk full"));
            }
            let n = room.min(buf.len());
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn max_index(csv_text: &[u8]) -> Option<u64> {
        String::from_utf8_lossy(csv_text)
            .lines()
            .filter_map(|line| line.split(',').next()?.parse::<u64>().ok())
            .max()
    }

    #[test]
    fn test_failed_chunk_leaves_no_rows_before_committed_mark() {
        use crate::error::EngineError;
        use std::sync::atomic::AtomicBool;

        let gen = generator(600);
        let mut full = CsvSink::new(Vec::new(), true);
        gen.run(0, &mut full, &AtomicBool::new(false)).unwrap();
        let expected = full.into_inner().unwrap();

        let settings = GenerationSettings {
            chunk_size: 100,
            parallel_chunks: 2,
            ..GenerationSettings::default()
        };
        let gen = TransactionGenerator::new(gen.spec().clone(), settings).unwrap();
        let disk = FullDisk {
            data: Vec::new(),
            limit: expected.len() / 2,
        };
        let mut sink = CsvSink::new(disk, true);
        let err = gen.run(0, &mut sink, &AtomicBool::new(false)).unwrap_err();
        let (last, next) = match err {
            EngineError::PartialGeneration {
                last_emitted_index,
                next_index,
                ..
            } => (last_emitted_index, next_index),
            other => panic!("unexpected error: {:?}", other),
        };
        assert_eq!(next % 100, 0);
        assert_eq!(last, Some(next - 1));

        // Bytes up to the committed mark hold exactly rows [0, next)
        let committed = sink.committed_bytes() as usize;
        let mut data = sink.into_inner().unwrap().data;
        assert!(data.len() >= committed);
        data.truncate(committed);
        assert_eq!(max_index(&data), last);

        let mut resumed = CsvSink::new(data, false);
        gen.run(next, &mut resumed, &AtomicBool::new(false)).unwrap();
        assert_eq!(resumed.into_inner().unwrap(), expected);
    }

    #[test]
    fn test_rejected_write_does_not_count_as_committed() {
        let gen = generator(10);
        let disk = FullDisk {
            data: Vec::new(),
            limit: 40,
        };
        let mut sink = CsvSink::new(disk, true);
        assert!(sink.write_chunk(0, &gen.chunk(0..10)).is_err());
        assert_eq!(sink.committed_bytes(), 0);
        assert_eq!(sink.get_ref().data.len(), 40);
    }

    #[test]
    fn test_vec_sink_collects() {
        let gen = generator(5);
        let mut sink = VecSink::default();
        sink.write_chunk(0, &gen.chunk(0..2)).unwrap();
        sink.write_chunk(2, &gen.chunk(2..5)).unwrap();
        assert_eq!(sink.rows, gen.chunk(0..5));
    }
}

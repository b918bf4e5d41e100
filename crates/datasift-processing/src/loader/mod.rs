//! Delimited-text parsing into polars DataFrames.
//!
//! The loader works on raw payload bytes plus an [`EncodingGuess`]. Text is
//! produced by [`ChunkedDecoder`] and parsed with the `csv` crate.
//!
//! Column types are inferred once over the whole source before any frame is
//! built. Chunked mode therefore streams the payload twice: the first pass
//! collects the schema, the second builds one frame per `rows` records and
//! stacks them. Because every chunk is built against the same schema, the
//! concatenated frame equals the whole-file frame.
//!
//! A quoted field still open at end of input is a parse error in both modes.

mod columns;
mod quotes;
pub mod schema;

use crate::config::PipelineConfig;
use crate::encoding::{ChunkedDecoder, DEFAULT_DECODE_PIECE_LEN, EncodingGuess, decode_error_from_io};
use crate::error::{ParsePosition, PipelineError, Result};
use columns::ColumnBuilder;
use quotes::QuoteTracker;
use encoding_rs::Encoding;
use polars::prelude::*;
use schema::{ColumnKind, SchemaInference, normalize_headers};
use std::collections::HashSet;
use std::io::Read;
use tracing::{debug, info, warn};

/// How the payload is turned into a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Decode and parse the whole payload at once.
    WholeFile,
    /// Stream the payload and build one frame per `rows` records.
    Chunked { rows: usize },
}

/// Parser settings.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub mode: LoadMode,
    pub delimiter: u8,
    pub missing_markers: Vec<String>,
    pub lossy: bool,
    /// Bytes handed to the streaming decoder per step in chunked mode.
    pub decode_piece_len: usize,
}

impl LoadOptions {
    pub fn from_config(config: &PipelineConfig) -> Self {
        let mode = match config.chunk_size {
            Some(rows) => LoadMode::Chunked { rows },
            None => LoadMode::WholeFile,
        };
        Self {
            mode,
            delimiter: config.delimiter,
            missing_markers: config.missing_markers.clone(),
            lossy: config.lossy_decoding,
            decode_piece_len: DEFAULT_DECODE_PIECE_LEN,
        }
    }
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

/// A parsed table and the number of chunks it was assembled from.
#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub df: DataFrame,
    pub chunks: usize,
}

/// Parses CSV payloads.
#[derive(Debug, Clone)]
pub struct TableLoader {
    options: LoadOptions,
    markers: HashSet<String>,
}

impl TableLoader {
    pub fn new(options: LoadOptions) -> Self {
        let markers = options.missing_markers.iter().cloned().collect();
        Self { options, markers }
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// Parse `bytes` decoded as `guess`.
    pub fn load(&self, bytes: &[u8], guess: &EncodingGuess) -> Result<LoadedTable> {
        let table = match self.options.mode {
            LoadMode::WholeFile => self.load_whole(bytes, guess.encoding)?,
            LoadMode::Chunked { rows } => self.load_chunked(bytes, guess.encoding, rows.max(1))?,
        };

        info!(
            "Loaded {} rows x {} columns ({} chunk(s), {})",
            table.df.height(),
            table.df.width(),
            table.chunks,
            guess.label()
        );
        Ok(table)
    }

    fn load_whole(&self, bytes: &[u8], encoding: &'static Encoding) -> Result<LoadedTable> {
        let text = ChunkedDecoder::new(bytes, encoding, bytes.len(), self.options.lossy)
            .decode_all()?;

        let mut reader = self.csv_reader(text.as_bytes());
        let header = read_header(&mut reader)?;

        let mut records = Vec::new();
        let mut record = csv::StringRecord::new();
        let mut last_position = None;
        while reader.read_record(&mut record).map_err(map_csv_error)? {
            last_position = record.position().cloned();
            if is_blank(&record) {
                continue;
            }
            check_width(&record, header.len())?;
            records.push(record.clone());
        }
        check_quotes_closed(&reader, last_position.as_ref())?;

        let mut schema = SchemaInference::new(header.len());
        for record in &records {
            schema.observe(record.iter(), |raw| self.is_missing(raw));
        }
        let kinds = schema.finish();

        let df = self.build_frame(&header, &kinds, &records)?;
        Ok(LoadedTable { df, chunks: 1 })
    }

    fn load_chunked(
        &self,
        bytes: &[u8],
        encoding: &'static Encoding,
        rows: usize,
    ) -> Result<LoadedTable> {
        let (header, kinds) = self.infer_streaming(bytes, encoding)?;

        let mut reader = self.csv_reader(self.decoder(bytes, encoding));
        read_header(&mut reader)?;

        let mut table: Option<DataFrame> = None;
        let mut chunks = 0usize;
        let mut batch = Vec::with_capacity(rows);
        let mut record = csv::StringRecord::new();

        loop {
            let more = reader.read_record(&mut record).map_err(map_csv_error)?;
            if more && !is_blank(&record) {
                check_width(&record, header.len())?;
                batch.push(record.clone());
            }

            let flush = batch.len() >= rows || (!more && (!batch.is_empty() || chunks == 0));
            if flush {
                let frame = self.build_frame(&header, &kinds, &batch)?;
                batch.clear();
                chunks += 1;
                debug!("Built chunk {} with {} rows", chunks, frame.height());

                match table.as_mut() {
                    None => table = Some(frame),
                    Some(acc) => {
                        check_chunk_schema(acc, &frame, chunks)?;
                        acc.vstack_mut(&frame)?;
                    }
                }
            }

            if !more {
                break;
            }
        }

        let df = table.ok_or_else(|| PipelineError::Internal("no chunk was built".to_string()))?;
        Ok(LoadedTable { df, chunks })
    }

    /// First streaming pass: header and column kinds.
    fn infer_streaming(
        &self,
        bytes: &[u8],
        encoding: &'static Encoding,
    ) -> Result<(Vec<String>, Vec<ColumnKind>)> {
        let mut reader = self.csv_reader(self.decoder(bytes, encoding));
        let header = read_header(&mut reader)?;

        let mut schema = SchemaInference::new(header.len());
        let mut record = csv::StringRecord::new();
        let mut last_position = None;
        while reader.read_record(&mut record).map_err(map_csv_error)? {
            last_position = record.position().cloned();
            if is_blank(&record) {
                continue;
            }
            check_width(&record, header.len())?;
            schema.observe(record.iter(), |raw| self.is_missing(raw));
        }
        check_quotes_closed(&reader, last_position.as_ref())?;

        if reader.get_ref().inner().had_replacements() {
            warn!(
                "Input contained bytes that are invalid in {}; replaced with U+FFFD",
                encoding.name()
            );
        }

        Ok((header, schema.finish()))
    }

    fn decoder<'a>(&self, bytes: &'a [u8], encoding: &'static Encoding) -> ChunkedDecoder<'a> {
        ChunkedDecoder::new(
            bytes,
            encoding,
            self.options.decode_piece_len,
            self.options.lossy,
        )
    }

    fn csv_reader<R: Read>(&self, source: R) -> csv::Reader<QuoteTracker<R>> {
        csv::ReaderBuilder::new()
            .delimiter(self.options.delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(QuoteTracker::new(source, self.options.delimiter))
    }

    fn is_missing(&self, raw: &str) -> bool {
        self.markers.contains(raw)
    }

    fn build_frame(
        &self,
        header: &[String],
        kinds: &[ColumnKind],
        records: &[csv::StringRecord],
    ) -> Result<DataFrame> {
        let mut builders: Vec<ColumnBuilder> = kinds
            .iter()
            .map(|kind| ColumnBuilder::new(*kind, records.len()))
            .collect();

        for record in records {
            for (idx, (builder, raw)) in builders.iter_mut().zip(record.iter()).enumerate() {
                if !builder.push(raw, self.is_missing(raw)) {
                    return Err(PipelineError::Internal(format!(
                        "value '{}' does not match the inferred type of column '{}'",
                        raw, header[idx]
                    )));
                }
            }
        }

        let columns: Vec<Column> = builders
            .into_iter()
            .zip(header)
            .map(|(builder, name)| builder.finish(name))
            .collect();

        Ok(DataFrame::new(columns)?)
    }
}

impl Default for TableLoader {
    fn default() -> Self {
        Self::new(LoadOptions::default())
    }
}

fn read_header<R: Read>(reader: &mut csv::Reader<R>) -> Result<Vec<String>> {
    let raw = reader.headers().map_err(map_csv_error)?;
    if raw.is_empty() || is_blank(raw) {
        return Err(PipelineError::parse("No columns to parse from file"));
    }
    Ok(normalize_headers(raw.iter()))
}

fn is_blank(record: &csv::StringRecord) -> bool {
    record.len() == 1 && record.get(0).is_some_and(str::is_empty)
}

fn check_width(record: &csv::StringRecord, expected: usize) -> Result<()> {
    if record.len() == expected {
        return Ok(());
    }
    Err(PipelineError::ParseError {
        message: format!("Expected {} fields, saw {}", expected, record.len()),
        position: record.position().map(ParsePosition::from),
    })
}

/// Fails when the input ended inside a quoted field. The open field belongs
/// to the last record read, or to the header when there is none.
fn check_quotes_closed<R: Read>(
    reader: &csv::Reader<QuoteTracker<R>>,
    last_record: Option<&csv::Position>,
) -> Result<()> {
    if !reader.get_ref().in_open_quote() {
        return Ok(());
    }
    let position = match last_record {
        Some(pos) => ParsePosition::from(pos),
        None => ParsePosition {
            line: 1,
            byte: 0,
            record: 0,
        },
    };
    Err(PipelineError::ParseError {
        message: "EOF inside quoted field".to_string(),
        position: Some(position),
    })
}

fn check_chunk_schema(first: &DataFrame, chunk: &DataFrame, index: usize) -> Result<()> {
    let describe = |df: &DataFrame| -> Vec<String> {
        df.get_columns()
            .iter()
            .map(|c| format!("{} ({})", c.name(), c.dtype()))
            .collect()
    };

    let expected = describe(first);
    let found = describe(chunk);
    if expected != found {
        return Err(PipelineError::SchemaMismatch {
            chunk: index,
            expected,
            found,
        });
    }
    Ok(())
}

fn map_csv_error(err: csv::Error) -> PipelineError {
    let position = err.position().map(ParsePosition::from);
    let message = err.to_string();
    match err.into_kind() {
        csv::ErrorKind::Io(io) => decode_error_from_io(io),
        _ => PipelineError::ParseError { message, position },
    }
}

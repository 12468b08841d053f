// ==============================================================================
// parsers/nirvana.rs - Nirvana annotation JSON stream parser
// ==============================================================================
// Description: Lazily streams position objects out of a gzipped Nirvana JSON file
// Author: Matt Barham
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Format (one position per line in practice, but layout is not relied upon):
//   {"header":{...},
//    "positions":[
//   {"chromosome":"chr1","position":12345,...,"variants":[...]},
//   ...
//   ],"genes":[...]}
// ==============================================================================

use flate2::read::MultiGzDecoder;
use serde::de::{DeserializeOwned, IgnoredAny};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::models::Position;

/// Top-level key holding the position array
const POSITIONS_KEY: &str = "positions";

/// Read buffer for the decompressed stream
const READ_BUFFER_SIZE: usize = 256 * 1024;

/// Nirvana stream decoding errors
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Failed to read annotation file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON in top-level object: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid position #{index}: {source}")]
    Position {
        index: u64,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unexpected byte '{found}' (expected {expected})")]
    UnexpectedByte { expected: &'static str, found: char },

    #[error("Unexpected end of input (expected {0})")]
    UnexpectedEof(&'static str),

    #[error("Top-level object has no \"positions\" array")]
    MissingPositions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderState {
    /// Before the `positions` array has been located
    Start,
    /// Inside the array; `first` until one element has been read
    InPositions { first: bool },
    /// Array exhausted or an error was returned
    Done,
}

/// Lazy iterator over the positions of a Nirvana JSON document
///
/// Only one position is materialized at a time. Keys other than `positions`
/// are skipped without building values. The rest of the document is still
/// checked once the array ends, so the iterator only finishes cleanly on a
/// complete, well-formed file.
pub struct PositionReader<R> {
    reader: R,
    state: ReaderState,
    positions_read: u64,
}

/// Open a gzipped Nirvana JSON file for streaming
///
/// Every call opens the file afresh, so each returned reader starts at the
/// first position.
///
/// # Example
/// ```no_run
/// use variant_store::parsers::open_positions;
///
/// for position in open_positions("sample.json.gz")? {
///     let position = position?;
///     println!("{} has {} variants", position.chromosome, position.variants.len());
/// }
/// # Ok::<(), variant_store::parsers::DecodeError>(())
/// ```
pub fn open_positions(
    path: impl AsRef<Path>,
) -> Result<PositionReader<BufReader<MultiGzDecoder<File>>>, DecodeError> {
    let path = path.as_ref();
    debug!("Opening Nirvana JSON stream: {:?}", path);

    let file = File::open(path)?;
    let decoder = MultiGzDecoder::new(file);
    Ok(PositionReader::new(BufReader::with_capacity(
        READ_BUFFER_SIZE,
        decoder,
    )))
}

impl<R: BufRead> PositionReader<R> {
    /// Wrap an already-decompressed JSON byte stream
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            state: ReaderState::Start,
            positions_read: 0,
        }
    }

    /// Number of positions yielded so far
    pub fn positions_read(&self) -> u64 {
        self.positions_read
    }

    fn advance(&mut self) -> Result<Option<Position>, DecodeError> {
        loop {
            match self.state {
                ReaderState::Start => {
                    self.seek_positions()?;
                    self.state = ReaderState::InPositions { first: true };
                }
                ReaderState::InPositions { first } => {
                    let next = self
                        .peek_significant()?
                        .ok_or(DecodeError::UnexpectedEof("position or ']'"))?;

                    if next == b']' {
                        self.reader.consume(1);
                        self.finish_document()?;
                        self.state = ReaderState::Done;
                        return Ok(None);
                    }

                    if !first {
                        self.expect_byte(b',', "',' or ']'")?;
                    }

                    let index = self.positions_read;
                    let position = self
                        .read_value::<Position>()
                        .map_err(|source| DecodeError::Position { index, source })?;

                    self.positions_read += 1;
                    self.state = ReaderState::InPositions { first: false };
                    return Ok(Some(position));
                }
                ReaderState::Done => return Ok(None),
            }
        }
    }

    /// Walk the top-level object up to the opening '[' of `positions`
    fn seek_positions(&mut self) -> Result<(), DecodeError> {
        self.expect_byte(b'{', "'{'")?;

        let mut first = true;
        loop {
            let next = self
                .peek_significant()?
                .ok_or(DecodeError::UnexpectedEof("object key or '}'"))?;

            if next == b'}' {
                return Err(DecodeError::MissingPositions);
            }
            if !first {
                self.expect_byte(b',', "',' or '}'")?;
            }
            first = false;

            let key: String = self.read_value()?;
            self.expect_byte(b':', "':'")?;

            if key == POSITIONS_KEY {
                self.expect_byte(b'[', "'[' opening positions")?;
                return Ok(());
            }

            debug!("Skipping top-level key: {}", key);
            self.skip_value()?;
        }
    }

    /// Skip the keys after `positions`, close the object, and require end of input
    ///
    /// Reading to the end also drains the gzip decoder, so a truncated or
    /// corrupt trailer fails here instead of passing unnoticed.
    fn finish_document(&mut self) -> Result<(), DecodeError> {
        loop {
            let next = self
                .peek_significant()?
                .ok_or(DecodeError::UnexpectedEof("',' or '}'"))?;

            if next == b'}' {
                self.reader.consume(1);
                break;
            }
            self.expect_byte(b',', "',' or '}'")?;

            let key: String = self.read_value()?;
            self.expect_byte(b':', "':'")?;
            debug!("Skipping top-level key: {}", key);
            self.skip_value()?;
        }

        match self.peek_significant()? {
            None => Ok(()),
            Some(b) => Err(DecodeError::UnexpectedByte {
                expected: "end of input",
                found: char::from(b),
            }),
        }
    }

    /// Deserialize exactly one JSON value from the stream
    ///
    /// Objects, arrays, strings and literals end on their own closing byte,
    /// so serde_json never reads past them. Bare numbers are the exception
    /// and are handled by `skip_number`.
    fn read_value<T: DeserializeOwned>(&mut self) -> Result<T, serde_json::Error> {
        let mut de = serde_json::Deserializer::from_reader(&mut self.reader);
        T::deserialize(&mut de)
    }

    fn skip_value(&mut self) -> Result<(), DecodeError> {
        match self.peek_significant()? {
            Some(b'-' | b'0'..=b'9') => self.skip_number(),
            Some(_) => {
                self.read_value::<IgnoredAny>()?;
                Ok(())
            }
            None => Err(DecodeError::UnexpectedEof("value")),
        }
    }

    fn skip_number(&mut self) -> Result<(), DecodeError> {
        loop {
            let (consumed, finished) = {
                let buf = self.reader.fill_buf()?;
                if buf.is_empty() {
                    return Ok(());
                }
                let len = buf
                    .iter()
                    .take_while(|b| matches!(b, b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E'))
                    .count();
                (len, len < buf.len())
            };
            self.reader.consume(consumed);
            if finished {
                return Ok(());
            }
        }
    }

    /// Skip whitespace and return the next byte without consuming it
    fn peek_significant(&mut self) -> Result<Option<u8>, DecodeError> {
        loop {
            let (skipped, found) = {
                let buf = self.reader.fill_buf()?;
                if buf.is_empty() {
                    return Ok(None);
                }
                let skipped = buf.iter().take_while(|b| b.is_ascii_whitespace()).count();
                (skipped, buf.get(skipped).copied())
            };
            self.reader.consume(skipped);
            if found.is_some() {
                return Ok(found);
            }
        }
    }

    fn expect_byte(&mut self, wanted: u8, expected: &'static str) -> Result<(), DecodeError> {
        match self.peek_significant()? {
            Some(b) if b == wanted => {
                self.reader.consume(1);
                Ok(())
            }
            Some(b) => Err(DecodeError::UnexpectedByte {
                expected,
                found: char::from(b),
            }),
            None => Err(DecodeError::UnexpectedEof(expected)),
        }
    }
}

impl<R: BufRead> Iterator for PositionReader<R> {
    type Item = Result<Position, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.advance() {
            Ok(Some(position)) => Some(Ok(position)),
            Ok(None) => None,
            Err(e) => {
                self.state = ReaderState::Done;
                Some(Err(e))
            }
        }
    }
}

impl<R: BufRead> std::iter::FusedIterator for PositionReader<R> {}

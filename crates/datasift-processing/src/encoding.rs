//! Text encoding detection and decoding.
//!
//! Detection looks for a byte-order mark first and otherwise runs chardetng's
//! statistical detector over the payload. The guess is not validated here;
//! it is handed straight to [`ChunkedDecoder`], which reports malformed input
//! as a decode error.
//!
//! [`ChunkedDecoder`] feeds the payload to an encoding_rs streaming decoder in
//! fixed-size pieces. A multi-byte character split across two pieces is held
//! by the decoder until its remaining bytes arrive, so the decoded text does
//! not depend on the piece size.

use crate::error::{PipelineError, Result};
use chardetng::EncodingDetector as CharsetSniffer;
use encoding_rs::{CoderResult, Decoder, DecoderResult, Encoding};
use serde::{Deserialize, Serialize};
use std::io::{self, Read};
use tracing::{debug, warn};

/// Default number of payload bytes decoded per step.
pub const DEFAULT_DECODE_PIECE_LEN: usize = 64 * 1024;

/// How an encoding was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodingMethod {
    /// A byte-order mark identified the encoding.
    Bom,
    /// The encoding was configured explicitly.
    Override,
    /// The statistical detector guessed the encoding.
    Heuristic,
}

impl EncodingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bom => "bom",
            Self::Override => "override",
            Self::Heuristic => "heuristic",
        }
    }
}

/// Best-guess encoding for a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingGuess {
    pub encoding: &'static Encoding,
    pub method: EncodingMethod,
}

impl EncodingGuess {
    /// The WHATWG name of the encoding, e.g. "UTF-8" or "windows-1252".
    pub fn label(&self) -> &'static str {
        self.encoding.name()
    }
}

/// Guesses the text encoding of raw bytes.
#[derive(Debug, Clone, Default)]
pub struct EncodingDetector {
    forced: Option<&'static Encoding>,
}

impl EncodingDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// A detector that always answers with the encoding named by `label`.
    pub fn with_override(label: &str) -> Result<Self> {
        let encoding = Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| {
            PipelineError::InvalidConfig(format!("Unknown encoding label '{}'", label))
        })?;
        Ok(Self {
            forced: Some(encoding),
        })
    }

    /// Detect the encoding of `bytes`.
    ///
    /// Empty input has nothing to detect from and fails with
    /// `EncodingUndetected` instead of falling back to a default.
    pub fn detect(&self, bytes: &[u8]) -> Result<EncodingGuess> {
        if bytes.is_empty() {
            return Err(PipelineError::EncodingUndetected(
                "the input is empty".to_string(),
            ));
        }

        if let Some(encoding) = self.forced {
            return Ok(EncodingGuess {
                encoding,
                method: EncodingMethod::Override,
            });
        }

        if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
            debug!("Found {} byte-order mark ({} bytes)", encoding.name(), bom_len);
            return Ok(EncodingGuess {
                encoding,
                method: EncodingMethod::Bom,
            });
        }

        let mut sniffer = CharsetSniffer::new();
        sniffer.feed(bytes, true);
        let encoding = sniffer.guess(None, true);

        if encoding == encoding_rs::REPLACEMENT {
            return Err(PipelineError::EncodingUndetected(
                "no character set matches the input".to_string(),
            ));
        }

        debug!("Detected encoding {}", encoding.name());
        Ok(EncodingGuess {
            encoding,
            method: EncodingMethod::Heuristic,
        })
    }
}

/// Malformed byte sequence found while decoding.
///
/// Travels through `io::Error` (and the csv reader) as the inner error and
/// is turned back into [`PipelineError::DecodeError`] by
/// [`decode_error_from_io`].
#[derive(Debug, thiserror::Error)]
#[error("malformed {encoding} sequence at byte {offset}")]
pub struct DecodeFailure {
    pub encoding: &'static str,
    pub offset: u64,
}

/// Recover a decode error carried inside an `io::Error`.
pub fn decode_error_from_io(err: io::Error) -> PipelineError {
    if err.get_ref().is_some_and(|inner| inner.is::<DecodeFailure>()) {
        if let Some(Ok(failure)) = err.into_inner().map(|inner| inner.downcast::<DecodeFailure>())
        {
            return PipelineError::DecodeError {
                encoding: failure.encoding.to_string(),
                offset: failure.offset,
            };
        }
        return PipelineError::Internal("decode failure lost its payload".to_string());
    }
    PipelineError::Io(err)
}

/// `io::Read` adapter yielding UTF-8 decoded from `src` piece by piece.
pub struct ChunkedDecoder<'a> {
    src: &'a [u8],
    pos: usize,
    piece_len: usize,
    decoder: Decoder,
    encoding: &'static Encoding,
    lossy: bool,
    replaced: bool,
    pending: String,
    pending_pos: usize,
    finished: bool,
}

impl<'a> ChunkedDecoder<'a> {
    /// Decode `src` as `encoding`, `piece_len` bytes at a time.
    ///
    /// A leading BOM for `encoding` is removed. With `lossy` set, malformed
    /// sequences become U+FFFD instead of an error.
    pub fn new(src: &'a [u8], encoding: &'static Encoding, piece_len: usize, lossy: bool) -> Self {
        Self {
            src,
            pos: 0,
            piece_len: piece_len.max(1),
            decoder: encoding.new_decoder_with_bom_removal(),
            encoding,
            lossy,
            replaced: false,
            pending: String::new(),
            pending_pos: 0,
            finished: false,
        }
    }

    /// Whether any replacement characters were substituted so far.
    pub fn had_replacements(&self) -> bool {
        self.replaced
    }

    /// Decode everything into one string.
    pub fn decode_all(mut self) -> Result<String> {
        let mut text = String::new();
        self.read_to_string(&mut text).map_err(decode_error_from_io)?;
        if self.replaced {
            warn!(
                "Input contained bytes that are invalid in {}; replaced with U+FFFD",
                self.encoding.name()
            );
        }
        Ok(text)
    }

    /// Decode the next piece into `pending`. Returns false at end of input.
    fn refill(&mut self) -> io::Result<bool> {
        while self.pending_pos >= self.pending.len() {
            if self.finished {
                return Ok(false);
            }

            self.pending.clear();
            self.pending_pos = 0;

            let end = (self.pos + self.piece_len).min(self.src.len());
            let last = end == self.src.len();
            let piece = &self.src[self.pos..end];

            let capacity = if self.lossy {
                self.decoder.max_utf8_buffer_length(piece.len())
            } else {
                self.decoder
                    .max_utf8_buffer_length_without_replacement(piece.len())
            }
            .ok_or_else(|| io::Error::other("decode buffer size overflow"))?;
            self.pending.reserve(capacity);

            if self.lossy {
                let (result, read, replaced) =
                    self.decoder.decode_to_string(piece, &mut self.pending, last);
                self.pos += read;
                self.replaced |= replaced;
                if matches!(result, CoderResult::InputEmpty) && last {
                    self.finished = true;
                }
            } else {
                let (result, read) =
                    self.decoder
                        .decode_to_string_without_replacement(piece, &mut self.pending, last);
                self.pos += read;
                match result {
                    DecoderResult::InputEmpty => {
                        if last {
                            self.finished = true;
                        }
                    }
                    DecoderResult::OutputFull => {}
                    DecoderResult::Malformed(bad, extra) => {
                        let offset = self.pos - bad as usize - extra as usize;
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidData,
                            DecodeFailure {
                                encoding: self.encoding.name(),
                                offset: offset as u64,
                            },
                        ));
                    }
                }
            }
        }
        Ok(true)
    }
}

impl Read for ChunkedDecoder<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || !self.refill()? {
            return Ok(0);
        }
        let available = &self.pending.as_bytes()[self.pending_pos..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.pending_pos += n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn decode(bytes: &[u8], encoding: &'static Encoding, piece: usize) -> Result<String> {
        ChunkedDecoder::new(bytes, encoding, piece, false).decode_all()
    }

    #[test]
    fn test_detect_empty_input_fails() {
        let err = EncodingDetector::new().detect(b"").unwrap_err();
        assert_eq!(err.error_code(), "ENCODING_UNDETECTED");
    }

    #[test]
    fn test_detect_utf8_bom() {
        let guess = EncodingDetector::new()
            .detect(b"\xEF\xBB\xBFname,age\n")
            .unwrap();
        assert_eq!(guess.label(), "UTF-8");
        assert_eq!(guess.method, EncodingMethod::Bom);
    }

    #[test]
    fn test_detect_utf8_text() {
        let text = "ville,pays\nSão Paulo,Brésil\nZürich,Schweiz\nKraków,Polska\n";
        let guess = EncodingDetector::new().detect(text.as_bytes()).unwrap();
        assert_eq!(guess.encoding, encoding_rs::UTF_8);
        assert_eq!(guess.method, EncodingMethod::Heuristic);
    }

    #[test]
    fn test_override_wins() {
        let detector = EncodingDetector::with_override("latin1").unwrap();
        let guess = detector.detect(b"a,b\n1,2\n").unwrap();
        assert_eq!(guess.encoding, encoding_rs::WINDOWS_1252);
        assert_eq!(guess.method, EncodingMethod::Override);

        assert!(EncodingDetector::with_override("no-such-charset").is_err());
    }

    #[test]
    fn test_bom_is_removed_when_decoding() {
        let text = decode(b"\xEF\xBB\xBFa,b\n", encoding_rs::UTF_8, 1024).unwrap();
        assert_eq!(text, "a,b\n");
    }

    #[test]
    fn test_split_multibyte_characters_decode_identically() {
        let original = "名前,都市\n山田,東京\nMüller,Köln\n😀,🚀\n";
        let bytes = original.as_bytes();

        for piece in [1, 2, 3, 5, 7, bytes.len()] {
            assert_eq!(decode(bytes, encoding_rs::UTF_8, piece).unwrap(), original);
        }
    }

    #[test]
    fn test_split_multibyte_legacy_encoding() {
        let original = "氏名,住所\n山田,東京\n";
        let (encoded, _, had_errors) = encoding_rs::SHIFT_JIS.encode(original);
        assert!(!had_errors);

        for piece in [1, 2, 3] {
            assert_eq!(
                decode(&encoded, encoding_rs::SHIFT_JIS, piece).unwrap(),
                original
            );
        }
    }

    #[test]
    fn test_malformed_input_reports_offset() {
        let err = decode(b"ab\xFFcd", encoding_rs::UTF_8, 2).unwrap_err();
        match err {
            PipelineError::DecodeError { encoding, offset } => {
                assert_eq!(encoding, "UTF-8");
                assert_eq!(offset, 2);
            }
            other => panic!("expected DecodeError, got {other:?}"),
        }
    }

    #[test]
    fn test_lossy_mode_substitutes_replacement_character() {
        let decoder = ChunkedDecoder::new(b"ab\xFFcd", encoding_rs::UTF_8, 2, true);
        let text = decoder.decode_all().unwrap();
        assert_eq!(text, "ab\u{FFFD}cd");
    }

    #[test]
    fn test_decode_error_from_plain_io_error() {
        let err = decode_error_from_io(io::Error::other("disk on fire"));
        assert_eq!(err.error_code(), "IO_ERROR");
    }
}

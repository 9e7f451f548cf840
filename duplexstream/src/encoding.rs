//! Text encodings a readable may be switched to with `set_encoding`
//!
//! The duplex adapter never looks at these: it hands the identifier to the
//! underlying readable and lets it decide. Readables keep a [`TextDecoder`]
//! per stream to turn raw chunks into text chunks, so characters split
//! across chunk boundaries survive.

use std::fmt;
use std::str::FromStr;

use base64::Engine;

use crate::error::StreamError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    Ascii,
    Latin1,
    Hex,
    Base64,
    Utf16Le,
}

impl Encoding {
    /// Canonical name, as accepted by `set_encoding`
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Encoding::Utf8 => "utf8",
            Encoding::Ascii => "ascii",
            Encoding::Latin1 => "latin1",
            Encoding::Hex => "hex",
            Encoding::Base64 => "base64",
            Encoding::Utf16Le => "utf16le",
        }
    }

    /// Decode raw bytes into text
    ///
    /// Invalid sequences are replaced, never rejected.
    #[must_use]
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            Encoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Encoding::Ascii => bytes.iter().map(|b| char::from(b & 0x7f)).collect(),
            Encoding::Latin1 => bytes.iter().map(|&b| char::from(b)).collect(),
            Encoding::Hex => hex::encode(bytes),
            Encoding::Base64 => base64::engine::general_purpose::STANDARD.encode(bytes),
            Encoding::Utf16Le => {
                let units = bytes
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]));
                char::decode_utf16(units)
                    .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
                    .collect()
            }
        }
    }

    /// Encode text into raw bytes
    ///
    /// # Errors
    ///
    /// Returns `StreamError::InvalidData` if `text` is not valid hex or base64
    /// for those encodings.
    pub fn encode(&self, text: &str) -> Result<Vec<u8>, StreamError> {
        match self {
            Encoding::Utf8 => Ok(text.as_bytes().to_vec()),
            // Truncation to the low byte is the expected behaviour here
            #[allow(clippy::cast_possible_truncation)]
            Encoding::Ascii | Encoding::Latin1 => Ok(text.chars().map(|c| c as u32 as u8).collect()),
            Encoding::Hex => hex::decode(text).map_err(|_| StreamError::InvalidData(*self)),
            Encoding::Base64 => base64::engine::general_purpose::STANDARD
                .decode(text)
                .map_err(|_| StreamError::InvalidData(*self)),
            Encoding::Utf16Le => Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect()),
        }
    }

    /// A stateful decoder for a stream of chunks in this encoding
    #[must_use]
    pub fn decoder(&self) -> TextDecoder {
        let unicode = match self {
            Encoding::Utf8 => Some(encoding_rs::UTF_8.new_decoder_without_bom_handling()),
            Encoding::Utf16Le => Some(encoding_rs::UTF_16LE.new_decoder_without_bom_handling()),
            _ => None,
        };
        TextDecoder {
            encoding: *self,
            unicode,
            pending: Vec::new(),
        }
    }
}

/// Decodes a sequence of chunks, carrying incomplete input to the next one
///
/// A multibyte character or a base64 group split between two chunks is
/// emitted whole with the later chunk. Call [`TextDecoder::finish`] once the
/// input ends to flush what is still held back.
pub struct TextDecoder {
    encoding: Encoding,
    unicode: Option<encoding_rs::Decoder>,
    pending: Vec<u8>,
}

impl TextDecoder {
    #[must_use]
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Decode the next chunk
    ///
    /// The result may be empty when the whole chunk is held back.
    pub fn decode_chunk(&mut self, bytes: &[u8]) -> String {
        if let Some(decoder) = self.unicode.as_mut() {
            return decode_unicode(decoder, bytes, false);
        }
        match self.encoding {
            Encoding::Base64 => {
                self.pending.extend_from_slice(bytes);
                let whole = self.pending.len() - self.pending.len() % 3;
                let text = self.encoding.decode(&self.pending[..whole]);
                self.pending.drain(..whole);
                text
            }
            encoding => encoding.decode(bytes),
        }
    }

    /// Flush held-back input at the end of the stream
    ///
    /// Returns `None` if nothing was pending.
    pub fn finish(&mut self) -> Option<String> {
        let text = match self.unicode.as_mut() {
            Some(decoder) => decode_unicode(decoder, &[], true),
            None => {
                let rest = std::mem::take(&mut self.pending);
                self.encoding.decode(&rest)
            }
        };
        // A finished unicode decoder cannot be fed again
        self.unicode = self.encoding.decoder().unicode;
        (!text.is_empty()).then_some(text)
    }
}

impl fmt::Debug for TextDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextDecoder")
            .field("encoding", &self.encoding)
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

fn decode_unicode(decoder: &mut encoding_rs::Decoder, mut bytes: &[u8], last: bool) -> String {
    let mut out = String::new();
    loop {
        let room = decoder
            .max_utf8_buffer_length(bytes.len())
            .unwrap_or(bytes.len() * 3 + 4);
        out.reserve(room);
        let (result, read, _) = decoder.decode_to_string(bytes, &mut out, last);
        bytes = &bytes[read..];
        if matches!(result, encoding_rs::CoderResult::InputEmpty) {
            return out;
        }
    }
}

impl FromStr for Encoding {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(Encoding::Utf8),
            "ascii" => Ok(Encoding::Ascii),
            "latin1" | "binary" => Ok(Encoding::Latin1),
            "hex" => Ok(Encoding::Hex),
            "base64" => Ok(Encoding::Base64),
            "ucs2" | "ucs-2" | "utf16le" | "utf-16le" => Ok(Encoding::Utf16Le),
            _ => Err(StreamError::UnknownEncoding(s.to_string())),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

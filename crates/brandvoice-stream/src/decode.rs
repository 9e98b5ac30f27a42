use crate::errors::AggregateError;

/// Turns raw chunk bytes into text.
///
/// Decoders may hold state between chunks (for example an incomplete
/// multi-byte sequence) but must never emit text that a later chunk could
/// change.
pub trait ChunkDecoder: Send {
    /// Decodes one chunk. On error nothing from the chunk is returned.
    fn decode(&mut self, chunk: &[u8]) -> Result<String, AggregateError>;

    /// Checks that no undecoded bytes remain after the last chunk.
    fn finish(&mut self) -> Result<(), AggregateError> {
        Ok(())
    }
}

/// Strict UTF-8 decoding that tolerates sequences split across chunks.
#[derive(Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
    consumed: usize,
}

impl ChunkDecoder for Utf8Decoder {
    fn decode(&mut self, chunk: &[u8]) -> Result<String, AggregateError> {
        let mut buf = std::mem::take(&mut self.pending);
        buf.extend_from_slice(chunk);
        let valid_up_to = match std::str::from_utf8(&buf) {
            Ok(_) => buf.len(),
            Err(err) if err.error_len().is_none() => err.valid_up_to(),
            Err(err) => {
                return Err(AggregateError::Decode {
                    offset: self.consumed + err.valid_up_to(),
                });
            }
        };
        self.pending = buf.split_off(valid_up_to);
        self.consumed += valid_up_to;
        String::from_utf8(buf).map_err(|err| AggregateError::Decode {
            offset: self.consumed - valid_up_to + err.utf8_error().valid_up_to(),
        })
    }

    fn finish(&mut self) -> Result<(), AggregateError> {
        if self.pending.is_empty() {
            Ok(())
        } else {
            Err(AggregateError::Decode {
                offset: self.consumed,
            })
        }
    }
}

/// ISO-8859-1: every byte is the code point with the same value.
#[derive(Default)]
pub struct Latin1Decoder;

impl ChunkDecoder for Latin1Decoder {
    fn decode(&mut self, chunk: &[u8]) -> Result<String, AggregateError> {
        Ok(chunk.iter().map(|&b| char::from(b)).collect())
    }
}

//! Chunk framing and every read that happens inside a chunk.
//!
//! All reads performed while a chunk is open go through `ChunkReader`, which refuses to read
//! past the declared end of the chunk and counts every byte it hands out.

use crate::prelude::*;

/// Variable-length integers longer than this are considered corrupt.
///
/// The format only allows 4 bytes, one extra byte is tolerated.
const MAX_VARLEN_BYTES: usize = 5;

/// The kind of chunk that was just opened.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum ChunkKind {
    /// A chunk with an unrecognized signature.
    ///
    /// Its length is known, so it can be skipped with
    /// [`Decoder::skip_chunk`](struct.Decoder.html#method.skip_chunk).
    Unknown([u8; 4]),
    /// The stream ended cleanly, exactly at a chunk boundary. There are no more chunks.
    EndOfStream,
    /// An `MThd` header chunk.
    Header,
    /// An `MTrk` track chunk.
    Track,
}

/// Why a byte could not be read.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum Exhausted {
    /// Every byte in the current chunk has been consumed.
    Chunk,
    /// The byte source ran dry while the chunk still declared more bytes.
    Stream,
}
impl Exhausted {
    fn into_err(self) -> &'static ErrorKind {
        match self {
            Exhausted::Chunk => err!(TruncatedStream, "chunk ended in the middle of a structure"),
            Exhausted::Stream => err!(TruncatedStream, "stream ended before the chunk did"),
        }
    }
}

#[derive(Debug)]
pub(crate) struct ChunkReader<S> {
    source: S,
    /// Bytes left in the current chunk.
    remaining: u32,
}
impl<S> ChunkReader<S> {
    pub fn new(source: S) -> ChunkReader<S> {
        ChunkReader {
            source,
            remaining: 0,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn into_inner(self) -> S {
        self.source
    }
}
impl<S: ByteSource> ChunkReader<S> {
    /// Read the signature and length of the next chunk, making it the current chunk.
    ///
    /// Any bytes left unread in the previous chunk are *not* skipped.
    pub fn open(&mut self) -> Result<ChunkKind> {
        self.remaining = 0;
        let mut id = [0; 4];
        for (i, slot) in id.iter_mut().enumerate() {
            match self.source.next_byte() {
                Some(byte) => *slot = byte,
                None if i == 0 => return Ok(ChunkKind::EndOfStream),
                None => bail!(err!(
                    TruncatedStream,
                    "stream ended inside a chunk signature"
                )),
            }
        }
        let mut len: u32 = 0;
        for _ in 0..4 {
            let byte = self
                .source
                .next_byte()
                .ok_or(err!(TruncatedStream, "stream ended inside a chunk length"))?;
            len = len << 8 | u32::from(byte);
        }
        ensure!(
            bit_range(len, 31..32) == 0,
            err!(MalformedLength, "chunk length exceeds 31 bits")
        );
        self.remaining = len;
        Ok(match &id {
            b"MThd" => ChunkKind::Header,
            b"MTrk" => ChunkKind::Track,
            _ => ChunkKind::Unknown(id),
        })
    }

    fn next(&mut self) -> StdResult<u8, Exhausted> {
        if self.remaining == 0 {
            return Err(Exhausted::Chunk);
        }
        let byte = self.source.next_byte().ok_or(Exhausted::Stream)?;
        self.remaining -= 1;
        Ok(byte)
    }

    /// Read a single byte of the current chunk.
    pub fn read_u8(&mut self) -> StdResult<u8, &'static ErrorKind> {
        self.next().map_err(Exhausted::into_err)
    }

    /// Read a big-endian integer of `len` bytes (at most 4).
    pub fn read_fixed(&mut self, len: usize) -> StdResult<u32, &'static ErrorKind> {
        debug_assert!(len <= 4, "fixed-length integers are at most 4 bytes");
        let mut int: u32 = 0;
        for _ in 0..len {
            int = int << 8 | u32::from(self.read_u8()?);
        }
        Ok(int)
    }

    /// Read a variable-length integer.
    ///
    /// Returns `None` if the chunk was already exhausted before the first byte, which is how
    /// the end of a track is detected when reading delta-times.
    /// Running out in the middle of the integer is an error.
    pub fn read_varlen(&mut self) -> StdResult<Option<u32>, &'static ErrorKind> {
        let mut int: u32 = 0;
        for i in 0..MAX_VARLEN_BYTES {
            let byte = match self.next() {
                Ok(byte) => byte,
                Err(Exhausted::Chunk) if i == 0 => return Ok(None),
                Err(exhausted) => return Err(exhausted.into_err()),
            };
            ensure!(
                int <= u32::MAX >> 7,
                err!(CorruptVariableLength, "varlen integer overflows 32 bits")
            );
            int = int << 7 | u32::from(bit_range(byte, 0..7));
            if bit_range(byte, 7..8) == 0 {
                if cfg!(feature = "strict") {
                    ensure!(
                        i < 4,
                        err!(Malformed, "varlen integer larger than 4 bytes")
                    );
                }
                return Ok(Some(int));
            }
        }
        Err(err!(
            CorruptVariableLength,
            "varlen integer not terminated after 5 bytes"
        ))
    }

    /// Read a variable-length integer that must be present, such as a payload length.
    pub fn read_length(&mut self) -> StdResult<u32, &'static ErrorKind> {
        self.read_varlen()?
            .ok_or(err!(TruncatedStream, "chunk ended before a payload length"))
    }

    /// Copy a payload of `declared` bytes into `buf`, keeping at most `buf.len() - 1` of them
    /// followed by a NUL terminator.
    ///
    /// The bytes that do not fit are still read and thrown away, so exactly `declared` bytes of
    /// the chunk are always consumed.
    /// Returns the amount of stored bytes, not counting the terminator.
    pub fn capture(&mut self, declared: u32, buf: &mut [u8]) -> StdResult<usize, &'static ErrorKind> {
        let room = buf.len().saturating_sub(1);
        let stored = usize::try_from(declared).map_or(room, |declared| declared.min(room));
        for slot in &mut buf[..stored] {
            *slot = self.read_u8()?;
        }
        if let Some(terminator) = buf.get_mut(stored) {
            *terminator = 0;
        }
        // `stored <= declared`, so this fits back in a `u32`
        self.skip(declared - stored as u32)?;
        Ok(stored)
    }

    /// Read and discard `len` bytes.
    pub fn skip(&mut self, len: u32) -> StdResult<(), &'static ErrorKind> {
        for _ in 0..len {
            self.read_u8()?;
        }
        Ok(())
    }

    /// Read and discard whatever is left of the current chunk.
    pub fn skip_rest(&mut self) -> StdResult<(), &'static ErrorKind> {
        self.skip(self.remaining)
    }
}

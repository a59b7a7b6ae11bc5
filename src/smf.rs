//! The decoding session: header parsing, chunk transitions and per-event state.

use crate::{
    chunk::{ChunkKind, ChunkReader},
    event::{Captured, Event, EventKind, EventType},
    prelude::*,
    primitive::Format,
};
use tracing::{debug, trace};

/// The capture buffer size used when none is given, in bytes, terminator included.
pub const DEFAULT_CAPACITY: usize = 141;

/// A MIDI file header, indicating metadata about the file.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub struct Header {
    /// Information about how should the tracks be laid out when playing them back.
    pub format: Format,
    /// The amount of tracks the header claims the file holds.
    ///
    /// This is informative only, the actual chunks are never counted against it.
    pub track_count: u16,
    /// The amount of MIDI ticks per beat (quarter note).
    pub ticks_per_beat: u15,
}
impl Header {
    pub fn new(format: Format, track_count: u16, ticks_per_beat: u15) -> Header {
        Header {
            format,
            track_count,
            ticks_per_beat,
        }
    }

    /// Read the fields of a header chunk that was just opened.
    fn read<S: ByteSource>(chunk: &mut ChunkReader<S>) -> Result<Header> {
        ensure!(
            chunk.remaining() == 6,
            err!(MalformedLength, "header chunk must be 6 bytes long")
        );
        let format = chunk.read_fixed(2).context("failed to read format")? as u16;
        let format = Format::from_code(format).ok_or(err!(Invalid, "invalid smf format"))?;
        let track_count = chunk.read_fixed(2).context("failed to read track count")? as u16;
        let division = chunk.read_fixed(2).context("failed to read division")? as u16;
        ensure!(
            bit_range(division, 15..16) == 0,
            err!(
                UnsupportedDivisionFormat,
                "smpte timecode division is not supported"
            )
        );
        if cfg!(feature = "strict") {
            ensure!(division != 0, err!(Malformed, "ticks per beat is zero"));
        }
        ensure!(
            chunk.remaining() == 0,
            err!(MalformedLength, "header chunk has leftover bytes")
        );
        Ok(Header::new(format, track_count, u15::from(division)))
    }
}

/// A streaming Standard Midi File decoder.
///
/// The decoder owns the byte source and every piece of decoding state: the open chunk and its
/// remaining byte count, the running status and the capture buffer for event payloads.
///
/// The caller drives it chunk by chunk:
/// [`open_chunk`](#method.open_chunk) moves to the next chunk, and
/// [`read_event`](#method.read_event) decodes the events of a track chunk one at a time until it
/// returns `None`.
///
/// `CAP` is the size of the payload capture buffer, including the NUL terminator.
/// It must be at least 1.
///
/// Errors are never recovered from: once a call fails the position within the stream is lost,
/// and the decoder should be dropped.
pub struct Decoder<S, const CAP: usize = DEFAULT_CAPACITY> {
    chunk: ChunkReader<S>,
    header: Header,
    current: ChunkKind,
    running_status: Option<u8>,
    /// The last decoded event, with its captured payload stripped.
    last: Option<(u32, EventKind<'static>)>,
    /// Stored and declared length of the last captured payload.
    last_capture: Option<(usize, u32)>,
    buf: [u8; CAP],
}
impl<S: ByteSource> Decoder<S> {
    /// Start decoding a file, reading its header chunk.
    ///
    /// Uses a capture buffer of [`DEFAULT_CAPACITY`](constant.DEFAULT_CAPACITY.html) bytes.
    pub fn begin(source: S) -> Result<Decoder<S>> {
        Self::begin_with_capacity(source)
    }
}
impl<S: ByteSource, const CAP: usize> Decoder<S, CAP> {
    const NONZERO_CAPACITY: () = assert!(CAP > 0, "capture buffer must fit the terminator");

    /// Start decoding a file, reading its header chunk, with a capture buffer of `CAP` bytes.
    ///
    /// The first chunk must be a header chunk.
    pub fn begin_with_capacity(source: S) -> Result<Decoder<S, CAP>> {
        #[allow(clippy::let_unit_value)]
        let () = Self::NONZERO_CAPACITY;
        let mut chunk = ChunkReader::new(source);
        let header = Self::read_header(&mut chunk).map_err(|err| {
            debug!(error = ?err, "failed to read smf header");
            err
        })?;
        trace!(?header, "read smf header");
        Ok(Decoder {
            chunk,
            header,
            current: ChunkKind::Header,
            running_status: None,
            last: None,
            last_capture: None,
            buf: [0; CAP],
        })
    }

    fn read_header(chunk: &mut ChunkReader<S>) -> Result<Header> {
        match chunk.open().context("failed to open header chunk")? {
            ChunkKind::Header => Header::read(chunk).context("failed to read header chunk"),
            _ => bail!(err!(UnexpectedChunk, "expected a header chunk first")),
        }
    }

    /// The header read by [`begin`](#method.begin).
    #[inline]
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// The kind of the chunk opened last.
    #[inline]
    pub fn current_chunk(&self) -> ChunkKind {
        self.current
    }

    /// How many bytes of the current chunk have not been read yet.
    #[inline]
    pub fn chunk_bytes_left(&self) -> u32 {
        self.chunk.remaining()
    }

    /// The status byte that events without one will use, if any.
    #[inline]
    pub fn running_status(&self) -> Option<u8> {
        self.running_status
    }

    /// Open the next chunk.
    ///
    /// Unread bytes of the current chunk are not skipped, call
    /// [`skip_chunk`](#method.skip_chunk) first if the chunk was not read to its end.
    ///
    /// Returns `ChunkKind::EndOfStream` if the stream ended cleanly before the next chunk.
    /// Unknown chunks are reported but not skipped.
    pub fn open_chunk(&mut self) -> Result<ChunkKind> {
        self.running_status = None;
        self.forget_last();
        self.current = ChunkKind::EndOfStream;
        let kind = self.chunk.open().context("failed to open chunk").map_err(|err| {
            debug!(error = ?err, "failed to open chunk");
            err
        })?;
        match kind {
            ChunkKind::Unknown(id) => {
                debug!(signature = ?id, len = self.chunk.remaining(), "unknown chunk")
            }
            _ => trace!(?kind, len = self.chunk.remaining(), "opened chunk"),
        }
        self.current = kind;
        Ok(kind)
    }

    /// Decode the next event of the current track chunk.
    ///
    /// Returns `None` once every byte of the chunk has been consumed.
    /// The returned event borrows the capture buffer, so it must be used (or copied) before
    /// the decoder is used again.
    pub fn read_event(&mut self) -> Result<Option<Event<'_>>> {
        self.forget_last();
        ensure!(
            self.current == ChunkKind::Track,
            err!(UnexpectedChunk, "events can only be read from track chunks")
        );
        let Decoder {
            chunk,
            running_status,
            last,
            last_capture,
            buf,
            ..
        } = self;
        match Event::read(chunk, running_status, &mut buf[..]) {
            Ok(Some(event)) => {
                trace!(delta = event.delta, kind = ?event.kind, "decoded event");
                *last = Some((event.delta, event.kind.to_static()));
                *last_capture = event
                    .kind
                    .captured()
                    .map(|data| (data.len(), data.declared_len()));
                Ok(Some(event))
            }
            Ok(None) => {
                trace!("end of track chunk");
                Ok(None)
            }
            Err(err) => {
                debug!(error = ?err, bytes_left = chunk.remaining(), "failed to decode event");
                Err(err)
            }
        }
    }

    /// The delta time of the last decoded event, if the last call to `read_event` produced one.
    #[inline]
    pub fn delta_ticks(&self) -> Option<u32> {
        self.last.map(|(delta, _)| delta)
    }

    /// The type of the last decoded event, if the last call to `read_event` produced one.
    #[inline]
    pub fn event_type(&self) -> Option<EventType> {
        self.last.map(|(_, kind)| kind.event_type())
    }

    /// The last decoded event, with all of its data, if the last call to `read_event` produced
    /// one.
    ///
    /// Unlike the event returned by `read_event`, this does not hold the decoder borrowed
    /// mutably.
    pub fn last_event(&self) -> Option<Event<'_>> {
        let (delta, kind) = self.last?;
        let kind = match self.payload() {
            Some(data) => kind.with_payload(data),
            None => kind,
        };
        Some(Event { delta, kind })
    }

    /// The captured payload of the last decoded event, if it had one.
    ///
    /// Only SysEx, escape and text-like meta events capture a payload, see
    /// [`last_event`](#method.last_event) for the data of every other event.
    pub fn payload(&self) -> Option<Captured<'_>> {
        self.last_capture
            .map(|(stored, declared)| Captured::from_buffer(&self.buf, stored, declared))
    }

    fn forget_last(&mut self) {
        self.last = None;
        self.last_capture = None;
    }

    /// Read a single raw byte of the current chunk.
    ///
    /// The raw readers are meant for the contents of chunks this crate does not understand.
    /// They keep the chunk byte count exact, but using them inside a track chunk will most
    /// likely leave `read_event` in the middle of an event.
    pub fn read_byte(&mut self) -> Result<u8> {
        self.forget_last();
        self.chunk.read_u8().context("failed to read chunk byte")
    }

    /// Read a raw big-endian integer of `len` bytes, at most 4, from the current chunk.
    pub fn read_fixed(&mut self, len: usize) -> Result<u32> {
        self.forget_last();
        ensure!(
            len <= 4,
            err!(Invalid, "fixed-length integers are at most 4 bytes long")
        );
        self.chunk.read_fixed(len).context("failed to read chunk integer")
    }

    /// Read a raw variable-length integer from the current chunk.
    ///
    /// Returns `None` if the chunk has no bytes left.
    pub fn read_varlen(&mut self) -> Result<Option<u32>> {
        self.forget_last();
        self.chunk
            .read_varlen()
            .context("failed to read chunk varlen integer")
    }

    /// Read `len` raw bytes of the current chunk into the capture buffer.
    ///
    /// Like any other payload, only the first `CAP - 1` bytes are kept, but all `len` bytes are
    /// consumed.
    pub fn read_bytes(&mut self, len: u32) -> Result<Captured<'_>> {
        self.forget_last();
        let stored = self
            .chunk
            .capture(len, &mut self.buf[..])
            .context("failed to read chunk bytes")?;
        Ok(Captured::from_buffer(&self.buf, stored, len))
    }

    /// Discard the rest of the current chunk, keeping the stream aligned to the next chunk.
    pub fn skip_chunk(&mut self) -> Result<()> {
        self.forget_last();
        let left = self.chunk.remaining();
        self.chunk.skip_rest().context("failed to skip chunk").map_err(|err| {
            debug!(error = ?err, bytes_left = left, "failed to skip chunk");
            err
        })?;
        trace!(skipped = left, "skipped chunk");
        Ok(())
    }

    /// Open chunks until a track chunk is found, skipping any other chunk on the way.
    ///
    /// Returns `false` if the stream ended before another track chunk.
    /// A second header chunk is an error in strict mode, and skipped otherwise.
    pub fn next_track(&mut self) -> Result<bool> {
        loop {
            match self.open_chunk()? {
                ChunkKind::Track => return Ok(true),
                ChunkKind::EndOfStream => return Ok(false),
                ChunkKind::Header => {
                    if cfg!(feature = "strict") {
                        bail!(err!(Malformed, "found a second header chunk"));
                    }
                    self.skip_chunk()?;
                }
                ChunkKind::Unknown(_) => self.skip_chunk()?,
            }
        }
    }

    /// Stop decoding and get the byte source back.
    ///
    /// The source is left wherever the decoder stopped reading.
    pub fn into_inner(self) -> S {
        self.chunk.into_inner()
    }
}
impl<S, const CAP: usize> fmt::Debug for Decoder<S, CAP> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Decoder")
            .field("header", &self.header)
            .field("current", &self.current)
            .field("bytes_left", &self.chunk.remaining())
            .field("running_status", &self.running_status)
            .finish_non_exhaustive()
    }
}

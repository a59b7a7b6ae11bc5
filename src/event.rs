//! All sort of events and their parsers.

use crate::{
    chunk::ChunkReader,
    prelude::*,
    primitive::{SmpteOffset, TimeSignature},
};

/// Represents a decoded SMF track event.
///
/// Consists of a delta time (in MIDI ticks relative to the previous event) and the actual track
/// event.
///
/// Payload bytes are borrowed from the decoder's capture buffer, so the event has to be used or
/// copied before the next event is read.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub struct Event<'a> {
    /// How many MIDI ticks after the previous event should this event fire.
    pub delta: u32,
    /// The type of event along with event-specific data.
    pub kind: EventKind<'a>,
}
impl<'a> Event<'a> {
    /// Reads a single event from the chunk, updating `running_status`.
    ///
    /// Returns `None` if the chunk had no bytes left, which is how a track ends.
    /// In case of failure the chunk might be left in the middle of an event!
    pub(crate) fn read<S: ByteSource>(
        chunk: &mut ChunkReader<S>,
        running_status: &mut Option<u8>,
        buf: &'a mut [u8],
    ) -> Result<Option<Event<'a>>> {
        let delta = match chunk
            .read_varlen()
            .context("failed to read event deltatime")?
        {
            Some(delta) => delta,
            None => return Ok(None),
        };
        let kind = EventKind::read(chunk, running_status, buf).context("failed to parse event")?;
        Ok(Some(Event { delta, kind }))
    }

    /// The kind of this event, without its data.
    #[inline]
    pub fn event_type(&self) -> EventType {
        self.kind.event_type()
    }
}

/// Represents the different kinds of SMF events and their associated data.
///
/// It notably does *not* include the timing of the event; the `Event` struct is responsible
/// for this.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum EventKind<'a> {
    /// A message associated to a MIDI channel carrying musical data.
    ///
    /// Usually, the bulk of MIDI data is these kind of messages.
    Midi {
        /// The MIDI channel that this event is associated with.
        channel: u4,
        /// The MIDI message type and associated data.
        message: MidiMessage,
    },
    /// A System Exclusive message, carrying arbitrary data.
    ///
    /// The data bytes included here do not include the implicit `0xF0` prefix.
    ///
    /// Usually SysEx events end with an `0xF7` byte, but SysEx events that are split into several
    /// small packets may only contain the `0xF7` byte in the last packet fragment.
    SysEx(Captured<'a>),
    /// An escape sequence, intended to send arbitrary data to the MIDI synthesizer.
    Escape(Captured<'a>),
    /// A meta-message, giving extra information for correct playback, like tempo, song name,
    /// lyrics, etc...
    Meta(MetaMessage<'a>),
}
impl<'a> EventKind<'a> {
    fn read<S: ByteSource>(
        chunk: &mut ChunkReader<S>,
        running_status: &mut Option<u8>,
        buf: &'a mut [u8],
    ) -> Result<EventKind<'a>> {
        let status = chunk.read_u8().context("failed to read status")?;
        let kind = match status {
            0x00..=0x7F => {
                //Running status: the byte just read is really the first data byte
                let running = running_status.ok_or(err!(
                    RunningStatusUnavailable,
                    "event missing status with no running status active"
                ))?;
                let (channel, message) = MidiMessage::read(chunk, running, Some(status))
                    .context("failed to read midi message")?;
                EventKind::Midi { channel, message }
            }
            0x80..=0xEF => {
                *running_status = Some(status);
                let (channel, message) = MidiMessage::read(chunk, status, None)
                    .context("failed to read midi message")?;
                EventKind::Midi { channel, message }
            }
            0xFF => {
                *running_status = None;
                EventKind::Meta(MetaMessage::read(chunk, buf).context("failed to read meta event")?)
            }
            0xF0 => {
                *running_status = None;
                EventKind::SysEx(Captured::read(chunk, buf).context("failed to read sysex event")?)
            }
            0xF7 => {
                *running_status = None;
                EventKind::Escape(
                    Captured::read(chunk, buf).context("failed to read escape event")?,
                )
            }
            0xF1..=0xF6 => bail!(err!(
                Invalid,
                "standard midi files cannot contain system common events"
            )),
            0xF8..=0xFE => bail!(err!(
                Invalid,
                "standard midi files cannot contain system realtime events"
            )),
        };
        Ok(kind)
    }

    /// The kind of this event, without its data.
    pub fn event_type(&self) -> EventType {
        match self {
            EventKind::Midi { .. } => EventType::Channel,
            EventKind::SysEx(_) => EventType::SysEx,
            EventKind::Escape(_) => EventType::Escape,
            EventKind::Meta(meta) => meta.event_type(),
        }
    }

    /// The captured payload of this event, if it carries one.
    ///
    /// Only SysEx, escape and text-like meta events carry captured payloads.
    pub fn captured(&self) -> Option<Captured<'a>> {
        match *self {
            EventKind::SysEx(data) | EventKind::Escape(data) => Some(data),
            EventKind::Meta(meta) => meta.captured(),
            EventKind::Midi { .. } => None,
        }
    }

    /// Remove any lifetimed data from this event to create an `EventKind` with `'static`
    /// lifetime that can be stored and moved everywhere, solving borrow checker issues.
    ///
    /// WARNING: Any captured payloads will be replaced by empty payloads.
    pub fn to_static(&self) -> EventKind<'static> {
        match *self {
            EventKind::Midi { channel, message } => EventKind::Midi { channel, message },
            EventKind::SysEx(_) => EventKind::SysEx(Captured::EMPTY),
            EventKind::Escape(_) => EventKind::Escape(Captured::EMPTY),
            EventKind::Meta(meta) => EventKind::Meta(meta.to_static()),
        }
    }
}
impl EventKind<'static> {
    /// Put a captured payload back into an event stripped by `to_static`.
    pub(crate) fn with_payload(self, data: Captured<'_>) -> EventKind<'_> {
        match self {
            EventKind::SysEx(_) => EventKind::SysEx(data),
            EventKind::Escape(_) => EventKind::Escape(data),
            EventKind::Meta(meta) => EventKind::Meta(meta.with_payload(data)),
            other => other,
        }
    }
}

/// A variable-length payload, captured into the decoder's fixed-size buffer.
///
/// At most `CAP - 1` bytes of the payload are kept, followed by a NUL terminator.
/// Payloads longer than that are truncated, but [`declared_len`](#method.declared_len) still
/// reports the length stated in the file.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub struct Captured<'a> {
    /// Stored bytes plus the NUL terminator.
    bytes: &'a [u8],
    declared: u32,
}
impl Captured<'static> {
    /// A payload with no bytes.
    pub(crate) const EMPTY: Captured<'static> = Captured {
        bytes: &[0],
        declared: 0,
    };
}
impl<'a> Captured<'a> {
    /// Read a varlen length followed by that many payload bytes.
    fn read<S: ByteSource>(
        chunk: &mut ChunkReader<S>,
        buf: &'a mut [u8],
    ) -> StdResult<Captured<'a>, &'static ErrorKind> {
        let declared = chunk.read_length()?;
        Captured::capture(chunk, declared, buf)
    }

    fn capture<S: ByteSource>(
        chunk: &mut ChunkReader<S>,
        declared: u32,
        buf: &'a mut [u8],
    ) -> StdResult<Captured<'a>, &'static ErrorKind> {
        let stored = chunk.capture(declared, &mut *buf)?;
        Ok(Captured::from_buffer(buf, stored, declared))
    }

    /// Rebuild a capture out of a buffer that holds `stored` bytes and a terminator.
    pub(crate) fn from_buffer(buf: &'a [u8], stored: usize, declared: u32) -> Captured<'a> {
        Captured {
            bytes: &buf[..=stored],
            declared,
        }
    }

    /// The stored payload bytes, without the terminator.
    #[inline]
    pub fn as_bytes(&self) -> &'a [u8] {
        &self.bytes[..self.bytes.len() - 1]
    }

    /// The stored payload bytes, followed by a single NUL byte.
    #[inline]
    pub fn with_nul(&self) -> &'a [u8] {
        self.bytes
    }

    /// The amount of stored bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len() - 1
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The payload length as declared in the file, which may be larger than what was stored.
    #[inline]
    pub fn declared_len(&self) -> u32 {
        self.declared
    }

    /// Whether some payload bytes were dropped because they did not fit.
    #[inline]
    pub fn is_truncated(&self) -> bool {
        (self.len() as u64) < u64::from(self.declared)
    }
}
impl AsRef<[u8]> for Captured<'_> {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

/// Represents a MIDI message, usually associated to a MIDI channel.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum MidiMessage {
    /// Stop playing a note.
    NoteOff {
        /// The MIDI key to stop playing.
        key: u7,
        /// The velocity with which to stop playing it.
        vel: u7,
    },
    /// Start playing a note.
    NoteOn {
        /// The key to start playing.
        key: u7,
        /// The velocity (strength) with which to press it.
        ///
        /// Note that by convention a `NoteOn` message with a velocity of 0 is equivalent to a
        /// `NoteOff`.
        vel: u7,
    },
    /// Modify the velocity of a note after it has been played.
    Aftertouch {
        /// The key for which to modify its velocity.
        key: u7,
        /// The new velocity for the key.
        vel: u7,
    },
    /// Modify the value of a MIDI controller.
    Controller {
        /// The controller to modify.
        ///
        /// See the MIDI spec for the meaning of each index.
        controller: u7,
        /// The value to set it to.
        value: u7,
    },
    /// Change the program (also known as instrument) for a channel.
    ProgramChange {
        /// The new program (instrument) to use for the channel.
        program: u7,
    },
    /// Change the note velocity of a whole channel at once, without starting new notes.
    ChannelAftertouch {
        /// The new velocity for all notes currently playing in the channel.
        vel: u7,
    },
    /// Set the pitch bend value for the entire channel.
    PitchBend {
        /// The new pitch-bend value.
        bend: PitchBend,
    },
}
impl MidiMessage {
    /// Midi messages have a known length.
    pub(crate) fn msg_length(status: u8) -> usize {
        const LENGTH_BY_STATUS: [u8; 16] = [0, 0, 0, 0, 0, 0, 0, 0, 2, 2, 2, 2, 1, 1, 2, 0];
        LENGTH_BY_STATUS[(status >> 4) as usize] as usize
    }

    /// Read the data bytes of a message with the given status.
    ///
    /// `pushdown` is a data byte that was already consumed in place of the status byte, and is
    /// used as the first parameter instead of reading it again.
    fn read_data<S: ByteSource>(
        chunk: &mut ChunkReader<S>,
        status: u8,
        mut pushdown: Option<u8>,
    ) -> StdResult<[u7; 2], &'static ErrorKind> {
        let mut data = [u7::new(0); 2];
        for slot in &mut data[..Self::msg_length(status)] {
            let raw = match pushdown.take() {
                Some(raw) => raw,
                None => chunk.read_u8()?,
            };
            *slot = u7::from_data(raw)?;
        }
        Ok(data)
    }

    /// Read a message with a channel status in the range `0x80..=0xEF`.
    pub(crate) fn read<S: ByteSource>(
        chunk: &mut ChunkReader<S>,
        status: u8,
        pushdown: Option<u8>,
    ) -> StdResult<(u4, MidiMessage), &'static ErrorKind> {
        let data = Self::read_data(chunk, status, pushdown)?;
        let channel = u4::from(status);
        let msg = match status >> 4 {
            0x8 => MidiMessage::NoteOff {
                key: data[0],
                vel: data[1],
            },
            0x9 => MidiMessage::NoteOn {
                key: data[0],
                vel: data[1],
            },
            0xA => MidiMessage::Aftertouch {
                key: data[0],
                vel: data[1],
            },
            0xB => MidiMessage::Controller {
                controller: data[0],
                value: data[1],
            },
            0xC => MidiMessage::ProgramChange { program: data[0] },
            0xD => MidiMessage::ChannelAftertouch { vel: data[0] },
            _ => {
                //0xE. Note the little-endian order, contrasting with the default big-endian order
                //of Standard Midi Files
                let lsb = data[0].as_int() as u16;
                let msb = data[1].as_int() as u16;
                MidiMessage::PitchBend {
                    bend: PitchBend(u14::from(msb << 7 | lsb)),
                }
            }
        };
        Ok((channel, msg))
    }

    /// Get the raw status nibble for this MIDI message type.
    pub fn status_nibble(&self) -> u8 {
        match self {
            MidiMessage::NoteOff { .. } => 0x8,
            MidiMessage::NoteOn { .. } => 0x9,
            MidiMessage::Aftertouch { .. } => 0xA,
            MidiMessage::Controller { .. } => 0xB,
            MidiMessage::ProgramChange { .. } => 0xC,
            MidiMessage::ChannelAftertouch { .. } => 0xD,
            MidiMessage::PitchBend { .. } => 0xE,
        }
    }

    /// The two raw parameter bytes, as they appear in the file.
    ///
    /// Messages with a single parameter report `0` as their second parameter.
    pub fn params(&self) -> (u8, u8) {
        match *self {
            MidiMessage::NoteOff { key, vel }
            | MidiMessage::NoteOn { key, vel }
            | MidiMessage::Aftertouch { key, vel } => (key.as_int(), vel.as_int()),
            MidiMessage::Controller { controller, value } => (controller.as_int(), value.as_int()),
            MidiMessage::ProgramChange { program } => (program.as_int(), 0),
            MidiMessage::ChannelAftertouch { vel } => (vel.as_int(), 0),
            MidiMessage::PitchBend { bend } => {
                let raw = bend.0.as_int();
                ((raw & 0x7F) as u8, (raw >> 7) as u8)
            }
        }
    }
}

/// The value of a pitch bend, represented as 14 bits.
///
/// A value of `0x0000` indicates full bend downwards.
/// A value of `0x2000` indicates no bend.
/// A value of `0x3FFF` indicates full bend upwards.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub struct PitchBend(pub u14);
impl PitchBend {
    /// The middle value of `0x2000`, indicating no bend.
    #[inline]
    pub const fn mid_raw_value() -> PitchBend {
        PitchBend(u14::new(0x2000))
    }

    /// Returns an int in the range `[-0x2000, 0x1FFF]`.
    #[inline]
    pub fn as_int(self) -> i16 {
        self.0.as_int() as i16 - 0x2000
    }

    /// Returns an `f32` in the range `[-1.0, 1.0)`.
    #[inline]
    pub fn as_f32(self) -> f32 {
        self.as_int() as f32 * (1.0 / 0x2000 as f32)
    }
}

/// A "meta message", as defined by the SMF spec.
/// These events carry metadata about the track, such as tempo, time signature, copyright, etc...
///
/// Meta messages with a fixed payload size are checked against it, and a mismatch is a
/// `MalformedLength` error.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum MetaMessage<'a> {
    /// The number of a sequence, in format 2 files, or of the whole pattern otherwise.
    SequenceNumber(u16),
    /// Arbitrary text associated to an instant.
    Text(Captured<'a>),
    /// A copyright notice.
    Copyright(Captured<'a>),
    /// The name of the sequence or of the track.
    Name(Captured<'a>),
    /// Information about the name of the current instrument.
    InstrumentName(Captured<'a>),
    /// Arbitrary lyric information associated to an instant.
    Lyric(Captured<'a>),
    /// Arbitrary marker text associated to an instant, like a rehearsal letter.
    Marker(Captured<'a>),
    /// Arbitrary cue point text associated to an instant.
    CuePoint(Captured<'a>),
    /// The MIDI channel that following meta and sysex events refer to.
    ChannelPrefix(u4),
    /// Obligatory at track end.
    EndOfTrack,
    /// Amount of microseconds per beat (quarter note).
    ///
    /// Usually appears at the beginning of a track, before any midi events are sent, but there
    /// are no guarantees.
    Tempo(u24),
    /// The starting point of the track, in SMPTE time.
    SmpteOffset(SmpteOffset),
    TimeSignature(TimeSignature),
    /// As in the MIDI specification, negative numbers indicate number of flats and positive
    /// numbers indicate number of sharps.
    /// `false` indicates a major scale, `true` indicates a minor scale.
    KeySignature(i8, bool),
    /// A meta-message this crate does not interpret.
    ///
    /// The `u8` is the raw meta-message identifier byte.
    /// The payload is consumed and thrown away.
    Unknown(u8),
}
impl<'a> MetaMessage<'a> {
    fn read<S: ByteSource>(
        chunk: &mut ChunkReader<S>,
        buf: &'a mut [u8],
    ) -> Result<MetaMessage<'a>> {
        let type_byte = chunk
            .read_u8()
            .context("failed to read meta message type")?;
        let len = chunk
            .read_length()
            .context("failed to read meta message length")?;
        let meta = match type_byte {
            0x00 => {
                ensure!(
                    len == 2,
                    err!(MalformedLength, "sequence number meta event must be 2 bytes long")
                );
                MetaMessage::SequenceNumber(chunk.read_fixed(2)? as u16)
            }
            0x01..=0x07 => {
                let data = Captured::capture(chunk, len, buf)
                    .context("failed to read meta message text")?;
                match type_byte {
                    0x01 => MetaMessage::Text(data),
                    0x02 => MetaMessage::Copyright(data),
                    0x03 => MetaMessage::Name(data),
                    0x04 => MetaMessage::InstrumentName(data),
                    0x05 => MetaMessage::Lyric(data),
                    0x06 => MetaMessage::Marker(data),
                    _ => MetaMessage::CuePoint(data),
                }
            }
            0x20 => {
                ensure!(
                    len == 1,
                    err!(MalformedLength, "channel prefix meta event must be 1 byte long")
                );
                MetaMessage::ChannelPrefix(u4::from_data(chunk.read_u8()?)?)
            }
            0x2F => {
                ensure!(
                    len == 0,
                    err!(MalformedLength, "end of track meta event must be empty")
                );
                MetaMessage::EndOfTrack
            }
            0x51 => {
                ensure!(
                    len == 3,
                    err!(MalformedLength, "tempo meta event must be 3 bytes long")
                );
                MetaMessage::Tempo(u24::from(chunk.read_fixed(3)?))
            }
            0x54 => {
                ensure!(
                    len == 5,
                    err!(MalformedLength, "smpte offset meta event must be 5 bytes long")
                );
                MetaMessage::SmpteOffset(
                    SmpteOffset::read(chunk).context("failed to read smpte offset")?,
                )
            }
            0x58 => {
                ensure!(
                    len == 4,
                    err!(MalformedLength, "time signature meta event must be 4 bytes long")
                );
                MetaMessage::TimeSignature(
                    TimeSignature::read(chunk).context("failed to read time signature")?,
                )
            }
            0x59 => {
                ensure!(
                    len == 2,
                    err!(MalformedLength, "key signature meta event must be 2 bytes long")
                );
                MetaMessage::KeySignature(chunk.read_u8()? as i8, chunk.read_u8()? != 0)
            }
            _ => {
                chunk
                    .skip(len)
                    .context("failed to skip unknown meta message")?;
                MetaMessage::Unknown(type_byte)
            }
        };
        Ok(meta)
    }

    /// The kind of this meta message, without its data.
    pub fn event_type(&self) -> EventType {
        match self {
            MetaMessage::SequenceNumber(_) => EventType::SequenceNumber,
            MetaMessage::Text(_) => EventType::Text,
            MetaMessage::Copyright(_) => EventType::Copyright,
            MetaMessage::Name(_) => EventType::Name,
            MetaMessage::InstrumentName(_) => EventType::InstrumentName,
            MetaMessage::Lyric(_) => EventType::Lyric,
            MetaMessage::Marker(_) => EventType::Marker,
            MetaMessage::CuePoint(_) => EventType::CuePoint,
            MetaMessage::ChannelPrefix(_) => EventType::ChannelPrefix,
            MetaMessage::EndOfTrack => EventType::EndOfTrack,
            MetaMessage::Tempo(_) => EventType::Tempo,
            MetaMessage::SmpteOffset(_) => EventType::SmpteOffset,
            MetaMessage::TimeSignature(_) => EventType::TimeSignature,
            MetaMessage::KeySignature(..) => EventType::KeySignature,
            MetaMessage::Unknown(_) => EventType::NoOp,
        }
    }

    /// Remove any lifetimed data from this message to create a `MetaMessage` with `'static`
    /// lifetime.
    ///
    /// WARNING: Any captured text will be replaced by an empty payload.
    pub fn to_static(&self) -> MetaMessage<'static> {
        use self::MetaMessage::*;
        match *self {
            SequenceNumber(v) => SequenceNumber(v),
            Text(_) => Text(Captured::EMPTY),
            Copyright(_) => Copyright(Captured::EMPTY),
            Name(_) => Name(Captured::EMPTY),
            InstrumentName(_) => InstrumentName(Captured::EMPTY),
            Lyric(_) => Lyric(Captured::EMPTY),
            Marker(_) => Marker(Captured::EMPTY),
            CuePoint(_) => CuePoint(Captured::EMPTY),
            ChannelPrefix(v) => ChannelPrefix(v),
            EndOfTrack => EndOfTrack,
            Tempo(v) => Tempo(v),
            SmpteOffset(v) => SmpteOffset(v),
            TimeSignature(v) => TimeSignature(v),
            KeySignature(v0, v1) => KeySignature(v0, v1),
            Unknown(v) => Unknown(v),
        }
    }

    /// The captured text of a text-like meta message.
    pub fn captured(&self) -> Option<Captured<'a>> {
        match *self {
            MetaMessage::Text(data)
            | MetaMessage::Copyright(data)
            | MetaMessage::Name(data)
            | MetaMessage::InstrumentName(data)
            | MetaMessage::Lyric(data)
            | MetaMessage::Marker(data)
            | MetaMessage::CuePoint(data) => Some(data),
            _ => None,
        }
    }
}

impl MetaMessage<'static> {
    fn with_payload(self, data: Captured<'_>) -> MetaMessage<'_> {
        use self::MetaMessage::*;
        match self {
            Text(_) => Text(data),
            Copyright(_) => Copyright(data),
            Name(_) => Name(data),
            InstrumentName(_) => InstrumentName(data),
            Lyric(_) => Lyric(data),
            Marker(_) => Marker(data),
            CuePoint(_) => CuePoint(data),
            other => other,
        }
    }
}

/// The kind of an event, without any of its data.
///
/// Handy to dispatch on an event without borrowing its payload.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum EventType {
    /// An event that carries nothing of interest and can be skipped, such as an unknown meta
    /// message.
    NoOp,
    /// A plain `0xF0` SysEx message.
    SysEx,
    /// An `0xF7` escape sequence.
    Escape,
    SequenceNumber,
    Text,
    Copyright,
    Name,
    InstrumentName,
    Lyric,
    Marker,
    CuePoint,
    ChannelPrefix,
    EndOfTrack,
    Tempo,
    SmpteOffset,
    TimeSignature,
    KeySignature,
    /// A MIDI channel message.
    Channel,
}

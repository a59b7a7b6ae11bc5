use crate::{
    chunk::ChunkReader,
    num::{u14, u15, u24, u28, u4, u7},
    ChunkKind, Decoder, Error, ErrorKind, Event, EventKind, EventType, Format, Fps, Header,
    IoSource, IterSource, MetaMessage, MidiMessage, PitchBend, SmpteOffset, TimeSignature,
};
use pretty_assertions::assert_eq;
use std::{
    fs::{self, File},
    io::{self, BufReader, Read},
};

/// Open and read the content of a test asset.
macro_rules! open {
    {$name:ident : $file:expr} => {
        let $name = fs::read(concat!("test-asset/", $file)).unwrap();
    };
}

/// Check that a result failed with the given error kind.
macro_rules! assert_kind {
    ($res:expr, $kind:ident) => {{
        match $res {
            Ok(_) => panic!(concat!("expected a ", stringify!($kind), " error")),
            Err(err) => {
                let err: Error = err.into();
                assert!(
                    matches!(err.kind(), ErrorKind::$kind(_)),
                    "expected a {} error, got: {:?}",
                    stringify!($kind),
                    err
                );
            }
        }
    }};
}

/// Build a chunk out of its signature and body.
fn chunk(id: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut raw = id.to_vec();
    raw.extend_from_slice(&(body.len() as u32).to_be_bytes());
    raw.extend_from_slice(body);
    raw
}

fn header(format: u16, track_count: u16, division: u16) -> Vec<u8> {
    let mut body = Vec::new();
    for field in [format, track_count, division] {
        body.extend_from_slice(&field.to_be_bytes());
    }
    chunk(b"MThd", &body)
}

/// A format 0 file at 96 ticks per beat holding a single track.
fn single_track(body: &[u8]) -> Vec<u8> {
    let mut raw = header(0, 1, 96);
    raw.extend(chunk(b"MTrk", body));
    raw
}

/// Begin decoding `raw` and open its first track.
fn open_track(raw: &[u8]) -> Decoder<&[u8]> {
    let mut decoder = Decoder::begin(raw).unwrap();
    assert_eq!(decoder.open_chunk().unwrap(), ChunkKind::Track);
    decoder
}

fn varlen(int: u32) -> Vec<u8> {
    let mut buf = [0; 4];
    u28::new(int).encode_varlen(&mut buf).to_vec()
}

fn note_on(channel: u8, key: u8, vel: u8) -> EventKind<'static> {
    EventKind::Midi {
        channel: u4::new(channel),
        message: MidiMessage::NoteOn {
            key: u7::new(key),
            vel: u7::new(vel),
        },
    }
}

fn note_off(channel: u8, key: u8, vel: u8) -> EventKind<'static> {
    EventKind::Midi {
        channel: u4::new(channel),
        message: MidiMessage::NoteOff {
            key: u7::new(key),
            vel: u7::new(vel),
        },
    }
}

mod decode {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn minimal_file() {
        let raw = single_track(&[
            0x00, 0x90, 60, 100, //
            0x60, 0x80, 60, 0, //
            0x00, 0xFF, 0x2F, 0x00,
        ]);
        let mut decoder = Decoder::begin(&raw[..]).unwrap();
        assert_eq!(
            *decoder.header(),
            Header::new(Format::SingleTrack, 1, u15::new(96))
        );
        assert_eq!(decoder.open_chunk().unwrap(), ChunkKind::Track);
        assert_eq!(
            decoder.read_event().unwrap(),
            Some(Event {
                delta: 0,
                kind: note_on(0, 60, 100),
            })
        );
        assert_eq!(
            decoder.read_event().unwrap(),
            Some(Event {
                delta: 96,
                kind: note_off(0, 60, 0),
            })
        );
        assert_eq!(decoder.delta_ticks(), Some(96));
        assert_eq!(decoder.event_type(), Some(EventType::Channel));
        assert_eq!(
            decoder.read_event().unwrap(),
            Some(Event {
                delta: 0,
                kind: EventKind::Meta(MetaMessage::EndOfTrack),
            })
        );
        assert_eq!(decoder.read_event().unwrap(), None);
        assert_eq!(decoder.delta_ticks(), None);
        assert_eq!(decoder.open_chunk().unwrap(), ChunkKind::EndOfStream);
    }

    #[test]
    fn test_asset() {
        open! {raw: "two_tracks.mid"};
        let file = File::open("test-asset/two_tracks.mid").unwrap();
        let mut from_file = Decoder::begin(IoSource::new(BufReader::new(file))).unwrap();
        let mut from_slice = Decoder::begin(&raw[..]).unwrap();
        assert_eq!(
            *from_file.header(),
            Header::new(Format::Parallel, 2, u15::new(480))
        );
        assert_eq!(from_file.header(), from_slice.header());

        let mut tracks = Vec::new();
        while from_file.next_track().unwrap() {
            assert!(from_slice.next_track().unwrap());
            let mut types = Vec::new();
            while let Some(event) = from_file.read_event().unwrap() {
                let delta = event.delta;
                let ty = event.event_type();
                let params = match event.kind {
                    EventKind::Midi { message, .. } => Some(message.params()),
                    _ => None,
                };
                let other = from_slice.read_event().unwrap().unwrap();
                assert_eq!(other.delta, delta);
                assert_eq!(other.event_type(), ty);
                if let EventKind::Midi { message, .. } = other.kind {
                    assert_eq!(Some(message.params()), params);
                }
                types.push(ty);
            }
            assert_eq!(from_slice.read_event().unwrap(), None);
            tracks.push(types);
        }
        assert!(!from_slice.next_track().unwrap());
        assert_eq!(
            tracks,
            vec![
                vec![
                    EventType::Name,
                    EventType::Tempo,
                    EventType::TimeSignature,
                    EventType::KeySignature,
                    EventType::EndOfTrack,
                ],
                [
                    &[EventType::Channel; 6][..],
                    &[EventType::SysEx, EventType::NoOp, EventType::EndOfTrack],
                ]
                .concat(),
            ]
        );
        assert_eq!(from_file.into_inner().take_error().map(|err| err.kind()), None);
    }

    #[test]
    fn channel_messages() {
        let raw = single_track(&[
            0x00, 0xC3, 0x05, //
            0x00, 0xD3, 0x40, //
            0x00, 0xB3, 0x07, 0x64, //
            0x00, 0xA3, 0x3C, 0x20, //
            0x00, 0xE3, 0x00, 0x40, //
            0x00, 0xE3, 0x7F, 0x7F,
        ]);
        let mut decoder = open_track(&raw);
        let mut messages = Vec::new();
        while let Some(event) = decoder.read_event().unwrap() {
            match event.kind {
                EventKind::Midi { channel, message } => {
                    assert_eq!(channel.as_int(), 3);
                    messages.push(message);
                }
                other => panic!("expected a midi message, got {:?}", other),
            }
        }
        assert_eq!(
            messages,
            vec![
                MidiMessage::ProgramChange {
                    program: u7::new(5)
                },
                MidiMessage::ChannelAftertouch { vel: u7::new(0x40) },
                MidiMessage::Controller {
                    controller: u7::new(7),
                    value: u7::new(100)
                },
                MidiMessage::Aftertouch {
                    key: u7::new(60),
                    vel: u7::new(0x20)
                },
                MidiMessage::PitchBend {
                    bend: PitchBend::mid_raw_value()
                },
                MidiMessage::PitchBend {
                    bend: PitchBend(u14::new(0x3FFF))
                },
            ]
        );
        assert_eq!(messages[0].params(), (5, 0));
        assert_eq!(messages[0].status_nibble(), 0xC);
        assert_eq!(messages[4].params(), (0x00, 0x40));
        assert_eq!(PitchBend::mid_raw_value().as_int(), 0);
        assert_eq!(PitchBend(u14::new(0x3FFF)).as_int(), 0x1FFF);
    }

    #[test]
    fn running_status() {
        let raw = single_track(&[
            0x00, 0x91, 60, 100, //
            0x00, 64, 80, //
            0x10, 67, 0,
        ]);
        let mut decoder = open_track(&raw);
        assert_eq!(decoder.read_event().unwrap().unwrap().kind, note_on(1, 60, 100));
        assert_eq!(decoder.running_status(), Some(0x91));
        assert_eq!(
            decoder.read_event().unwrap(),
            Some(Event {
                delta: 0,
                kind: note_on(1, 64, 80),
            })
        );
        assert_eq!(
            decoder.read_event().unwrap(),
            Some(Event {
                delta: 0x10,
                kind: note_on(1, 67, 0),
            })
        );
        assert_eq!(decoder.running_status(), Some(0x91));
        assert_eq!(decoder.chunk_bytes_left(), 0);
    }

    #[test]
    fn running_status_is_cleared() {
        //Nothing set it yet
        let raw = single_track(&[0x00, 60, 100]);
        assert_kind!(open_track(&raw).read_event(), RunningStatusUnavailable);

        //Meta events cancel it
        let raw = single_track(&[0x00, 0x90, 60, 100, 0x00, 0xFF, 0x01, 0x00, 0x00, 62, 100]);
        let mut decoder = open_track(&raw);
        decoder.read_event().unwrap();
        decoder.read_event().unwrap();
        assert_eq!(decoder.running_status(), None);
        assert_kind!(decoder.read_event(), RunningStatusUnavailable);

        //SysEx events cancel it
        let raw = single_track(&[0x00, 0x90, 60, 100, 0x00, 0xF0, 0x01, 0xF7, 0x00, 62, 100]);
        let mut decoder = open_track(&raw);
        decoder.read_event().unwrap();
        decoder.read_event().unwrap();
        assert_kind!(decoder.read_event(), RunningStatusUnavailable);

        //Opening a chunk resets it
        let mut raw = header(1, 2, 96);
        raw.extend(chunk(b"MTrk", &[0x00, 0x90, 60, 100]));
        raw.extend(chunk(b"MTrk", &[0x00, 62, 100]));
        let mut decoder = open_track(&raw);
        decoder.read_event().unwrap();
        assert_eq!(decoder.read_event().unwrap(), None);
        assert!(decoder.next_track().unwrap());
        assert_eq!(decoder.running_status(), None);
        assert_kind!(decoder.read_event(), RunningStatusUnavailable);
    }

    #[test]
    fn byte_accounting() {
        let mut body = Vec::new();
        let mut sizes = Vec::new();
        let mut push = |bytes: &[u8]| {
            body.extend_from_slice(bytes);
            sizes.push(bytes.len() as u32);
        };
        push(&[0x00, 0x90, 60, 100]);
        push(&[0x81, 0x00, 60, 0]);
        push(&[0x00, 0xFF, 0x03, 0x05, b'h', b'e', b'l', b'l', b'o']);
        let mut text = vec![0x00, 0xFF, 0x01, 0x81, 0x48];
        text.extend(std::iter::repeat(b'x').take(200));
        push(&text);
        push(&[0x00, 0xF7, 0x02, 0xF3, 0x01]);
        push(&[0x00, 0xFF, 0x7F, 0x03, 0x00, 0x00, 0x41]);
        push(&[0x00, 0xFF, 0x2F, 0x00]);

        let raw = single_track(&body);
        let mut decoder = open_track(&raw);
        let mut left = body.len() as u32;
        assert_eq!(decoder.chunk_bytes_left(), left);
        for size in sizes {
            decoder.read_event().unwrap().unwrap();
            left -= size;
            assert_eq!(decoder.chunk_bytes_left(), left);
        }
        assert_eq!(left, 0);
        assert_eq!(decoder.read_event().unwrap(), None);
    }

    #[test]
    fn capture_truncation() {
        let mut body = vec![0x00, 0xFF, 0x01, 12];
        body.extend_from_slice(b"Hello, world");
        body.extend_from_slice(&[0x00, 0xFF, 0x2F, 0x00]);
        let raw = single_track(&body);

        let mut decoder = Decoder::<_, 8>::begin_with_capacity(&raw[..]).unwrap();
        assert_eq!(decoder.open_chunk().unwrap(), ChunkKind::Track);
        match decoder.read_event().unwrap().unwrap().kind {
            EventKind::Meta(MetaMessage::Text(text)) => {
                assert_eq!(text.as_bytes(), b"Hello, ");
                assert_eq!(text.with_nul(), b"Hello, \0");
                assert_eq!(text.len(), 7);
                assert_eq!(text.declared_len(), 12);
                assert!(text.is_truncated());
            }
            other => panic!("expected a text event, got {:?}", other),
        }
        assert_eq!(decoder.event_type(), Some(EventType::Text));
        assert_eq!(decoder.payload().unwrap().as_bytes(), b"Hello, ");
        assert_eq!(decoder.chunk_bytes_left(), 4);
        assert_eq!(
            decoder.read_event().unwrap().unwrap().kind,
            EventKind::Meta(MetaMessage::EndOfTrack)
        );
        assert_eq!(decoder.payload(), None);
    }

    #[test]
    fn capture_payloads() {
        let raw = single_track(&[
            0x00, 0xF0, 0x05, 0x7E, 0x7F, 0x09, 0x01, 0xF7, //
            0x00, 0xF7, 0x02, 0xF3, 0x01, //
            0x00, 0xFF, 0x03, 0x00,
        ]);
        let mut decoder = open_track(&raw);
        match decoder.read_event().unwrap().unwrap().kind {
            EventKind::SysEx(data) => {
                assert_eq!(data.as_bytes(), [0x7E_u8, 0x7F, 0x09, 0x01, 0xF7]);
                assert!(!data.is_truncated());
            }
            other => panic!("expected a sysex event, got {:?}", other),
        }
        match decoder.read_event().unwrap().unwrap().kind {
            EventKind::Escape(data) => assert_eq!(data.with_nul(), [0xF3_u8, 0x01, 0x00]),
            other => panic!("expected an escape event, got {:?}", other),
        }
        let event = decoder.read_event().unwrap().unwrap();
        let name = event.kind.captured().unwrap();
        assert!(name.is_empty());
        assert_eq!(name.with_nul(), [0_u8]);
        assert_eq!(event.event_type(), EventType::Name);
    }

    #[test]
    fn meta_messages() {
        let raw = single_track(&[
            0x00, 0xFF, 0x00, 0x02, 0x01, 0x02, //
            0x00, 0xFF, 0x20, 0x01, 0x09, //
            0x00, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20, //
            0x00, 0xFF, 0x54, 0x05, 0x61, 0x02, 0x03, 0x04, 0x05, //
            0x00, 0xFF, 0x58, 0x04, 0x06, 0x02, 0x18, 0x08, //
            0x00, 0xFF, 0x59, 0x02, 0xFE, 0x00, //
            0x00, 0xFF, 0x59, 0x02, 0x03, 0x01, //
            0x00, 0xFF, 0x7F, 0x03, 0x00, 0x00, 0x41,
        ]);
        let smpte = SmpteOffset {
            hours: 0x61,
            minutes: 2,
            seconds: 3,
            frames: 4,
            subframes: 5,
        };
        let expected = [
            MetaMessage::SequenceNumber(0x0102),
            MetaMessage::ChannelPrefix(u4::new(9)),
            MetaMessage::Tempo(u24::new(500_000)),
            MetaMessage::SmpteOffset(smpte),
            MetaMessage::TimeSignature(TimeSignature {
                numerator: 6,
                denominator: 4,
                clocks_per_click: 24,
                thirty_seconds_per_quarter: 8,
            }),
            MetaMessage::KeySignature(-2, false),
            MetaMessage::KeySignature(3, true),
            MetaMessage::Unknown(0x7F),
        ];
        let mut decoder = open_track(&raw);
        for expected in expected.iter() {
            match decoder.read_event().unwrap().unwrap().kind {
                EventKind::Meta(meta) => assert_eq!(meta, *expected),
                other => panic!("expected a meta event, got {:?}", other),
            }
        }
        assert_eq!(decoder.read_event().unwrap(), None);
        assert_eq!(smpte.hour(), 1);
        assert_eq!(smpte.fps(), Fps::Fps30);
        assert!((smpte.second_f32() - (3.0 + 4.05 / 30.0)).abs() < 1e-5);
        assert_eq!(expected[7].event_type(), EventType::NoOp);
    }

    #[test]
    fn decoder_releases_source() {
        let raw = single_track(&[0x00, 0xFF, 0x2F, 0x00]);
        let mut source = &raw[..];
        let decoder = Decoder::begin(&mut source).unwrap();
        drop(decoder);
        assert_eq!(source, &raw[14..]);

        let decoder = Decoder::begin(IterSource(raw.iter().copied())).unwrap();
        let IterSource(mut rest) = decoder.into_inner();
        assert_eq!(rest.next(), Some(b'M'));
    }
}

mod varlen {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Open a track chunk with the given body for raw reads.
    fn reader(raw: &[u8]) -> ChunkReader<&[u8]> {
        let mut reader = ChunkReader::new(raw);
        assert_eq!(reader.open().unwrap(), ChunkKind::Track);
        reader
    }

    #[test]
    fn round_trip() {
        for &(int, len) in &[
            (0, 1),
            (0x40, 1),
            (0x7F, 1),
            (0x80, 2),
            (0x2000, 2),
            (0x3FFF, 2),
            (0x4000, 3),
            (0x1F_FFFF, 3),
            (0x20_0000, 4),
            (0x0FFF_FFFF, 4),
        ] {
            let encoded = varlen(int);
            assert_eq!(encoded.len(), len, "encoded length of {:#x}", int);
            let raw = chunk(b"MTrk", &encoded);
            let mut reader = reader(&raw);
            assert_eq!(reader.read_varlen().unwrap(), Some(int));
            assert_eq!(reader.remaining(), 0);
        }
        assert_eq!(varlen(0x0FFF_FFFF), [0xFF_u8, 0xFF, 0xFF, 0x7F]);
        assert_eq!(varlen(0x80), [0x81_u8, 0x00]);
    }

    #[test]
    fn five_bytes() {
        let raw = chunk(b"MTrk", &[0x80, 0x80, 0x80, 0x80, 0x80, 0x00]);
        assert_kind!(reader(&raw).read_varlen(), CorruptVariableLength);

        let raw = chunk(b"MTrk", &[0x90, 0x80, 0x80, 0x80, 0x00]);
        assert_kind!(reader(&raw).read_varlen(), CorruptVariableLength);

        let raw = chunk(b"MTrk", &[0x81, 0x80, 0x80, 0x80, 0x00]);
        if cfg!(feature = "strict") {
            assert_kind!(reader(&raw).read_varlen(), Malformed);
        } else {
            assert_eq!(reader(&raw).read_varlen().unwrap(), Some(0x1000_0000));
        }
    }

    #[test]
    fn end_of_chunk() {
        let raw = chunk(b"MTrk", &[]);
        assert_eq!(reader(&raw).read_varlen().unwrap(), None);

        let raw = chunk(b"MTrk", &[0x81]);
        assert_kind!(reader(&raw).read_varlen(), TruncatedStream);
    }

    #[test]
    fn capture() {
        let raw = chunk(b"MTrk", &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11]);
        let mut reader = reader(&raw);
        let mut buf = [0xAA; 4];
        assert_eq!(reader.capture(10, &mut buf).unwrap(), 3);
        assert_eq!(buf, [1_u8, 2, 3, 0]);
        assert_eq!(reader.remaining(), 1);
        assert_kind!(reader.capture(2, &mut buf), TruncatedStream);
    }
}

mod malformed {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn tempo_length() {
        for len in [0, 2, 4] {
            let mut body = vec![0x00, 0xFF, 0x51, len];
            body.extend(std::iter::repeat(0x20).take(len as usize));
            let raw = single_track(&body);
            assert_kind!(open_track(&raw).read_event(), MalformedLength);
        }
    }

    #[test]
    fn fixed_meta_lengths() {
        for &(ty, len) in &[(0x00, 1), (0x20, 2), (0x2F, 1), (0x54, 4), (0x58, 3), (0x59, 1)] {
            let mut body = vec![0x00, 0xFF, ty, len];
            body.extend(std::iter::repeat(0).take(len as usize));
            let raw = single_track(&body);
            assert_kind!(open_track(&raw).read_event(), MalformedLength);
        }
    }

    #[test]
    fn time_signature_exponent() {
        let raw = single_track(&[0x00, 0xFF, 0x58, 0x04, 0x04, 0x20, 0x18, 0x08]);
        assert_kind!(open_track(&raw).read_event(), Invalid);
    }

    #[test]
    fn system_status() {
        let raw = single_track(&[0x00, 0xF2, 0x00, 0x00]);
        assert_kind!(open_track(&raw).read_event(), Invalid);
        let raw = single_track(&[0x00, 0xF8]);
        assert_kind!(open_track(&raw).read_event(), Invalid);
    }

    #[test]
    fn data_byte_top_bit() {
        let raw = single_track(&[0x00, 0x90, 0x3C, 0xE4]);
        if cfg!(feature = "strict") {
            assert_kind!(open_track(&raw).read_event(), Malformed);
        } else {
            assert_eq!(
                open_track(&raw).read_event().unwrap().unwrap().kind,
                note_on(0, 0x3C, 0x64)
            );
        }
    }

    #[test]
    fn truncated() {
        //The stream ends before the chunk does
        let mut raw = header(0, 1, 96);
        raw.extend_from_slice(b"MTrk");
        raw.extend_from_slice(&10u32.to_be_bytes());
        raw.extend_from_slice(&[0x00, 0x90, 60]);
        assert_kind!(open_track(&raw).read_event(), TruncatedStream);

        //The chunk ends in the middle of an event
        let mut raw = single_track(&[0x00, 0x90]);
        raw.extend_from_slice(&[60, 100]);
        assert_kind!(open_track(&raw).read_event(), TruncatedStream);

        //Captured payloads that run past the chunk
        let raw = single_track(&[0x00, 0xFF, 0x01, 0x10, b'a']);
        assert_kind!(open_track(&raw).read_event(), TruncatedStream);

        //Chunk signatures and lengths
        let mut raw = header(0, 1, 96);
        raw.extend_from_slice(b"MTr");
        let mut decoder = Decoder::begin(&raw[..]).unwrap();
        assert_kind!(decoder.open_chunk(), TruncatedStream);

        let mut raw = header(0, 1, 96);
        raw.extend_from_slice(b"MTrk\x00\x00");
        let mut decoder = Decoder::begin(&raw[..]).unwrap();
        assert_kind!(decoder.open_chunk(), TruncatedStream);
    }

    #[test]
    fn short_fixed_meta() {
        //Time signature declares 4 bytes but the chunk ends after 2 of them
        let raw = single_track(&[0x00, 0xFF, 0x58, 0x04, 0x04, 0x02]);
        let mut decoder = open_track(&raw);
        assert_kind!(decoder.read_event(), TruncatedStream);
        assert_eq!(decoder.chunk_bytes_left(), 0);

        //Same for an smpte offset
        let raw = single_track(&[0x00, 0xFF, 0x54, 0x05, 0x01, 0x02]);
        let mut decoder = open_track(&raw);
        assert_kind!(decoder.read_event(), TruncatedStream);
        assert_eq!(decoder.chunk_bytes_left(), 0);
    }

    #[test]
    fn chunk_length_top_bit() {
        let mut raw = header(0, 1, 96);
        raw.extend_from_slice(b"MTrk\x80\x00\x00\x00");
        let mut decoder = Decoder::begin(&raw[..]).unwrap();
        assert_kind!(decoder.open_chunk(), MalformedLength);
    }

    #[test]
    fn header_chunk() {
        let mut raw = chunk(b"MThd", &[0, 0, 0, 1, 0, 96, 0]);
        raw.extend(chunk(b"MTrk", &[]));
        assert_kind!(Decoder::begin(&raw[..]), MalformedLength);

        let raw = header(0, 1, 0xE250);
        assert_kind!(Decoder::begin(&raw[..]), UnsupportedDivisionFormat);

        let raw = header(3, 1, 96);
        assert_kind!(Decoder::begin(&raw[..]), Invalid);

        let raw = chunk(b"MTrk", &[0x00, 0xFF, 0x2F, 0x00]);
        assert_kind!(Decoder::begin(&raw[..]), UnexpectedChunk);

        assert_kind!(Decoder::begin(&[0_u8; 0][..]), UnexpectedChunk);

        let raw = header(1, 1, 0);
        if cfg!(feature = "strict") {
            assert_kind!(Decoder::begin(&raw[..]), Malformed);
        } else {
            assert_eq!(Decoder::begin(&raw[..]).unwrap().header().ticks_per_beat.as_int(), 0);
        }
    }

    #[test]
    fn events_outside_tracks() {
        let raw = single_track(&[0x00, 0xFF, 0x2F, 0x00]);
        let mut decoder = Decoder::begin(&raw[..]).unwrap();
        assert_kind!(decoder.read_event(), UnexpectedChunk);
    }

    #[test]
    fn error_context() {
        let raw = single_track(&[0x00, 0xFF, 0x51, 0x02, 0x00, 0x00]);
        let err = open_track(&raw).read_event().unwrap_err();
        assert_eq!(
            err.kind(),
            ErrorKind::MalformedLength("tempo meta event must be 3 bytes long")
        );
        if cfg!(all(debug_assertions, feature = "alloc")) {
            assert_eq!(
                err.context(),
                ["failed to read meta event", "failed to parse event"]
            );
        } else {
            assert!(err.context().is_empty());
        }
        assert_eq!(
            err.to_string(),
            "malformed length: tempo meta event must be 3 bytes long"
        );
    }
}

mod chunks {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn unknown_chunks() {
        let mut raw = header(1, 1, 96);
        raw.extend(chunk(b"XFIH", &[1, 2, 3]));
        raw.extend(chunk(b"MTrk", &[0x00, 0xFF, 0x2F, 0x00]));

        let mut decoder = Decoder::begin(&raw[..]).unwrap();
        assert_eq!(decoder.open_chunk().unwrap(), ChunkKind::Unknown(*b"XFIH"));
        assert_eq!(decoder.chunk_bytes_left(), 3);
        decoder.skip_chunk().unwrap();
        assert_eq!(decoder.chunk_bytes_left(), 0);
        assert_eq!(decoder.open_chunk().unwrap(), ChunkKind::Track);

        let mut decoder = Decoder::begin(&raw[..]).unwrap();
        assert!(decoder.next_track().unwrap());
        assert_eq!(decoder.current_chunk(), ChunkKind::Track);
        assert_eq!(
            decoder.read_event().unwrap().unwrap().event_type(),
            EventType::EndOfTrack
        );
        assert!(!decoder.next_track().unwrap());
        assert_eq!(decoder.current_chunk(), ChunkKind::EndOfStream);
    }

    #[test]
    fn raw_chunk_reads() {
        open! {raw: "two_tracks.mid"};
        let mut decoder = Decoder::begin(&raw[..]).unwrap();
        assert_eq!(decoder.open_chunk().unwrap(), ChunkKind::Track);
        decoder.skip_chunk().unwrap();
        assert_eq!(decoder.open_chunk().unwrap(), ChunkKind::Unknown(*b"XFIH"));
        assert_eq!(decoder.read_byte().unwrap(), 1);
        assert_eq!(decoder.read_fixed(2).unwrap(), 0x0203);
        assert_eq!(decoder.chunk_bytes_left(), 0);
        assert_kind!(decoder.read_byte(), TruncatedStream);
        assert_eq!(decoder.read_varlen().unwrap(), None);

        let mut decoder = Decoder::begin(&raw[..]).unwrap();
        decoder.open_chunk().unwrap();
        decoder.skip_chunk().unwrap();
        decoder.open_chunk().unwrap();
        assert_eq!(decoder.read_bytes(3).unwrap().as_bytes(), [1_u8, 2, 3]);
        assert_eq!(decoder.open_chunk().unwrap(), ChunkKind::Track);
        assert_eq!(decoder.read_event().unwrap().unwrap().delta, 0);
    }

    #[test]
    fn raw_reads_keep_accounting() {
        let mut body = varlen(0x2000);
        body.extend_from_slice(b"abcdefgh");
        let mut raw = header(1, 0, 96);
        raw.extend(chunk(b"XFIH", &body));
        raw.extend(chunk(b"MTrk", &[0x00, 0xFF, 0x2F, 0x00]));

        let mut decoder = Decoder::<_, 4>::begin_with_capacity(&raw[..]).unwrap();
        assert_eq!(decoder.open_chunk().unwrap(), ChunkKind::Unknown(*b"XFIH"));
        assert_eq!(decoder.read_varlen().unwrap(), Some(0x2000));
        assert_kind!(decoder.read_fixed(5), Invalid);
        let data = decoder.read_bytes(8).unwrap();
        assert_eq!(data.as_bytes(), b"abc");
        assert_eq!(data.declared_len(), 8);
        assert_eq!(decoder.chunk_bytes_left(), 0);
        assert!(decoder.next_track().unwrap());
        assert_eq!(
            decoder.read_event().unwrap().unwrap().event_type(),
            EventType::EndOfTrack
        );
    }

    #[test]
    fn last_event() {
        let raw = single_track(&[
            0x00, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20, //
            0x10, 0x92, 60, 100, //
            0x00, 0xFF, 0x06, 0x02, b'A', b'B',
        ]);
        let mut decoder = open_track(&raw);
        assert_eq!(decoder.last_event(), None);

        decoder.read_event().unwrap();
        assert_eq!(
            decoder.last_event(),
            Some(Event {
                delta: 0,
                kind: EventKind::Meta(MetaMessage::Tempo(u24::new(500_000))),
            })
        );
        assert_eq!(decoder.payload(), None);

        decoder.read_event().unwrap();
        assert_eq!(
            decoder.last_event(),
            Some(Event {
                delta: 0x10,
                kind: note_on(2, 60, 100),
            })
        );

        decoder.read_event().unwrap();
        let event = decoder.last_event().unwrap();
        match event.kind {
            EventKind::Meta(MetaMessage::Marker(text)) => {
                assert_eq!(text.as_bytes(), b"AB");
                assert_eq!(text.declared_len(), 2);
            }
            other => panic!("expected a marker event, got {:?}", other),
        }
        assert_eq!(Some(event.kind.captured().unwrap()), decoder.payload());

        assert_eq!(decoder.read_event().unwrap(), None);
        assert_eq!(decoder.last_event(), None);
    }

    #[test]
    fn skip_partial_track() {
        let mut raw = header(1, 2, 96);
        raw.extend(chunk(b"MTrk", &[0x00, 0x90, 60, 100, 0x00, 0xFF, 0x2F, 0x00]));
        raw.extend(chunk(b"MTrk", &[0x00, 0xFF, 0x2F, 0x00]));
        let mut decoder = open_track(&raw);
        decoder.read_event().unwrap();
        decoder.skip_chunk().unwrap();
        assert!(decoder.next_track().unwrap());
        assert_eq!(decoder.chunk_bytes_left(), 4);
    }

    #[test]
    fn repeated_header() {
        let mut raw = header(0, 1, 96);
        raw.extend(header(0, 1, 96));
        raw.extend(chunk(b"MTrk", &[]));
        let mut decoder = Decoder::begin(&raw[..]).unwrap();
        if cfg!(feature = "strict") {
            assert_kind!(decoder.next_track(), Malformed);
        } else {
            assert!(decoder.next_track().unwrap());
            assert_eq!(decoder.read_event().unwrap(), None);
        }
    }
}

mod io_source {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Hands out bytes one by one, interrupting the first read and failing for good after
    /// `fail_after` bytes.
    struct Flaky<'a> {
        data: &'a [u8],
        interrupted: bool,
        fail_after: usize,
    }
    impl Read for Flaky<'_> {
        fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(io::ErrorKind::Interrupted.into());
            }
            if self.fail_after == 0 {
                return Err(io::Error::new(io::ErrorKind::Other, "device removed"));
            }
            match (self.data.split_first(), out.first_mut()) {
                (Some((&byte, rest)), Some(slot)) => {
                    *slot = byte;
                    self.data = rest;
                    self.fail_after -= 1;
                    Ok(1)
                }
                _ => Ok(0),
            }
        }
    }

    #[test]
    fn device_failure() {
        let raw = single_track(&[0x00, 0x90, 60, 100]);
        let source = IoSource::new(Flaky {
            data: &raw,
            interrupted: false,
            fail_after: 24,
        });
        let mut decoder = Decoder::begin(source).unwrap();
        assert_eq!(decoder.open_chunk().unwrap(), ChunkKind::Track);
        assert_kind!(decoder.read_event(), TruncatedStream);
        let err = decoder.into_inner().take_error().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::Other);
    }

    #[test]
    fn clean_end() {
        let raw = single_track(&[0x00, 0xFF, 0x2F, 0x00]);
        let mut decoder = Decoder::begin(IoSource::new(&raw[..])).unwrap();
        assert!(decoder.next_track().unwrap());
        decoder.read_event().unwrap().unwrap();
        assert_eq!(decoder.read_event().unwrap(), None);
        assert!(!decoder.next_track().unwrap());
        let mut source = decoder.into_inner();
        assert!(source.take_error().is_none());
        assert!(source.get_ref().is_empty());
    }
}

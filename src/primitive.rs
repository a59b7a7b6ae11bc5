//! Simple building-block data that can be read in one go.
//! All primitives have a known, fixed size.

use crate::{chunk::ChunkReader, prelude::*};

/// Slightly restricted integers.
macro_rules! restricted_int {
    {$(#[$attr:meta])* $name:ident : $inner:tt => $bits:expr} => {
        $(#[$attr])*
        #[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Hash, Default)]
        #[repr(transparent)]
        #[allow(non_camel_case_types)]
        pub struct $name($inner);
        impl From<$inner> for $name {
            /// Lossy conversion, loses top bit.
            #[inline]
            fn from(raw: $inner) -> $name {
                $name::from_int_lossy(raw)
            }
        }
        impl From<$name> for $inner {
            #[inline]
            fn from(restricted: $name) -> $inner {restricted.0}
        }
        impl fmt::Display for $name {
            #[inline]
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
        impl $name {
            const MASK: $inner = (1 << $bits) - 1;

            /// The maximum value that this restricted integer can hold.
            #[inline]
            pub const fn max_value() -> $name {
                $name (Self::MASK)
            }

            /// Creates a restricted int from its non-restricted counterpart by masking off the
            /// extra bits.
            #[inline]
            pub const fn new(raw: $inner) -> $name {
                $name (raw & Self::MASK)
            }

            /// Creates a restricted int from its non-restricted counterpart by masking off the
            /// extra bits.
            #[inline]
            pub const fn from_int_lossy(raw: $inner) -> $name {
                $name (raw & Self::MASK)
            }

            /// Returns `Some` if the raw integer is within range of the restricted integer, and
            /// `None` otherwise.
            #[inline]
            pub fn try_from(raw: $inner) -> Option<$name> {
                if raw <= Self::MASK {
                    Some($name(raw))
                }else{
                    None
                }
            }

            /// Get the inner integer out of the wrapper.
            /// The inner integer is guaranteed to be in range of the restricted wrapper.
            #[inline]
            pub fn as_int(self) -> $inner {
                Into::into(self)
            }

            /// Convert a raw value read from the stream.
            ///
            /// Out-of-range values are an error in strict mode and lose their extra bits
            /// otherwise.
            #[allow(dead_code)]
            #[inline]
            pub(crate) fn from_data(raw: $inner) -> StdResult<$name, &'static ErrorKind> {
                if cfg!(feature = "strict") {
                    Self::try_from(raw).ok_or(err!(
                        Malformed,
                        concat!("expected ", stringify!($name), ", found ", stringify!($inner))
                    ))
                } else {
                    Ok(Self::from_int_lossy(raw))
                }
            }
        }
        impl PartialEq<$inner> for $name {
            fn eq(&self, rhs: &$inner) -> bool {
                self.as_int() == *rhs
            }
        }
        impl PartialOrd<$inner> for $name {
            fn partial_cmp(&self, rhs: &$inner) -> Option<core::cmp::Ordering> {
                Some(self.as_int().cmp(rhs))
            }
        }
        impl PartialEq<$name> for $inner {
            fn eq(&self, rhs: &$name) -> bool {
                *self == rhs.as_int()
            }
        }
        impl PartialOrd<$name> for $inner {
            fn partial_cmp(&self, rhs: &$name) -> Option<core::cmp::Ordering> {
                Some(self.cmp(&rhs.as_int()))
            }
        }
    };
}
restricted_int! {
    /// A 15-bit integer type.
    ///
    /// Wraps the `u16` type and ensures that the top bit is always zero.
    u15: u16 => 15
}
restricted_int! {
    /// A 14-bit integer type.
    ///
    /// Wraps the `u16` type and ensures that the top two bits are always zero.
    u14: u16 => 14
}
restricted_int! {
    /// A 7-bit integer type.
    ///
    /// Wraps the `u8` type and ensures that the top bit is always zero.
    u7: u8 => 7
}
restricted_int! {
    /// A 4-bit integer type.
    ///
    /// Wraps the `u8` type and ensures that the top 4 bits are always zero.
    u4: u8 => 4
}
restricted_int! {
    /// A 24-bit integer type.
    ///
    /// Wraps the `u32` type and ensures that the top 8 bits are always zero.
    u24: u32 => 24
}
restricted_int! {
    /// Referred to in the MIDI spec as "variable length int".
    ///
    /// The largest value that fits in the 4-byte encoding the format allows.
    u28: u32 => 28
}

impl u28 {
    /// Encode this integer as a minimal variable-length quantity into `buf`, returning the used
    /// part of the buffer.
    ///
    /// Each byte carries 7 bits, most significant group first, with the top bit set on every
    /// byte except the last.
    pub fn encode_varlen(self, buf: &mut [u8; 4]) -> &[u8] {
        let int = self.as_int();
        let mut len = 1;
        while len < 4 && int >> (7 * len) != 0 {
            len += 1;
        }
        for (i, slot) in buf[..len].iter_mut().enumerate() {
            let group = ((int >> (7 * (len - 1 - i))) & 0x7F) as u8;
            *slot = if i + 1 < len { group | 0x80 } else { group };
        }
        &buf[..len]
    }
}

/// The order in which tracks should be laid out when playing back this SMF file.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum Format {
    /// This file should have a single track only.
    SingleTrack,
    /// This file has several tracks that should be played simultaneously.
    ///
    /// Usually the first track controls tempo and other song metadata.
    Parallel,
    /// This file has several tracks, each one a separate song.
    ///
    /// The tracks should be played sequentially, as completely separate MIDI tracks packaged
    /// within a single SMF file.
    Sequential,
}
impl Format {
    /// Map the raw header format field to a `Format`, if it is one of the three defined values.
    pub fn from_code(code: u16) -> Option<Format> {
        Some(match code {
            0 => Format::SingleTrack,
            1 => Format::Parallel,
            2 => Format::Sequential,
            _ => return None,
        })
    }

    /// The raw header format field.
    pub fn as_code(self) -> u16 {
        match self {
            Format::SingleTrack => 0,
            Format::Parallel => 1,
            Format::Sequential => 2,
        }
    }
}

/// A raw SMPTE offset, as stored in the SMPTE offset meta event.
///
/// Fields are kept exactly as they appear in the file.
/// The `hours` byte also packs the frame rate in its bits 5 and 6; use
/// [`hour`](#method.hour) and [`fps`](#method.fps) to split it.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub struct SmpteOffset {
    pub hours: u8,
    pub minutes: u8,
    pub seconds: u8,
    pub frames: u8,
    /// Hundredths of a frame.
    pub subframes: u8,
}
impl SmpteOffset {
    /// The hour component, without the packed frame rate.
    #[inline]
    pub fn hour(&self) -> u8 {
        bit_range(self.hours, 0..5)
    }

    /// The frame rate packed in the hour byte.
    #[inline]
    pub fn fps(&self) -> Fps {
        Fps::from_code(bit_range(self.hours, 5..7))
    }

    /// Convert the second + frame + subframe components of this offset into a single
    /// floating-point number of seconds.
    /// Note that this does not include the hour and minute components.
    #[inline]
    pub fn second_f32(&self) -> f32 {
        self.seconds as f32
            + ((self.frames as f32 + self.subframes as f32 / 100.0) / self.fps().as_f32())
    }

    /// Reads the 5 payload bytes, stopping at the first failed read.
    pub(crate) fn read<S: ByteSource>(
        chunk: &mut ChunkReader<S>,
    ) -> StdResult<SmpteOffset, &'static ErrorKind> {
        Ok(SmpteOffset {
            hours: chunk.read_u8()?,
            minutes: chunk.read_u8()?,
            seconds: chunk.read_u8()?,
            frames: chunk.read_u8()?,
            subframes: chunk.read_u8()?,
        })
    }
}

/// One of the four FPS values available for SMPTE times, as defined by the MIDI standard.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum Fps {
    /// 24 frames per second.
    Fps24,
    /// 25 frames per second.
    Fps25,
    /// Actually `29.97 = 30 / 1.001` frames per second.
    ///
    /// Quite an exotic value because of interesting historical reasons.
    Fps29,
    /// 30 frames per second.
    Fps30,
}
impl Fps {
    /// Does the conversion from a 2-bit fps code to an `Fps` value.
    pub(crate) fn from_code(code: u8) -> Fps {
        match code & 0b11 {
            0 => Fps::Fps24,
            1 => Fps::Fps25,
            2 => Fps::Fps29,
            _ => Fps::Fps30,
        }
    }

    /// Get the integral approximate fps out.
    #[inline]
    pub fn as_int(self) -> u8 {
        match self {
            Fps::Fps24 => 24,
            Fps::Fps25 => 25,
            Fps::Fps29 => 29,
            Fps::Fps30 => 30,
        }
    }

    /// Get the actual `f32` fps out.
    #[inline]
    pub fn as_f32(self) -> f32 {
        match self {
            Fps::Fps24 => 24.0,
            Fps::Fps25 => 25.0,
            Fps::Fps29 => 30.0 / 1.001,
            Fps::Fps30 => 30.0,
        }
    }
}

/// A time signature, as stored in the time signature meta event.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub struct TimeSignature {
    /// Beats per measure.
    pub numerator: u8,
    /// The note value that gets the beat, already expanded from the power-of-two exponent
    /// stored in the file (ie. `4` for quarter notes).
    pub denominator: u32,
    /// MIDI clocks per metronome click.
    pub clocks_per_click: u8,
    /// Notated 32nd notes per 24 MIDI clocks (a quarter note).
    pub thirty_seconds_per_quarter: u8,
}
impl TimeSignature {
    /// Reads the 4 payload bytes, stopping at the first failed read.
    pub(crate) fn read<S: ByteSource>(
        chunk: &mut ChunkReader<S>,
    ) -> StdResult<TimeSignature, &'static ErrorKind> {
        let numerator = chunk.read_u8()?;
        let denominator = 1u32
            .checked_shl(u32::from(chunk.read_u8()?))
            .ok_or(err!(Invalid, "time signature denominator exponent out of range"))?;
        Ok(TimeSignature {
            numerator,
            denominator,
            clocks_per_click: chunk.read_u8()?,
            thirty_seconds_per_quarter: chunk.read_u8()?,
        })
    }
}

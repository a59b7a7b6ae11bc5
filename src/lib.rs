//! # Overview
//!
//! `smfstream` is a Standard Midi File (SMF) decoder that reads its input one byte at a time,
//! never holding more than a single event in memory.
//! It is meant for situations where the whole file cannot (or should not) be loaded, such as
//! playing `.mid` files straight off an SD card on a microcontroller.
//!
//! Usage looks like this:
//!
//! ```rust
//! use smfstream::{ChunkKind, Decoder};
//!
//! # let bytes: &[u8] = &[
//! #     b'M', b'T', b'h', b'd', 0, 0, 0, 6, 0, 0, 0, 1, 0, 96,
//! #     b'M', b'T', b'r', b'k', 0, 0, 0, 4, 0x00, 0xFF, 0x2F, 0x00,
//! # ];
//! let mut decoder = Decoder::begin(bytes)?;
//! println!("ticks per beat: {}", decoder.header().ticks_per_beat);
//!
//! loop {
//!     match decoder.open_chunk()? {
//!         ChunkKind::Track => {
//!             while let Some(event) = decoder.read_event()? {
//!                 println!("{:?}", event);
//!             }
//!         }
//!         ChunkKind::EndOfStream => break,
//!         _ => decoder.skip_chunk()?,
//!     }
//! }
//! # Ok::<(), smfstream::Error>(())
//! ```
//!
//! The [`Decoder`](struct.Decoder.html) struct is the main type in the crate.
//!
//! # About byte sources
//!
//! The decoder pulls bytes from a [`ByteSource`](trait.ByteSource.html), a forward-only source
//! with no seeking.
//! Byte slices, byte iterators and (with the `std` feature) any `std::io::Read` implement it or
//! can be wrapped to implement it.
//!
//! The decoder keeps exact track of how many bytes are left in the current chunk, so no one
//! else may read from the source while the decoder is in use.
//! This is enforced by the decoder taking ownership of the source (or of a `&mut` to it).
//!
//! # About payloads
//!
//! SysEx and text-like meta events carry arbitrary-length payloads.
//! These are captured into a fixed-size buffer owned by the decoder, holding up to `CAP - 1`
//! bytes followed by a NUL terminator.
//! Longer payloads are truncated, but the rest of their bytes are still consumed from the stream
//! so that decoding stays aligned.
//! The capacity defaults to [`DEFAULT_CAPACITY`](constant.DEFAULT_CAPACITY.html) and can be
//! changed through the `CAP` const parameter of `Decoder`.
//!
//! Decoded events borrow the capture buffer, so an event must be used (or copied) before the
//! next call to `read_event`.
//!
//! # About features
//!
//! - The `std` feature
//!
//!   Enables `IoSource` for reading from any `std::io::Read`, and implements
//!   `std::error::Error` for the error type.
//!   This feature is enabled by default. Disabling it with `default-features = false` makes the
//!   crate `no_std`. Decoding never allocates.
//!
//! - The `alloc` feature
//!
//!   In debug builds, errors carry a list of context messages describing what the decoder was
//!   doing when the error was raised.
//!
//! - The `strict` feature
//!
//!   By default `smfstream` accepts data that is uncompliant but still decodable, such as data
//!   bytes with their top bit set or 5-byte variable-length integers.
//!   By enabling the `strict` feature these raise `ErrorKind::Malformed` errors instead.
//!
//! # Logging
//!
//! Decoding failures are reported through `tracing` at the `debug` level, and every decoded
//! event and opened chunk at the `trace` level.
//! No subscriber is installed by this crate.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

macro_rules! bail {
    ($err:expr) => {{
        return Err($err.into());
    }};
}
macro_rules! ensure {
    ($cond:expr, $err:expr) => {{
        if !$cond {
            bail!($err)
        }
    }};
}

/// All of the errors this crate produces.
#[macro_use]
mod error;

mod prelude {
    pub(crate) use crate::{
        error::{ErrorKind, Result, ResultExt, StdResult},
        primitive::{u14, u15, u24, u4, u7},
        source::ByteSource,
    };
    pub(crate) use core::{fmt, ops};

    pub(crate) fn bit_range<T>(val: T, range: ops::Range<u32>) -> T
    where
        T: From<u8>
            + ops::Shr<u32, Output = T>
            + ops::Shl<u32, Output = T>
            + ops::Not<Output = T>
            + ops::BitAnd<Output = T>,
    {
        let mask = !((!T::from(0)) << (range.end - range.start));
        (val >> range.start) & mask
    }
}

mod chunk;
mod event;
mod primitive;
mod smf;
mod source;

pub use crate::{
    chunk::ChunkKind,
    error::{Error, ErrorKind, Result},
    event::{Captured, Event, EventKind, EventType, MetaMessage, MidiMessage, PitchBend},
    primitive::{Format, Fps, SmpteOffset, TimeSignature},
    smf::{Decoder, Header, DEFAULT_CAPACITY},
    source::{ByteSource, IterSource},
};
#[cfg(feature = "std")]
pub use crate::source::IoSource;

/// Exotically-sized integers used by the MIDI standard.
pub mod num {
    pub use crate::primitive::{u14, u15, u24, u28, u4, u7};
}

#[cfg(test)]
mod test;

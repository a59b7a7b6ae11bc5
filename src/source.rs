//! Forward-only byte sources the decoder pulls from.

#[cfg(feature = "std")]
use std::io;

/// A sequential source of bytes.
///
/// The decoder reads exactly one byte per call and never seeks or rewinds.
/// Returning `None` signals that there is no more data; the decoder will not call `next_byte`
/// again expecting a different answer within the same structure.
pub trait ByteSource {
    /// Produce the next byte, or `None` at end of data.
    fn next_byte(&mut self) -> Option<u8>;
}

impl<'a> ByteSource for &'a [u8] {
    #[inline]
    fn next_byte(&mut self) -> Option<u8> {
        let (&byte, rest) = self.split_first()?;
        *self = rest;
        Some(byte)
    }
}

impl<S: ByteSource + ?Sized> ByteSource for &mut S {
    #[inline]
    fn next_byte(&mut self) -> Option<u8> {
        (**self).next_byte()
    }
}

/// Adapts any iterator of bytes into a `ByteSource`.
#[derive(Clone, Debug)]
pub struct IterSource<I>(pub I);
impl<I: Iterator<Item = u8>> ByteSource for IterSource<I> {
    #[inline]
    fn next_byte(&mut self) -> Option<u8> {
        self.0.next()
    }
}

/// Reads bytes one at a time out of a `std::io::Read`.
///
/// Reads are unbuffered, so wrapping a `File` in a `BufReader` first is highly recommended.
///
/// I/O errors end the data.
/// The error that ended it (if it was not a plain end-of-file) is kept and can be inspected
/// through [`take_error`](#method.take_error), to tell a truncated file from a failing device.
///
/// This type is only available with the `std` feature enabled.
#[cfg(feature = "std")]
#[derive(Debug)]
pub struct IoSource<R> {
    reader: R,
    error: Option<io::Error>,
}
#[cfg(feature = "std")]
impl<R: io::Read> IoSource<R> {
    pub fn new(reader: R) -> IoSource<R> {
        IoSource {
            reader,
            error: None,
        }
    }

    /// The I/O error that cut the data short, if any.
    pub fn take_error(&mut self) -> Option<io::Error> {
        self.error.take()
    }

    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}
#[cfg(feature = "std")]
impl<R: io::Read> ByteSource for IoSource<R> {
    fn next_byte(&mut self) -> Option<u8> {
        if self.error.is_some() {
            return None;
        }
        let mut byte = [0];
        loop {
            match self.reader.read(&mut byte) {
                Ok(0) => return None,
                Ok(_) => return Some(byte[0]),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return None,
                Err(err) => {
                    tracing::debug!(error = %err, "byte source failed");
                    self.error = Some(err);
                    return None;
                }
            }
        }
    }
}

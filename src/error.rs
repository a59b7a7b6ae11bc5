use core::fmt;

#[cfg(all(debug_assertions, feature = "alloc"))]
mod error_impl {
    use super::{Error, ErrorExt, ErrorKind};
    use alloc::{boxed::Box, vec::Vec};

    pub type ErrorInner = Box<Chained>;

    #[derive(Clone, Debug)]
    pub struct Chained {
        kind: &'static ErrorKind,
        context: Vec<&'static str>,
    }
    impl ErrorExt for Error {
        #[inline]
        fn kind(&self) -> ErrorKind {
            *self.inner.kind
        }
        #[inline]
        fn context(&self) -> &[&'static str] {
            &self.inner.context
        }
        #[inline]
        fn chain_ctx(mut self, ctx: &'static str) -> Error {
            self.inner.context.push(ctx);
            self
        }
    }
    impl From<&'static ErrorKind> for Error {
        #[inline]
        fn from(kind: &'static ErrorKind) -> Error {
            Error {
                inner: Box::new(Chained {
                    kind,
                    context: Vec::new(),
                }),
            }
        }
    }
}

#[cfg(not(all(debug_assertions, feature = "alloc")))]
mod error_impl {
    use super::{Error, ErrorExt, ErrorKind};

    /// In release mode errors are just a thin pointer.
    pub type ErrorInner = &'static ErrorKind;
    impl ErrorExt for Error {
        #[inline]
        fn kind(&self) -> ErrorKind {
            *self.inner
        }
        #[inline]
        fn context(&self) -> &[&'static str] {
            &[]
        }
        #[inline]
        fn chain_ctx(self, _ctx: &'static str) -> Error {
            self
        }
    }
    impl From<&'static ErrorKind> for Error {
        #[inline]
        fn from(inner: &'static ErrorKind) -> Error {
            Error { inner }
        }
    }
}

/// Represents an error while decoding a Standard Midi File stream.
///
/// This type wraps an `ErrorKind`, which names the structural check that failed.
/// In debug mode (with the `alloc` feature) it additionally records what the decoder was doing
/// when the check failed, outermost last.
/// In release mode it is a thin pointer to a static `ErrorKind`, and `Error::context` is always
/// empty.
///
/// If the `std` feature is enabled, this type implements `std::error::Error`.
///
/// For more information about the error policy used by `smfstream`, see
/// [`ErrorKind`](enum.ErrorKind.html).
#[derive(Clone)]
pub struct Error {
    inner: self::error_impl::ErrorInner,
}
impl Error {
    /// Create a new error with the given `ErrorKind`.
    #[inline]
    pub fn new(kind: &'static ErrorKind) -> Error {
        Error::from(kind)
    }

    /// The structural check that failed.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        ErrorExt::kind(self)
    }

    /// What the decoder was doing when the error was raised, innermost first.
    ///
    /// Always empty in release mode or without the `alloc` feature.
    #[inline]
    pub fn context(&self) -> &[&'static str] {
        ErrorExt::context(self)
    }
}
impl fmt::Display for Error {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.kind(), f)
    }
}
impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.kind())?;
        for ctx in self.context() {
            writeln!(f)?;
            write!(f, "  while: {}", ctx)?;
        }
        Ok(())
    }
}
#[cfg(feature = "std")]
impl std::error::Error for Error {}

trait ErrorExt {
    fn kind(&self) -> ErrorKind;
    fn context(&self) -> &[&'static str];
    fn chain_ctx(self, ctx: &'static str) -> Error;
}

/// The type of error that occurred while decoding.
///
/// Errors are categorized by the structural rule of the SMF format that was broken.
/// Each variant carries a non-normative string literal with the exact check that failed.
///
/// None of these errors are recoverable: the decoder never resynchronizes, and once an error is
/// returned the position within the byte stream can no longer be trusted.
/// A clean end of a track chunk or of the whole stream is not an error.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    /// A length field disagrees with what the format requires, such as a header chunk that is
    /// not 6 bytes long or a tempo meta event that is not 3 bytes long.
    #[error("malformed length: {0}")]
    MalformedLength(&'static str),
    /// The byte stream or the current chunk ended in the middle of a structure.
    #[error("truncated stream: {0}")]
    TruncatedStream(&'static str),
    /// A variable-length integer did not terminate within 5 bytes, or does not fit in 32 bits.
    #[error("corrupt variable length integer: {0}")]
    CorruptVariableLength(&'static str),
    /// An event omitted its status byte before any channel event set a running status.
    #[error("running status unavailable: {0}")]
    RunningStatusUnavailable(&'static str),
    /// The header uses SMPTE timecode division, only ticks-per-beat is supported.
    #[error("unsupported division format: {0}")]
    UnsupportedDivisionFormat(&'static str),
    /// A chunk of the wrong kind was found, for example a track where the header was expected.
    #[error("unexpected chunk: {0}")]
    UnexpectedChunk(&'static str),
    /// A field holds a value that the format does not define.
    #[error("invalid midi: {0}")]
    Invalid(&'static str),
    /// The file could be decoded, but it is clearly not compliant.
    ///
    /// This kind of error is not emitted by default, only if the `strict` crate feature is
    /// enabled.
    #[error("malformed midi: {0}")]
    Malformed(&'static str),
}
impl ErrorKind {
    /// Get the informative message on what exact part of the MIDI format was not respected.
    #[inline]
    pub fn message(&self) -> &'static str {
        match *self {
            ErrorKind::MalformedLength(msg)
            | ErrorKind::TruncatedStream(msg)
            | ErrorKind::CorruptVariableLength(msg)
            | ErrorKind::RunningStatusUnavailable(msg)
            | ErrorKind::UnsupportedDivisionFormat(msg)
            | ErrorKind::UnexpectedChunk(msg)
            | ErrorKind::Invalid(msg)
            | ErrorKind::Malformed(msg) => msg,
        }
    }
}

macro_rules! err {
    ($kind:ident, $msg:expr) => {{
        const ERR_KIND: &'static ErrorKind = &ErrorKind::$kind($msg);
        ERR_KIND
    }};
}

pub(crate) trait ResultExt<T> {
    fn context(self, ctx: &'static str) -> StdResult<T, Error>;
}
impl<T> ResultExt<T> for StdResult<T, Error> {
    #[inline]
    fn context(self, ctx: &'static str) -> StdResult<T, Error> {
        self.map_err(|err| err.chain_ctx(ctx))
    }
}
impl<T> ResultExt<T> for StdResult<T, &'static ErrorKind> {
    #[inline]
    fn context(self, ctx: &'static str) -> StdResult<T, Error> {
        self.map_err(|errkind| Error::from(errkind).chain_ctx(ctx))
    }
}

/// The result type used by the decoder.
pub type Result<T> = StdResult<T, Error>;
pub(crate) use core::result::Result as StdResult;

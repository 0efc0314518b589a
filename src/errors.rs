use std::{error::Error, fmt, io};

/// Possible errors that arise from compressing or decompressing an `ash0` binary
#[derive(Debug)]
#[non_exhaustive]
pub enum AshError {
    /// The first four bytes of the input were not `"ASH0"`
    BadMagic(String),
    /// A bit read ran past the end of one of the two streams
    TruncatedStream,
    /// An LZ copy pointed outside the bytes produced so far, or past the
    /// declared uncompressed size
    InvalidReference {
        length: usize,
        distance: usize,
        produced: usize,
        remaining: usize,
    },
    /// A serialized Huffman tree described more nodes than its alphabet allows
    BadTreeEncoding,
    /// The raw payload does not fit the 24-bit size field
    InputTooLarge(usize),
    /// A symbol or distance alphabet width outside the supported range
    BadBitWidth(&'static str, u32),
    Io(io::Error),
}

impl fmt::Display for AshError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AshError::BadMagic(s) => write!(f, "Invalid magic '{}' in header", s),
            AshError::TruncatedStream => write!(f, "Compressed stream ended early"),
            AshError::InvalidReference {
                length,
                distance,
                produced,
                remaining,
            } => write!(
                f,
                "Bad input file: copy of {} bytes from {} back with {} produced and {} left",
                length, distance, produced, remaining
            ),
            AshError::BadTreeEncoding => write!(f, "Huffman tree couldn't be read"),
            AshError::InputTooLarge(n) => write!(
                f,
                "Input size ({} bytes) exceeds the 24-bit maximum",
                n
            ),
            AshError::BadBitWidth(which, n) => {
                write!(f, "Unsupported {} tree width of {} bits", which, n)
            }
            AshError::Io(_) => write!(f, "IO issue"),
        }
    }
}

impl Error for AshError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AshError::Io(e) => Some(e as &dyn Error),
            _ => None,
        }
    }
}

impl From<io::Error> for AshError {
    fn from(e: io::Error) -> Self {
        // the bit readers report running off the end of their buffer as EOF
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Self::TruncatedStream
        } else {
            Self::Io(e)
        }
    }
}

//! Compression and decompression of Nintendo's `ASH0` files from the Wii,
//! as found in the System Menu, Animal Crossing: City Folk, and
//! My Pokémon Ranch.
//!
//! The format Huffman-codes an LZ77 token sequence into two independent bit
//! streams: one for literal bytes and copy lengths, one for copy distances.
//! Each stream embeds its own Huffman tree; `src/format.rs` documents the
//! exact layout.
//!
//! Compress with [`compress`] or an [`EncoderBuilder`], and decompress with
//! [`decompress`] or a [`DecoderBuilder`]:
//!
//! ```
//! let raw = b"sam I am I am sam I am sam sam I am";
//!
//! let packed = ash0::compress(&raw[..]).unwrap();
//! let unpacked = ash0::decompress(&packed[..]).unwrap();
//!
//! assert_eq!(&unpacked, raw);
//! ```
//!
//! The alphabet widths are a contract between encoder and decoder: they are
//! not stored in the file, and a file can only be decoded with the widths
//! it was encoded with. Most known files use the defaults (9-bit symbols,
//! 11-bit distances); My Pokémon Ranch uses 15-bit distances. Use the
//! builders to override them, and [`ash_info`] to peek at a file's header.

mod decode;
mod encode;
mod errors;
mod format;

pub use decode::{ash_info, decompress, DecoderBuilder};
pub use encode::{compress, EncoderBuilder};
pub use errors::AshError;
pub use format::AshHeader;

//! Information and structures for `ASH0` files.
//!
//! An `ASH0` file is a twelve byte header followed by two self-contained bit
//! streams: the *symbol stream*, holding literal bytes and LZ copy lengths,
//! and the *distance stream*, holding LZ back-distances. Each stream starts
//! with its own serialized Huffman tree and is read independently of the
//! other.
//!
//! ## Header
//!
//! | Byte Num | Description |
//! | :------: | ----------- |
//! | 0..4     | magic bytes ("ASH0") |
//! | 4..8     | size in big endian bytes of decompressed data (low 24 bits) |
//! | 8..12    | absolute big endian offset of the distance stream |
//!
//! The symbol stream always begins at offset `0xC`. Both streams are stored
//! as big endian 32-bit words with bits consumed most-significant first,
//! zero-padded out to a word boundary, which is why the distance stream
//! offset is always a multiple of four.
//!
//! ## Huffman trees
//!
//! A tree over an alphabet of `W`-bit symbols is serialized by a prefix
//! depth-first walk: an inner node is a `1` bit followed by its left then its
//! right subtree, and a leaf is a `0` bit followed by the symbol value in `W`
//! bits. The tree `('a', ('b', 'x'))` over a 9-bit alphabet is therefore
//!
//! ```text
//! 1 0 001100001 1 0 001100010 0 001111000
//! ```
//!
//! and assigns the codes `a = 0`, `b = 10`, `x = 11`. A lone leaf cannot be
//! expressed this way, so encoders pad the alphabet to at least two used
//! symbols.
//!
//! Symbol-stream leaves below `0x100` are literal bytes; a leaf `s >= 0x100`
//! is an LZ copy of `s - 0x100 + 3` bytes. Each copy pulls one value `d`
//! from the distance stream and re-reads the output from `d + 1` bytes back,
//! byte by byte, so a copy longer than its distance repeats the window.

use crate::errors::AshError;
use bitstream_io::{BigEndian, BitRead, BitReader};
use byteorder::{ByteOrder, BE};
use smallvec::SmallVec;
use std::io::Read;

/// The four magic bytes opening every `ASH0` file.
pub(crate) const MAGIC: &[u8; 4] = b"ASH0";

/// Total size of the file header; the symbol stream starts here.
pub(crate) const HEADER_SIZE: usize = 0xC;

/// Largest payload the 24-bit size field can describe.
pub(crate) const MAX_INPUT: usize = 0x00FF_FFFF;

/// Symbol values below this are literal bytes; the rest are copy lengths.
pub(crate) const LITERAL_MAX: u32 = 0x100;

/// Shortest copy worth a reference token.
pub(crate) const MIN_MATCH: u32 = 3;

/// Longest copy a `sym_bits`-wide symbol alphabet can express.
pub(crate) fn max_copy_length(sym_bits: u32) -> usize {
    (1 << sym_bits) - 1 - LITERAL_MAX as usize + MIN_MATCH as usize
}

/// Reject alphabet widths the container cannot carry. The symbol alphabet
/// must cover all 256 literals plus at least one length; the distance
/// alphabet is capped by the 24-bit output size.
pub(crate) fn check_widths(sym_bits: u32, dist_bits: u32) -> Result<(), AshError> {
    if sym_bits < 9 || sym_bits > 16 {
        return Err(AshError::BadBitWidth("symbol", sym_bits));
    }
    if dist_bits < 1 || dist_bits > 24 {
        return Err(AshError::BadBitWidth("distance", dist_bits));
    }
    Ok(())
}

/// The information stored at the start of an `ASH0` file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AshHeader {
    /// size of decompressed data
    pub size: u32,
    /// absolute offset of the distance stream
    pub dist_offset: u32,
}

impl AshHeader {
    /// Parse an ASH header from the front of `input`
    pub fn from_bytes(input: &[u8]) -> Result<Self, AshError> {
        if input.len() < HEADER_SIZE {
            return Err(AshError::TruncatedStream);
        }

        if &input[0..4] != MAGIC {
            let seen = String::from_utf8_lossy(&input[0..4]).into_owned();
            return Err(AshError::BadMagic(seen));
        }

        // upper byte of the size field is reserved
        let size = BE::read_u32(&input[4..8]) & MAX_INPUT as u32;
        let dist_offset = BE::read_u32(&input[8..12]);

        Ok(Self { size, dist_offset })
    }

    /// Write out `self` as the twelve header bytes
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..4].copy_from_slice(MAGIC);
        BE::write_u32(&mut out[4..8], self.size & MAX_INPUT as u32);
        BE::write_u32(&mut out[8..12], self.dist_offset);
        out
    }
}

/// A Huffman tree node or leaf designed to be stored in an array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TreeEntry {
    // left and right are indices into an `AshTree` array
    Node { left: usize, right: usize },
    Leaf(u32),
}

/// Which child of a pending inner node a finished subtree attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

/// An array based huffman tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AshTree {
    entries: Vec<TreeEntry>,
    root: usize,
}

impl AshTree {
    /// Deserialize a tree over `width`-bit symbols from the front of a
    /// stream.
    ///
    /// The walk keeps a stack of child slots still waiting for a subtree: a
    /// `1` bit allocates an inner node and queues its right then left slot,
    /// and a `0` bit reads a leaf and unwinds. Filling a right slot
    /// completes that node, so its index keeps unwinding into the next slot
    /// up; filling a left slot stops, because the same node's right subtree
    /// is serialized next. The tree is complete when a leaf unwinds through
    /// an empty stack.
    pub(crate) fn from_bitreader<R: Read>(
        bits: &mut BitReader<R, BigEndian>,
        width: u32,
    ) -> Result<Self, AshError> {
        let max_entries = 2 * (1usize << width) - 1;
        let mut entries: Vec<TreeEntry> = Vec::new();
        let mut pending: SmallVec<[(usize, Side); 64]> = SmallVec::new();

        let root = loop {
            if entries.len() >= max_entries {
                return Err(AshError::BadTreeEncoding);
            }

            if bits.read_bit()? {
                let node = entries.len();
                entries.push(TreeEntry::Node { left: 0, right: 0 });
                pending.push((node, Side::Right));
                pending.push((node, Side::Left));
            } else {
                let sym: u32 = bits.read(width)?;
                let mut done = entries.len();
                entries.push(TreeEntry::Leaf(sym));

                loop {
                    match pending.pop() {
                        Some((node, Side::Right)) => {
                            if let TreeEntry::Node { right, .. } = &mut entries[node] {
                                *right = done;
                            }
                            done = node;
                        }
                        Some((node, Side::Left)) => {
                            if let TreeEntry::Node { left, .. } = &mut entries[node] {
                                *left = done;
                            }
                            break;
                        }
                        None => break,
                    }
                }

                if pending.is_empty() {
                    break done;
                }
            }
        };

        Ok(Self { entries, root })
    }

    /// Use `BitReader` `bits` to read one symbol out of this tree
    pub(crate) fn read_value<R: Read>(
        &self,
        bits: &mut BitReader<R, BigEndian>,
    ) -> Result<u32, AshError> {
        let mut idx = self.root;
        loop {
            match self.entries[idx] {
                TreeEntry::Leaf(sym) => return Ok(sym),
                TreeEntry::Node { left, right } => {
                    idx = if bits.read_bit()? { right } else { left };
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    fn reader(bytes: &[u8]) -> BitReader<Cursor<&[u8]>, BigEndian> {
        BitReader::endian(Cursor::new(bytes), BigEndian)
    }

    #[test]
    fn header_round_trip() {
        let header = AshHeader {
            size: 0x00AB_CDEF,
            dist_offset: 0x40,
        };
        let parsed = AshHeader::from_bytes(&header.to_bytes()).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn header_rejects_magic() {
        let err = AshHeader::from_bytes(&[0u8; 12]).unwrap_err();
        assert!(matches!(err, AshError::BadMagic(_)));
    }

    #[test]
    fn header_masks_reserved_byte() {
        let mut bytes = AshHeader {
            size: 12,
            dist_offset: 0x10,
        }
        .to_bytes();
        bytes[4] = 0xFF;
        assert_eq!(AshHeader::from_bytes(&bytes).unwrap().size, 12);
    }

    #[test]
    fn deserializes_three_leaf_tree() {
        // ('a', ('b', 'x')) over 9-bit symbols, as laid out in the module
        // docs: 1 0 001100001 1 0 001100010 0 001111000, then padding.
        // Followed by the codes 0, 10, 11 to read back a, b, x.
        let bytes = [
            0b1000_1100, 0b0011_0001, 0b1000_1000, 0b0111_1000, 0b0101_1000, 0, 0, 0,
        ];
        let mut bits = reader(&bytes);
        let tree = AshTree::from_bitreader(&mut bits, 9).unwrap();

        assert_eq!(tree.read_value(&mut bits).unwrap(), 'a' as u32);
        assert_eq!(tree.read_value(&mut bits).unwrap(), 'b' as u32);
        assert_eq!(tree.read_value(&mut bits).unwrap(), 'x' as u32);
    }

    #[test]
    fn tree_read_stops_at_stream_end() {
        // one inner node, then the stream runs dry mid-leaf
        let bytes = [0b1000_0000];
        let mut bits = reader(&bytes);
        let err = AshTree::from_bitreader(&mut bits, 9).unwrap_err();
        assert!(matches!(err, AshError::TruncatedStream));
    }

    #[test]
    fn tree_rejects_node_overflow() {
        // nothing but inner nodes; a 9-bit alphabet allows at most 1023
        // entries, so this must fail instead of growing without bound
        let bytes = [0xFF; 256];
        let mut bits = reader(&bytes);
        let err = AshTree::from_bitreader(&mut bits, 9).unwrap_err();
        assert!(matches!(err, AshError::BadTreeEncoding));
    }
}

use crate::{
    errors::AshError,
    format::{self, AshHeader, LITERAL_MAX, MAX_INPUT, MIN_MATCH},
};
use bitstream_io::{BigEndian, BitWrite, BitWriter};
use log::debug;
use std::{
    fs::File,
    io::{BufReader, BufWriter, Cursor, Read, Write},
    path::Path,
};

mod huffman;
pub(crate) mod lz;
mod optimal;

use self::{
    huffman::CodeTree,
    lz::{Token, tokenize},
};

type Frequency = u64;

/// Specify the encoding settings: alphabet widths, optimization passes,
/// and the input source.
///
/// To create a new `EncoderBuilder`, use [`for_reader()`], [`for_file()`],
/// or [`for_bytes()`]. Then, change any of the encoding settings with
/// `EncoderBuilder`'s helper methods. Finally, encode the input data with
/// [`encode_to_writer()`], [`encode_to_file()`], or [`encode_to_vec()`].
/// ```
/// # use ash0::EncoderBuilder;
/// let input = b"ABBACABBCADFEGABA";
/// let compressed = EncoderBuilder::for_bytes(input)
///     .passes(1)
///     .encode_to_vec();
/// ```
///
/// The default encoding settings match the files found in the Wii System
/// Menu and Animal Crossing: City Folk:
/// * 9-bit symbol/length alphabet
/// * 11-bit distance alphabet
/// * No re-tokenization passes
///
/// My Pokémon Ranch files want `dist_bits(15)` instead.
///
/// [`for_reader()`]: EncoderBuilder::for_reader
/// [`for_file()`]: EncoderBuilder::for_file
/// [`for_bytes()`]: EncoderBuilder::for_bytes
/// [`encode_to_writer()`]: EncoderBuilder::encode_to_writer
/// [`encode_to_file()`]: EncoderBuilder::encode_to_file
/// [`encode_to_vec()`]: EncoderBuilder::encode_to_vec
pub struct EncoderBuilder<R> {
    rdr: R,
    sym_bits: u32,
    dist_bits: u32,
    passes: u32,
}

impl<R: Read> EncoderBuilder<R> {
    /// Create a new `EncoderBuilder` for the data in `rdr`.
    #[inline]
    pub fn for_reader(rdr: R) -> Self {
        Self {
            rdr,
            sym_bits: 9,
            dist_bits: 11,
            passes: 0,
        }
    }

    /// Set the width of the symbol/length alphabet in bits, from 9 to 16.
    /// Wider alphabets allow longer copies at the price of larger trees.
    #[inline]
    pub fn sym_bits(&mut self, n: u32) -> &mut Self {
        self.sym_bits = n;
        self
    }

    /// Set the width of the distance alphabet in bits, from 1 to 24.
    /// Wider alphabets allow the encoder to look further back.
    #[inline]
    pub fn dist_bits(&mut self, n: u32) -> &mut Self {
        self.dist_bits = n;
        self
    }

    /// Set how many times the token stream is re-derived against the
    /// trained trees. Each pass trades encoding time for output size;
    /// zero reproduces the plain greedy encoding.
    #[inline]
    pub fn passes(&mut self, n: u32) -> &mut Self {
        self.passes = n;
        self
    }

    /// Start the encoding and write the compressed data out to `wtr`
    #[inline]
    pub fn encode_to_writer<W: Write>(&mut self, wtr: W) -> Result<(), AshError> {
        do_encode(self, wtr)
    }

    /// Start the encoding and write the compressed data out to the newly
    /// created `File` `f`
    #[inline]
    pub fn encode_to_file<P: AsRef<Path>>(&mut self, f: P) -> Result<(), AshError> {
        let wtr = BufWriter::new(File::create(f)?);
        self.encode_to_writer(wtr)
    }

    /// Start the encoding and return the compressed data in a `Vec<u8>`.
    #[inline]
    pub fn encode_to_vec(&mut self) -> Result<Vec<u8>, AshError> {
        let mut out = Vec::new();
        self.encode_to_writer(&mut out).map(|_| out)
    }
}

impl EncoderBuilder<BufReader<File>> {
    /// Create a new `EncoderBuilder` for the file at `p`.
    #[inline]
    pub fn for_file<P: AsRef<Path>>(p: P) -> Result<Self, AshError> {
        let rdr = BufReader::new(File::open(p)?);
        Ok(Self::for_reader(rdr))
    }
}

impl<'a> EncoderBuilder<Cursor<&'a [u8]>> {
    /// Create a new `EncoderBuilder` for the data in the `bytes` slice.
    #[inline]
    pub fn for_bytes(bytes: &'a [u8]) -> Self {
        let rdr = Cursor::new(bytes);
        Self::for_reader(rdr)
    }
}

/// Compress data into an `ASH0` `Vec<u8>` with the default settings
///
/// This is a convenience function to encode a `Read`er without having to
/// import and set up an [`EncoderBuilder`].
pub fn compress<R: Read>(rdr: R) -> Result<Vec<u8>, AshError> {
    EncoderBuilder::for_reader(rdr).encode_to_vec()
}

fn do_encode<R: Read, W: Write>(
    opts: &mut EncoderBuilder<R>,
    mut wtr: W,
) -> Result<(), AshError> {
    format::check_widths(opts.sym_bits, opts.dist_bits)?;

    let mut raw = Vec::new();
    opts.rdr.read_to_end(&mut raw)?;

    let out = encode_buffer(&raw, opts.sym_bits, opts.dist_bits, opts.passes)?;
    wtr.write_all(&out)?;

    Ok(())
}

/// Compress `raw` into a complete in-memory `ASH0` file.
pub(crate) fn encode_buffer(
    raw: &[u8],
    sym_bits: u32,
    dist_bits: u32,
    passes: u32,
) -> Result<Vec<u8>, AshError> {
    if raw.len() > MAX_INPUT {
        return Err(AshError::InputTooLarge(raw.len()));
    }

    let max_len = format::max_copy_length(sym_bits);
    let max_dist = 1usize << dist_bits;

    let mut tokens = tokenize(raw, max_len, max_dist);
    debug!("tokenized {} bytes into {} tokens", raw.len(), tokens.len());

    let (mut sym_tree, mut dist_tree) = train_trees(&tokens, sym_bits, dist_bits);

    for pass in 1..=passes {
        tokens = optimal::retokenize(raw, &sym_tree, &dist_tree);
        let trees = train_trees(&tokens, sym_bits, dist_bits);
        sym_tree = trees.0;
        dist_tree = trees.1;
        debug!("pass {}: {} tokens", pass, tokens.len());
    }

    // Symbol stream: the symbol tree, then one code per token. Distance
    // stream: the distance tree, then one code per reference.
    let mut sym_stream = BitWriter::endian(Vec::new(), BigEndian);
    let mut dist_stream = BitWriter::endian(Vec::new(), BigEndian);
    sym_tree.write(&mut sym_stream, sym_bits)?;
    dist_tree.write(&mut dist_stream, dist_bits)?;

    for token in &tokens {
        match *token {
            Token::Literal(byte) => {
                sym_tree.write_symbol(&mut sym_stream, byte as u32)?;
            }
            Token::Reference { length, distance } => {
                sym_tree.write_symbol(&mut sym_stream, LITERAL_MAX + length - MIN_MATCH)?;
                dist_tree.write_symbol(&mut dist_stream, distance - 1)?;
            }
        }
    }

    let sym_bytes = finish_stream(sym_stream)?;
    let dist_bytes = finish_stream(dist_stream)?;
    debug!(
        "symbol stream {} bytes, distance stream {} bytes",
        sym_bytes.len(),
        dist_bytes.len()
    );

    let header = AshHeader {
        size: raw.len() as u32,
        dist_offset: (format::HEADER_SIZE + sym_bytes.len()) as u32,
    };

    let mut out = Vec::with_capacity(format::HEADER_SIZE + sym_bytes.len() + dist_bytes.len());
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(&sym_bytes);
    out.extend_from_slice(&dist_bytes);

    Ok(out)
}

/// Flush a bit stream and zero-pad it out to a 32-bit word boundary.
fn finish_stream(mut stream: BitWriter<Vec<u8>, BigEndian>) -> Result<Vec<u8>, AshError> {
    stream.byte_align()?;
    let mut bytes = stream.into_writer();
    while bytes.len() % 4 != 0 {
        bytes.push(0);
    }
    Ok(bytes)
}

/// Count symbol and distance occurrences across `tokens` and grow a tree
/// for each alphabet. A literal feeds its byte value; a reference feeds its
/// length symbol and, to the other tree, its distance symbol.
pub(crate) fn train_trees(tokens: &[Token], sym_bits: u32, dist_bits: u32) -> (CodeTree, CodeTree) {
    let mut sym_freq = vec![0 as Frequency; 1 << sym_bits];
    let mut dist_freq = vec![0 as Frequency; 1 << dist_bits];

    for token in tokens {
        match *token {
            Token::Literal(byte) => sym_freq[byte as usize] += 1,
            Token::Reference { length, distance } => {
                sym_freq[(LITERAL_MAX + length - MIN_MATCH) as usize] += 1;
                dist_freq[(distance - 1) as usize] += 1;
            }
        }
    }

    (CodeTree::train(&sym_freq), CodeTree::train(&dist_freq))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_input_still_has_both_streams() {
        let out = encode_buffer(&[], 9, 11, 0).unwrap();
        let header = AshHeader::from_bytes(&out).unwrap();
        assert_eq!(header.size, 0);
        // both trees exist even with nothing to code
        assert!(header.dist_offset as usize > format::HEADER_SIZE);
        assert!(out.len() > header.dist_offset as usize);
        assert_eq!(out.len() % 4, 0);
        assert_eq!(header.dist_offset % 4, 0);
    }

    #[test]
    fn oversize_input_is_rejected() {
        let raw = vec![0u8; MAX_INPUT + 1];
        let err = encode_buffer(&raw, 9, 11, 0).unwrap_err();
        assert!(matches!(err, AshError::InputTooLarge(_)));
    }

    #[test]
    fn width_bounds_are_enforced() {
        assert!(matches!(
            EncoderBuilder::for_bytes(b"x").sym_bits(8).encode_to_vec(),
            Err(AshError::BadBitWidth("symbol", 8))
        ));
        assert!(matches!(
            EncoderBuilder::for_bytes(b"x").dist_bits(25).encode_to_vec(),
            Err(AshError::BadBitWidth("distance", 25))
        ));
        assert!(matches!(
            EncoderBuilder::for_bytes(b"x").sym_bits(17).encode_to_vec(),
            Err(AshError::BadBitWidth("symbol", 17))
        ));
        assert!(matches!(
            EncoderBuilder::for_bytes(b"x").dist_bits(0).encode_to_vec(),
            Err(AshError::BadBitWidth("distance", 0))
        ));
    }

    #[test]
    fn header_places_distance_stream_after_symbols() {
        let out = encode_buffer(b"hello world!", 9, 11, 0).unwrap();
        let header = AshHeader::from_bytes(&out).unwrap();
        assert_eq!(header.size, 12);
        assert!((header.dist_offset as usize) > format::HEADER_SIZE);
        assert!((header.dist_offset as usize) < out.len());
        assert_eq!(header.dist_offset % 4, 0);
    }
}

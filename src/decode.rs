use crate::{
    errors::AshError,
    format::{self, AshHeader, AshTree, LITERAL_MAX, MIN_MATCH},
};
use bitstream_io::{BigEndian, BitReader};
use log::debug;
use std::{
    fs::File,
    io::{BufReader, BufWriter, Cursor, Read, Write},
    path::Path,
};

/// Specify the decoding settings: alphabet widths and the input source.
///
/// The alphabet widths are not recorded in the file, so they have to match
/// whatever the encoder used; with the wrong widths the embedded trees
/// parse into garbage and decoding fails. The defaults fit the Wii System
/// Menu and Animal Crossing: City Folk; My Pokémon Ranch files want
/// `dist_bits(15)`.
///
/// ```no_run
/// # use ash0::DecoderBuilder;
/// # fn main() -> Result<(), ash0::AshError> {
/// let data = DecoderBuilder::for_file("home.ash")?
///     .dist_bits(15)
///     .decode_to_vec()?;
/// # Ok(())
/// # }
/// ```
pub struct DecoderBuilder<R> {
    rdr: R,
    sym_bits: u32,
    dist_bits: u32,
}

impl<R: Read> DecoderBuilder<R> {
    /// Create a new `DecoderBuilder` for the data in `rdr`.
    #[inline]
    pub fn for_reader(rdr: R) -> Self {
        Self {
            rdr,
            sym_bits: 9,
            dist_bits: 11,
        }
    }

    /// Set the width of the symbol/length alphabet in bits, from 9 to 16.
    #[inline]
    pub fn sym_bits(&mut self, n: u32) -> &mut Self {
        self.sym_bits = n;
        self
    }

    /// Set the width of the distance alphabet in bits, from 1 to 24.
    #[inline]
    pub fn dist_bits(&mut self, n: u32) -> &mut Self {
        self.dist_bits = n;
        self
    }

    /// Decode the input and write the raw data out to `wtr`
    #[inline]
    pub fn decode_to_writer<W: Write>(&mut self, mut wtr: W) -> Result<(), AshError> {
        let out = self.decode_to_vec()?;
        wtr.write_all(&out).map_err(Into::into)
    }

    /// Decode the input and write the raw data out to the newly created
    /// `File` `f`
    #[inline]
    pub fn decode_to_file<P: AsRef<Path>>(&mut self, f: P) -> Result<(), AshError> {
        let wtr = BufWriter::new(File::create(f)?);
        self.decode_to_writer(wtr)
    }

    /// Decode the input and return the raw data in a `Vec<u8>`.
    #[inline]
    pub fn decode_to_vec(&mut self) -> Result<Vec<u8>, AshError> {
        // the distance stream offset points backward into the input, so
        // decoding needs the whole file in memory anyway
        let mut input = Vec::new();
        self.rdr.read_to_end(&mut input)?;
        decode_buffer(&input, self.sym_bits, self.dist_bits)
    }
}

impl DecoderBuilder<BufReader<File>> {
    /// Create a new `DecoderBuilder` for the file at `p`.
    #[inline]
    pub fn for_file<P: AsRef<Path>>(p: P) -> Result<Self, AshError> {
        let rdr = BufReader::new(File::open(p)?);
        Ok(Self::for_reader(rdr))
    }
}

impl<'a> DecoderBuilder<Cursor<&'a [u8]>> {
    /// Create a new `DecoderBuilder` for the data in the `bytes` slice.
    #[inline]
    pub fn for_bytes(bytes: &'a [u8]) -> Self {
        let rdr = Cursor::new(bytes);
        Self::for_reader(rdr)
    }
}

/// Decompress `ASH0` data with the default settings
///
/// This is a convenience function to decode a `Read`er without having to
/// import and set up a [`DecoderBuilder`].
pub fn decompress<R: Read>(rdr: R) -> Result<Vec<u8>, AshError> {
    DecoderBuilder::for_reader(rdr).decode_to_vec()
}

/// Read just the header out of an `ASH0` file.
pub fn ash_info<R: Read>(mut rdr: R) -> Result<AshHeader, AshError> {
    let mut header = [0u8; format::HEADER_SIZE];
    rdr.read_exact(&mut header)?;
    AshHeader::from_bytes(&header)
}

/// Expand a complete in-memory `ASH0` file.
pub(crate) fn decode_buffer(
    input: &[u8],
    sym_bits: u32,
    dist_bits: u32,
) -> Result<Vec<u8>, AshError> {
    format::check_widths(sym_bits, dist_bits)?;

    let header = AshHeader::from_bytes(input)?;
    let dist_offset = header.dist_offset as usize;
    if dist_offset < format::HEADER_SIZE || dist_offset > input.len() {
        return Err(AshError::TruncatedStream);
    }
    debug!(
        "{} byte payload, distance stream at {:#x}",
        header.size, header.dist_offset
    );

    // two independent bit streams over one backing buffer
    let mut sym_bits_rdr = BitReader::endian(Cursor::new(&input[format::HEADER_SIZE..]), BigEndian);
    let mut dist_bits_rdr = BitReader::endian(Cursor::new(&input[dist_offset..]), BigEndian);

    let sym_tree = AshTree::from_bitreader(&mut sym_bits_rdr, sym_bits)?;
    let dist_tree = AshTree::from_bitreader(&mut dist_bits_rdr, dist_bits)?;

    let size = header.size as usize;
    let mut out: Vec<u8> = Vec::with_capacity(size);

    while out.len() < size {
        let sym = sym_tree.read_value(&mut sym_bits_rdr)?;

        if sym < LITERAL_MAX {
            out.push(sym as u8);
        } else {
            let dsym = dist_tree.read_value(&mut dist_bits_rdr)?;
            let length = (sym - LITERAL_MAX + MIN_MATCH) as usize;
            let distance = dsym as usize + 1;

            if distance > out.len() || length > size - out.len() {
                return Err(AshError::InvalidReference {
                    length,
                    distance,
                    produced: out.len(),
                    remaining: size - out.len(),
                });
            }

            // byte-by-byte so copies longer than their distance repeat the
            // window, run-length style
            for _ in 0..length {
                let byte = out[out.len() - distance];
                out.push(byte);
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rejects_wrong_magic() {
        let input = [0u8; 32];
        let err = decode_buffer(&input, 9, 11).unwrap_err();
        assert!(matches!(err, AshError::BadMagic(_)));
    }

    #[test]
    fn rejects_distance_offset_outside_input() {
        let mut input = AshHeader {
            size: 4,
            dist_offset: 0x100,
        }
        .to_bytes()
        .to_vec();
        input.extend_from_slice(&[0u8; 8]);
        let err = decode_buffer(&input, 9, 11).unwrap_err();
        assert!(matches!(err, AshError::TruncatedStream));
    }

    #[test]
    fn rejects_reference_before_start_of_output() {
        // Symbol stream: tree ('A', 259), then one length symbol right
        // away, with nothing produced yet to copy from.
        // Tree bits: 1 0 001000001 0 100000011, code: 1
        // -> 1000_1000 0010_1000 0001_1100 0000_0000
        let mut input = AshHeader {
            size: 4,
            dist_offset: 0x10,
        }
        .to_bytes()
        .to_vec();
        input.extend_from_slice(&[0b1000_1000, 0b0010_1000, 0b0001_1100, 0]);
        // Distance stream: tree (0, 1), code: 0
        input.extend_from_slice(&[0b1000_0000, 0b0000_0000, 0b0000_0000, 0b1000_0000]);

        let err = decode_buffer(&input, 9, 11).unwrap_err();
        match err {
            AshError::InvalidReference {
                length,
                distance,
                produced,
                ..
            } => {
                assert_eq!(length, 6);
                assert_eq!(distance, 1);
                assert_eq!(produced, 0);
            }
            other => panic!("expected InvalidReference, got {:?}", other),
        }
    }
}

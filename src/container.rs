//! The `.hz` container: the code table, followed by the packed payload.
//!
//! ```text
//! +--------------------+
//! | entry_count (2)    |  u16 little-endian, number of distinct symbols
//! +--------------------+
//! | entries            |  per entry:
//! |   symbol (1)       |    the byte value
//! |   code_len (1)     |    code length in bits, 1..=255
//! |   code (variable)  |    ceil(code_len / 8) bytes, MSB-first, zero-padded
//! +--------------------+
//! | payload_bits (8)   |  u64 little-endian (sized layout only)
//! +--------------------+
//! | payload            |  encoded message, MSB-first, zero-padded
//! +--------------------+
//! ```
//!
//! The legacy layout omits `payload_bits`. Without it the decoder can't tell
//! padding from data in the final payload byte, so a padding run that happens
//! to spell a complete code decodes to an extra trailing symbol.
//!
//! Older tools gave the only symbol of a single-symbol input an empty code,
//! leaving an empty payload. Such files are rejected in either layout: a
//! zero-length code can't say how many times the symbol occurred.

use std::io::{self, prelude::*, Cursor};

use tracing::debug;

use crate::{
    bits::{self, BitUnpacker, PackedBits},
    code_table::{Code, CodeTable},
    errors::malformed,
    Error, Result,
};

/// Most distinct symbols a byte-oriented table can hold.
const MAX_ENTRIES: usize = 256;

/// Whether the container records the exact payload bit length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Layout {
    /// Header ends with the payload bit length.
    #[default]
    Sized,

    /// Header ends right after the table. Matches files written by older
    /// tools, at the cost of ambiguous trailing padding.
    Legacy,
}

/// A decoded (or ready to encode) container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    table: CodeTable,
    payload: Vec<u8>,
    payload_bits: usize,
    layout: Layout,
}

impl Container {
    pub fn new(table: CodeTable, payload: PackedBits) -> Self {
        Self {
            table,
            payload_bits: payload.bit_len(),
            payload: payload.into_bytes(),
            layout: Layout::Sized,
        }
    }

    pub fn table(&self) -> &CodeTable {
        &self.table
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Number of meaningful payload bits. For a legacy container this counts
    /// the padding too.
    pub fn payload_bits(&self) -> usize {
        self.payload_bits
    }

    /// Layout this container was decoded from. Always [`Layout::Sized`] for
    /// one built with [`Container::new`]; [`Container::encode`] takes the
    /// layout to write separately.
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// The meaningful payload bits, in order.
    pub fn bits(&self) -> BitUnpacker<'_> {
        // `new`/`decode` keep payload_bits within the payload.
        BitUnpacker::new(&self.payload, self.payload_bits)
            .unwrap_or_else(|| unreachable!("payload_bits exceeds payload"))
    }

    pub fn encode(&self, layout: Layout) -> Result<Vec<u8>> {
        let entry_count = u16::try_from(self.table.len())
            .map_err(|_| Error::InternalInvariantViolation("code table too large"))?;

        let mut out = Vec::with_capacity(2 + self.table.len() * 4 + 8 + self.payload.len());
        out.extend_from_slice(&entry_count.to_le_bytes());

        for (byte, code) in self.table.iter() {
            let code_len = u8::try_from(code.len())
                .map_err(|_| Error::InternalInvariantViolation("code longer than 255 bits"))?;

            out.push(byte);
            out.push(code_len);
            out.extend_from_slice(bits::pack(code.iter().by_vals()).bytes());
        }

        if layout == Layout::Sized {
            out.extend_from_slice(&(self.payload_bits as u64).to_le_bytes());
        }
        out.extend_from_slice(&self.payload);

        Ok(out)
    }

    pub fn decode(bytes: &[u8], layout: Layout) -> Result<Self> {
        let mut input = Cursor::new(bytes);

        let entry_count = read_u16_le(&mut input, "entry count")? as usize;
        if entry_count > MAX_ENTRIES {
            return malformed(format!(
                "entry count {entry_count} exceeds the {MAX_ENTRIES} possible byte values"
            ));
        }

        let mut entries = Vec::with_capacity(entry_count);
        for index in 0..entry_count {
            let [symbol, code_len] = read_array(&mut input, "table entry")?;
            if code_len == 0 {
                return malformed(format!("entry {index} (symbol {symbol:#04x}) has an empty code"));
            }

            let mut packed = vec![0; bits::byte_len(code_len as usize)];
            if input.read_exact(&mut packed).is_err() {
                return malformed(format!(
                    "entry {index} declares a {code_len}-bit code but the container ends first"
                ));
            }

            let mut code = Code::from_vec(packed);
            code.truncate(code_len as usize);
            entries.push((symbol, code));
        }

        let table = CodeTable::try_from_entries(entries)
            .map_err(|conflict| Error::MalformedContainer(conflict.to_string()))?;
        if !table.is_prefix_free() {
            return malformed("code table is not prefix-free");
        }

        let declared_bits = match layout {
            Layout::Sized => Some(read_u64_le(&mut input, "payload bit length")?),
            Layout::Legacy => None,
        };

        let payload = bytes[input.position() as usize..].to_vec();
        let payload_bits = match declared_bits {
            Some(declared) => {
                let expected_bytes = usize::try_from(declared)
                    .ok()
                    .map(bits::byte_len)
                    .filter(|&n| n == payload.len());
                if expected_bytes.is_none() {
                    return malformed(format!(
                        "header declares {declared} payload bits but {} payload bytes follow",
                        payload.len()
                    ));
                }
                declared as usize
            }
            None => payload.len() * 8,
        };

        if table.is_empty() && payload_bits != 0 {
            return malformed("payload present without a code table");
        }

        debug!(
            entries = table.len(),
            payload_bits,
            ?layout,
            "parsed container header"
        );

        Ok(Self {
            table,
            payload,
            payload_bits,
            layout,
        })
    }
}

fn read_array<const N: usize>(input: &mut impl Read, what: &str) -> Result<[u8; N]> {
    let mut buf = [0; N];
    match input.read_exact(&mut buf) {
        Ok(()) => Ok(buf),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            malformed(format!("container ends inside the {what}"))
        }
        Err(e) => Err(Error::Read(e)),
    }
}

fn read_u16_le(input: &mut impl Read, what: &str) -> Result<u16> {
    read_array(input, what).map(u16::from_le_bytes)
}

fn read_u64_le(input: &mut impl Read, what: &str) -> Result<u64> {
    read_array(input, what).map(u64::from_le_bytes)
}

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
};

use bitvec::prelude::*;

use crate::{
    frequency::FrequencyTable,
    tree::{HuffmanTree, Node},
    Error, Result,
};

/// A Huffman code: the path from the root to a leaf, `0` for `lo` and `1`
/// for `hi`, first step first.
pub type Code = BitVec<u8, Msb0>;

/// Why a set of (byte, code) entries can't form a table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub(crate) enum TableConflict {
    #[error("symbol {0:#04x} appears twice")]
    DuplicateSymbol(u8),

    #[error("symbols {0:#04x} and {1:#04x} share a code")]
    DuplicateCode(u8, u8),

    #[error("symbol {0:#04x} has an empty code")]
    EmptyCode(u8),
}

/// Byte-to-code mapping, plus its exact inverse.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CodeTable {
    codes: BTreeMap<u8, Code>,
    symbols: HashMap<Code, u8>,
}

impl fmt::Debug for CodeTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (byte, code) in self.iter() {
            map.entry(&byte, &format_args!("{}", BitString(code)));
        }
        map.finish()
    }
}

/// Displays a code as a string of `0`s and `1`s.
pub struct BitString<'a>(pub &'a BitSlice<u8, Msb0>);

impl fmt::Display for BitString<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for bit in self.0.iter().by_vals() {
            f.write_str(if bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl CodeTable {
    /// Assign every leaf of `tree` its root-to-leaf path.
    ///
    /// A tree that is a lone leaf gets the one-bit code `0`, so every symbol
    /// in the payload costs at least one bit.
    pub fn from_tree(tree: &HuffmanTree) -> Result<Self> {
        let mut entries = Vec::new();

        match tree.root() {
            Node::Leaf { byte, .. } => entries.push((*byte, bitvec![u8, Msb0; 0])),
            root => collect_codes(root, &mut Code::new(), &mut entries),
        }

        Self::try_from_entries(entries)
            .map_err(|_| Error::InternalInvariantViolation("tree produced colliding codes"))
    }

    /// Build a table from explicit entries, rejecting anything that would
    /// make the inverse lookup ambiguous.
    pub(crate) fn try_from_entries(
        entries: impl IntoIterator<Item = (u8, Code)>,
    ) -> std::result::Result<Self, TableConflict> {
        let mut table = Self::default();

        for (byte, code) in entries {
            if code.is_empty() {
                return Err(TableConflict::EmptyCode(byte));
            }
            if table.codes.contains_key(&byte) {
                return Err(TableConflict::DuplicateSymbol(byte));
            }
            if let Some(&other) = table.symbols.get(&code) {
                return Err(TableConflict::DuplicateCode(other, byte));
            }

            table.symbols.insert(code.clone(), byte);
            table.codes.insert(byte, code);
        }

        Ok(table)
    }

    pub fn code(&self, byte: u8) -> Option<&Code> {
        self.codes.get(&byte)
    }

    /// Inverse lookup.
    pub fn symbol(&self, code: &Code) -> Option<u8> {
        self.symbols.get(code).copied()
    }

    /// Number of symbols in the table.
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Entries in ascending byte order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, &Code)> + '_ {
        self.codes.iter().map(|(&byte, code)| (byte, code))
    }

    pub fn max_code_len(&self) -> usize {
        self.codes.values().map(|code| code.len()).max().unwrap_or(0)
    }

    /// Exact number of payload bits needed to encode an input with these
    /// frequencies. `None` if some byte in `frequencies` has no code.
    pub fn encoded_bits(&self, frequencies: &FrequencyTable) -> Option<u64> {
        frequencies.iter().try_fold(0u64, |acc, (byte, count)| {
            let len = self.code(byte)?.len() as u64;
            Some(acc + len * count)
        })
    }

    /// True when no code is a prefix of another.
    pub fn is_prefix_free(&self) -> bool {
        // In lexicographic order, a code that prefixes others sorts directly
        // before the first of them.
        let mut codes: Vec<&Code> = self.codes.values().collect();
        codes.sort_by(|a, b| a.iter().by_vals().cmp(b.iter().by_vals()));

        codes.windows(2).all(|pair| !pair[1].starts_with(pair[0].as_bitslice()))
    }
}

fn collect_codes(node: &Node, prefix: &mut Code, out: &mut Vec<(u8, Code)>) {
    match node {
        Node::Leaf { byte, .. } => out.push((*byte, prefix.clone())),
        Node::Internal { lo, hi, .. } => {
            prefix.push(false);
            collect_codes(lo, prefix, out);
            prefix.pop();

            prefix.push(true);
            collect_codes(hi, prefix, out);
            prefix.pop();
        }
    }
}

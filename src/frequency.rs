use std::{fmt, io::Read};

use crate::{chunks::Chunks, Result};

/// Occurrence count of every byte value in some input.
#[derive(Clone, PartialEq, Eq)]
pub struct FrequencyTable {
    counts: [u64; 256],
}

impl Default for FrequencyTable {
    fn default() -> Self {
        Self { counts: [0; 256] }
    }
}

// Not derived, to skip the zero entries.
impl fmt::Debug for FrequencyTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl FrequencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of(bytes: &[u8]) -> Self {
        let mut table = Self::new();
        table.add(bytes);
        table
    }

    pub fn add(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.counts[byte as usize] += 1;
        }
    }

    pub fn count(&self, byte: u8) -> u64 {
        self.counts[byte as usize]
    }

    /// Number of distinct byte values seen.
    pub fn distinct(&self) -> usize {
        self.counts.iter().filter(|&&c| c != 0).count()
    }

    /// Total number of bytes seen.
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.distinct() == 0
    }

    /// (byte, count) pairs with a non-zero count, in ascending byte order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, u64)> + '_ {
        (0..=u8::MAX)
            .zip(self.counts.iter().copied())
            .filter(|&(_, count)| count != 0)
    }
}

/// Scan `input` to its end, counting every byte.
///
/// Reports `bytes_read / total_len` to `on_progress` after each chunk. When
/// the total is unknown, only the closing 1.0 is reported. If any read fails,
/// the partial counts are dropped along with the error. A zero `chunk_size`
/// is rejected before anything is read.
pub fn count_frequencies<R: Read>(
    input: R,
    total_len: Option<u64>,
    chunk_size: usize,
    mut on_progress: impl FnMut(f64),
) -> Result<FrequencyTable> {
    let mut table = FrequencyTable::new();
    let mut chunks = Chunks::new(input, chunk_size)?;

    while let Some(chunk) = chunks.next_chunk()? {
        table.add(chunk);

        if let Some(total) = total_len.filter(|&t| t != 0) {
            on_progress(fraction(chunks.consumed(), total));
        }
    }

    on_progress(1.0);
    Ok(table)
}

/// `done / total`, clamped to [0, 1].
pub(crate) fn fraction(done: u64, total: u64) -> f64 {
    if total == 0 {
        return 1.0;
    }

    (done as f64 / total as f64).clamp(0.0, 1.0)
}

use std::io::{self, prelude::*};

use tracing::{debug, info, warn};

use super::Reporter;
use crate::{
    bits::{BitPacker, PackedBits},
    chunks::Chunks,
    code_table::CodeTable,
    container::Container,
    errors::read_error,
    frequency::{count_frequencies, fraction},
    observer::{Observer, Summary},
    tree::HuffmanTree,
    Error, Options, Result,
};

const COMPLETE: &str = "Compression complete.";

/// Working stages, in the order a run passes through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Stage {
    CountingFrequencies,
    BuildingTree,
    Encoding,
    Serializing,
}

impl Stage {
    fn status(self) -> &'static str {
        match self {
            Stage::CountingFrequencies => "Counting byte frequencies...",
            Stage::BuildingTree => "Building Huffman tree...",
            Stage::Encoding => "Encoding input...",
            Stage::Serializing => "Writing container...",
        }
    }
}

/// Compresses one input into one container.
///
/// The input is read twice, once to count frequencies and once to encode, so
/// it must be seekable.
pub struct CompressionPipeline<O: Observer> {
    options: Options,
    reporter: Reporter<O>,
    /// `None` until the first stage starts.
    stage: Option<Stage>,
}

impl<O: Observer> CompressionPipeline<O> {
    pub fn new(options: Options, observer: O) -> Self {
        let step = options.progress_step;
        Self {
            options,
            reporter: Reporter::new(observer, step),
            stage: None,
        }
    }

    /// Compress `input` into `output`.
    ///
    /// `total_len` is the input size if known; it only affects progress
    /// reporting during the first pass. `output` receives a single write of
    /// the finished container, or nothing at all if the run fails.
    pub fn run<R: Read + Seek, W: Write>(
        mut self,
        input: R,
        total_len: Option<u64>,
        output: W,
    ) -> Result<Summary> {
        let result = self.execute(input, total_len, output);

        match &result {
            Ok(summary) => info!(?summary, "compression finished"),
            Err(e) => warn!(error = %e, stage = ?self.stage, "compression failed"),
        }
        self.reporter.finish(result.as_ref(), COMPLETE);

        result
    }

    fn enter(&mut self, next: Stage) {
        debug_assert!(Some(next) > self.stage, "{:?} -> {next:?}", self.stage);
        self.stage = Some(next);
        self.reporter.begin_stage(next.status());
    }

    fn execute<R: Read + Seek, W: Write>(
        &mut self,
        mut input: R,
        total_len: Option<u64>,
        mut output: W,
    ) -> Result<Summary> {
        self.options.validate()?;
        let chunk_size = self.options.chunk_size;

        self.enter(Stage::CountingFrequencies);
        let reporter = &mut self.reporter;
        let frequencies =
            count_frequencies(&mut input, total_len, chunk_size, |p| reporter.progress(p))?;

        self.enter(Stage::BuildingTree);
        let table = match HuffmanTree::build(&frequencies)? {
            Some(tree) => CodeTable::from_tree(&tree)?,
            None => CodeTable::default(),
        };
        debug!(
            symbols = table.len(),
            max_code_len = table.max_code_len(),
            "built code table"
        );
        self.reporter.progress(1.0);

        self.enter(Stage::Encoding);
        let expected_bits = table.encoded_bits(&frequencies).ok_or(
            Error::InternalInvariantViolation("counted byte missing from code table"),
        )?;
        input.rewind().map_err(read_error)?;
        let reporter = &mut self.reporter;
        let payload = encode_input(
            &mut input,
            &table,
            frequencies.total(),
            expected_bits,
            chunk_size,
            |p| reporter.progress(p),
        )?;

        self.enter(Stage::Serializing);
        let payload_bits = payload.bit_len();
        let container = Container::new(table, payload);
        let bytes = container.encode(self.options.layout)?;
        output
            .write_all(&bytes)
            .and_then(|()| output.flush())
            .map_err(Error::Write)?;
        self.reporter.progress(1.0);

        Ok(Summary::Compressed {
            input_bytes: frequencies.total(),
            table: container.table().clone(),
            payload_bits,
            output_bytes: bytes.len(),
        })
    }
}

/// Second pass: replace every byte of `input` with its code.
///
/// The frequency pass saw exactly `total` bytes; a source that now yields a
/// different length, or a byte without a code, changed between the passes.
fn encode_input<R: Read>(
    input: R,
    table: &CodeTable,
    total: u64,
    expected_bits: u64,
    chunk_size: usize,
    mut on_progress: impl FnMut(f64),
) -> Result<PackedBits> {
    let changed = |detail: String| {
        let msg = format!("input changed between passes: {detail}");
        Error::Read(io::Error::new(io::ErrorKind::InvalidData, msg))
    };

    let mut packer = BitPacker::with_capacity(usize::try_from(expected_bits).unwrap_or(0));
    let mut chunks = Chunks::new(input, chunk_size)?;

    while let Some(chunk) = chunks.next_chunk()? {
        for &byte in chunk {
            let code = table
                .code(byte)
                .ok_or_else(|| changed(format!("byte {byte:#04x} was not counted")))?;
            packer.extend(code);
        }
        on_progress(fraction(chunks.consumed(), total));
    }

    if chunks.consumed() != total {
        let read = chunks.consumed();
        return Err(changed(format!("counted {total} bytes, encoded {read}")));
    }

    on_progress(1.0);
    Ok(packer.finish())
}

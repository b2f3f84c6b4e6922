use std::io::prelude::*;

use tracing::{debug, info, warn};

use super::Reporter;
use crate::{
    chunks::Chunks,
    code_table::Code,
    container::{Container, Layout},
    frequency::fraction,
    observer::{Observer, Summary},
    Error, Options, Result,
};

/// Payload bits decoded between progress reports.
const PROGRESS_INTERVAL_BITS: usize = 8192;

const COMPLETE: &str = "Decompression complete.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Stage {
    ParsingHeader,
    DecodingPayload,
}

impl Stage {
    fn status(self) -> &'static str {
        match self {
            Stage::ParsingHeader => "Reading container header...",
            Stage::DecodingPayload => "Decoding payload...",
        }
    }
}

/// Decodes one container back into the original bytes.
///
/// The whole container is buffered before parsing, and the whole output
/// before writing.
pub struct DecompressionPipeline<O: Observer> {
    options: Options,
    reporter: Reporter<O>,
    stage: Option<Stage>,
}

impl<O: Observer> DecompressionPipeline<O> {
    pub fn new(options: Options, observer: O) -> Self {
        let step = options.progress_step;
        Self {
            options,
            reporter: Reporter::new(observer, step),
            stage: None,
        }
    }

    /// Decompress the container read from `input` into `output`.
    ///
    /// `total_len` is the container size if known, for progress while
    /// reading it in.
    pub fn run<R: Read, W: Write>(
        mut self,
        input: R,
        total_len: Option<u64>,
        output: W,
    ) -> Result<Summary> {
        let result = self.execute(input, total_len, output);

        match &result {
            Ok(summary) => info!(?summary, "decompression finished"),
            Err(e) => warn!(error = %e, stage = ?self.stage, "decompression failed"),
        }
        self.reporter.finish(result.as_ref(), COMPLETE);

        result
    }

    fn enter(&mut self, next: Stage) {
        debug_assert!(Some(next) > self.stage, "{:?} -> {next:?}", self.stage);
        self.stage = Some(next);
        self.reporter.begin_stage(next.status());
    }

    fn execute<R: Read, W: Write>(
        &mut self,
        input: R,
        total_len: Option<u64>,
        mut output: W,
    ) -> Result<Summary> {
        self.options.validate()?;

        self.enter(Stage::ParsingHeader);
        let mut bytes = Vec::new();
        let mut chunks = Chunks::new(input, self.options.chunk_size)?;
        while let Some(chunk) = chunks.next_chunk()? {
            bytes.extend_from_slice(chunk);
            if let Some(total) = total_len {
                self.reporter.progress(fraction(chunks.consumed(), total));
            }
        }
        let container = Container::decode(&bytes, self.options.layout)?;
        self.reporter.progress(1.0);

        self.enter(Stage::DecodingPayload);
        let reporter = &mut self.reporter;
        let decoded = decode_payload(&container, |p| reporter.progress(p))?;

        output
            .write_all(&decoded)
            .and_then(|()| output.flush())
            .map_err(Error::Write)?;

        Ok(Summary::Decompressed {
            input_bytes: bytes.len(),
            output_bytes: decoded.len(),
        })
    }
}

/// Walk the payload one bit at a time, emitting a byte whenever the bits
/// gathered so far spell a code.
fn decode_payload(container: &Container, mut on_progress: impl FnMut(f64)) -> Result<Vec<u8>> {
    let table = container.table();
    let max_code_len = table.max_code_len();
    let total = container.payload_bits();

    // Legacy containers may end in up to seven zero bits of padding that
    // don't spell a code.
    let maybe_padding = |start: usize, candidate: &Code| {
        container.layout() == Layout::Legacy && start + 8 > total && candidate.not_any()
    };

    let mut out = Vec::new();
    let mut candidate = Code::with_capacity(max_code_len);
    let mut candidate_start = 0;

    for (i, bit) in container.bits().enumerate() {
        candidate.push(bit);

        if let Some(byte) = table.symbol(&candidate) {
            out.push(byte);
            candidate.clear();
            candidate_start = i + 1;
        } else if candidate.len() >= max_code_len && !maybe_padding(candidate_start, &candidate) {
            return Err(Error::UndecodableBitstream {
                trailing_bits: candidate.len(),
                decoded: out.len(),
            });
        }

        if (i + 1) % PROGRESS_INTERVAL_BITS == 0 {
            on_progress(fraction((i + 1) as u64, total as u64));
        }
    }

    if !candidate.is_empty() {
        if !maybe_padding(candidate_start, &candidate) {
            return Err(Error::UndecodableBitstream {
                trailing_bits: candidate.len(),
                decoded: out.len(),
            });
        }
        warn!(
            bits = candidate.len(),
            "treating unmatched zero bits at the end of a legacy container as padding"
        );
    }

    debug!(symbols = out.len(), "decoded payload");
    on_progress(1.0);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::io::{self, Cursor};

    use rand_chacha::{
        rand_core::{RngCore, SeedableRng},
        ChaCha8Rng,
    };
    use test_case::test_case;

    use super::*;
    use crate::{observer::Event, pipeline::CompressionPipeline};

    fn compress(input: &[u8], options: &Options) -> Vec<u8> {
        let mut out = Vec::new();
        CompressionPipeline::new(options.clone(), ())
            .run(Cursor::new(input), None, &mut out)
            .unwrap();
        out
    }

    fn decompress_recording(
        container: &[u8],
        options: Options,
    ) -> (Result<Summary>, Vec<u8>, Vec<Event>) {
        let mut events = Vec::new();
        let mut out = Vec::new();
        let result = DecompressionPipeline::new(options, &mut events).run(
            container,
            Some(container.len() as u64),
            &mut out,
        );
        (result, out, events)
    }

    #[test]
    fn three_symbols() -> anyhow::Result<()> {
        let container = compress(b"AAAAABBBCC", &Options::default());
        let (result, out, events) = decompress_recording(&container, Options::default());

        assert_eq!(
            result?,
            Summary::Decompressed {
                input_bytes: container.len(),
                output_bytes: 10,
            }
        );
        assert_eq!(out, b"AAAAABBBCC");

        let statuses: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                Event::Status(s) => Some(s.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(
            statuses,
            [
                "Reading container header...",
                "Decoding payload...",
                "Decompression complete.",
            ]
        );
        Ok(())
    }

    #[test]
    fn truncated_entry_writes_nothing() {
        // One entry claiming a 10-bit code, with no code bytes after it.
        let container = hex::decode("0100410a").unwrap();
        let (result, out, events) = decompress_recording(&container, Options::default());

        assert!(matches!(result, Err(Error::MalformedContainer(_))));
        assert!(out.is_empty());
        assert!(matches!(events.last(), Some(Event::Finished(Err(_)))));
        assert!(events.contains(&Event::Status(
            "Error: malformed container: entry 0 declares a 10-bit code but the container ends first"
                .into()
        )));
    }

    // Table: A=0, B=10.
    #[test_case("0200410100420280" , "0200000000000000", "c0", 2, 0 ; "runs past longest code")]
    #[test_case("0200410100420280" , "0300000000000000", "20", 1, 2 ; "unmatched tail")]
    fn undecodable(table: &str, bit_len: &str, payload: &str, trailing: usize, decoded: usize) {
        let container = hex::decode(format!("{table}{bit_len}{payload}")).unwrap();
        let (result, out, _) = decompress_recording(&container, Options::default());

        match result {
            Err(Error::UndecodableBitstream {
                trailing_bits,
                decoded: n,
            }) => {
                assert_eq!(trailing_bits, trailing);
                assert_eq!(n, decoded);
            }
            other => panic!("expected an undecodable bitstream, got {other:?}"),
        }
        assert!(out.is_empty());
    }

    #[test]
    fn legacy_zero_padding_is_ignored() -> anyhow::Result<()> {
        // Table: A=1, B=01. Payload 1 01 00000, the tail spelling no code.
        let container = hex::decode("0200410180420240a0")?;
        let legacy = Options::default().with_layout(Layout::Legacy);
        let (result, out, _) = decompress_recording(&container, legacy);

        result?;
        assert_eq!(out, b"AB");
        Ok(())
    }

    #[test]
    fn legacy_nonzero_tail_is_rejected() {
        let container = hex::decode("0200410180420240a1").unwrap();
        let legacy = Options::default().with_layout(Layout::Legacy);
        let (result, out, _) = decompress_recording(&container, legacy);

        assert!(matches!(result, Err(Error::UndecodableBitstream { .. })));
        assert!(out.is_empty());
    }

    #[test]
    fn legacy_padding_can_spell_symbols() -> anyhow::Result<()> {
        // Four 'Z's with code 0, as written without a bit length: the padding
        // reads back as four more.
        let container = hex::decode("01005a010000")?;
        let legacy = Options::default().with_layout(Layout::Legacy);
        let (result, out, _) = decompress_recording(&container, legacy);

        result?;
        assert_eq!(out, b"ZZZZZZZZ");
        Ok(())
    }

    #[test]
    fn sized_layout_needs_bit_length() {
        let container = compress(b"hello", &Options::default().with_layout(Layout::Legacy));
        let (result, out, _) = decompress_recording(&container, Options::default());

        assert!(matches!(result, Err(Error::MalformedContainer(_))));
        assert!(out.is_empty());
    }

    #[test]
    fn decoding_reports_progress() -> anyhow::Result<()> {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut input = vec![0; 64 * 1024];
        rng.fill_bytes(&mut input);

        let container = compress(&input, &Options::default());
        let (result, out, events) = decompress_recording(&container, Options::default());
        result?;
        assert_eq!(out, input);

        let decoding: Vec<f64> = events
            .iter()
            .skip_while(|e| **e != Event::Status("Decoding payload...".into()))
            .filter_map(|e| match e {
                Event::Progress(p) => Some(*p),
                _ => None,
            })
            .collect();
        assert!(decoding.len() > 10);
        assert_eq!(decoding.first(), Some(&0.0));
        assert_eq!(decoding.last(), Some(&1.0));
        assert!(decoding.windows(2).all(|w| w[0] <= w[1]));
        Ok(())
    }

    #[test]
    fn failed_read_is_reported() {
        struct FailingSource;

        impl Read for FailingSource {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
            }
        }

        let mut events = Vec::new();
        let mut out = Vec::new();
        let result =
            DecompressionPipeline::new(Options::default(), &mut events).run(FailingSource, None, &mut out);

        assert!(matches!(result, Err(Error::Read(_))));
        assert!(out.is_empty());
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, Event::Finished(_)))
                .count(),
            1
        );
    }
}

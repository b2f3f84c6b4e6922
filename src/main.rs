use std::{
    ffi::OsString,
    fs::{self, File},
    io::{self, prelude::*, BufReader, BufWriter},
    path::{Path, PathBuf},
    sync::mpsc::{self, Sender},
    thread,
};

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use hz::{
    bits, BitString, CompressionPipeline, Container, DecompressionPipeline, Event, Layout, Options,
    Summary, DEFAULT_CHUNK_SIZE,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Static Huffman compressor for `.hz` containers.
#[derive(Parser, Debug)]
#[command(name = "hz", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Read and write containers without the payload bit length, as older
    /// tools do
    #[arg(long, global = true)]
    legacy: bool,

    /// Bytes read from the input per chunk
    #[arg(long, global = true, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Don't draw a progress bar
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compress a file (default output: INPUT with its extension replaced by .hz)
    Compress {
        input: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Decompress a container (default output: INPUT without .hz, or with .out)
    Decompress {
        input: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print a container's header and code table
    Inspect { input: PathBuf },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let layout = if cli.legacy {
        Layout::Legacy
    } else {
        Layout::Sized
    };
    let options = Options::default()
        .with_layout(layout)
        .with_chunk_size(cli.chunk_size);

    match cli.command {
        Command::Compress { input, output } => {
            let output = output.unwrap_or_else(|| input.with_extension("hz"));
            compress(&input, &output, options, cli.quiet)
        }
        Command::Decompress { input, output } => {
            let output = output.unwrap_or_else(|| decompressed_name(&input));
            decompress(&input, &output, options, cli.quiet)
        }
        Command::Inspect { input } => inspect(&input, layout),
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// `foo.hz` becomes `foo`; anything else gets `.out` appended.
fn decompressed_name(input: &Path) -> PathBuf {
    if input.extension().map_or(false, |ext| ext == "hz") {
        input.with_extension("")
    } else {
        let mut name = OsString::from(input.as_os_str());
        name.push(".out");
        PathBuf::from(name)
    }
}

fn compress(input: &Path, output: &Path, options: Options, quiet: bool) -> anyhow::Result<()> {
    if input == output {
        bail!("refusing to overwrite the input {}", input.display());
    }

    let file = File::open(input).with_context(|| format!("opening {}", input.display()))?;
    let len = file.metadata()?.len();
    let mut sink = LazyFile::new(output.to_owned());

    let summary = run_with_progress(quiet, move |observer| {
        let result = CompressionPipeline::new(options, observer).run(
            BufReader::new(file),
            Some(len),
            &mut sink,
        );
        (result, sink)
    })
    .with_context(|| format!("compressing {}", input.display()))?;

    if let Summary::Compressed {
        input_bytes,
        table,
        payload_bits,
        output_bytes,
    } = summary
    {
        if !quiet {
            println!(
                "{} -> {}: {input_bytes} bytes in, {output_bytes} bytes out \
                 ({} symbols, {payload_bits} payload bits)",
                input.display(),
                output.display(),
                table.len(),
            );
        }
    }
    Ok(())
}

fn decompress(input: &Path, output: &Path, options: Options, quiet: bool) -> anyhow::Result<()> {
    if input == output {
        bail!("refusing to overwrite the input {}", input.display());
    }

    let file = File::open(input).with_context(|| format!("opening {}", input.display()))?;
    let len = file.metadata()?.len();
    let mut sink = LazyFile::new(output.to_owned());

    let summary = run_with_progress(quiet, move |observer| {
        let result = DecompressionPipeline::new(options, observer).run(
            BufReader::new(file),
            Some(len),
            &mut sink,
        );
        (result, sink)
    })
    .with_context(|| format!("decompressing {}", input.display()))?;

    if let Summary::Decompressed {
        input_bytes,
        output_bytes,
    } = summary
    {
        if !quiet {
            println!(
                "{} -> {}: {input_bytes} bytes in, {output_bytes} bytes out",
                input.display(),
                output.display(),
            );
        }
    }
    Ok(())
}

/// Run a pipeline on a worker thread, drawing its events on this one.
///
/// On failure, whatever the job wrote to its sink is removed.
fn run_with_progress<F>(quiet: bool, job: F) -> anyhow::Result<Summary>
where
    F: FnOnce(Sender<Event>) -> (hz::Result<Summary>, LazyFile) + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let worker = thread::spawn(move || job(tx));

    let bar = if quiet {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(PROGRESS_TICKS);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent:>3}% {msg}")?
                .progress_chars("#>-"),
        );
        bar
    };

    // Ends once the pipeline, and with it the sender, is dropped.
    for event in rx {
        match event {
            Event::Status(message) => bar.set_message(message),
            Event::Progress(fraction) => {
                bar.set_position((fraction * PROGRESS_TICKS as f64).round() as u64)
            }
            Event::Finished(Ok(_)) => bar.finish(),
            Event::Finished(Err(_)) => bar.abandon(),
        }
    }

    let (result, sink) = worker
        .join()
        .map_err(|_| anyhow!("pipeline thread panicked"))?;

    if result.is_err() {
        sink.discard()?;
    }
    Ok(result?)
}

const PROGRESS_TICKS: u64 = 1000;

fn inspect(input: &Path, layout: Layout) -> anyhow::Result<()> {
    let bytes = fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let container =
        Container::decode(&bytes, layout).with_context(|| format!("parsing {}", input.display()))?;
    let table = container.table();

    println!("entries:      {}", table.len());
    println!("payload bits: {}", container.payload_bits());
    println!("payload size: {} bytes", container.payload().len());
    println!("longest code: {} bits", table.max_code_len());

    for (byte, code) in table.iter() {
        let printable = if byte.is_ascii_graphic() {
            format!("{:?}", byte as char)
        } else {
            String::new()
        };
        let packed = bits::pack(code.iter().by_vals());

        println!(
            "{byte:#04x} {printable:>5} {:>3} {:<24} {}",
            code.len(),
            BitString(code).to_string(),
            hex::encode(packed.bytes()),
        );
    }
    Ok(())
}

/// An output file that is only created by the first write, so a run that
/// fails before writing leaves nothing behind.
struct LazyFile {
    path: PathBuf,
    file: Option<BufWriter<File>>,
}

impl LazyFile {
    fn new(path: PathBuf) -> Self {
        Self { path, file: None }
    }

    /// Remove the file again, if it was created.
    fn discard(self) -> io::Result<()> {
        if let Some(file) = self.file {
            drop(file);
            debug!(path = %self.path.display(), "removing partial output");
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

impl Write for LazyFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let file = match self.file.take() {
            Some(file) => file,
            None => BufWriter::new(File::create(&self.path)?),
        };
        self.file.insert(file).write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.file {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("notes.hz", "notes" ; "strips hz")]
    #[test_case("archive.tar.hz", "archive.tar" ; "keeps inner extension")]
    #[test_case("notes.bin", "notes.bin.out" ; "appends out")]
    #[test_case("notes", "notes.out" ; "no extension")]
    fn decompressed_names(input: &str, expected: &str) {
        assert_eq!(decompressed_name(Path::new(input)), PathBuf::from(expected));
    }

    #[test]
    fn lazy_file_is_created_on_write() -> anyhow::Result<()> {
        let path = std::env::temp_dir().join(format!("hz-lazy-{}", std::process::id()));
        let _ = fs::remove_file(&path);

        let mut sink = LazyFile::new(path.clone());
        sink.flush()?;
        assert!(!path.exists());

        sink.write_all(b"data")?;
        sink.flush()?;
        assert_eq!(fs::read(&path)?, b"data");

        sink.discard()?;
        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn cli_parses() {
        let cli = Cli::try_parse_from(["hz", "--legacy", "compress", "in.txt", "-o", "out.hz"])
            .unwrap();
        assert!(cli.legacy);
        assert_eq!(cli.chunk_size, DEFAULT_CHUNK_SIZE);
        assert!(matches!(
            cli.command,
            Command::Compress { output: Some(_), .. }
        ));
    }
}

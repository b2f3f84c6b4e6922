//! Static Huffman compression, with the code table stored alongside the
//! payload in a `.hz` container.
//!
//! For in-memory data use [`compress`] and [`decompress`]. To stream from a
//! file, watch progress, or cancel mid-way, drive a [`CompressionPipeline`]
//! or [`DecompressionPipeline`] directly.
//!
//! ```
//! let container = hz::compress(b"abracadabra")?;
//! assert_eq!(hz::decompress(&container)?, b"abracadabra");
//! # Ok::<(), hz::Error>(())
//! ```

pub mod bits;
mod cancel;
mod chunks;
pub mod code_table;
mod config;
pub mod container;
mod errors;
pub mod frequency;
pub mod observer;
pub mod pipeline;
pub mod tree;

use std::io::Cursor;

pub use crate::cancel::{CancelHandle, Cancellable};
pub use crate::code_table::{BitString, Code, CodeTable};
pub use crate::config::{Options, DEFAULT_CHUNK_SIZE};
pub use crate::container::{Container, Layout};
pub use crate::errors::{Error, Result};
pub use crate::observer::{Event, Observer, Summary};
pub use crate::pipeline::{CompressionPipeline, DecompressionPipeline};

/// Compress `input` into a container with default options.
pub fn compress(input: &[u8]) -> Result<Vec<u8>> {
    compress_with(input, &Options::default())
}

pub fn compress_with(input: &[u8], options: &Options) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    CompressionPipeline::new(options.clone(), ()).run(
        Cursor::new(input),
        Some(input.len() as u64),
        &mut out,
    )?;
    Ok(out)
}

/// Decompress a container produced by [`compress`].
pub fn decompress(container: &[u8]) -> Result<Vec<u8>> {
    decompress_with(container, &Options::default())
}

/// `options.layout` must match the layout the container was written with.
pub fn decompress_with(container: &[u8], options: &Options) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    DecompressionPipeline::new(options.clone(), ()).run(
        container,
        Some(container.len() as u64),
        &mut out,
    )?;
    Ok(out)
}

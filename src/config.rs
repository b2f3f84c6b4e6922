use crate::{container::Layout, Error, Result};

/// Default size of each read from the input source.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Tunables shared by both pipelines.
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    /// Upper bound on the bytes pulled from the source per read.
    pub chunk_size: usize,

    /// Whether containers record the exact payload bit length.
    pub layout: Layout,

    /// Smallest increase in a stage's progress fraction that gets reported.
    /// The final 1.0 of a stage is always reported.
    pub progress_step: f64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            layout: Layout::Sized,
            progress_step: 0.01,
        }
    }
}

impl Options {
    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidOptions("chunk size must be non-zero".into()));
        }

        if !(0.0..=1.0).contains(&self.progress_step) {
            let msg = format!("progress step must be within [0, 1], got {}", self.progress_step);
            return Err(Error::InvalidOptions(msg));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test]
    fn defaults_are_valid() {
        Options::default().validate().unwrap();
    }

    #[test_case(Options::default().with_chunk_size(0) ; "zero chunk size")]
    #[test_case(Options { progress_step: 1.5, ..Options::default() } ; "step above one")]
    #[test_case(Options { progress_step: f64::NAN, ..Options::default() } ; "nan step")]
    fn rejects(options: Options) {
        assert!(matches!(options.validate(), Err(Error::InvalidOptions(_))));
    }
}

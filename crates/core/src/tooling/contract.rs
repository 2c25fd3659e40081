//! Invocation contract of the external codec executable.
//!
//! The compressor reads and writes fixed file names relative to its current
//! directory, which is why every job runs it inside its own workspace.
//!
//! ```text
//! compressor <input.wav>    -> ./compressed.bin
//! compressor -d             ./compressed.bin -> ./output.wav
//! metrics <a.wav> <b.wav>   -> text report on stdout
//! ```

/// File the compressor writes on compress and reads on decompress.
pub const COMPRESSED_INTERMEDIATE: &str = "compressed.bin";

/// File the compressor writes on decompress.
pub const RECONSTRUCTED_INTERMEDIATE: &str = "output.wav";

/// Flag that switches the compressor into decompression mode.
pub const DECOMPRESS_FLAG: &str = "-d";

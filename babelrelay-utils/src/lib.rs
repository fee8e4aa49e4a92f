//! Helpers shared by babelrelay crates.

pub mod audio;

pub use audio::{concat_chunks, detect_audio_format, label_buffer, retain_tail};

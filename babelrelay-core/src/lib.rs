//! Core traits and types for the babelrelay speech routing library
//!
//! This crate provides the capability contracts every provider implements and the
//! error types the resilience layer classifies.

pub mod audio;
pub mod capability;
pub mod error;
pub mod stt;
pub mod translate;
pub mod tts;

pub use audio::*;
pub use capability::*;
pub use error::*;
pub use stt::*;
pub use translate::*;
pub use tts::*;

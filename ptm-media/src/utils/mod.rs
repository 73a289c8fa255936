//! Utility modules for ptm-media

pub mod audio_decoder;

pub use audio_decoder::decode_envelope;

// Purpose - external interfaces: decoding encoded audio into PCM

pub mod decoder;

pub use decoder::{DecodeError, Decoder, PcmBuffer, WavDecoder};

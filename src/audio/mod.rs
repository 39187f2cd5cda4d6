// Audio engine module
// Uses Symphonia for decoding and cpal for output

pub mod adapter;
pub mod decoder;
pub mod engine;
pub mod output;
pub mod resampler;

pub use adapter::EngineAdapter;
pub use engine::SymphoniaEngine;

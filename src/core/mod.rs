pub mod audio;
pub mod dsp;
pub mod engine;
pub mod isolator;
pub mod separator;

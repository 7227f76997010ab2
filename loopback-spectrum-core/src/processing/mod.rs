pub mod downmix;
pub mod gain;
pub mod spectrum;

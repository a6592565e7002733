//! Demo-data simulation: a scripted scenario and a throttled streamer that
//! feeds it through ordinary event intake. Mirrors `original_source/app/sim/`.

pub mod dataset;
pub mod streamer;

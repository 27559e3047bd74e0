// ABOUTME: File-replay / load-testing pipeline: plays back captured frames against a live server
// ABOUTME: Grounded on the original project's internal/tcp/replayer.go and internal/player package

mod pipeline;
mod player;

pub use pipeline::{run, PipelineConfig};
pub use player::{ReplayConfig, ReplayError, Replayer};

pub mod checkpoint;
pub mod hub;

pub use checkpoint::{resolve, Checkpoint, CheckpointLocation, WeightFiles};
pub use hub::HubClient;

pub mod aggregator;
pub mod digest;
pub mod partitioner;
pub mod prompts;
pub mod registry;
pub mod selector;

pub use aggregator::{PerformanceSummary, ResponseAggregator};
pub use partitioner::{partition, ChunkPartitioner};
pub use registry::BackendRegistry;
pub use selector::{BackendSelector, SelectionPolicy};

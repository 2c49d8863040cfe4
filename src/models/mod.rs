pub mod backend;
pub mod chunk;
pub mod loaders;
pub mod query_result;
pub mod record;

pub use backend::{BackendDescriptor, BackendKind};
pub use chunk::{ChunkDigest, RecordChunk, SizeStats};
pub use loaders::{load_all_record_files, load_config_toml, load_records_from_json};
pub use query_result::QueryResult;
pub use record::{Protocol, TrafficRecord};

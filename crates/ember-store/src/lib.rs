mod keyspace;
mod quicklist;
mod value;

pub use keyspace::{DEFAULT_TTL_SAMPLE_SIZE, Keyspace, StoreError};
pub use quicklist::{DEFAULT_NODE_CAP, Quicklist};
pub use value::{Value, ValueKind};

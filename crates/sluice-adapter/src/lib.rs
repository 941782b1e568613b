mod memory;
mod object;
mod response;
mod storage;

pub use memory::{MemoryObjectStore, MemoryResponseCache};
pub use object::{ObjectMetadata, ObjectStore, StoredObject};
pub use response::{CachedResponse, ResponseCache, max_age_of};
pub use storage::FilesystemStorage;

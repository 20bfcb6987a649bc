mod memory;
mod traits;
mod types;

pub use memory::MemoryStore;
pub use traits::Store;
pub use types::{
    DeleteRequest, GetOutput, GetRequest, PutRequest, TableSpec, TableStatus, Throughput,
    WriteOutput,
};

pub mod codec;
pub use codec::CodecError;
mod config;
pub use config::{
    DEFAULT_COLD_WINDOW, DEFAULT_PAGE_SIZE, DEFAULT_RETRY_DELAY, DEFAULT_SHUTDOWN_PAGE_PAUSE,
    DEFAULT_SHUTDOWN_RETRIES, DEFAULT_TICK_PAGE_PAUSE, DrainConfig,
};
mod document_key;
pub use document_key::DocumentKey;
mod entity_id;
pub use entity_id::EntityId;
mod tracked;
pub use tracked::{EntityState, Tracked};
mod unix_timestamp;
pub use unix_timestamp::UnixTimestamp;
mod update;
pub use update::{BulkWriteResult, UpdateDescriptor, WriteOrdering};

/// Asset Storage Layer
///
/// Persistent key-value storage for assets. It provides:
/// - The structured `Value`/`Payload` model and the `Asset` record
/// - Atomic snapshot files (write temp, sync, rename)
/// - The `AssetStore` with lock-free snapshot reads and a single writer

// Asset and payload type definitions
pub mod types;

// Snapshot envelope and atomic file replacement
pub mod snapshot;

// ArcSwap-backed store with write-through persistence
pub mod store;

// Re-export commonly used types
pub use snapshot::SnapshotFile;
pub use store::AssetStore;
pub use types::{Asset, AssetFilter, Metadata, Payload, Value};

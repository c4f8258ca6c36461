#[cfg(feature = "file-watcher")]
pub mod file_watcher;
pub mod self_write;
pub mod types;

#[cfg(feature = "file-watcher")]
pub use file_watcher::StoreWatcher;

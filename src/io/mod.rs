//! IO modules - side effects (network, filesystem, archives)

pub mod delta;
pub mod download;
pub mod store;

pub use download::DownloadError;
pub use store::{DirStore, EntryStore, StoreError, ZipStore};

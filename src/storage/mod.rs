//! 产物存储：执行日志、失败截图、下载的文档

pub mod blob_store;
pub mod http_store;
pub mod local_store;
pub mod publisher;
pub mod session_state;

pub use blob_store::{BlobKind, BlobStore};
pub use http_store::HttpBlobStore;
pub use local_store::LocalBlobStore;
pub use publisher::{publish_report, PublishedArtifacts};
pub use session_state::{SavedSession, SessionStateStore};

//! 业务能力层（Services）
//!
//! 每个门户一个 `ProviderAdapter`，通过 `AdapterRegistry` 按供应商查找；
//! 凭据通过 `CredentialProvider` 只读提供。

pub mod adapter;
pub mod credentials;
pub mod del_sud;
pub mod monroe;
pub mod portal;
pub mod registry;
pub mod suizo;

pub use adapter::{ProviderAdapter, RowReference, SearchResult};
pub use credentials::{CredentialProvider, EnvCredentials, StaticCredentials};
pub use del_sud::DelSudAdapter;
pub use monroe::MonroeAdapter;
pub use portal::PortalSettings;
pub use registry::AdapterRegistry;
pub use suizo::SuizoAdapter;

//! A filesystem view of a cloud object store.
//!
//! The store has no directories of its own: objects carry names and parent
//! links, names are matched case-insensitively and need not be unique. This
//! crate resolves slash-separated paths against that graph, stages file
//! content in local scratch files, and uploads it when a handle is closed.
//!
//! ```no_run
//! use drivefs::{DriveConfig, DriveFs};
//!
//! # async fn demo() -> drivefs::Result<()> {
//! let fs = DriveFs::connect(DriveConfig::from_env()?)?;
//! fs.makedirs("/reports/2024", true).await?;
//! fs.write_bytes("/reports/2024/summary.csv", b"a,b\n1,2\n").await?;
//! for name in fs.listdir("/reports/2024").await? {
//!     println!("{name}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod fs;
pub mod http;
pub mod info;
pub mod memory;
pub mod mode;
pub mod object;
pub mod path;
pub mod query;
pub mod resolver;
pub mod staged;
pub mod subfs;

pub use backend::{Backend, ListRequest, ObjectPage, UploadSession, UploadStatus, UploadTarget};
pub use config::{DriveConfig, load_config};
pub use error::{Error, Result};
pub use fs::DriveFs;
pub use http::HttpBackend;
pub use info::{Info, InfoUpdate};
pub use memory::MemoryBackend;
pub use mode::Mode;
pub use object::ObjectRecord;
pub use query::Query;
pub use staged::{OpenOptions, StagedFile};
pub use subfs::SubDriveFs;

#[cfg(test)]
mod tests;

//! hffs: a filesystem interface over Hugging Face Hub repositories
//!
//! Model, dataset and space repositories are exposed through the usual
//! filesystem verbs (list, stat, glob, read, write, copy, move, delete).
//! Reads are lazy ranged downloads; every mutation becomes one commit.
//!
//! # Architecture
//!
//! - **Paths**: `hf://[datasets/|spaces/]<repo_id>[@<revision>]/<path>` parsing
//!   and Hub URL building (`path`).
//! - **Hub clients**: the `HubClient` trait and its HTTP and in-memory
//!   implementations, including the LFS upload protocol (`hub`).
//! - **Filesystem**: the generic `FileSystem` trait with default algorithms
//!   for find/glob/du/copy (`filesystem`), implemented for Hub repositories by
//!   `HfFileSystem` (`hf`).
//!
//! # Example
//!
//! ```no_run
//! use hffs::config::Config;
//! use hffs::filesystem::FileSystem;
//! use hffs::hf::HfFileSystem;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load(None)?;
//! let fs = HfFileSystem::from_config(&config)?;
//!
//! for path in fs.glob("hf://datasets/squad/**/*.parquet").await? {
//!     println!("{}", path);
//! }
//! let _readme = fs.cat("hf://gpt2/README.md").await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod env;
pub mod error;
pub mod filesystem;
pub mod hf;
pub mod hub;
pub mod path;

pub use error::{HffsError, Result};
pub use filesystem::{FileInfo, FileSystem, FileType};
pub use hf::{CommitOptions, HfFileSystem, HfFileSystemOptions, OpenMode};

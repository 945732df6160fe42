//! # rtube
//!
//! Deciphers the scrambled signatures and throttle parameters that a video
//! site's player script applies to stream URLs, and assembles signed streams
//! from a watch page.
//!
//! The player script is analysed once: the signature transform plan and the
//! throttle program are extracted into a [`Cipher`], which is then applied to
//! any number of URLs.
//!
//! ## Example
//!
//! ```rust,no_run
//! use rtube::{PlayerConfig, PlayerStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PlayerStore::new(PlayerConfig::default())?;
//!     let streams = store.streams("https://www.youtube.com/watch?v=dQw4w9WgXcQ").await?;
//!
//!     if let Some(stream) = streams.get_by_itag(18) {
//!         println!("{} -> {}", stream.default_filename(), stream.url);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod core;
pub mod error;
pub mod platform;
pub mod utils;

// Re-export main types
pub use crate::core::{Stream, StreamContext, StreamQuery};
pub use error::RtubeError;
pub use platform::{Cipher, PlayerConfig, PlayerStore};

/// Result type alias for rtube operations
pub type Result<T> = std::result::Result<T, RtubeError>;

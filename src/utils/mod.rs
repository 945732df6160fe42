//! Utility functions for rtube

pub mod filename;
pub mod mime;
pub mod parser;
pub mod retry;
pub mod url;

pub use filename::*;
pub use mime::*;
pub use self::url::*;

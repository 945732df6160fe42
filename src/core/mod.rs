//! Watch page extraction and stream assembly

pub mod extract;
pub mod stream;

pub use extract::{initial_player_response, js_url, publish_date};
pub use stream::{build_streams, Stream, StreamContext, StreamQuery};

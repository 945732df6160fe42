//! Player script analysis and stream URL signing

pub mod cipher;
pub mod patterns;
pub mod player;
pub mod response;
pub mod signing;
pub mod throttle;
pub mod transform;

pub use cipher::Cipher;
pub use player::{HttpFetcher, PlayerConfig, PlayerStore, ScriptFetcher};
pub use response::{FormatData, PlayerResponse, StreamingData};
pub use signing::{apply_descrambler, apply_signature, sign_url};
pub use throttle::{ThrottleOp, ThrottleProgram};
pub use transform::{TransformOp, TransformPlan};

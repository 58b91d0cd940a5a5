pub mod answer;
pub mod common;
pub mod completions;
pub mod discard;
pub mod show;
pub mod submit;
pub mod sync;
pub mod toggle;

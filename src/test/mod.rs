
pub use test_helper::*;

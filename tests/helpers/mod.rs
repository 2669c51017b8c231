#![allow(dead_code, unused_imports)]
pub mod test_app;
pub mod test_db;

pub use test_app::*;
pub use test_db::*;

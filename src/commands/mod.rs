// Operations exposed to the surrounding application

pub mod storage;

pub use storage::*;

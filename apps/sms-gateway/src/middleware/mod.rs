//! 中间件

pub mod access;

pub use access::*;

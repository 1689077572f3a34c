//! Handlers 模块

pub mod health;
pub mod links;
pub mod metrics;
pub mod sms;

pub use health::*;
pub use links::*;
pub use metrics::*;
pub use sms::*;

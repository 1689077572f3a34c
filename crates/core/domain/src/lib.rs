pub mod delivery;
pub mod link;
pub mod message;
pub mod permissions;

pub use delivery::{DeliveryReport, DeliveryState};
pub use link::{ConnectionRecord, LinkType, SendCommand};
pub use message::{Concatenation, MessageStatus, Priority, SendRequest, SubmissionRecord};

/// 当前 Unix 毫秒时间戳。
pub fn now_epoch_ms() -> i64 {
    let now = std::time::SystemTime::now();
    let duration = now
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    duration.as_millis() as i64
}

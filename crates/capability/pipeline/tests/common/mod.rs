#![allow(dead_code)]

use async_trait::async_trait;
use domain::SendCommand;
use smsgw_link::{DeviceDispatcher, DispatchError};
use smsgw_storage::{DEVICE_TYPE_LINK, DeviceRecord};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Clone, Copy)]
pub enum Failure {
    NotConnected,
    Transport,
}

/// 记录每次下发并按设备注入失败。
#[derive(Default)]
pub struct RecordingDispatcher {
    sent: Mutex<Vec<(String, SendCommand)>>,
    failures: HashMap<String, Failure>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, device_id: &str, failure: Failure) -> Self {
        self.failures.insert(device_id.to_string(), failure);
        self
    }

    pub fn sent(&self) -> Vec<(String, SendCommand)> {
        self.sent.lock().expect("lock").clone()
    }
}

#[async_trait]
impl DeviceDispatcher for RecordingDispatcher {
    async fn send(&self, device_id: &str, command: &SendCommand) -> Result<(), DispatchError> {
        self.sent
            .lock()
            .expect("lock")
            .push((device_id.to_string(), command.clone()));
        match self.failures.get(device_id) {
            Some(Failure::NotConnected) => {
                Err(DispatchError::NotConnected(format!("no live link for {}", device_id)))
            }
            Some(Failure::Transport) => Err(DispatchError::Transport("timeout".to_string())),
            None => Ok(()),
        }
    }
}

pub fn device(device_id: &str, group_id: &str, online: bool) -> DeviceRecord {
    DeviceRecord {
        device_id: device_id.to_string(),
        name: format!("Device {}", device_id),
        device_group_id: Some(group_id.to_string()),
        device_group_name: Some(format!("Group {}", group_id)),
        site_id: Some("site-1".to_string()),
        site_name: Some("HQ".to_string()),
        online,
        device_type: DEVICE_TYPE_LINK.to_string(),
        carrier_name: Some("Carrier".to_string()),
        sim_phone_number: Some("+15550000000".to_string()),
        default_sim_slot: Some(1),
    }
}

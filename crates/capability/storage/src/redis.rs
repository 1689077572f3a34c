//! Redis 链路注册表实现
//!
//! 键布局：
//! - `smsgw:link:{device_id}` → JSON 链路记录（SET EX）
//! - `smsgw:instance:{instance_id}:links` → 设备 ID 集合（同 TTL）
//!
//! 写路径全部用 Lua 脚本完成，单次调用即原子 upsert/delete。

use crate::error::StorageError;
use crate::registry::LinkRegistry;
use domain::{ConnectionRecord, LinkType};
use redis::AsyncCommands;

const LINK_KEY_PREFIX: &str = "smsgw:link:";
const INSTANCE_KEY_PREFIX: &str = "smsgw:instance:";
const INSTANCE_KEY_SUFFIX: &str = ":links";

/// KEYS[1] 链路键，KEYS[2] 新实例索引；
/// ARGV: payload, ttl, instance_id, 实例键前缀, 实例键后缀, device_id
const STORE_SCRIPT: &str = r#"
local prev = redis.call('GET', KEYS[1])
if prev then
  local ok, rec = pcall(cjson.decode, prev)
  if ok and type(rec) == 'table' and rec['instance_id'] and rec['instance_id'] ~= ARGV[3] then
    redis.call('SREM', ARGV[4] .. rec['instance_id'] .. ARGV[5], ARGV[6])
  end
end
redis.call('SET', KEYS[1], ARGV[1], 'EX', tonumber(ARGV[2]))
redis.call('SADD', KEYS[2], ARGV[6])
redis.call('EXPIRE', KEYS[2], tonumber(ARGV[2]))
return 1
"#;

/// KEYS[1] 链路键；ARGV: ts_ms, ttl, 实例键前缀, 实例键后缀, device_id
const HEARTBEAT_SCRIPT: &str = r#"
local raw = redis.call('GET', KEYS[1])
if not raw then return false end
local ok, rec = pcall(cjson.decode, raw)
if not ok or type(rec) ~= 'table' then return false end
rec['last_heartbeat_ms'] = tonumber(ARGV[1])
local encoded = cjson.encode(rec)
redis.call('SET', KEYS[1], encoded, 'EX', tonumber(ARGV[2]))
if rec['instance_id'] then
  local index = ARGV[3] .. rec['instance_id'] .. ARGV[4]
  redis.call('SADD', index, ARGV[5])
  redis.call('EXPIRE', index, tonumber(ARGV[2]))
end
return encoded
"#;

/// KEYS[1] 链路键，KEYS[2] 实例索引；ARGV: instance_id, device_id
const REMOVE_SCRIPT: &str = r#"
local raw = redis.call('GET', KEYS[1])
if raw then
  local ok, rec = pcall(cjson.decode, raw)
  if (not ok) or type(rec) ~= 'table' or rec['instance_id'] == ARGV[1] then
    redis.call('DEL', KEYS[1])
  end
end
redis.call('SREM', KEYS[2], ARGV[2])
return 1
"#;

/// KEYS[1] 链路键；ARGV: stale_before_ms, 实例键前缀, 实例键后缀, device_id
const REMOVE_IF_STALE_SCRIPT: &str = r#"
local raw = redis.call('GET', KEYS[1])
if not raw then return 0 end
local ok, rec = pcall(cjson.decode, raw)
if ok and type(rec) == 'table' then
  local last = tonumber(rec['last_heartbeat_ms'])
  if last and last >= tonumber(ARGV[1]) then return 0 end
end
redis.call('DEL', KEYS[1])
if ok and type(rec) == 'table' and rec['instance_id'] then
  redis.call('SREM', ARGV[2] .. rec['instance_id'] .. ARGV[3], ARGV[4])
end
return 1
"#;

#[derive(serde::Serialize, serde::Deserialize)]
struct LinkPayload {
    device_id: String,
    device_group_id: Option<String>,
    site_id: Option<String>,
    link_type: String,
    handicapped: bool,
    connected_at_ms: i64,
    last_heartbeat_ms: i64,
    instance_id: String,
}

impl From<&ConnectionRecord> for LinkPayload {
    fn from(record: &ConnectionRecord) -> Self {
        Self {
            device_id: record.device_id.clone(),
            device_group_id: record.device_group_id.clone(),
            site_id: record.site_id.clone(),
            link_type: record.link_type.as_str().to_string(),
            handicapped: record.handicapped,
            connected_at_ms: record.connected_at_ms,
            last_heartbeat_ms: record.last_heartbeat_ms,
            instance_id: record.instance_id.clone(),
        }
    }
}

impl LinkPayload {
    fn into_record(self) -> ConnectionRecord {
        ConnectionRecord {
            link_type: LinkType::parse(&self.link_type).unwrap_or_default(),
            device_id: self.device_id,
            device_group_id: self.device_group_id,
            site_id: self.site_id,
            handicapped: self.handicapped,
            connected_at_ms: self.connected_at_ms,
            last_heartbeat_ms: self.last_heartbeat_ms,
            instance_id: self.instance_id,
        }
    }
}

fn link_key(device_id: &str) -> String {
    format!("{}{}", LINK_KEY_PREFIX, device_id)
}

fn instance_key(instance_id: &str) -> String {
    format!("{}{}{}", INSTANCE_KEY_PREFIX, instance_id, INSTANCE_KEY_SUFFIX)
}

fn live_members(members: Vec<String>, values: Vec<Option<String>>) -> Vec<String> {
    let mut device_ids: Vec<String> = members
        .into_iter()
        .zip(values)
        .filter_map(|(device_id, value)| value.map(|_| device_id))
        .collect();
    device_ids.sort();
    device_ids
}

fn decode_payload(data: &str) -> Result<ConnectionRecord, StorageError> {
    let payload: LinkPayload = serde_json::from_str(data)?;
    Ok(payload.into_record())
}

/// Redis 链路注册表。
pub struct RedisLinkRegistry {
    client: redis::Client,
    ttl_seconds: u64,
}

impl RedisLinkRegistry {
    pub fn new(client: redis::Client, ttl_seconds: u64) -> Self {
        Self {
            client,
            ttl_seconds: ttl_seconds.max(1),
        }
    }

    pub fn connect(redis_url: &str, ttl_seconds: u64) -> Result<Self, StorageError> {
        let client = redis::Client::open(redis_url)
            .map_err(|err| StorageError::connection(err.to_string()))?;
        Ok(Self::new(client, ttl_seconds))
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, StorageError> {
        self.client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(|err| StorageError::connection(err.to_string()))
    }
}

#[async_trait::async_trait]
impl LinkRegistry for RedisLinkRegistry {
    async fn store(&self, record: &ConnectionRecord) -> Result<(), StorageError> {
        let mut connection = self.connection().await?;
        let data = serde_json::to_string(&LinkPayload::from(record))?;
        redis::Script::new(STORE_SCRIPT)
            .key(link_key(&record.device_id))
            .key(instance_key(&record.instance_id))
            .arg(data)
            .arg(self.ttl_seconds)
            .arg(&record.instance_id)
            .arg(INSTANCE_KEY_PREFIX)
            .arg(INSTANCE_KEY_SUFFIX)
            .arg(&record.device_id)
            .invoke_async::<_, i64>(&mut connection)
            .await?;
        Ok(())
    }

    async fn heartbeat(
        &self,
        device_id: &str,
        ts_ms: i64,
    ) -> Result<ConnectionRecord, StorageError> {
        let mut connection = self.connection().await?;
        let data: Option<String> = redis::Script::new(HEARTBEAT_SCRIPT)
            .key(link_key(device_id))
            .arg(ts_ms)
            .arg(self.ttl_seconds)
            .arg(INSTANCE_KEY_PREFIX)
            .arg(INSTANCE_KEY_SUFFIX)
            .arg(device_id)
            .invoke_async(&mut connection)
            .await?;
        let Some(data) = data else {
            return Err(StorageError::not_found(format!(
                "link not registered: {}",
                device_id
            )));
        };
        decode_payload(&data)
    }

    async fn lookup(&self, device_id: &str) -> Result<Option<ConnectionRecord>, StorageError> {
        let mut connection = self.connection().await?;
        let data: Option<String> = connection.get(link_key(device_id)).await?;
        let Some(data) = data else {
            return Ok(None);
        };
        decode_payload(&data).map(Some)
    }

    async fn remove(&self, device_id: &str, instance_id: &str) -> Result<(), StorageError> {
        let mut connection = self.connection().await?;
        redis::Script::new(REMOVE_SCRIPT)
            .key(link_key(device_id))
            .key(instance_key(instance_id))
            .arg(instance_id)
            .arg(device_id)
            .invoke_async::<_, i64>(&mut connection)
            .await?;
        Ok(())
    }

    async fn list_by_instance(&self, instance_id: &str) -> Result<Vec<String>, StorageError> {
        let mut connection = self.connection().await?;
        let members: Vec<String> = connection.smembers(instance_key(instance_id)).await?;
        if members.is_empty() {
            return Ok(members);
        }
        // 索引集合不随链接键过期，按链接键是否仍存在过滤
        let keys: Vec<String> = members.iter().map(|id| link_key(id)).collect();
        let values: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut connection)
            .await?;
        Ok(live_members(members, values))
    }

    async fn list_all(&self) -> Result<Vec<ConnectionRecord>, StorageError> {
        let mut connection = self.connection().await?;
        let pattern = format!("{}*", LINK_KEY_PREFIX);
        let mut cursor: u64 = 0;
        let mut items = Vec::new();
        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut connection)
                .await?;
            if !keys.is_empty() {
                let values: Vec<Option<String>> = redis::cmd("MGET")
                    .arg(&keys)
                    .query_async(&mut connection)
                    .await?;
                for value in values {
                    // 并发删除或内容损坏的条目直接跳过
                    let Some(value) = value else { continue };
                    let Ok(record) = decode_payload(&value) else {
                        continue;
                    };
                    items.push(record);
                }
            }
            if next_cursor == 0 {
                break;
            }
            cursor = next_cursor;
        }
        Ok(items)
    }

    async fn remove_if_stale(
        &self,
        device_id: &str,
        stale_before_ms: i64,
    ) -> Result<bool, StorageError> {
        let mut connection = self.connection().await?;
        let removed: i64 = redis::Script::new(REMOVE_IF_STALE_SCRIPT)
            .key(link_key(device_id))
            .arg(stale_before_ms)
            .arg(INSTANCE_KEY_PREFIX)
            .arg(INSTANCE_KEY_SUFFIX)
            .arg(device_id)
            .invoke_async(&mut connection)
            .await?;
        Ok(removed == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_follow_layout() {
        assert_eq!(link_key("dev-1"), "smsgw:link:dev-1");
        assert_eq!(instance_key("gw-a"), "smsgw:instance:gw-a:links");
    }

    #[test]
    fn payload_round_trips_link_type() {
        let record = ConnectionRecord::new("dev-1", "gw-a", LinkType::Console, 10);
        let data = serde_json::to_string(&LinkPayload::from(&record)).expect("encode");
        let decoded = decode_payload(&data).expect("decode");
        assert_eq!(decoded, record);
    }

    #[test]
    fn index_members_without_live_key_are_dropped() {
        let members = vec!["dev-2".to_string(), "dev-1".to_string(), "dev-3".to_string()];
        let values = vec![Some("{}".to_string()), None, Some("{}".to_string())];
        assert_eq!(
            live_members(members, values),
            vec!["dev-2".to_string(), "dev-3".to_string()]
        );
    }

    #[test]
    fn corrupt_payload_is_an_error() {
        assert!(decode_payload("{not json").is_err());
    }
}

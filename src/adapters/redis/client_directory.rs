//! Redis-backed client directory.
//!
//! Records are JSON strings under `client:<id>` with a TTL. Operations that
//! read and rewrite a record run as Lua scripts so each is one atomic step
//! on the server.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::Script;

use crate::domain::foundation::{ClientId, ServerId};
use crate::domain::relay::{ClientRecord, QueueAdmission};
use crate::ports::{server_key, ClientDirectory, StoreError};

const MARK_QUEUED: &str = r#"
local raw = redis.call('GET', KEYS[1])
if not raw then return 'unknown' end
local rec = cjson.decode(raw)
if rec.partner_id and rec.partner_id ~= cjson.null then return 'matched' end
if rec.in_queue then return 'queued' end
rec.in_queue = true
redis.call('SET', KEYS[1], cjson.encode(rec), 'KEEPTTL')
return 'admitted'
"#;

const CLEAR_QUEUED: &str = r#"
local raw = redis.call('GET', KEYS[1])
if not raw then return 0 end
local rec = cjson.decode(raw)
rec.in_queue = false
redis.call('SET', KEYS[1], cjson.encode(rec), 'KEEPTTL')
return 1
"#;

const PAIR: &str = r#"
if KEYS[1] == KEYS[2] then return 0 end
local raw_a = redis.call('GET', KEYS[1])
local raw_b = redis.call('GET', KEYS[2])
if not raw_a or not raw_b then return 0 end
local a = cjson.decode(raw_a)
local b = cjson.decode(raw_b)
if (a.partner_id and a.partner_id ~= cjson.null) or (b.partner_id and b.partner_id ~= cjson.null) then
  return 0
end
if a.in_queue ~= true or b.in_queue ~= true then return 0 end
a.partner_id = ARGV[2]
a.in_queue = false
b.partner_id = ARGV[1]
b.in_queue = false
redis.call('SET', KEYS[1], cjson.encode(a), 'EX', ARGV[3])
redis.call('SET', KEYS[2], cjson.encode(b), 'EX', ARGV[3])
return 1
"#;

// The partner's key is derived inside the script, so this is not safe under
// Redis Cluster slot routing.
const UNPAIR: &str = r#"
local raw = redis.call('GET', KEYS[1])
if not raw then return false end
local rec = cjson.decode(raw)
local partner = rec.partner_id
if not partner or partner == cjson.null then return false end
rec.partner_id = nil
redis.call('SET', KEYS[1], cjson.encode(rec), 'EX', ARGV[2])
local partner_key = ARGV[3] .. partner
local partner_raw = redis.call('GET', partner_key)
if partner_raw then
  local prec = cjson.decode(partner_raw)
  if prec.partner_id == ARGV[1] then
    prec.partner_id = nil
    redis.call('SET', partner_key, cjson.encode(prec), 'EX', ARGV[2])
  end
end
return partner
"#;

/// Client directory stored in Redis.
#[derive(Clone)]
pub struct RedisClientDirectory {
    conn: MultiplexedConnection,
    mark_queued: Script,
    clear_queued: Script,
    pair: Script,
    unpair: Script,
}

impl RedisClientDirectory {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self {
            conn,
            mark_queued: Script::new(MARK_QUEUED),
            clear_queued: Script::new(CLEAR_QUEUED),
            pair: Script::new(PAIR),
            unpair: Script::new(UNPAIR),
        }
    }
}

fn unavailable(e: redis::RedisError) -> StoreError {
    StoreError::Redis(e.to_string())
}

#[async_trait]
impl ClientDirectory for RedisClientDirectory {
    async fn register(&self, record: &ClientRecord, ttl_secs: u64) -> Result<(), StoreError> {
        let json =
            serde_json::to_string(record).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(ClientRecord::key(&record.id))
            .arg(json)
            .arg("EX")
            .arg(ttl_secs)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(unavailable)
    }

    async fn get(&self, id: &ClientId) -> Result<Option<ClientRecord>, StoreError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = redis::cmd("GET")
            .arg(ClientRecord::key(id))
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;

        raw.map(|json| {
            serde_json::from_str(&json).map_err(|e| StoreError::Serialization(e.to_string()))
        })
        .transpose()
    }

    async fn remove(&self, id: &ClientId) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("DEL")
            .arg(ClientRecord::key(id))
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(unavailable)
    }

    async fn mark_queued(&self, id: &ClientId) -> Result<QueueAdmission, StoreError> {
        let mut conn = self.conn.clone();
        let outcome: String = self
            .mark_queued
            .key(ClientRecord::key(id))
            .invoke_async(&mut conn)
            .await
            .map_err(unavailable)?;

        match outcome.as_str() {
            "admitted" => Ok(QueueAdmission::Admitted),
            "queued" => Ok(QueueAdmission::AlreadyQueued),
            "matched" => Ok(QueueAdmission::AlreadyMatched),
            "unknown" => Ok(QueueAdmission::UnknownClient),
            other => Err(StoreError::Serialization(format!(
                "unexpected mark_queued result: {}",
                other
            ))),
        }
    }

    async fn clear_queued(&self, id: &ClientId) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _found: i64 = self
            .clear_queued
            .key(ClientRecord::key(id))
            .invoke_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn pair(&self, a: &ClientId, b: &ClientId, ttl_secs: u64) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let linked: i64 = self
            .pair
            .key(ClientRecord::key(a))
            .key(ClientRecord::key(b))
            .arg(a.to_string())
            .arg(b.to_string())
            .arg(ttl_secs)
            .invoke_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(linked == 1)
    }

    async fn unpair(&self, id: &ClientId, ttl_secs: u64) -> Result<Option<ClientId>, StoreError> {
        let mut conn = self.conn.clone();
        let former: Option<String> = self
            .unpair
            .key(ClientRecord::key(id))
            .arg(id.to_string())
            .arg(ttl_secs)
            .arg("client:")
            .invoke_async(&mut conn)
            .await
            .map_err(unavailable)?;

        former
            .map(|raw| {
                raw.parse::<ClientId>()
                    .map_err(|e| StoreError::Serialization(e.to_string()))
            })
            .transpose()
    }

    async fn refresh_server(&self, server_id: &ServerId, ttl_secs: u64) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(server_key(server_id))
            .arg("alive")
            .arg("EX")
            .arg(ttl_secs)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(unavailable)
    }

    async fn is_server_alive(&self, server_id: &ServerId) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("EXISTS")
            .arg(server_key(server_id))
            .query_async::<_, bool>(&mut conn)
            .await
            .map_err(unavailable)
    }
}

impl std::fmt::Debug for RedisClientDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisClientDirectory").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn directory() -> RedisClientDirectory {
        let client = redis::Client::open("redis://127.0.0.1/").unwrap();
        RedisClientDirectory::new(client.get_multiplexed_tokio_connection().await.unwrap())
    }

    async fn registered(directory: &RedisClientDirectory) -> ClientId {
        let id = ClientId::new();
        let record = ClientRecord::new(id, "10.0.0.1", ServerId::new("relay-test"));
        directory.register(&record, 60).await.unwrap();
        id
    }

    #[tokio::test]
    #[ignore] // Requires Redis: cargo test -- --ignored
    async fn queued_flag_round_trips_through_lua() {
        let directory = directory().await;
        let id = registered(&directory).await;

        assert_eq!(directory.mark_queued(&id).await.unwrap(), QueueAdmission::Admitted);
        assert_eq!(directory.mark_queued(&id).await.unwrap(), QueueAdmission::AlreadyQueued);
        assert!(directory.get(&id).await.unwrap().unwrap().in_queue);

        directory.clear_queued(&id).await.unwrap();
        assert!(!directory.get(&id).await.unwrap().unwrap().in_queue);
        directory.remove(&id).await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires Redis: cargo test -- --ignored
    async fn pair_and_unpair_are_symmetric() {
        let directory = directory().await;
        let a = registered(&directory).await;
        let b = registered(&directory).await;

        // Neither is waiting yet.
        assert!(!directory.pair(&a, &b, 60).await.unwrap());
        directory.mark_queued(&a).await.unwrap();
        directory.mark_queued(&b).await.unwrap();

        assert!(directory.pair(&a, &b, 60).await.unwrap());
        assert!(!directory.pair(&a, &b, 60).await.unwrap());
        assert_eq!(directory.get(&a).await.unwrap().unwrap().partner_id, Some(b));
        assert_eq!(directory.get(&b).await.unwrap().unwrap().partner_id, Some(a));

        assert_eq!(directory.unpair(&b, 60).await.unwrap(), Some(a));
        assert_eq!(directory.unpair(&a, 60).await.unwrap(), None);
        assert_eq!(directory.get(&a).await.unwrap().unwrap().partner_id, None);

        directory.remove(&a).await.unwrap();
        directory.remove(&b).await.unwrap();
    }
}

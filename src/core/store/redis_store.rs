use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::{ConnectionManager, PubSub};
use redis::{AsyncCommands, Client, Script};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::core::store::{EventStream, LockHandle, Store, StoreEvent, UPDATE_LOCK};

/// Pub/sub channel shared by all replicas.
const CHANNEL: &str = "default";

/// Lease of the update lock. A crashed leader blocks updates at most this long.
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(10);

const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(1);

/// Deletes the lock only if it still carries our token, so releasing after
/// the lease expired never frees somebody else's lock.
const RELEASE_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end
"#;

/// Renews the lease only while the lock still carries our token.
const EXTEND_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("pexpire", KEYS[1], ARGV[2])
else
    return 0
end
"#;

/// Redis backed store for deployments with more than one replica.
///
/// Values are stored as compact JSON strings. Events travel over a single
/// Redis channel as `<event_type>:<json>`.
pub struct RedisStore {
    client: Client,
    conn: ConnectionManager,
    lock_ttl: Duration,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self> {
        info!("Connecting to Redis on {}..", redact_url(url));

        let client = Client::open(url).context("invalid Redis URL")?;
        let conn = ConnectionManager::new(client.clone())
            .await
            .context("failed to connect to Redis")?;

        Ok(Self {
            client,
            conn,
            lock_ttl: DEFAULT_LOCK_TTL,
        })
    }

    pub fn with_lock_ttl(mut self, lock_ttl: Duration) -> Self {
        self.lock_ttl = lock_ttl;
        self
    }
}

async fn subscribe(client: &Client) -> Result<PubSub> {
    let mut pubsub = client
        .get_async_pubsub()
        .await
        .context("failed to open Redis pub/sub connection")?;
    pubsub
        .subscribe(CHANNEL)
        .await
        .context("failed to subscribe to Redis channel")?;
    Ok(pubsub)
}

pub(crate) fn encode_event(event_type: &str, payload: &Value) -> Result<String> {
    Ok(format!("{}:{}", event_type, serde_json::to_string(payload)?))
}

pub(crate) fn decode_event(raw: &str) -> Result<StoreEvent> {
    let (event_type, data) = raw
        .split_once(':')
        .ok_or_else(|| anyhow!("message without event type"))?;
    let payload = serde_json::from_str(data).context("message payload is not JSON")?;
    Ok(StoreEvent::new(event_type, payload))
}

/// Hides the password part of a Redis URL for logging.
fn redact_url(url: &str) -> String {
    match reqwest::Url::parse(url) {
        Ok(mut parsed) if parsed.password().is_some() => {
            let _ = parsed.set_password(Some("***"));
            parsed.to_string()
        }
        Ok(parsed) => parsed.to_string(),
        Err(_) => "<invalid url>".to_string(),
    }
}

#[async_trait]
impl Store for RedisStore {
    fn kind(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(key).await?;
        raw.map(|s| serde_json::from_str(&s))
            .transpose()
            .with_context(|| format!("value of {key} is not JSON"))
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut conn = self.conn.clone();
        let encoded = serde_json::to_string(&value)?;
        let _: () = conn.set(key, encoded).await?;
        Ok(())
    }

    async fn acquire_lock(&self) -> Result<Option<LockHandle>> {
        let mut conn = self.conn.clone();
        let handle = LockHandle::new(UPDATE_LOCK);

        let reply: Option<String> = redis::cmd("SET")
            .arg(&handle.resource)
            .arg(&handle.token)
            .arg("NX")
            .arg("PX")
            .arg(self.lock_ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await?;

        Ok(reply.map(|_| handle))
    }

    async fn extend_lock(&self, lock: &LockHandle) -> Result<bool> {
        let mut conn = self.conn.clone();
        let extended: i64 = Script::new(EXTEND_SCRIPT)
            .key(&lock.resource)
            .arg(&lock.token)
            .arg(self.lock_ttl.as_millis() as u64)
            .invoke_async(&mut conn)
            .await?;

        if extended == 0 {
            warn!("Lease of lock {} ran out", lock);
        }
        Ok(extended == 1)
    }

    async fn release_lock(&self, lock: LockHandle) -> Result<()> {
        let mut conn = self.conn.clone();
        let deleted: i64 = Script::new(RELEASE_SCRIPT)
            .key(&lock.resource)
            .arg(&lock.token)
            .invoke_async(&mut conn)
            .await?;

        if deleted == 0 {
            debug!("Lock {} had already expired", lock);
        }
        Ok(())
    }

    async fn publish(&self, event_type: &str, payload: Value) -> Result<()> {
        let mut conn = self.conn.clone();
        let message = encode_event(event_type, &payload)?;
        let _: i64 = conn.publish(CHANNEL, message).await?;
        Ok(())
    }

    async fn listen(&self) -> Result<EventStream> {
        // subscribe before returning so the listener is live for the caller
        let first = subscribe(&self.client).await?;
        let client = self.client.clone();

        let stream = async_stream::stream! {
            let mut pending = Some(first);
            loop {
                let pubsub = match pending.take() {
                    Some(pubsub) => pubsub,
                    None => match subscribe(&client).await {
                        Ok(pubsub) => pubsub,
                        Err(e) => {
                            warn!("Redis resubscribe failed: {:#}", e);
                            tokio::time::sleep(RESUBSCRIBE_DELAY).await;
                            continue;
                        }
                    },
                };

                let mut messages = pubsub.into_on_message();
                while let Some(message) = messages.next().await {
                    let decoded = message
                        .get_payload::<String>()
                        .map_err(anyhow::Error::from)
                        .and_then(|raw| decode_event(&raw));
                    match decoded {
                        Ok(event) => yield event,
                        Err(e) => warn!("Dropping malformed pub/sub message: {:#}", e),
                    }
                }

                warn!("Redis subscription closed, resubscribing..");
                tokio::time::sleep(RESUBSCRIBE_DELAY).await;
            }
        };

        Ok(Box::pin(stream))
    }
}

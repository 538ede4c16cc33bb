//! Redis-backed store
//!
//! Dials a multiplexed async connection and runs every command on the one
//! connection owned by the supervisor.

use std::fmt;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, RedisError, RedisResult};
use tokio::task::JoinHandle;

use super::connector::{spawn_connector, ConnectionState, Connector, Dialer, Lease};
use super::retry::RetryPolicy;
use super::{KvStore, StoreError, StoreResult};

impl From<RedisError> for StoreError {
    fn from(err: RedisError) -> Self {
        if err.is_connection_refusal() {
            StoreError::Refused(err.to_string())
        } else if err.is_connection_dropped() {
            StoreError::Closed(err.to_string())
        } else if err.is_io_error() || err.is_timeout() {
            StoreError::Transport(err.to_string())
        } else {
            StoreError::Command(err.to_string())
        }
    }
}

// == Redis Dialer ==
/// Opens connections to the Redis server named by a `redis://` URL.
pub struct RedisDialer {
    client: Client,
    url: String,
}

impl RedisDialer {
    /// Parses the URL without connecting.
    pub fn new(url: impl Into<String>) -> StoreResult<Self> {
        let url = url.into();
        let client =
            Client::open(url.as_str()).map_err(|e| StoreError::InvalidUrl(e.to_string()))?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl Dialer for RedisDialer {
    type Conn = MultiplexedConnection;

    fn describe(&self) -> String {
        self.url.clone()
    }

    async fn dial(&self) -> StoreResult<MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }
}

// == Redis Store ==
/// Production [`KvStore`] talking to Redis through the supervised connection.
#[derive(Clone)]
pub struct RedisStore {
    connector: Connector<RedisDialer>,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore")
            .field("state", &self.connector.state())
            .finish()
    }
}

impl RedisStore {
    /// Starts connecting to `url` in the background.
    ///
    /// Only a malformed URL fails here; an unreachable server is handled by
    /// the reconnection policy.
    pub fn connect(url: &str, policy: RetryPolicy) -> StoreResult<(Self, JoinHandle<()>)> {
        let dialer = RedisDialer::new(url)?;
        let (connector, handle) = spawn_connector(dialer, policy);
        Ok((Self { connector }, handle))
    }

    pub fn state(&self) -> ConnectionState {
        self.connector.state()
    }

    /// Stops reconnecting and fails every queued or later command.
    pub fn close(&self) {
        self.connector.close();
    }

    fn settle<T>(&self, lease: &Lease<MultiplexedConnection>, result: RedisResult<T>) -> StoreResult<T> {
        result.map_err(|err| {
            let err = StoreError::from(err);
            self.connector.report(lease, &err);
            err
        })
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut lease = self.connector.acquire().await?;
        let result: RedisResult<Option<String>> = lease.conn.get(key).await;
        self.settle(&lease, result)
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<Option<String>> {
        let mut lease = self.connector.acquire().await?;
        let result: RedisResult<Option<String>> = lease.conn.set(key, value).await;
        self.settle(&lease, result)
    }

    async fn incr(&self, key: &str) -> StoreResult<i64> {
        let mut lease = self.connector.acquire().await?;
        let result: RedisResult<i64> = lease.conn.incr(key, 1i64).await;
        self.settle(&lease, result)
    }

    async fn decr(&self, key: &str) -> StoreResult<i64> {
        let mut lease = self.connector.acquire().await?;
        let result: RedisResult<i64> = lease.conn.decr(key, 1i64).await;
        self.settle(&lease, result)
    }
}

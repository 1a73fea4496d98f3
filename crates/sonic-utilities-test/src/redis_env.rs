//! Containerised Redis for integration tests.
//!
//! One container serves every SONiC database; each [`DbId`] maps to its
//! usual database number inside it.

use std::time::Duration;

use anyhow::{Context, Result};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, RedisResult};
use sonic_utilities_common::{DbId, RedisConfig, RedisStore};
use testcontainers::{
    core::{ContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage,
};
use tracing::debug;

/// Redis test environment with a containerised Redis instance
pub struct RedisTestEnv {
    _container: ContainerAsync<GenericImage>,
    pub host: String,
    pub port: u16,
}

impl RedisTestEnv {
    /// Starts a Redis container and waits until it accepts connections.
    pub async fn start() -> Result<Self> {
        let container = GenericImage::new("redis", "7-alpine")
            .with_exposed_port(ContainerPort::Tcp(6379))
            .with_wait_for(WaitFor::message_on_stdout("Ready to accept connections"))
            .start()
            .await
            .context("starting redis container")?;

        let host = container.get_host().await?.to_string();
        let port = container.get_host_port_ipv4(6379).await?;
        let env = Self {
            _container: container,
            host,
            port,
        };

        let client = env.client(DbId::ConfigDb)?;
        for _ in 0..5 {
            match client.get_multiplexed_tokio_connection().await {
                Ok(_) => break,
                Err(_) => tokio::time::sleep(Duration::from_millis(200)).await,
            }
        }
        debug!(host = %env.host, port = env.port, "Redis test container ready");
        Ok(env)
    }

    /// Store configuration for one database in the container.
    pub fn redis_config(&self, db_id: DbId) -> RedisConfig {
        RedisConfig::new(self.host.clone(), self.port, db_id)
    }

    /// Connects a [`RedisStore`] to one database in the container.
    pub async fn store(&self, db_id: DbId) -> Result<RedisStore> {
        RedisStore::connect(self.redis_config(db_id))
            .await
            .with_context(|| format!("connecting to {}", db_id.name()))
    }

    fn client(&self, db_id: DbId) -> RedisResult<Client> {
        Client::open(self.redis_config(db_id).uri())
    }

    /// Raw connection to one database, for seeding and inspection.
    pub async fn connection(&self, db_id: DbId) -> RedisResult<MultiplexedConnection> {
        self.client(db_id)?.get_multiplexed_tokio_connection().await
    }

    /// Flushes every database.
    pub async fn flush_all(&self) -> RedisResult<()> {
        let mut conn = self.connection(DbId::ConfigDb).await?;
        redis::cmd("FLUSHALL").query_async::<()>(&mut conn).await
    }

    pub async fn keys(&self, db_id: DbId, pattern: &str) -> RedisResult<Vec<String>> {
        let mut conn = self.connection(db_id).await?;
        conn.keys(pattern).await
    }

    pub async fn hgetall(&self, db_id: DbId, key: &str) -> RedisResult<Vec<(String, String)>> {
        let mut conn = self.connection(db_id).await?;
        conn.hgetall(key).await
    }

    pub async fn hset(&self, db_id: DbId, key: &str, field: &str, value: &str) -> RedisResult<()> {
        let mut conn = self.connection(db_id).await?;
        conn.hset(key, field, value).await
    }
}

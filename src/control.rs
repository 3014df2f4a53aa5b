//! Control service behind the TCP server.
//!
//! Bundles one cache, one offline queue and one network monitor, and maps
//! protocol requests onto them. Queued writes are replayed against the
//! service's own cache: `set` and `clear-key` actions are applied, anything
//! else is rejected and retried until the queue gives up on it.

use bytes::BytesMut;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::cache::RequestCache;
use crate::command::{Command, Request};
use crate::config::{CacheConfig, QueueConfig};
use crate::error::{OfflineError, OfflineResult};
use crate::metrics::PerformanceMonitor;
use crate::network::NetworkMonitor;
use crate::queue::OfflineQueue;
use crate::utils::buffer_to_line;

/// Largest request a connection may send.
pub const MAX_REQUEST_BYTES: usize = 1024 * 1024;

/// Apply one queued write to `cache`.
///
/// `set` expects `{"key": .., "value": ..}`; a non-string value is stored as
/// its JSON text. `clear-key` expects `{"key": ..}`.
pub fn apply_write(cache: &RequestCache<String>, action: &str, payload: &Value) -> OfflineResult<()> {
    let key = payload
        .get("key")
        .and_then(Value::as_str)
        .ok_or_else(|| OfflineError::InvalidPayload(format!("'{}' requires a string \"key\"", action)))?;

    match Command::parse(action) {
        Ok(Command::Set) => {
            let value = match payload.get("value") {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => {
                    return Err(OfflineError::InvalidPayload(
                        "'set' requires a \"value\"".to_string(),
                    ))
                }
            };
            cache.set(key, value);
            Ok(())
        }
        Ok(Command::ClearKey) => {
            cache.clear(key);
            Ok(())
        }
        _ => Err(OfflineError::UnknownAction(action.to_string())),
    }
}

/// The state a control server shares across connections.
#[derive(Debug, Clone)]
pub struct ControlService {
    cache: RequestCache<String>,
    queue: OfflineQueue,
    monitor: NetworkMonitor,
    metrics: PerformanceMonitor,
}

impl ControlService {
    pub fn new(cache_config: CacheConfig, queue_config: QueueConfig, initially_online: bool) -> Self {
        Self {
            cache: RequestCache::new(cache_config),
            queue: OfflineQueue::new(queue_config),
            monitor: NetworkMonitor::new(initially_online),
            metrics: PerformanceMonitor::new(),
        }
    }

    pub fn cache(&self) -> &RequestCache<String> {
        &self.cache
    }

    pub fn queue(&self) -> &OfflineQueue {
        &self.queue
    }

    pub fn monitor(&self) -> &NetworkMonitor {
        &self.monitor
    }

    /// Handling times, one metric per request named after its command.
    pub fn metrics(&self) -> &PerformanceMonitor {
        &self.metrics
    }

    /// Start replaying the queue whenever the monitor comes back online.
    pub fn spawn_auto_sync(&self) -> JoinHandle<()> {
        let cache = self.cache.clone();
        self.queue.sync_on_reconnect(&self.monitor, move |action, payload| {
            let result = apply_write(&cache, &action, &payload);
            async move { result }
        })
    }

    /// Handle one request and produce the response line.
    pub async fn handle(&self, request: &Request) -> OfflineResult<String> {
        debug!(command = %request.command, "handling control request");

        let response = match request.command {
            Command::Ping => "PONG".to_string(),

            Command::Get => self.cache.get(request.arg(0)).unwrap_or_default(),

            Command::Set => {
                let key = request.arg(0);
                let existed = self.cache.contains(key);
                self.cache.set(key, request.arg(1).to_string());
                let reply = if existed { "r Ok" } else { "Ok" };
                reply.to_string()
            }

            Command::ClearKey => {
                if self.cache.clear(request.arg(0)) {
                    "Ok".to_string()
                } else {
                    String::new()
                }
            }

            Command::ClearAll => {
                self.cache.clear_all();
                "Ok".to_string()
            }

            Command::Size => self.cache.size().to_string(),

            Command::Stats => {
                let stats = self.cache.stats();
                format!(
                    "hits:{} misses:{} size:{} expirations:{} hit_rate:{:.1}% queued:{} online:{}",
                    stats.hits,
                    stats.misses,
                    stats.size,
                    stats.expirations,
                    stats.hit_rate,
                    self.queue.size(),
                    self.monitor.get_is_online()
                )
            }

            Command::Enqueue => {
                let payload: Value = serde_json::from_str(request.arg(1))?;
                self.queue.enqueue(request.arg(0), payload)
            }

            Command::Queue => serde_json::to_string(&self.queue.get_queue())?,

            Command::Online | Command::Offline => {
                let online = request.command == Command::Online;
                self.monitor.set_online(online);
                let reply = if online { "online" } else { "offline" };
                reply.to_string()
            }

            Command::Metrics => serde_json::to_string(&self.metrics.report())?,

            Command::Sync => {
                let cache = self.cache.clone();
                let report = self
                    .queue
                    .sync_all(move |action, payload| {
                        let result = apply_write(&cache, &action, &payload);
                        async move { result }
                    })
                    .await;
                serde_json::to_string(&report)?
            }
        };

        Ok(response)
    }

    /// Serve one connection: read the request up to EOF, write the response,
    /// then shut down the write half.
    ///
    /// The client half-closes after sending, so a request split across many
    /// reads arrives whole.
    pub async fn serve<S>(&self, stream: &mut S) -> OfflineResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut buf = BytesMut::with_capacity(1024);
        let mut too_large = false;
        while stream.read_buf(&mut buf).await? > 0 {
            if buf.len() > MAX_REQUEST_BYTES {
                too_large = true;
                break;
            }
        }
        if buf.is_empty() {
            return Ok(());
        }

        let response = if too_large {
            format!(
                "ERR {}",
                OfflineError::ParseError(format!("request exceeds {} bytes", MAX_REQUEST_BYTES))
            )
        } else {
            match buffer_to_line(&mut buf) {
                Ok(line) => self.respond(&line).await,
                Err(e) => format!("ERR {}", e),
            }
        };

        stream.write_all(response.as_bytes()).await?;
        stream.shutdown().await?;
        Ok(())
    }

    /// Parse and handle a raw request line, rendering errors as `ERR ...`.
    pub async fn respond(&self, line: &str) -> String {
        let result = match Request::parse(line) {
            Ok(request) => {
                self.metrics
                    .measure(request.command.as_str(), self.handle(&request))
                    .await
            }
            Err(err) => Err(err),
        };
        result.unwrap_or_else(|err| format!("ERR {}", err))
    }
}

impl Default for ControlService {
    fn default() -> Self {
        Self::new(CacheConfig::default(), QueueConfig::default(), true)
    }
}

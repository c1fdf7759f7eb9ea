//! Per-invocation tool-client construction and caching
//!
//! Authenticated tool clients are expensive to construct (a transport
//! handshake per client), so the factory caches them per
//! `(principal, agent, tool set)` and reuses them across invocations while
//! the originating credential stays valid. Validity is re-checked on every
//! hit, not just at insert: a cached client whose principal has expired is
//! evicted before it can be handed out again.
//!
//! Construction never fails upward. A missing or invalid principal, or a
//! failed authenticated connect, degrades to an unauthenticated client over
//! the same transport, logged as a warning so the degraded mode is visible.

use super::client::ToolClient;
use super::transport::ToolConnector;
use crate::auth::Principal;
use crate::config::ToolClientCacheConfig;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeSet, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Cache key: who, for which agent, over which exact tool set
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ClientCacheKey {
    principal_hash: String,
    agent_id: String,
    tool_set_hash: u64,
}

impl ClientCacheKey {
    fn new(principal: Option<&Principal>, agent_id: &str, tools: &BTreeSet<String>) -> Self {
        let principal_hash = principal
            .map(Principal::cache_hash)
            .unwrap_or_else(|| "anonymous".to_string());

        // BTreeSet iterates sorted, so identical sets hash identically
        let mut hasher = DefaultHasher::new();
        for tool in tools {
            tool.hash(&mut hasher);
        }

        Self {
            principal_hash,
            agent_id: agent_id.to_string(),
            tool_set_hash: hasher.finish(),
        }
    }
}

/// A cached client plus the facts needed to re-check its validity
struct CachedClient {
    client: Arc<ToolClient>,
    created_at: Instant,
    /// Expiry of the originating principal's token; `None` for anonymous
    /// fallback clients
    principal_expires_at: Option<DateTime<Utc>>,
}

impl CachedClient {
    fn is_stale(&self, ttl: Option<Duration>) -> bool {
        if let Some(ttl) = ttl {
            if self.created_at.elapsed() > ttl {
                return true;
            }
        }
        match self.principal_expires_at {
            Some(expires_at) => Utc::now() >= expires_at,
            None => false,
        }
    }
}

/// Cache statistics
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl CacheStats {
    /// Total cache hits
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Total cache misses
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Total evictions
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }
}

/// Builds and caches tool clients scoped to a principal, agent, and tool set
pub struct AgentToolClientFactory {
    connector: Arc<dyn ToolConnector>,
    cache: DashMap<ClientCacheKey, CachedClient>,
    config: ToolClientCacheConfig,
    stats: CacheStats,
}

impl AgentToolClientFactory {
    /// Create a factory with default cache policy
    pub fn new(connector: Arc<dyn ToolConnector>) -> Self {
        Self::with_config(connector, ToolClientCacheConfig::default())
    }

    /// Create a factory with custom cache policy
    pub fn with_config(connector: Arc<dyn ToolConnector>, config: ToolClientCacheConfig) -> Self {
        Self {
            connector,
            cache: DashMap::new(),
            config,
            stats: CacheStats::default(),
        }
    }

    /// Cache statistics
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Number of cached clients
    pub fn cached_clients(&self) -> usize {
        self.cache.len()
    }

    /// Build (or reuse) a tool client for an agent invocation.
    ///
    /// - A valid principal yields an authenticated client carrying its
    ///   bearer credential, scoped to exactly `tool_names`.
    /// - An invalid or absent principal, or a failed authenticated connect,
    ///   yields an unauthenticated fallback over the same transport.
    /// - An empty tool set yields a client with no tools and no transport
    ///   connection, bypassing the cache.
    pub async fn build(
        &self,
        agent_id: &str,
        tool_names: &[String],
        principal: Option<&Principal>,
    ) -> Arc<ToolClient> {
        if tool_names.is_empty() {
            debug!(agent_id, "no tools requested, returning detached client");
            return Arc::new(ToolClient::without_tools(agent_id));
        }

        let tools: BTreeSet<String> = tool_names.iter().cloned().collect();
        let key = ClientCacheKey::new(principal, agent_id, &tools);

        if let Some(entry) = self.cache.get(&key) {
            if entry.is_stale(self.config.client_ttl) {
                drop(entry);
                self.cache.remove(&key);
                self.stats.evictions.fetch_add(1, Ordering::Relaxed);
            } else {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                return Arc::clone(&entry.client);
            }
        }
        self.stats.misses.fetch_add(1, Ordering::Relaxed);

        let client = Arc::new(self.construct(agent_id, tools, principal).await);

        // Concurrent builders may race here; last writer wins and every
        // inserted client is fully constructed.
        if self.cache.len() < self.config.max_entries {
            self.cache.insert(
                key,
                CachedClient {
                    client: Arc::clone(&client),
                    created_at: Instant::now(),
                    principal_expires_at: principal
                        .filter(|_| client.is_authenticated())
                        .map(Principal::token_expires_at),
                },
            );
        }

        client
    }

    /// Remove every cache entry whose TTL or originating principal has
    /// expired. Safe to call from a periodic maintenance task.
    pub fn evict_expired(&self) {
        let ttl = self.config.client_ttl;
        let mut evicted = 0u64;
        self.cache.retain(|_, entry| {
            if entry.is_stale(ttl) {
                evicted += 1;
                false
            } else {
                true
            }
        });
        if evicted > 0 {
            self.stats.evictions.fetch_add(evicted, Ordering::Relaxed);
            debug!(evicted, "evicted stale tool clients");
        }
    }

    /// Drop all cached clients
    pub fn clear(&self) {
        let evicted = self.cache.len() as u64;
        self.cache.clear();
        self.stats.evictions.fetch_add(evicted, Ordering::Relaxed);
    }

    async fn construct(
        &self,
        agent_id: &str,
        tools: BTreeSet<String>,
        principal: Option<&Principal>,
    ) -> ToolClient {
        if let Some(principal) = principal {
            if principal.is_token_valid() {
                match self.connect_authenticated(principal).await {
                    Ok(transport) => {
                        debug!(
                            agent_id,
                            user_id = principal.user_id(),
                            tools = tools.len(),
                            "built authenticated tool client"
                        );
                        return ToolClient::authenticated(agent_id, tools, transport);
                    }
                    Err(e) => {
                        warn!(
                            agent_id,
                            user_id = principal.user_id(),
                            "authenticated tool client construction failed, \
                             falling back to unauthenticated: {}",
                            e
                        );
                    }
                }
            } else {
                warn!(
                    agent_id,
                    user_id = principal.user_id(),
                    "principal token invalid, falling back to unauthenticated tool client"
                );
            }
        }

        match self.connector.connect(HashMap::new()).await {
            Ok(transport) => ToolClient::unauthenticated(agent_id, tools, transport),
            Err(e) => {
                warn!(
                    agent_id,
                    "unauthenticated tool transport unavailable, returning detached client: {}", e
                );
                ToolClient::without_tools(agent_id)
            }
        }
    }

    async fn connect_authenticated(
        &self,
        principal: &Principal,
    ) -> Result<Arc<dyn super::transport::ToolTransport>, super::error::McpError> {
        let mut headers = HashMap::new();
        if let Some(token) = principal.auth_token() {
            headers.insert("Authorization".to_string(), format!("Bearer {}", token));
        }
        headers.insert(
            "X-Organization-Id".to_string(),
            principal.organization_id().to_string(),
        );
        self.connector.connect(headers).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SessionType;
    use crate::mcp::error::McpError;
    use crate::mcp::transport::ToolTransport;
    use crate::mcp::types::{McpTool, McpToolResult};
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use serde_json::Value;

    struct NullTransport;

    #[async_trait]
    impl ToolTransport for NullTransport {
        async fn list_tools(&self) -> Result<Vec<McpTool>, McpError> {
            Ok(vec![])
        }

        async fn call_tool(&self, _: &str, _: Value) -> Result<McpToolResult, McpError> {
            Ok(McpToolResult {
                content: vec![],
                is_error: false,
            })
        }
    }

    /// Connector counting connections; can be told to fail authenticated
    /// connects (those carrying an Authorization header)
    struct CountingConnector {
        connects: AtomicU64,
        fail_authenticated: bool,
    }

    impl CountingConnector {
        fn new() -> Self {
            Self {
                connects: AtomicU64::new(0),
                fail_authenticated: false,
            }
        }

        fn failing_authenticated() -> Self {
            Self {
                connects: AtomicU64::new(0),
                fail_authenticated: true,
            }
        }

        fn connects(&self) -> u64 {
            self.connects.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ToolConnector for CountingConnector {
        async fn connect(
            &self,
            headers: HashMap<String, String>,
        ) -> Result<Arc<dyn ToolTransport>, McpError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if self.fail_authenticated && headers.contains_key("Authorization") {
                return Err(McpError::connection("auth handshake refused"));
            }
            Ok(Arc::new(NullTransport))
        }
    }

    fn principal(expires_in: ChronoDuration) -> Principal {
        Principal::new(
            "user-1",
            "org-1",
            "agent@example.com",
            SessionType::Api,
            Utc::now() + expires_in,
        )
        .unwrap()
        .with_api_token("opaque-1")
    }

    fn tools(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_empty_tool_set_skips_transport() {
        let connector = Arc::new(CountingConnector::new());
        let factory = AgentToolClientFactory::new(Arc::clone(&connector) as Arc<dyn ToolConnector>);

        let client = factory
            .build("agent-1", &[], Some(&principal(ChronoDuration::hours(1))))
            .await;

        assert!(client.tool_names().is_empty());
        assert_eq!(connector.connects(), 0);
    }

    #[tokio::test]
    async fn test_valid_principal_builds_authenticated_client() {
        let factory = AgentToolClientFactory::new(Arc::new(CountingConnector::new()));

        let client = factory
            .build(
                "agent-1",
                &tools(&["create_ticket"]),
                Some(&principal(ChronoDuration::hours(1))),
            )
            .await;

        assert!(client.is_authenticated());
        assert!(client.has_tool("create_ticket"));
    }

    #[tokio::test]
    async fn test_cache_hit_skips_reconstruction() {
        let connector = Arc::new(CountingConnector::new());
        let factory = AgentToolClientFactory::new(Arc::clone(&connector) as Arc<dyn ToolConnector>);
        let p = principal(ChronoDuration::hours(1));

        let first = factory
            .build("agent-1", &tools(&["create_ticket"]), Some(&p))
            .await;
        let second = factory
            .build("agent-1", &tools(&["create_ticket"]), Some(&p))
            .await;

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(connector.connects(), 1);
        assert_eq!(factory.stats().hits(), 1);
        assert_eq!(factory.stats().misses(), 1);
    }

    #[tokio::test]
    async fn test_tool_order_does_not_fragment_cache() {
        let connector = Arc::new(CountingConnector::new());
        let factory = AgentToolClientFactory::new(Arc::clone(&connector) as Arc<dyn ToolConnector>);
        let p = principal(ChronoDuration::hours(1));

        let a = factory
            .build("agent-1", &tools(&["a_tool", "b_tool"]), Some(&p))
            .await;
        let b = factory
            .build("agent-1", &tools(&["b_tool", "a_tool"]), Some(&p))
            .await;

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(connector.connects(), 1);
    }

    #[tokio::test]
    async fn test_expired_principal_entry_evicted_on_hit() {
        let connector = Arc::new(CountingConnector::new());
        let factory = AgentToolClientFactory::new(Arc::clone(&connector) as Arc<dyn ToolConnector>);

        // Valid for a moment, long enough to be cached as authenticated
        let p = principal(ChronoDuration::milliseconds(50));
        let first = factory
            .build("agent-1", &tools(&["create_ticket"]), Some(&p))
            .await;
        assert!(first.is_authenticated());

        tokio::time::sleep(std::time::Duration::from_millis(80)).await;

        // Same key, but the originating token has expired: the stale entry
        // must be evicted and the rebuild degrades to unauthenticated.
        let second = factory
            .build("agent-1", &tools(&["create_ticket"]), Some(&p))
            .await;

        assert!(!Arc::ptr_eq(&first, &second));
        assert!(!second.is_authenticated());
        assert_eq!(factory.stats().evictions(), 1);
    }

    #[tokio::test]
    async fn test_invalid_principal_falls_back_unauthenticated() {
        let factory = AgentToolClientFactory::new(Arc::new(CountingConnector::new()));
        let expired = principal(ChronoDuration::hours(-1));

        let client = factory
            .build("agent-1", &tools(&["create_ticket"]), Some(&expired))
            .await;

        assert!(!client.is_authenticated());
        assert!(client.has_tool("create_ticket"));
    }

    #[tokio::test]
    async fn test_no_principal_goes_straight_to_fallback() {
        let factory = AgentToolClientFactory::new(Arc::new(CountingConnector::new()));

        let client = factory
            .build("agent-1", &tools(&["create_ticket"]), None)
            .await;

        assert!(!client.is_authenticated());
    }

    #[tokio::test]
    async fn test_failed_authenticated_connect_degrades() {
        let connector = Arc::new(CountingConnector::failing_authenticated());
        let factory = AgentToolClientFactory::new(Arc::clone(&connector) as Arc<dyn ToolConnector>);

        let client = factory
            .build(
                "agent-1",
                &tools(&["create_ticket"]),
                Some(&principal(ChronoDuration::hours(1))),
            )
            .await;

        // Authenticated connect refused, unauthenticated fallback succeeded
        assert!(!client.is_authenticated());
        assert!(client.has_tool("create_ticket"));
        assert_eq!(connector.connects(), 2);
    }

    #[tokio::test]
    async fn test_evict_expired_sweeps_stale_entries() {
        let connector = Arc::new(CountingConnector::new());
        let factory = AgentToolClientFactory::with_config(
            Arc::clone(&connector) as Arc<dyn ToolConnector>,
            ToolClientCacheConfig::default().with_ttl(std::time::Duration::from_millis(10)),
        );

        let _ = factory
            .build(
                "agent-1",
                &tools(&["create_ticket"]),
                Some(&principal(ChronoDuration::hours(1))),
            )
            .await;
        assert_eq!(factory.cached_clients(), 1);

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        factory.evict_expired();

        assert_eq!(factory.cached_clients(), 0);
        assert_eq!(factory.stats().evictions(), 1);
    }
}

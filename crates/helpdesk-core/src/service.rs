//! Upward-facing facade for the API layer
//!
//! Composes the history pipeline, authorization gate, token refresh, and
//! tool-client factory into the three operations the request-handling layer
//! calls. Authorization denial is an explicit error here, never a silent
//! degradation: a request that may not use a tool must be told so.

use crate::auth::{Principal, TokenRefreshManager};
use crate::context::{HistoryFormat, MessageFormatConverter, MessageHistoryProvider};
use crate::error::{HelpdeskError, HelpdeskResult};
use crate::mcp::{AgentToolClientFactory, ToolClient};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

/// Facade over the conversational-memory and tool-authorization pipeline
pub struct ChatBackend {
    history: MessageHistoryProvider,
    refresh: TokenRefreshManager,
    factory: AgentToolClientFactory,
}

impl ChatBackend {
    /// Compose a backend from its three subsystems
    pub fn new(
        history: MessageHistoryProvider,
        refresh: TokenRefreshManager,
        factory: AgentToolClientFactory,
    ) -> Self {
        Self {
            history,
            refresh,
            factory,
        }
    }

    /// History pipeline
    pub fn history(&self) -> &MessageHistoryProvider {
        &self.history
    }

    /// Token refresh manager
    pub fn refresh_manager(&self) -> &TokenRefreshManager {
        &self.refresh
    }

    /// Tool-client factory
    pub fn factory(&self) -> &AgentToolClientFactory {
        &self.factory
    }

    /// Retrieve a thread's bounded history in the requested shape.
    ///
    /// Best-effort: failures inside the pipeline produce an empty list, and
    /// the parent request proceeds without memory context.
    pub async fn get_bounded_history(
        &self,
        thread_id: Uuid,
        max_context_size: usize,
        use_memory_context: bool,
        format: HistoryFormat,
    ) -> Vec<Value> {
        let messages = self
            .history
            .get_thread_messages(thread_id, max_context_size, use_memory_context)
            .await;
        MessageFormatConverter::convert(&messages, format)
    }

    /// Authorize a tool set for a principal and build the client.
    ///
    /// Every requested tool is checked against
    /// [`Principal::can_access_tool`]; the first denial aborts with an
    /// explicit [`HelpdeskError::AccessDenied`]. When the credential is
    /// inside its refresh window it is renewed proactively before the
    /// client is built. Returns the client together with the principal that
    /// actually backs it, so callers can replace their in-flight reference
    /// after a proactive refresh.
    pub async fn authorize_and_build_tool_client(
        &self,
        principal: &Principal,
        agent_id: &str,
        tool_names: &[String],
    ) -> HelpdeskResult<(Principal, Arc<ToolClient>)> {
        for tool_name in tool_names {
            if !principal.can_access_tool(tool_name) {
                return Err(HelpdeskError::access_denied(principal.user_id(), tool_name));
            }
        }

        let active = if self.refresh.should_refresh(principal) {
            match self.refresh.refresh(principal).await {
                Some(refreshed) => {
                    info!(
                        user_id = principal.user_id(),
                        "credential refreshed proactively before tool client build"
                    );
                    refreshed
                }
                None => principal.clone(),
            }
        } else {
            principal.clone()
        };

        let client = self.factory.build(agent_id, tool_names, Some(&active)).await;
        Ok((active, client))
    }

    /// Reactive path after a downstream tool call failed with `http_status`.
    ///
    /// Delegates to the refresh state machine (only 401/403 act) and, on
    /// success, rebuilds the client under the refreshed principal. `None`
    /// means refresh was exhausted or inapplicable; the caller decides
    /// whether to proceed unauthenticated or surface an auth error.
    pub async fn handle_tool_auth_failure(
        &self,
        principal: &Principal,
        agent_id: &str,
        tool_names: &[String],
        http_status: u16,
        cancel: Option<&CancellationToken>,
    ) -> Option<(Principal, Arc<ToolClient>)> {
        let refreshed = self
            .refresh
            .handle_auth_failure(principal, http_status, cancel)
            .await?;
        let client = self
            .factory
            .build(agent_id, tool_names, Some(&refreshed))
            .await;
        Some((refreshed, client))
    }
}

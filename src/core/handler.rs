//! Client handler for upstream MCP server notifications.
//!
//! Implements RMCP's `ClientHandler` trait to handle:
//! - Tool/resource/prompt list change notifications (queued as refreshes)
//! - Progress and logging notifications (forwarded into tracing)

use std::sync::Arc;

use rmcp::{
    model::{
        CancelledNotificationParam, ClientInfo, LoggingLevel, LoggingMessageNotificationParam,
        ProgressNotificationParam, ResourceUpdatedNotificationParam,
    },
    service::NotificationContext,
    ClientHandler, RoleClient,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

#[derive(Clone, Debug)]
pub struct HubClientHandler {
    server: Arc<str>,
    client_info: ClientInfo,
    refresh_tx: Option<mpsc::Sender<String>>,
}

impl HubClientHandler {
    pub fn new(server: impl AsRef<str>) -> Self {
        let mut client_info = ClientInfo::default();
        client_info.client_info.name = "mcp-hub".to_string();
        client_info.client_info.version = env!("CARGO_PKG_VERSION").to_string();

        Self {
            server: Arc::from(server.as_ref()),
            client_info,
            refresh_tx: None,
        }
    }

    /// Wire the channel that receives the server name whenever the upstream
    /// announces a changed tool or resource list.
    #[must_use]
    pub fn with_refresh_channel(mut self, tx: mpsc::Sender<String>) -> Self {
        self.refresh_tx = Some(tx);
        self
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    fn send_refresh(&self) {
        if let Some(tx) = &self.refresh_tx {
            let _ = tx.try_send(self.server.to_string()).map_err(|e| {
                warn!(
                    server = %self.server,
                    error = %e,
                    "Failed to queue inventory refresh"
                );
            });
        }
    }
}

impl ClientHandler for HubClientHandler {
    async fn on_cancelled(
        &self,
        params: CancelledNotificationParam,
        _context: NotificationContext<RoleClient>,
    ) {
        info!(
            server = %self.server,
            request_id = %params.request_id,
            reason = ?params.reason,
            "MCP server cancelled request"
        );
    }

    async fn on_progress(
        &self,
        params: ProgressNotificationParam,
        _context: NotificationContext<RoleClient>,
    ) {
        debug!(
            server = %self.server,
            token = ?params.progress_token,
            progress = %params.progress,
            total = ?params.total,
            message = ?params.message,
            "MCP server progress"
        );
    }

    async fn on_resource_updated(
        &self,
        params: ResourceUpdatedNotificationParam,
        _context: NotificationContext<RoleClient>,
    ) {
        info!(
            server = %self.server,
            uri = %params.uri,
            "MCP server resource updated"
        );
    }

    async fn on_resource_list_changed(&self, _context: NotificationContext<RoleClient>) {
        info!(server = %self.server, "MCP server resource list changed");
        self.send_refresh();
    }

    async fn on_tool_list_changed(&self, _context: NotificationContext<RoleClient>) {
        info!(server = %self.server, "MCP server tool list changed");
        self.send_refresh();
    }

    async fn on_prompt_list_changed(&self, _context: NotificationContext<RoleClient>) {
        info!(server = %self.server, "MCP server prompt list changed");
        self.send_refresh();
    }

    fn get_info(&self) -> ClientInfo {
        self.client_info.clone()
    }

    async fn on_logging_message(
        &self,
        params: LoggingMessageNotificationParam,
        _context: NotificationContext<RoleClient>,
    ) {
        let logger = params.logger.as_deref().unwrap_or("mcp");

        match params.level {
            LoggingLevel::Emergency | LoggingLevel::Alert | LoggingLevel::Critical => {
                error!(
                    server = %self.server,
                    logger = %logger,
                    level = ?params.level,
                    "MCP: {}",
                    params.data
                );
            }
            LoggingLevel::Error => {
                error!(
                    server = %self.server,
                    logger = %logger,
                    "MCP: {}",
                    params.data
                );
            }
            LoggingLevel::Warning => {
                warn!(
                    server = %self.server,
                    logger = %logger,
                    "MCP: {}",
                    params.data
                );
            }
            LoggingLevel::Notice | LoggingLevel::Info => {
                info!(
                    server = %self.server,
                    logger = %logger,
                    "MCP: {}",
                    params.data
                );
            }
            LoggingLevel::Debug => {
                debug!(
                    server = %self.server,
                    logger = %logger,
                    "MCP: {}",
                    params.data
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_creation() {
        let handler = HubClientHandler::new("test-server");
        assert_eq!(handler.server(), "test-server");
        assert!(handler.refresh_tx.is_none());
    }

    #[test]
    fn test_client_info() {
        let handler = HubClientHandler::new("test-server");
        let info = handler.get_info();
        assert_eq!(info.client_info.name, "mcp-hub");
    }

    #[test]
    fn test_with_refresh_channel() {
        let (tx, _rx) = mpsc::channel(10);
        let handler = HubClientHandler::new("test-server").with_refresh_channel(tx);
        assert!(handler.refresh_tx.is_some());
    }

    #[tokio::test]
    async fn test_send_refresh_carries_server_name() {
        let (tx, mut rx) = mpsc::channel(10);
        let handler = HubClientHandler::new("fs").with_refresh_channel(tx);

        handler.send_refresh();
        assert_eq!(rx.recv().await.as_deref(), Some("fs"));
    }

    #[test]
    fn test_send_refresh_without_channel_is_noop() {
        let handler = HubClientHandler::new("fs");
        handler.send_refresh();
    }
}

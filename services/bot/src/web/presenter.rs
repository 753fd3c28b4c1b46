//! services/bot/src/web/presenter.rs
//!
//! `ChatPresenter` over WebSocket connections. Each connection registers an
//! outbox channel; rendering a page pushes a `render` frame into it and the
//! connection's writer task forwards it to the socket.

use async_trait::async_trait;
use dashmap::DashMap;
use lexicon_core::{ChatPresenter, ChatTarget, Control, MessageHandle, Page, PortError, PortResult};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::web::protocol::{ControlDto, PageDto, ServerMessage};

pub type Outbox = mpsc::UnboundedReceiver<ServerMessage>;

#[derive(Default)]
pub struct WsPresenter {
    connections: DashMap<ChatTarget, mpsc::UnboundedSender<ServerMessage>>,
    next_connection: AtomicU64,
}

impl WsPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new connection and returns its chat target with the receiving
    /// end of its outbox.
    pub fn register(&self) -> (ChatTarget, Outbox) {
        let n = self.next_connection.fetch_add(1, Ordering::Relaxed);
        let target = ChatTarget(format!("conn-{}", n));
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections.insert(target.clone(), tx);
        (target, rx)
    }

    pub fn unregister(&self, target: &ChatTarget) {
        self.connections.remove(target);
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Queues a frame for `target`. Fails if the connection is gone.
    pub fn send(&self, target: &ChatTarget, message: ServerMessage) -> PortResult<()> {
        let sender = self
            .connections
            .get(target)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| PortError::Unavailable(format!("Connection {} is closed", target.0)))?;
        sender
            .send(message)
            .map_err(|_| PortError::Unavailable(format!("Connection {} is closed", target.0)))
    }
}

#[async_trait]
impl ChatPresenter for WsPresenter {
    async fn render_prompt(
        &self,
        target: &ChatTarget,
        page: &Page,
        controls: &[Control],
    ) -> PortResult<MessageHandle> {
        let message_id = Uuid::new_v4().to_string();
        self.send(
            target,
            ServerMessage::Render {
                message_id: message_id.clone(),
                page: PageDto::from(page),
                controls: controls.iter().map(ControlDto::from).collect(),
            },
        )?;
        debug!("Rendered '{}' on {} as {}", page.title, target.0, message_id);
        Ok(MessageHandle(message_id))
    }

    async fn delete_message(&self, target: &ChatTarget, handle: &MessageHandle) -> PortResult<()> {
        self.send(
            target,
            ServerMessage::Delete {
                message_id: handle.0.clone(),
            },
        )
    }
}

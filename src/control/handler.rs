//! Command dispatch over the control channel

use std::sync::Arc;

use super::command::Command;
use super::response::Response;
use crate::error::{ProtocolError, SessionError};
use crate::session::{ControlChannel, SessionController};
use crate::sink::SinkConnector;

/// Serves control commands for one session
///
/// Commands are handled one at a time, each to completion, in arrival
/// order. Media fan-out does not go through the handler and is never
/// blocked by it.
pub struct CommandHandler<C: SinkConnector> {
    controller: Arc<SessionController<C>>,
}

impl<C: SinkConnector> CommandHandler<C> {
    pub fn new(controller: Arc<SessionController<C>>) -> Self {
        Self { controller }
    }

    /// Decode and execute one control message
    pub async fn handle(&self, text: &str) -> Response {
        match Command::decode(text) {
            Ok(command) => self.dispatch(command).await,
            Err(e) => {
                tracing::warn!(error = %e, "Rejected control message");
                let action = match &e {
                    ProtocolError::UnknownAction(action) => Some(action.as_str()),
                    ProtocolError::MissingField { action, .. } => Some(*action),
                    ProtocolError::Malformed(_) => None,
                };
                Response::error(action, e.to_string())
            }
        }
    }

    /// Execute a decoded command
    pub async fn dispatch(&self, command: Command) -> Response {
        let action = command.action();
        tracing::debug!(action = action, "Control command");

        if self.controller.is_closed() {
            return Response::error(Some(action), SessionError::Closed.to_string());
        }

        let result = match command {
            Command::Start => self
                .controller
                .start()
                .await
                .map(|()| Response::ok(action).with_urls(self.controller.list_urls())),
            Command::Stop => self.controller.stop().await.map(|()| Response::ok(action)),
            Command::AddUrl { url } => self
                .controller
                .add_url(&url)
                .await
                .map(|_| Response::ok(action).with_url(url)),
            Command::RemoveUrl { url } => self
                .controller
                .remove_url(&url)
                .await
                .map(|_| Response::ok(action).with_url(url)),
            Command::Status => Ok(Response::ok(action).with_status(self.controller.status())),
            Command::ListUrls => Ok(Response::ok(action).with_urls(self.controller.list_urls())),
        };

        result.unwrap_or_else(|e| {
            tracing::warn!(action = action, error = %e, "Control command failed");
            Response::error(Some(action), e.to_string())
        })
    }

    /// Serve `channel` until its incoming side closes
    pub async fn run(self, channel: ControlChannel) {
        let ControlChannel {
            mut incoming,
            outgoing,
        } = channel;

        while let Some(text) = incoming.recv().await {
            let response = self.handle(&text).await;

            let json = match response.to_json() {
                Ok(json) => json,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to encode control response");
                    continue;
                }
            };
            if outgoing.send(json).await.is_err() {
                tracing::debug!("Control channel peer gone");
                break;
            }
        }

        tracing::debug!("Control channel closed");
    }
}

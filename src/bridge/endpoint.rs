//! The collector-facing side of the relay.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::bridge::handoff::CommandHandoff;
use crate::bridge::router::CorrelationRouter;
use crate::error::BridgeResult;

/// Fetch and answer operations used by the control surface.
#[derive(Debug)]
pub struct BridgeEndpoint {
    handoff: Arc<CommandHandoff>,
    router: CorrelationRouter,
    poll_timeout: Duration,
}

impl BridgeEndpoint {
    /// Build the endpoint for `connections` upstreams.
    ///
    /// Returns the outbound receivers, one per connection, for the session writers.
    pub fn new(connections: usize, poll_timeout: Duration) -> (Self, Vec<mpsc::UnboundedReceiver<String>>) {
        let (router, outbound) = CorrelationRouter::new(connections);
        (
            Self {
                handoff: Arc::new(CommandHandoff::new()),
                router,
                poll_timeout,
            },
            outbound,
        )
    }

    /// The handoff producers offer commands on.
    pub fn handoff(&self) -> Arc<CommandHandoff> {
        self.handoff.clone()
    }

    pub fn connection_count(&self) -> usize {
        self.router.connection_count()
    }

    /// Wait for the next command, tagged with its connection.
    pub async fn fetch_next_command(&self) -> BridgeResult<String> {
        self.handoff.fetch(self.poll_timeout).await
    }

    /// Route a collector answer back to its connection.
    pub fn submit_answer(&self, body: &[u8]) -> BridgeResult<usize> {
        self.router.route_answer(body)
    }
}

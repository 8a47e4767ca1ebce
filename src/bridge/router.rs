//! Routes collector answers back to the connection their command came from.

use tokio::sync::mpsc;

use crate::bridge::correlation::CorrelatedMessage;
use crate::error::{BridgeError, BridgeResult};
use crate::observability::metrics;

/// Fixed set of per-connection outbound queues.
#[derive(Debug)]
pub struct CorrelationRouter {
    outbound: Box<[mpsc::UnboundedSender<String>]>,
}

impl CorrelationRouter {
    /// Create one queue per connection; the receivers go to the session writers.
    pub fn new(connections: usize) -> (Self, Vec<mpsc::UnboundedReceiver<String>>) {
        let (senders, receivers): (Vec<_>, Vec<_>) =
            (0..connections).map(|_| mpsc::unbounded_channel()).unzip();
        (
            Self {
                outbound: senders.into_boxed_slice(),
            },
            receivers,
        )
    }

    pub fn connection_count(&self) -> usize {
        self.outbound.len()
    }

    /// Queue a collector answer for the connection named in its id.
    ///
    /// Returns the connection index the answer was queued on.
    pub fn route_answer(&self, body: &[u8]) -> BridgeResult<usize> {
        let message = CorrelatedMessage::from_collector(body)?;
        let connection = message.id.connection();

        let queue = self.outbound.get(connection).ok_or_else(|| {
            BridgeError::Protocol(format!(
                "message id {} refers to connection {} but only {} exist",
                message.id,
                connection,
                self.outbound.len()
            ))
        })?;

        let frame = message.to_upstream_frame()?;
        queue.send(frame).map_err(|_| {
            BridgeError::Protocol(format!("outbound queue of connection {connection} is closed"))
        })?;

        metrics::record_answer_routed(connection);
        tracing::debug!(connection, id = %message.id, "Answer queued for upstream");
        Ok(connection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_routed_to_tagged_connection() {
        let (router, mut receivers) = CorrelationRouter::new(3);
        let connection = router
            .route_answer(br#"{"type":"search","id":"2-7","data":{"ok":true}}"#)
            .unwrap();
        assert_eq!(connection, 2);

        assert_eq!(
            receivers[2].try_recv().unwrap(),
            r#"{"type":"search","id":"7","data":{"ok":true}}"#
        );
        assert!(receivers[0].try_recv().is_err());
        assert!(receivers[1].try_recv().is_err());
    }

    #[test]
    fn test_out_of_range_index_rejected() {
        let (router, mut receivers) = CorrelationRouter::new(3);
        let err = router.route_answer(br#"{"type":"search","id":"5-1"}"#).unwrap_err();
        assert!(matches!(err, BridgeError::Protocol(_)));
        assert!(receivers.iter_mut().all(|r| r.try_recv().is_err()));
    }

    #[test]
    fn test_untagged_id_rejected() {
        let (router, _receivers) = CorrelationRouter::new(1);
        let err = router.route_answer(br#"{"type":"search","id":"7"}"#).unwrap_err();
        assert!(matches!(err, BridgeError::Protocol(_)));
    }

    #[test]
    fn test_no_connections_rejects_everything() {
        let (router, receivers) = CorrelationRouter::new(0);
        assert!(receivers.is_empty());
        assert_eq!(router.connection_count(), 0);
        assert!(router.route_answer(br#"{"type":"x","id":"0-1"}"#).is_err());
    }

    #[test]
    fn test_closed_queue_reported() {
        let (router, receivers) = CorrelationRouter::new(1);
        drop(receivers);
        assert!(router.route_answer(br#"{"type":"x","id":"0-1"}"#).is_err());
    }
}

//! # Listener Flows
//!
//! `TransferServer` driven by `TransferClient` over loopback sockets:
//!
//! 1. **Happy path**: one framed container in, `OK` out, container in the sink
//! 2. **Failure isolation**: malformed payloads and sink refusals close only
//!    their own connection, without a reply, even amid concurrent senders
//! 3. **Concurrency**: a stalled handler does not hold up other connections
//! 4. **Lifecycle**: stop refuses new connections but lets in-flight ones
//!    finish; repeated stop and port conflicts are reported
//! 5. **Admission**: `Reject` and `Queue` policies under load

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use futures::future::join_all;
    use parking_lot::Mutex;
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::{Notify, Semaphore};
    use tokio::time::timeout;

    use sc_transfer_listener::{
        AdmissionPolicy, ClientError, CloseError, ListenerConfig, ListenerError, ListenerState,
        SinkError, TransferClient, TransferContainer, TransferListenerApi, TransferMetadata,
        TransferServer, TransferSink,
    };

    type Transfer = TransferContainer<String, Vec<u8>>;

    const WAIT: Duration = Duration::from_secs(5);

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    /// Sink that records transfers, refuses keys in `failing`, and parks keys
    /// in `gated` until `open_gate` is called.
    struct ScriptedSink {
        received: Mutex<Vec<Transfer>>,
        failing: HashSet<String>,
        gated: HashSet<String>,
        gate: Semaphore,
        entered_gate: Notify,
    }

    impl Default for ScriptedSink {
        fn default() -> Self {
            Self {
                received: Mutex::new(Vec::new()),
                failing: HashSet::new(),
                gated: HashSet::new(),
                gate: Semaphore::new(0),
                entered_gate: Notify::new(),
            }
        }
    }

    impl ScriptedSink {
        fn failing(keys: &[&str]) -> Self {
            Self {
                failing: keys.iter().map(|k| k.to_string()).collect(),
                ..Default::default()
            }
        }

        fn gated(keys: &[&str]) -> Self {
            Self {
                gated: keys.iter().map(|k| k.to_string()).collect(),
                ..Default::default()
            }
        }

        fn open_gate(&self) {
            self.gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }

        fn keys(&self) -> Vec<String> {
            self.received.lock().iter().map(|t| t.key().clone()).collect()
        }
    }

    #[async_trait]
    impl TransferSink<String, Vec<u8>> for ScriptedSink {
        async fn add_incoming_transfer(&self, container: Transfer) -> Result<(), SinkError> {
            if self.failing.contains(container.key()) {
                return Err(SinkError::Rejected(format!("refusing {}", container.key())));
            }
            if self.gated.contains(container.key()) {
                self.entered_gate.notify_one();
                let _permit = self.gate.acquire().await.map_err(|_| SinkError::Closed)?;
            }
            self.received.lock().push(container);
            Ok(())
        }
    }

    fn loopback(port: u16) -> ListenerConfig {
        ListenerConfig::for_port(port).with_bind_address(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    async fn start_server(
        config: ListenerConfig,
        sink: Arc<ScriptedSink>,
    ) -> (TransferServer<String, Vec<u8>>, SocketAddr) {
        let mut server = TransferServer::new(config, sink);
        let addr = server.start().await.expect("listener starts");
        (server, addr)
    }

    fn transfer(key: &str) -> Transfer {
        TransferContainer::with_metadata(
            key.to_string(),
            key.as_bytes().to_vec(),
            TransferMetadata::new().with_origin("peer-a"),
        )
    }

    fn client() -> TransferClient<String, Vec<u8>> {
        TransferClient::new()
            .with_connect_timeout(WAIT)
            .with_reply_timeout(WAIT)
    }

    async fn wait_until_idle(server: &TransferServer<String, Vec<u8>>) {
        for _ in 0..100 {
            if server.active_connections() == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("handlers did not finish");
    }

    // =============================================================================
    // HAPPY PATH
    // =============================================================================

    #[tokio::test]
    async fn test_transfer_is_acknowledged_and_delivered() {
        let sink = Arc::new(ScriptedSink::default());
        let (mut server, addr) = start_server(loopback(0), sink.clone()).await;

        let sent = transfer("user:42");
        client().send(addr, &sent).await.unwrap();

        let received = sink.received.lock().clone();
        assert_eq!(received, vec![sent]);
        assert_eq!(received[0].metadata().origin.as_deref(), Some("peer-a"));

        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_many_concurrent_senders() {
        let sink = Arc::new(ScriptedSink::default());
        let (mut server, addr) = start_server(loopback(0), sink.clone()).await;
        let client = Arc::new(client());

        let sends = (0..32).map(|i| {
            let client = Arc::clone(&client);
            async move { client.send(addr, &transfer(&format!("k{i}"))).await }
        });
        let results = join_all(sends).await;

        assert!(results.iter().all(|r| r.is_ok()));
        let keys: HashSet<_> = sink.keys().into_iter().collect();
        assert_eq!(keys.len(), 32);

        server.stop().await.unwrap();
        let metrics = server.metrics();
        assert_eq!(metrics.connections_accepted, 32);
        assert_eq!(metrics.transfers_acknowledged, 32);
    }

    // =============================================================================
    // FAILURE ISOLATION
    // =============================================================================

    #[tokio::test]
    async fn test_sink_refusal_closes_without_reply() {
        let sink = Arc::new(ScriptedSink::failing(&["poison"]));
        let (mut server, addr) = start_server(loopback(0), sink.clone()).await;

        let refused = client().send(addr, &transfer("poison")).await;
        match refused {
            Err(ClientError::NotAcknowledged { reply }) => assert!(reply.is_empty()),
            other => panic!("expected unacknowledged transfer, got {other:?}"),
        }

        // The listener keeps serving
        client().send(addr, &transfer("fine")).await.unwrap();
        assert_eq!(sink.keys(), vec!["fine".to_string()]);
        assert_eq!(server.metrics().delivery_failures, 1);

        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_sink_refusal_spares_concurrent_connections() {
        let sink = Arc::new(ScriptedSink::failing(&["poison"]));
        let (mut server, addr) = start_server(loopback(0), sink.clone()).await;
        let client = Arc::new(client());

        let keys: Vec<String> = std::iter::once("poison".to_string())
            .chain((0..16).map(|i| format!("good-{i}")))
            .collect();
        let sends = keys.iter().map(|key| {
            let client = Arc::clone(&client);
            async move { (key.clone(), client.send(addr, &transfer(key)).await) }
        });

        for (key, result) in join_all(sends).await {
            if key == "poison" {
                assert!(matches!(result, Err(ClientError::NotAcknowledged { .. })));
            } else {
                assert!(result.is_ok(), "{key} not acknowledged: {result:?}");
            }
        }

        let delivered: HashSet<_> = sink.keys().into_iter().collect();
        assert_eq!(delivered.len(), 16);
        assert!(!delivered.contains("poison"));

        server.stop().await.unwrap();
        let metrics = server.metrics();
        assert_eq!(metrics.transfers_acknowledged, 16);
        assert_eq!(metrics.delivery_failures, 1);
    }

    #[tokio::test]
    async fn test_stalled_handler_does_not_block_others() {
        let sink = Arc::new(ScriptedSink::gated(&["slow"]));
        let (mut server, addr) = start_server(loopback(0), sink.clone()).await;

        let slow = tokio::spawn(async move { client().send(addr, &transfer("slow")).await });
        timeout(WAIT, sink.entered_gate.notified()).await.unwrap();

        timeout(WAIT, client().send(addr, &transfer("fast")))
            .await
            .expect("fast transfer not held up")
            .unwrap();
        assert_eq!(sink.keys(), vec!["fast".to_string()]);
        assert!(!slow.is_finished());

        sink.open_gate();
        slow.await.unwrap().unwrap();
        assert_eq!(sink.keys(), vec!["fast".to_string(), "slow".to_string()]);

        server.stop().await.unwrap();
    }

    // =============================================================================
    // LIFECYCLE
    // =============================================================================

    #[tokio::test]
    async fn test_stop_refuses_new_but_finishes_in_flight() {
        let sink = Arc::new(ScriptedSink::gated(&["in-flight"]));
        let (mut server, addr) = start_server(loopback(0), sink.clone()).await;

        let pending = tokio::spawn(async move { client().send(addr, &transfer("in-flight")).await });
        timeout(WAIT, sink.entered_gate.notified()).await.unwrap();

        server.stop().await.unwrap();
        assert!(!server.is_listening());
        assert_eq!(server.state(), ListenerState::Stopped);
        assert!(TcpStream::connect(addr).await.is_err());

        sink.open_gate();
        pending.await.unwrap().unwrap();
        assert_eq!(sink.keys(), vec!["in-flight".to_string()]);
    }

    #[tokio::test]
    async fn test_second_stop_reports_close_error() {
        let (mut server, _addr) = start_server(loopback(0), Arc::new(ScriptedSink::default())).await;

        server.stop().await.unwrap();
        let err = server.stop().await.unwrap_err();
        assert!(matches!(
            err,
            ListenerError::Close(CloseError::NotListening { .. })
        ));
        assert_eq!(server.state(), ListenerState::Stopped);
    }

    #[tokio::test]
    async fn test_port_in_use_fails_start() {
        let occupant = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let port = occupant.local_addr().unwrap().port();

        let mut server = TransferServer::new(loopback(port), Arc::new(ScriptedSink::default()));
        match server.start().await {
            Err(ListenerError::Bind { addr, .. }) => assert_eq!(addr.port(), port),
            other => panic!("expected bind failure, got {other:?}"),
        }
        assert!(!server.is_listening());
        assert!(server.local_addr().is_none());
    }

    #[tokio::test]
    async fn test_bind_convenience_listens_on_port() {
        let occupant = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let port = occupant.local_addr().unwrap().port();
        drop(occupant);

        let sink = Arc::new(ScriptedSink::default());
        let mut server = TransferServer::bind(port, sink.clone()).await.unwrap();
        assert!(server.is_listening());

        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        client().send(addr, &transfer("via-bind")).await.unwrap();
        assert_eq!(sink.keys(), vec!["via-bind".to_string()]);

        server.stop().await.unwrap();
    }

    // =============================================================================
    // ADMISSION
    // =============================================================================

    #[tokio::test]
    async fn test_reject_admission_beyond_capacity() {
        let sink = Arc::new(ScriptedSink::gated(&["holder"]));
        let config = loopback(0).with_admission(AdmissionPolicy::Reject { max_connections: 1 });
        let (mut server, addr) = start_server(config, sink.clone()).await;

        let holder = tokio::spawn(async move { client().send(addr, &transfer("holder")).await });
        timeout(WAIT, sink.entered_gate.notified()).await.unwrap();

        assert!(client().send(addr, &transfer("excess")).await.is_err());
        assert_eq!(server.metrics().connections_rejected, 1);

        sink.open_gate();
        holder.await.unwrap().unwrap();
        wait_until_idle(&server).await;

        client().send(addr, &transfer("after")).await.unwrap();
        assert_eq!(sink.keys(), vec!["holder".to_string(), "after".to_string()]);

        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_queue_admission_waits_for_slot() {
        let sink = Arc::new(ScriptedSink::gated(&["holder"]));
        let config = loopback(0).with_admission(AdmissionPolicy::Queue { max_connections: 1 });
        let (mut server, addr) = start_server(config, sink.clone()).await;

        let holder = tokio::spawn(async move { client().send(addr, &transfer("holder")).await });
        timeout(WAIT, sink.entered_gate.notified()).await.unwrap();

        let queued = tokio::spawn(async move { client().send(addr, &transfer("queued")).await });
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!queued.is_finished());
        assert!(sink.keys().is_empty());

        sink.open_gate();
        holder.await.unwrap().unwrap();
        queued.await.unwrap().unwrap();
        assert_eq!(sink.keys(), vec!["holder".to_string(), "queued".to_string()]);
        assert_eq!(server.metrics().connections_rejected, 0);

        server.stop().await.unwrap();
    }
}

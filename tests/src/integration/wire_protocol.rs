//! # Wire Protocol
//!
//! Raw-socket checks of what the listener puts on the wire, independent of
//! `TransferClient`: the exact confirmation bytes, and silence on every kind
//! of bad frame.

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::time::timeout;

    use sc_transfer_listener::{
        ChannelTransferSink, IncomingTransfers, JsonTransferCodec, ListenerConfig,
        TransferClient, TransferContainer, TransferListenerApi, TransferServer,
    };

    type Server = TransferServer<String, String>;

    const WAIT: Duration = Duration::from_secs(5);

    fn loopback() -> ListenerConfig {
        ListenerConfig::for_port(0).with_bind_address(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    async fn start(config: ListenerConfig) -> (Server, SocketAddr, IncomingTransfers<String, String>) {
        let (sink, incoming) = ChannelTransferSink::unbounded();
        let mut server = TransferServer::new(config, Arc::new(sink));
        let addr = server.start().await.unwrap();
        (server, addr, incoming)
    }

    /// Write `bytes`, half-close, and collect whatever comes back.
    async fn exchange(addr: SocketAddr, bytes: &[u8]) -> Vec<u8> {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(bytes).await.unwrap();
        stream.shutdown().await.unwrap();

        let mut reply = Vec::new();
        match timeout(WAIT, stream.read_to_end(&mut reply)).await.unwrap() {
            Ok(_) => reply,
            // Closed without reading our bytes; nothing was sent back
            Err(e) if e.kind() == std::io::ErrorKind::ConnectionReset => reply,
            Err(e) => panic!("unexpected read error: {e}"),
        }
    }

    fn frame(payload: &[u8]) -> Vec<u8> {
        let mut bytes = (payload.len() as u32).to_be_bytes().to_vec();
        bytes.extend_from_slice(payload);
        bytes
    }

    #[tokio::test]
    async fn test_confirmation_is_exactly_ok() {
        let (mut server, addr, mut incoming) = start(loopback()).await;

        let container = TransferContainer::new("k".to_string(), "v".to_string());
        let payload = bincode::serialize(&container).unwrap();

        assert_eq!(exchange(addr, &frame(&payload)).await, b"OK".to_vec());
        assert_eq!(incoming.try_recv(), Some(container));

        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_garbage_payload_gets_silence() {
        let (mut server, addr, mut incoming) = start(loopback()).await;

        let reply = exchange(addr, &frame(b"definitely not bincode")).await;
        assert!(reply.is_empty());
        assert!(incoming.try_recv().is_none());
        assert_eq!(server.metrics().deserialization_failures, 1);

        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_truncated_frame_gets_silence() {
        let (mut server, addr, mut incoming) = start(loopback()).await;

        let mut bytes = 100u32.to_be_bytes().to_vec();
        bytes.extend_from_slice(&[1, 2, 3]);
        assert!(exchange(addr, &bytes).await.is_empty());
        assert!(incoming.try_recv().is_none());

        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_frame_gets_silence() {
        let (mut server, addr, _incoming) = start(loopback()).await;

        assert!(exchange(addr, &0u32.to_be_bytes()).await.is_empty());

        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_oversized_frame_gets_silence() {
        let config = ListenerConfig {
            max_transfer_bytes: 64,
            ..loopback()
        };
        let (mut server, addr, mut incoming) = start(config).await;

        let container = TransferContainer::new("k".to_string(), "x".repeat(256));
        let payload = bincode::serialize(&container).unwrap();

        assert!(exchange(addr, &frame(&payload)).await.is_empty());
        assert!(incoming.try_recv().is_none());

        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_and_leave_is_harmless() {
        let (mut server, addr, mut incoming) = start(loopback()).await;

        assert!(exchange(addr, &[]).await.is_empty());
        assert!(incoming.try_recv().is_none());

        // Still serving afterwards
        let container = TransferContainer::new("after".to_string(), "probe".to_string());
        TransferClient::new().send(addr, &container).await.unwrap();
        assert_eq!(incoming.recv().await, Some(container));

        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_silent_peer_is_dropped_after_read_timeout() {
        let config = ListenerConfig {
            read_timeout: Some(Duration::from_millis(50)),
            ..loopback()
        };
        let (mut server, addr, _incoming) = start(config).await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        let mut reply = Vec::new();
        let read = timeout(WAIT, stream.read_to_end(&mut reply))
            .await
            .expect("listener closes idle connection");
        assert!(read.is_ok());
        assert!(reply.is_empty());
        assert_eq!(server.metrics().timeouts, 1);

        server.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_json_codec_end_to_end() {
        let (sink, mut incoming) = ChannelTransferSink::<String, String>::unbounded();
        let mut server = TransferServer::new(loopback(), Arc::new(sink))
            .with_codec(Arc::new(JsonTransferCodec::new()));
        let addr = server.start().await.unwrap();

        let container = TransferContainer::new("json".to_string(), "value".to_string());
        TransferClient::with_codec(Arc::new(JsonTransferCodec::new()))
            .send(addr, &container)
            .await
            .unwrap();
        assert_eq!(incoming.recv().await, Some(container));

        // A bincode sender is refused by a JSON listener
        let mismatched = TransferContainer::new("bin".to_string(), "value".to_string());
        assert!(TransferClient::new().send(addr, &mismatched).await.is_err());

        server.stop().await.unwrap();
    }
}

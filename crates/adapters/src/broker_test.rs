//! Broker adapter tests
//!
//! Uses a local TCP listener as the broker frontend and decodes the
//! length-prefixed frames the adapter writes.

use std::time::Duration;

use ferry_config::BrokerSettings;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;

use crate::broker::BrokerAdapter;
use crate::DestinationAdapter;

fn settings(address: &str) -> BrokerSettings {
    BrokerSettings {
        address: address.to_string(),
        topic: "events".to_string(),
        connection_timeout_secs: Some(2),
        tcp_keepalive: None,
    }
}

async fn read_frame(stream: &mut tokio::net::TcpStream) -> (String, Vec<u8>) {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).await.unwrap();
    let frame_len = u32::from_be_bytes(len_buf) as usize;

    let mut frame = vec![0u8; frame_len];
    stream.read_exact(&mut frame).await.unwrap();

    let topic_len = u16::from_be_bytes([frame[0], frame[1]]) as usize;
    let topic = String::from_utf8(frame[2..2 + topic_len].to_vec()).unwrap();
    let payload = frame[2 + topic_len..].to_vec();
    (topic, payload)
}

#[test]
fn test_rejects_empty_topic() {
    let mut s = settings("localhost:9092");
    s.topic = String::new();
    assert!(BrokerAdapter::new(&s).is_err());
}

#[tokio::test]
async fn test_send_writes_topic_framed_payload() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_frame(&mut stream).await
    });

    let adapter = BrokerAdapter::new(&settings(&address)).unwrap();
    let response = adapter.send(b"{\"event\":\"track\"}", Duration::from_secs(2)).await;
    assert_eq!(response.status_code, 200);

    let (topic, payload) = server.await.unwrap();
    assert_eq!(topic, "events");
    assert_eq!(payload, b"{\"event\":\"track\"}");

    adapter.close().await;
}

#[tokio::test]
async fn test_connection_reused_across_sends() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();

    let server = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let first = read_frame(&mut stream).await;
        let second = read_frame(&mut stream).await;
        (first, second)
    });

    let adapter = BrokerAdapter::new(&settings(&address)).unwrap();
    assert!(adapter.send(b"one", Duration::from_secs(2)).await.is_success());
    assert!(adapter.send(b"two", Duration::from_secs(2)).await.is_success());

    let ((_, p1), (_, p2)) = server.await.unwrap();
    assert_eq!(p1, b"one");
    assert_eq!(p2, b"two");
    assert_eq!(adapter.metrics().snapshot().reconnects, 1);

    adapter.close().await;
}

#[tokio::test]
async fn test_unreachable_broker_is_retryable() {
    // bind then drop to get a port with nothing listening
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    drop(listener);

    let adapter = BrokerAdapter::new(&settings(&address)).unwrap();
    let response = adapter.send(b"lost", Duration::from_secs(1)).await;

    assert_eq!(response.status_code, 503);
    assert_eq!(response.class(), crate::ResponseClass::Transient);
}

// tests/transport_nats.rs
//
// Needs a running server: NATS_URL=127.0.0.1:4222 cargo test --features
// transport_nats -- --ignored

#![cfg(feature = "transport_nats")]

use bytes::Bytes;

use mom_socket::{
    // ---
    create_nats_connector,
    Address,
    ConnectOptions,
    DialOptions,
    Error,
    Message,
    Transport,
    TransportBuilder,
    DEFAULT_ENDPOINT,
};

fn nats_url() -> String {
    std::env::var("NATS_URL").unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string())
}

#[tokio::test]
#[ignore = "requires a NATS server"]
async fn nats_closed_connection_refuses_publish_and_subscribe() {
    // ---
    // Arrange
    // ---
    let connector = create_nats_connector().expect("nats connector");
    let endpoints = mom_socket::normalize_endpoints([nats_url()]);
    let opts = ConnectOptions {
        secure: false,
        tls: None,
        timeout: None,
    };
    let bus = connector
        .connect(&endpoints, &opts)
        .await
        .expect("connect failed");
    let subject = Address::from("mom-socket.test.closed");

    // ---
    // Act
    // ---
    bus.close().await.expect("close failed");

    // ---
    // Assert
    // ---
    let err = bus
        .publish(&subject, Bytes::from_static(b"late"))
        .await
        .expect_err("publish on closed connection succeeded");
    assert!(matches!(err, Error::Transport(_)));

    let err = bus
        .subscribe_sync(&subject)
        .await
        .err()
        .expect("subscribe on closed connection succeeded");
    assert!(matches!(err, Error::Subscribe(_)));

    // Second close is a no-op.
    bus.close().await.expect("second close failed");
}

#[tokio::test]
#[ignore = "requires a NATS server"]
async fn nats_client_send_after_close_fails() {
    // ---
    let transport = TransportBuilder::new()
        .address(nats_url())
        .nats()
        .build()
        .expect("nats transport");

    let client = transport
        .dial("mom-socket.test.nobody", DialOptions::default())
        .await
        .expect("dial failed");

    client.close().await.expect("close failed");

    let err = client.send(&Message::new("late")).await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
}

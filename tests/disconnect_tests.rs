use std::time::Duration;

use anyhow::Result;
use mocktcp::{init_test_tracing, MockConfig, MockServer};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const SHORT: Duration = Duration::from_millis(100);

async fn start() -> Result<MockServer> {
    init_test_tracing();
    Ok(MockServer::start(MockConfig::default()).await?)
}

async fn failure_message(server: &MockServer) -> String {
    match server.join().await {
        Ok(()) => panic!("expected the script to fail"),
        Err(err) => err.to_string(),
    }
}

#[tokio::test]
async fn test_close_before_expect_disconnect() -> Result<()> {
    let server = start().await?;
    let mut client = server.connect().await?;
    client.close().await?;

    server.expect_connect()?;
    server.expect_disconnect()?;
    server.join().await?;
    server.stop().await?;

    // The transport is released on stop.
    let mut rest = Vec::new();
    client.read_to_end(&mut rest).await?;
    assert!(rest.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_close_after_expect_disconnect() -> Result<()> {
    let server = start().await?;
    server.expect_connect()?;
    server.expect_disconnect()?;

    let mut client = server.connect().await?;
    client.close().await?;

    server.join().await?;
    server.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_second_connection_while_awaiting_disconnect() -> Result<()> {
    let server = start().await?;
    let _first = server.connect().await?;
    server.expect_connect()?;

    let _second = TcpStream::connect(server.local_addr()).await?;
    server.expect_disconnect()?;

    assert_eq!(
        failure_message(&server).await,
        "While waiting for client to disconnect a second connection was attempted"
    );
    assert_eq!(server.metrics().duplicate_connections, 1);
    server.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_expect_disconnect_times_out() -> Result<()> {
    let server = start().await?;
    let _client = server.connect().await?;

    server.expect_connect()?;
    server.expect_disconnect_within(SHORT)?;

    assert_eq!(
        failure_message(&server).await,
        "Timed out waiting for client to disconnect. Remember to call `close()`."
    );
    server.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_expect_disconnect_receives_unexpected_bytes() -> Result<()> {
    let server = start().await?;
    let mut client = server.connect().await?;
    client.write_all(b"Hello").await?;
    client.close().await?;

    server.expect_connect()?;
    server.expect_disconnect_within(Duration::from_millis(200))?;

    assert_eq!(
        failure_message(&server).await,
        "Received unexpected data while waiting for client to disconnect. Data is b\"Hello\"."
    );
    server.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_unread_data_is_reported() -> Result<()> {
    let server = start().await?;
    server.expect_connect()?;
    let mut client = server.connect().await?;

    server.send_bytes(b"abc")?;
    server.join().await?;

    let mut first = [0u8; 1];
    client.read_exact(&mut first).await?;
    assert_eq!(&first, b"a");
    client.close().await?;

    server.expect_disconnect()?;
    assert_eq!(
        failure_message(&server).await,
        "There is data sent by server that was not read by client before \
         `expect_disconnect()` completed: unread_bytes=b\"bc\"."
    );
    server.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_unread_newline_is_escaped() -> Result<()> {
    let server = start().await?;
    server.expect_connect()?;
    let mut client = server.connect().await?;

    server.send_bytes(b"One\nTwo\n")?;
    let mut line = [0u8; 4];
    client.read_exact(&mut line).await?;
    assert_eq!(&line, b"One\n");
    client.close().await?;

    server.expect_disconnect()?;
    assert_eq!(
        failure_message(&server).await,
        "There is data sent by server that was not read by client before \
         `expect_disconnect()` completed: unread_bytes=b\"Two\\n\"."
    );
    server.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_everything_read_then_disconnect() -> Result<()> {
    let server = start().await?;
    server.expect_connect()?;
    server.send_bytes(b"Hola!")?;
    server.expect_disconnect()?;

    let mut client = server.connect().await?;
    let mut buf = [0u8; 5];
    client.read_exact(&mut buf).await?;
    client.close().await?;

    server.join().await?;
    assert_eq!(server.sent_bytes(), server.read_bytes());
    server.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_shutdown_without_close_ack_times_out() -> Result<()> {
    let server = start().await?;
    server.expect_connect()?;
    let mut client = server.connect().await?;

    // Half-close without the acknowledging `close()`.
    client.shutdown().await?;

    server.expect_disconnect_within(SHORT)?;
    assert_eq!(
        failure_message(&server).await,
        "Timed out waiting for client to call `close().await`."
    );
    server.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_send_to_stalled_peer_does_not_hang_join() -> Result<()> {
    init_test_tracing();
    let server = MockServer::start(
        MockConfig::default().with_default_timeout(Duration::from_millis(200)),
    )
    .await?;
    let payload = vec![7u8; 64 * 1024 * 1024];

    server.expect_connect()?;
    server.send_bytes(&payload)?;
    server.expect_disconnect_within(Duration::from_millis(200))?;

    // Connects, never reads, closes its write side.
    let mut client = server.connect().await?;
    client.close().await?;

    let joined = tokio::time::timeout(Duration::from_secs(5), server.join()).await?;
    let message = match joined {
        Ok(()) => panic!("unread payload must fail the script"),
        Err(err) => err.to_string(),
    };
    assert!(
        message.starts_with("There is data sent by server that was not read by client"),
        "{}",
        &message[..message.len().min(200)]
    );

    // Only the part the socket accepted before the deadline is ledgered.
    let sent = server.metrics().bytes_sent;
    assert!(sent > 0 && sent < payload.len() as u64, "bytes_sent={sent}");
    assert_eq!(server.sent_bytes().len() as u64, sent);

    tokio::time::timeout(Duration::from_secs(5), server.stop()).await??;
    drop(client);
    Ok(())
}

#[tokio::test]
#[allow(deprecated)]
async fn test_connection_reset_counts_as_disconnect() -> Result<()> {
    let server = start().await?;
    server.expect_connect()?;
    let mut client = server.connect().await?;

    server.send_bytes(b"Hola!Adios!")?;
    server.join().await?;

    let mut buf = [0u8; 5];
    client.read_exact(&mut buf).await?;
    assert_eq!(&buf, b"Hola!");

    // Zero linger turns the drop into a reset while data is still unread.
    client.get_ref().set_linger(Some(Duration::ZERO))?;
    client.close().await?;
    drop(client);

    server.expect_disconnect()?;
    assert_eq!(
        failure_message(&server).await,
        "There is data sent by server that was not read by client before \
         `expect_disconnect()` completed: unread_bytes=b\"Adios!\"."
    );
    server.stop().await?;
    Ok(())
}

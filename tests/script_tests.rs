//! Connect, byte and send steps, and the join/stop lifecycle.

use std::time::Duration;

use anyhow::Result;
use mocktcp::{init_test_tracing, MockConfig, MockError, MockServer};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const SHORT: Duration = Duration::from_millis(100);

async fn start() -> Result<MockServer> {
    init_test_tracing();
    Ok(MockServer::start(MockConfig::default()).await?)
}

fn failure_message(result: mocktcp::Result<()>) -> String {
    match result {
        Ok(()) => panic!("expected the script to fail"),
        Err(err) => {
            assert!(err.is_script_failure(), "not a script failure: {err:?}");
            err.to_string()
        }
    }
}

#[tokio::test]
async fn test_expect_connect_passes() -> Result<()> {
    let server = start().await?;
    server.expect_connect()?;
    let _client = server.connect().await?;
    server.join().await?;
    server.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_expect_connect_after_connection_passes() -> Result<()> {
    let server = start().await?;
    let _client = server.connect().await?;
    server.expect_connect()?;
    server.join().await?;
    server.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_expect_connect_times_out() -> Result<()> {
    let server = start().await?;
    server.expect_connect_within(SHORT)?;
    assert_eq!(
        failure_message(server.join().await),
        "Timed out waiting for client to connect"
    );
    server.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_expect_bytes_passes() -> Result<()> {
    let server = start().await?;
    server.expect_connect()?;
    let mut client = server.connect().await?;
    server.join().await?;

    // Expectation first, then the client writes.
    server.expect_bytes(b"Hello, world")?;
    client.write_all(b"Hello, world").await?;

    // Client writes first, then the expectation.
    client.write_all(b"Goodbye, world").await?;
    server.expect_bytes(b"Goodbye, world")?;
    server.join().await?;

    client.close().await?;
    server.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_expect_bytes_nothing_sent_fails() -> Result<()> {
    let server = start().await?;
    server.expect_connect()?;
    let mut client = server.connect().await?;

    server.expect_bytes(b"Hello, world")?;
    client.write_all(b"Hello, world").await?;
    server.join().await?;

    server.expect_bytes_within(b"Goodbye, world", SHORT)?;
    assert_eq!(
        failure_message(server.join().await),
        "Timed out waiting for b\"Goodbye, world\""
    );
    server.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_expect_bytes_wrong_bytes_fails() -> Result<()> {
    let server = start().await?;
    server.expect_connect()?;
    let mut client = server.connect().await?;
    server.join().await?;

    server.expect_bytes(b"Hello, world")?;
    client.write_all(b"Hello, world").await?;
    server.join().await?;

    server.expect_bytes(b"Bonjour")?;
    client.write_all(b"Goodbye, world").await?;
    assert_eq!(
        failure_message(server.join().await),
        "Expected to read b\"Bonjour\" but actually read b\"Goodbye\""
    );
    server.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_client_disconnect_while_expecting_bytes() -> Result<()> {
    let server = start().await?;
    server.expect_connect()?;
    server.expect_bytes(b"Hello")?;

    let mut client = server.connect().await?;
    client.close().await?;

    assert_eq!(
        failure_message(server.join().await),
        "Client disconnected while waiting for b\"Hello\""
    );
    server.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_partial_bytes_before_close_are_shown() -> Result<()> {
    let server = start().await?;
    server.expect_connect()?;
    server.expect_bytes(b"Hello")?;

    let mut client = server.connect().await?;
    client.write_all(b"He").await?;
    client.close().await?;

    assert_eq!(
        failure_message(server.join().await),
        "Expected to read b\"Hello\" but actually read b\"He\""
    );
    server.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_send_bytes() -> Result<()> {
    let server = start().await?;
    server.expect_connect()?;
    let mut client = server.connect().await?;
    server.join().await?;

    server.send_bytes(b"Hola!")?;
    server.join().await?;
    let mut buf = [0u8; 5];
    client.read_exact(&mut buf).await?;
    assert_eq!(&buf, b"Hola!");

    server.send_bytes(b"Adios!")?;
    server.join().await?;
    let mut buf = [0u8; 6];
    client.read_exact(&mut buf).await?;
    assert_eq!(&buf, b"Adios!");

    assert_eq!(server.sent_bytes(), b"Hola!Adios!");
    assert_eq!(server.read_bytes(), b"Hola!Adios!");

    client.close().await?;
    server.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_delayed_join() -> Result<()> {
    let server = start().await?;
    server.expect_connect()?;
    let mut client = server.connect().await?;

    server.expect_bytes(b"Hello, world")?;
    client.write_all(b"Hello, world").await?;

    server.expect_bytes(b"Goodbye, world")?;
    client.write_all(b"Goodbye, world").await?;
    server.join().await?;

    client.close().await?;
    server.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_missing_expect_connect() -> Result<()> {
    let server = start().await?;
    let mut client = server.connect().await?;

    server.expect_bytes(b"Hello, world")?;
    client.write_all(b"Hello, world").await?;

    assert_eq!(
        failure_message(server.join().await),
        "Missing `expect_connect()` before `expect_bytes(b\"Hello, world\")`"
    );
    server.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_early_error_does_not_hang() -> Result<()> {
    let server = start().await?;
    let mut client = server.connect().await?;

    server.expect_connect()?;
    server.expect_bytes(b"Hello")?;
    server.expect_bytes(b"Goodbye")?;
    server.expect_bytes(b"Sayonara")?;

    client.write_all(b"Adios amigo!").await?;

    assert_eq!(
        failure_message(server.join().await),
        "Expected to read b\"Hello\" but actually read b\"Adios\""
    );
    let metrics = server.metrics();
    assert_eq!(metrics.steps_declared, 4);
    assert_eq!(metrics.steps_evaluated, 2);
    assert_eq!(metrics.steps_skipped, 2);
    server.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_no_transport_work_after_first_fault() -> Result<()> {
    let server = start().await?;
    let mut client = server.connect().await?;
    server.expect_connect()?;
    server.expect_bytes(b"ping")?;
    client.write_all(b"pong").await?;
    assert!(server.join().await.is_err());

    let before = server.metrics();
    server.send_bytes(b"never written")?;
    server.expect_bytes(b"never read")?;
    client.write_all(b"never read").await?;
    server.join().await?;

    let after = server.metrics();
    assert_eq!(after.actions_executed, before.actions_executed);
    assert_eq!(after.bytes_sent, 0);
    assert_eq!(after.bytes_read, before.bytes_read);
    assert_eq!(after.steps_skipped, before.steps_skipped + 2);
    assert!(server.sent_bytes().is_empty());
    server.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_ordering_expectations_before_connection() -> Result<()> {
    let server = start().await?;
    server.expect_connect()?;
    server.expect_bytes(b"Hello")?;

    let mut client = server.connect().await?;
    client.write_all(b"Hello").await?;
    server.join().await?;

    client.close().await?;
    server.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_plain_tcp_client_is_accepted() -> Result<()> {
    let server = start().await?;
    server.expect_connect()?;
    server.expect_bytes(b"raw")?;

    let mut stream = TcpStream::connect(server.local_addr()).await?;
    stream.write_all(b"raw").await?;
    server.join().await?;
    server.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_join_after_failure_is_quiet() -> Result<()> {
    let server = start().await?;
    server.expect_connect_within(SHORT)?;
    assert!(server.join().await.is_err());
    assert!(server.join_already_failed());

    server.join().await?;
    server.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_stop_is_idempotent() -> Result<()> {
    let server = start().await?;
    server.expect_connect_within(SHORT)?;
    let first = failure_message(server.stop().await);
    assert_eq!(first, "Timed out waiting for client to connect");

    server.stop().await?;
    server.stop().await?;
    assert!(server.is_stopped());
    assert!(matches!(server.expect_connect(), Err(MockError::Stopped)));
    Ok(())
}

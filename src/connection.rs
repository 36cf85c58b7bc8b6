//! TCP connection management.
//!
//! A [`Connection`] wraps one TCP stream to a store endpoint with buffered
//! RESP I/O, the AUTH/SELECT handshake and the configured timeouts. Any
//! transport failure marks the connection broken so the pool drops it
//! instead of handing it to the next caller.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::config::EndpointConfig;
use crate::error::{Error, Result};
use crate::resp;
use crate::types::Value;

/// Default read/write buffer size (8 KB).
const DEFAULT_BUF_SIZE: usize = 8 * 1024;

/// A TCP stream to the store with buffered RESP I/O.
pub struct Connection {
    stream: TcpStream,
    read_buf: BytesMut,
    write_buf: BytesMut,
    socket_timeout: Option<Duration>,
    broken: bool,
}

impl Connection {
    /// Open a new connection and run the AUTH/SELECT handshake.
    pub async fn connect(config: &EndpointConfig) -> Result<Self> {
        let addr = config.addr();
        let tcp = match config.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, TcpStream::connect(&addr))
                .await
                .map_err(|_| Error::Timeout(limit))??,
            None => TcpStream::connect(&addr).await?,
        };
        tcp.set_nodelay(true).map_err(Error::Io)?;

        let mut conn = Self {
            stream: tcp,
            read_buf: BytesMut::with_capacity(DEFAULT_BUF_SIZE),
            write_buf: BytesMut::with_capacity(DEFAULT_BUF_SIZE),
            socket_timeout: config.socket_timeout,
            broken: false,
        };

        if let Some(ref password) = config.password {
            let mut args = vec![Bytes::from("AUTH")];
            if let Some(ref username) = config.username {
                args.push(Bytes::copy_from_slice(username.as_bytes()));
            }
            args.push(Bytes::copy_from_slice(password.as_bytes()));
            match conn.execute(&args).await {
                Ok(Value::Status(ref s)) if s == "OK" => {}
                Ok(reply) => {
                    return Err(Error::Auth(format!("unexpected AUTH response: {}", reply)))
                }
                Err(Error::Server(msg)) => return Err(Error::Auth(msg)),
                Err(e) => return Err(e),
            }
        }

        if config.database != 0 {
            let reply = conn
                .execute(&[
                    Bytes::from("SELECT"),
                    Bytes::from(config.database.to_string()),
                ])
                .await?;
            match reply {
                Value::Status(ref s) if s == "OK" => {}
                _ => {
                    return Err(Error::Protocol(format!(
                        "unexpected SELECT response: {}",
                        reply
                    )))
                }
            }
        }

        debug!(addr = %addr, db = config.database, "connection established");
        Ok(conn)
    }

    /// Send a command and read its reply within the socket timeout.
    pub async fn execute(&mut self, args: &[Bytes]) -> Result<Value> {
        let limit = self.socket_timeout;
        self.round_trip(args, limit).await
    }

    /// Send a blocking command (BLPOP and friends) whose reply may take up to
    /// `block` longer than the socket timeout.
    pub async fn execute_blocking(&mut self, args: &[Bytes], block: Duration) -> Result<Value> {
        let limit = self.socket_timeout.map(|t| t + block);
        self.round_trip(args, limit).await
    }

    /// Send a command without waiting for a reply.
    pub async fn send_command(&mut self, args: &[Bytes]) -> Result<()> {
        let result = self.write_command(args).await;
        self.track(result)
    }

    /// Read the next reply with no deadline. Used for pushed pub/sub frames.
    pub async fn read_push(&mut self) -> Result<Value> {
        let result = self.read_response().await;
        self.track(result)
    }

    /// Whether a transport failure left this connection unusable.
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    /// Mark the connection unusable so the pool discards it.
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }

    async fn round_trip(&mut self, args: &[Bytes], limit: Option<Duration>) -> Result<Value> {
        let exchange = async {
            self.write_command(args).await?;
            self.read_response().await
        };
        let result = match limit {
            Some(limit) => tokio::time::timeout(limit, exchange)
                .await
                .unwrap_or(Err(Error::Timeout(limit))),
            None => exchange.await,
        };
        self.track(result)
    }

    fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(ref e) = result {
            if e.is_transport() {
                self.broken = true;
            }
        }
        result
    }

    async fn write_command(&mut self, args: &[Bytes]) -> Result<()> {
        self.write_buf.clear();
        resp::encode_command(args, &mut self.write_buf);
        self.stream.write_all(&self.write_buf).await?;
        self.stream.flush().await?;
        self.write_buf.clear();
        Ok(())
    }

    async fn read_response(&mut self) -> Result<Value> {
        loop {
            match resp::decode_value(&mut self.read_buf)? {
                Some(Value::Error(msg)) => return Err(Error::Server(msg)),
                Some(value) => return Ok(value),
                None => {}
            }

            let n = self.stream.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
        }
    }
}

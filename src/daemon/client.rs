//! IPC client side of the daemon channel.
//!
//! Reads the port-discovery file to find the daemon, then round-trips JSON
//! over `POST /rpc` with a bounded timeout. One client holds one reusable
//! connection pool; call [`IpcClient::close`] when done with it rather than
//! leaking the sockets to process exit.

use super::protocol::{IpcRequest, IpcResponse, PingReply};
use crate::error::ConnectionError;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, trace};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct IpcClient {
    port_path: PathBuf,
    timeout: Duration,
    http: Option<reqwest::Client>,
    closed: bool,
}

impl IpcClient {
    pub fn new(port_path: impl Into<PathBuf>) -> Self {
        Self {
            port_path: port_path.into(),
            timeout: DEFAULT_TIMEOUT,
            http: None,
            closed: false,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether a daemon has published a port (it may still be dead; the first
    /// call will find out).
    pub fn is_available(&self) -> bool {
        self.port_path.exists()
    }

    fn read_port(&self) -> Result<u16, ConnectionError> {
        let content = std::fs::read_to_string(&self.port_path)
            .map_err(|_| ConnectionError::NotRunning(self.port_path.clone()))?;
        content
            .trim()
            .parse::<u16>()
            .map_err(|_| ConnectionError::Malformed("port file is not a port number".to_string()))
    }

    /// Send one request and return the daemon's `result` payload.
    pub async fn call(&mut self, request: IpcRequest) -> Result<Value, ConnectionError> {
        if self.closed {
            return Err(ConnectionError::Closed);
        }
        let port = self.read_port()?;
        if self.http.is_none() {
            trace!(port = port, "Opening IPC connection pool");
        }
        let http = self.http.get_or_insert_with(reqwest::Client::new);

        debug!(method = %request.method, port = port, "IPC call");
        let response = http
            .post(format!("http://127.0.0.1:{port}/rpc"))
            .json(&request)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ConnectionError::Timeout(self.timeout)
                } else {
                    ConnectionError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        let body: IpcResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ConnectionError::Timeout(self.timeout)
            } else {
                ConnectionError::Malformed(e.to_string())
            }
        })?;

        match body {
            IpcResponse::Ok { result } => Ok(result),
            IpcResponse::Err { error } => {
                debug!(status = %status, error = %error, "Daemon reported an error");
                Err(ConnectionError::Daemon(error))
            }
        }
    }

    /// Health probe against the daemon's built-in `ping` method.
    pub async fn ping(&mut self) -> Result<PingReply, ConnectionError> {
        let result = self.call(IpcRequest::ping()).await?;
        serde_json::from_value(result).map_err(|e| ConnectionError::Malformed(e.to_string()))
    }

    /// Release the connection pool. Further calls return
    /// [`ConnectionError::Closed`] until the client is recreated.
    pub fn close(&mut self) {
        if self.http.take().is_some() {
            trace!("IPC connection pool closed");
        }
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_port_file_is_not_running() {
        let tmp = tempfile::tempdir().unwrap();
        let mut client = IpcClient::new(tmp.path().join("absent.port"));
        assert!(!client.is_available());
        let err = client.call(IpcRequest::ping()).await.unwrap_err();
        assert!(matches!(err, ConnectionError::NotRunning(_)));
    }

    #[tokio::test]
    async fn test_garbage_port_file_is_malformed() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bad.port");
        std::fs::write(&path, "not-a-port").unwrap();
        let mut client = IpcClient::new(&path);
        let err = client.call(IpcRequest::ping()).await.unwrap_err();
        assert!(matches!(err, ConnectionError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_call_after_close_is_closed() {
        let tmp = tempfile::tempdir().unwrap();
        let mut client = IpcClient::new(tmp.path().join("any.port"));
        client.close();
        let err = client.call(IpcRequest::ping()).await.unwrap_err();
        assert!(matches!(err, ConnectionError::Closed));
    }
}

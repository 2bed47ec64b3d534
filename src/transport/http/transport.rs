//! Request/response transport over HTTP(S).
//!
//! There is no standing session: every publish opens a connection, sends a
//! single request and releases the connection when the response has been
//! read. Connection pooling is disabled so nothing is held between publishes
//! and every exit path (success, non-2xx, network error, timeout) drops the
//! connection.
//!
//! URL construction: `<base without trailing '/'><path>.json`.
//!
//! Success is a 2xx status. Any other status is reported as
//! [`UplinkError::Status`]; network failures (DNS, TLS, connect, timeout)
//! carry no status and are reported as [`UplinkError::Transport`] or
//! [`UplinkError::Timeout`].

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};

use crate::{
    //
    log_debug,
    log_info,
    log_warn,
    Inbound,
    Record,
    Result,
    SessionBase,
    SessionPtr,
    SessionShape,
    TransportSession,
    UplinkConfig,
    UplinkError,
    WriteMode,
};

/// HTTP-based implementation of the `TransportSession` trait.
pub struct HttpTransport {
    // ---
    base: SessionBase,
    base_url: String,
    client: Client,
}

impl HttpTransport {
    // ---

    /// Document URL for a database path.
    fn url_for(&self, path: &str) -> String {
        document_url(&self.base_url, path)
    }
}

/// Join a database base URL and a path into a document URL.
fn document_url(base_url: &str, path: &str) -> String {
    // ---
    format!("{}{}.json", base_url.trim_end_matches('/'), path)
}

#[async_trait::async_trait]
impl TransportSession for HttpTransport {
    // ---

    fn base(&self) -> &SessionBase {
        &self.base
    }

    fn is_connected(&self) -> bool {
        true
    }

    async fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    async fn pump(&mut self) -> Result<Vec<Inbound>> {
        Ok(Vec::new())
    }

    async fn publish(&mut self, record: Record) -> Result<()> {
        // ---
        let url = self.url_for(record.destination.as_str());

        let request = match record.write {
            WriteMode::Append => self.client.post(&url),
            WriteMode::Replace => self.client.put(&url),
        };

        log_debug!(
            "{}: {:?} {url} ({} bytes)",
            self.base.transport_id,
            record.write,
            record.payload.len()
        );

        let response = request
            .header(CONTENT_TYPE, &*record.content_type)
            .body(record.payload)
            .send()
            .await
            .map_err(|err| {
                log_warn!("{}: request to {url} failed: {err}", self.base.transport_id);
                if err.is_timeout() {
                    UplinkError::Timeout
                } else {
                    UplinkError::Transport(err.to_string())
                }
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.is_success() {
            log_info!(
                "{}: {} {} -> {body}",
                self.base.transport_id,
                status.as_u16(),
                record.destination
            );
            Ok(())
        } else {
            log_warn!(
                "{}: {} {} failed: {body}",
                self.base.transport_id,
                status.as_u16(),
                record.destination
            );
            Err(status_error(status))
        }
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

fn status_error(status: StatusCode) -> UplinkError {
    UplinkError::Status(status.as_u16())
}

/// Creates an HTTP document-store transport from the given configuration.
///
/// # Errors
///
/// Returns an error if:
/// - No transport URI is configured
/// - The HTTP client cannot be constructed (TLS backend initialisation)
pub async fn create_transport(config: &UplinkConfig) -> Result<SessionPtr> {
    // ---
    let base_url = config
        .transport_uri
        .as_deref()
        .ok_or_else(|| UplinkError::MissingConfig("transport_uri".into()))?;

    if config.accept_invalid_certs {
        log_warn!("http: TLS certificate verification is DISABLED for {base_url}");
    }

    let client = Client::builder()
        .timeout(config.request_timeout)
        .connect_timeout(config.connect_timeout)
        .pool_max_idle_per_host(0)
        .danger_accept_invalid_certs(config.accept_invalid_certs)
        .build()
        .map_err(|err| UplinkError::Transport(err.to_string()))?;

    Ok(Box::new(HttpTransport {
        base: SessionBase::new("http", SessionShape::RequestResponse),
        base_url: base_url.trim_end_matches('/').to_string(),
        client,
    }))
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_document_url_trims_trailing_slash() {
        // ---
        assert_eq!(
            document_url("https://db.example.com/", "/plant/esp32_01/readings"),
            "https://db.example.com/plant/esp32_01/readings.json"
        );
        assert_eq!(
            document_url("https://db.example.com", "/plant/esp32_01/status"),
            "https://db.example.com/plant/esp32_01/status.json"
        );
    }

    /// Serve exactly one request with `status_line` and return the raw
    /// request text.
    async fn serve_once(status_line: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        // ---
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let mut request = Vec::new();
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request).to_string();
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text
                        .lines()
                        .find_map(|l| {
                            l.to_ascii_lowercase()
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if request.len() >= end + 4 + length || n == 0 {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let response = format!("{status_line}\r\ncontent-length: 2\r\nconnection: close\r\n\r\n{{}}");
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&request).to_string()
        });

        (format!("http://{addr}/"), handle)
    }

    #[tokio::test]
    async fn test_append_posts_json_document() {
        // ---
        let (uri, server) = serve_once("HTTP/1.1 200 OK").await;
        let config = UplinkConfig::with_uri(uri, "esp32_01");
        let mut session = create_transport(&config).await.unwrap();

        assert_eq!(session.shape(), SessionShape::RequestResponse);
        assert!(session.is_connected());

        let record = Record::telemetry(
            "/plant/esp32_01/readings".into(),
            r#"{"humidity":60.10}"#.into(),
        );
        session.publish(record).await.unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /plant/esp32_01/readings.json HTTP/1.1"));
        assert!(request.to_ascii_lowercase().contains("content-type: application/json"));
        assert!(request.ends_with(r#"{"humidity":60.10}"#));
    }

    #[tokio::test]
    async fn test_replace_puts_and_reports_status() {
        // ---
        let (uri, server) = serve_once("HTTP/1.1 401 Unauthorized").await;
        let config = UplinkConfig::with_uri(uri, "esp32_01");
        let mut session = create_transport(&config).await.unwrap();

        let record = Record::status("/plant/esp32_01/status".into(), r#"{"status":"online"}"#.into());
        let result = session.publish(record).await;
        assert!(matches!(result, Err(UplinkError::Status(401))));

        let request = server.await.unwrap();
        assert!(request.starts_with("PUT /plant/esp32_01/status.json HTTP/1.1"));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        // ---
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = UplinkConfig::with_uri(format!("http://{addr}"), "esp32_01");
        let mut session = create_transport(&config).await.unwrap();

        let record = Record::telemetry("/plant/esp32_01/readings".into(), "{}".into());
        assert!(matches!(
            session.publish(record).await,
            Err(UplinkError::Transport(_)) | Err(UplinkError::Timeout)
        ));
    }
}

//! HTTP transport with lifecycle hooks.
//!
//! A [`Transport`] performs one GET round trip and reports each phase to the
//! [`RequestTrace`] it is handed. [`HyperTransport`] is the real network
//! implementation; tests drive the fetch flow with their own transports.

use super::types::{BoxError, FetchedResponse, Target};
use crate::config::Config;
use crate::error::AppError;
use crate::infra::decompressor::ACCEPTED_ENCODINGS;
use crate::infra::tls::ALPN_H2;
use crate::infra::{connect_tls, DnsResolver, HickoryDnsResolver, RustlsTlsProvider, TlsProvider};
use crate::shared::cert_parser::snapshot_from_stream;
use crate::shared::{DnsInfo, RequestTrace};
use http_body_util::{BodyExt, Empty};
use hyper::{
    body::{Bytes, Incoming},
    client::conn::{http1, http2},
    header::{ACCEPT_ENCODING, HOST, USER_AGENT},
    Method, Request, Response, Version,
};
use hyper_util::rt::{TokioExecutor, TokioIo};
use std::net::{IpAddr, SocketAddr};
use tokio::net::TcpStream;

/// Trait for transports that execute a single instrumented GET.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Sends the request and returns once the response head has arrived.
    ///
    /// Hooks on `trace` fire in phase order. On a name resolution failure the
    /// DNS-done hook receives the error before this returns.
    async fn round_trip(
        &self,
        target: &Target,
        trace: &mut RequestTrace,
    ) -> Result<FetchedResponse, AppError>;
}

/// Network transport built on hickory, tokio-rustls and hyper.
pub struct HyperTransport<R = HickoryDnsResolver, P = RustlsTlsProvider> {
    resolver: R,
    tls: P,
    user_agent: String,
}

impl HyperTransport {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        Ok(Self::with_parts(
            HickoryDnsResolver::new(),
            RustlsTlsProvider::new()?,
            config.user_agent.clone(),
        ))
    }
}

impl<R: DnsResolver, P: TlsProvider> HyperTransport<R, P> {
    pub fn with_parts(resolver: R, tls: P, user_agent: String) -> Self {
        Self {
            resolver,
            tls,
            user_agent,
        }
    }

    fn build_request(&self, target: &Target, h2: bool) -> Result<Request<Empty<Bytes>>, AppError> {
        let builder = if h2 {
            Request::builder()
                .version(Version::HTTP_2)
                .uri(target.absolute_uri())
        } else {
            Request::builder()
                .uri(target.path.as_str())
                .header(HOST, target.authority())
        };

        builder
            .method(Method::GET)
            .header(USER_AGENT, self.user_agent.as_str())
            .header(ACCEPT_ENCODING, ACCEPTED_ENCODINGS)
            .body(Empty::new())
            .map_err(|e| AppError::Internal(format!("failed to build request: {}", e)))
    }

    /// Runs the HTTP exchange over an established connection.
    async fn send<I>(
        &self,
        io: I,
        target: &Target,
        h2: bool,
        trace: &mut RequestTrace,
    ) -> Result<FetchedResponse, AppError>
    where
        I: hyper::rt::Read + hyper::rt::Write + Unpin + Send + 'static,
    {
        let req = self.build_request(target, h2)?;

        let response: Response<Incoming> = if h2 {
            let (mut sender, conn) = http2::handshake(TokioExecutor::new(), io)
                .await
                .map_err(|e| AppError::Transport(format!("HTTP/2 handshake failed: {}", e)))?;
            tokio::spawn(async move {
                if let Err(e) = conn.await {
                    tracing::warn!("Connection error: {}", e);
                }
            });
            sender
                .send_request(req)
                .await
                .map_err(|e| AppError::Transport(e.to_string()))?
        } else {
            let (mut sender, conn) = http1::handshake(io)
                .await
                .map_err(|e| AppError::Transport(format!("HTTP handshake failed: {}", e)))?;
            tokio::spawn(async move {
                if let Err(e) = conn.await {
                    tracing::warn!("Connection error: {}", e);
                }
            });
            sender
                .send_request(req)
                .await
                .map_err(|e| AppError::Transport(e.to_string()))?
        };

        trace.got_first_response_byte();
        tracing::debug!(status = %response.status(), version = ?response.version(), "Response head received");

        let (parts, body) = response.into_parts();
        let reason = parts
            .extensions
            .get::<hyper::ext::ReasonPhrase>()
            .map(|r| String::from_utf8_lossy(r.as_bytes()).into_owned());
        Ok(FetchedResponse {
            status: parts.status,
            reason,
            headers: parts.headers,
            body: body
                .map_err(|e| -> BoxError { Box::new(e) })
                .boxed_unsync(),
        })
    }
}

/// Dials each address in order and returns the first connection that succeeds.
async fn connect_any(addrs: &[IpAddr], port: u16) -> Result<TcpStream, AppError> {
    let mut last_error = None;
    for ip in addrs {
        let addr = SocketAddr::new(*ip, port);
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                tracing::debug!(%addr, "Connected");
                return Ok(stream);
            }
            Err(e) => {
                tracing::debug!(%addr, "Connect failed: {}", e);
                last_error = Some(format!("dial tcp {}: {}", addr, e));
            }
        }
    }
    Err(AppError::Transport(
        last_error.unwrap_or_else(|| "no addresses to connect to".to_string()),
    ))
}

impl<R: DnsResolver, P: TlsProvider> Transport for HyperTransport<R, P> {
    async fn round_trip(
        &self,
        target: &Target,
        trace: &mut RequestTrace,
    ) -> Result<FetchedResponse, AppError> {
        trace.dns_start();
        let addrs = match self.resolver.resolve(&target.host).await {
            Ok(addrs) => addrs,
            Err(e) => {
                trace.dns_done(DnsInfo {
                    addrs: Vec::new(),
                    error: Some(e.clone()),
                });
                return Err(AppError::Dns(e));
            }
        };
        trace.dns_done(DnsInfo {
            addrs: addrs.clone(),
            error: None,
        });

        trace.connect_start();
        let tcp_stream = connect_any(&addrs, target.port).await?;
        trace.connect_done();

        if target.is_https {
            trace.tls_handshake_start();
            let tls_stream = connect_tls(&self.tls, tcp_stream, &target.host).await?;
            let snapshot = snapshot_from_stream(&tls_stream, &target.host);
            let h2 = snapshot.negotiated_protocol.as_bytes() == ALPN_H2;
            trace.tls_handshake_done(snapshot);

            self.send(TokioIo::new(tls_stream), target, h2, trace).await
        } else {
            self.send(TokioIo::new(tcp_stream), target, false, trace).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::driver::time_get;
    use crate::infra::tls::ALPN_HTTP11;
    use http_body_util::Full;
    use hyper::server::conn::http2 as server_http2;
    use hyper::service::service_fn;
    use rustls_pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
    use std::convert::Infallible;
    use std::io::Write;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;
    use tokio_rustls::TlsAcceptor;

    const CA_DER: &[u8] = include_bytes!("../shared/testdata/ca.der");
    const LEAF_DER: &[u8] = include_bytes!("../shared/testdata/leaf.der");
    const LEAF_KEY_DER: &[u8] = include_bytes!("../shared/testdata/leaf.key.der");

    /// Sends every name to the loopback address.
    struct LoopbackResolver;

    impl DnsResolver for LoopbackResolver {
        async fn resolve(&self, _host: &str) -> Result<Vec<IpAddr>, String> {
            Ok(vec![IpAddr::from([127, 0, 0, 1])])
        }
    }

    /// Client config that trusts only the test CA.
    struct TestCaTlsProvider {
        config: Arc<rustls::ClientConfig>,
    }

    impl TestCaTlsProvider {
        fn new() -> Self {
            let mut roots = rustls::RootCertStore::empty();
            roots.add(CertificateDer::from(CA_DER.to_vec())).unwrap();

            let provider = Arc::new(rustls::crypto::ring::default_provider());
            let mut config = rustls::ClientConfig::builder_with_provider(provider)
                .with_safe_default_protocol_versions()
                .unwrap()
                .with_root_certificates(roots)
                .with_no_client_auth();
            config.alpn_protocols = vec![ALPN_H2.to_vec(), ALPN_HTTP11.to_vec()];

            Self {
                config: Arc::new(config),
            }
        }
    }

    impl TlsProvider for TestCaTlsProvider {
        fn client_config(&self) -> Arc<rustls::ClientConfig> {
            self.config.clone()
        }
    }

    /// Acceptor presenting the `localhost` leaf and its CA, offering only `alpn`.
    fn tls_acceptor(alpn: &[u8]) -> TlsAcceptor {
        let chain = vec![
            CertificateDer::from(LEAF_DER.to_vec()),
            CertificateDer::from(CA_DER.to_vec()),
        ];
        let key = PrivateKeyDer::from(PrivatePkcs8KeyDer::from(LEAF_KEY_DER.to_vec()));

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let mut config = rustls::ServerConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_no_client_auth()
            .with_single_cert(chain, key)
            .unwrap();
        config.alpn_protocols = vec![alpn.to_vec()];

        TlsAcceptor::from(Arc::new(config))
    }

    fn tls_transport() -> HyperTransport<LoopbackResolver, TestCaTlsProvider> {
        HyperTransport::with_parts(
            LoopbackResolver,
            TestCaTlsProvider::new(),
            "http-info-test".to_string(),
        )
    }

    /// Reads until the end of the request head.
    async fn read_head<S: AsyncRead + Unpin>(socket: &mut S) -> Vec<u8> {
        let mut request = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&chunk[..n]);
            if request.windows(4).any(|w| w == b"\r\n\r\n") {
                break;
            }
        }
        request
    }

    async fn respond<S: AsyncRead + AsyncWrite + Unpin>(socket: &mut S, response: &[u8]) -> Vec<u8> {
        let request = read_head(socket).await;
        socket.write_all(response).await.unwrap();
        socket.shutdown().await.ok();
        request
    }

    /// Serves one canned response on a loopback port and hands back the raw request.
    async fn serve_once(response: Vec<u8>) -> (SocketAddr, JoinHandle<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            respond(&mut socket, &response).await
        });
        (addr, handle)
    }

    fn transport() -> HyperTransport {
        HyperTransport::with_parts(
            HickoryDnsResolver::new(),
            RustlsTlsProvider::new().unwrap(),
            "http-info-test".to_string(),
        )
    }

    #[tokio::test]
    async fn test_plain_http_round_trip() {
        let (addr, server) = serve_once(
            b"HTTP/1.1 200 OK\r\n\
              Content-Type: text/plain\r\n\
              Content-Length: 5\r\n\
              Set-Cookie: a=1\r\n\
              Set-Cookie: b=2\r\n\
              \r\n\
              hello"
                .to_vec(),
        )
        .await;

        let url = format!("http://{}/path?q=1", addr);
        let report = time_get(&transport(), &url).await.unwrap();

        assert_eq!(report.status.as_u16(), 200);
        assert_eq!(report.bytes, 5);
        assert!(!report.compressed);
        assert!(report.transfer_encoding.is_empty());
        assert!(report.tls.is_none());
        assert_eq!(report.dns.addrs, vec![addr.ip()]);
        assert!(report
            .headers
            .contains(&("Set-Cookie".to_string(), vec!["a=1".to_string(), "b=2".to_string()])));

        let request = String::from_utf8(server.await.unwrap()).unwrap().to_lowercase();
        assert!(request.starts_with("get /path?q=1 http/1.1\r\n"));
        assert!(request.contains(&format!("host: {}\r\n", addr)));
        assert!(request.contains("accept-encoding: gzip, deflate, br\r\n"));
        assert!(request.contains("user-agent: http-info-test\r\n"));
    }

    #[tokio::test]
    async fn test_chunked_transfer_encoding() {
        let (addr, _server) = serve_once(
            b"HTTP/1.1 200 OK\r\n\
              Transfer-Encoding: chunked\r\n\
              \r\n\
              5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n"
                .to_vec(),
        )
        .await;

        let report = time_get(&transport(), &format!("http://{}/", addr)).await.unwrap();

        assert_eq!(report.bytes, 11);
        assert_eq!(report.transfer_encoding, vec!["chunked".to_string()]);
        assert!(report.headers.iter().all(|(name, _)| name != "Transfer-Encoding"));
    }

    #[tokio::test]
    async fn test_gzip_body_is_decoded() {
        let original = "compress me ".repeat(100);
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(original.as_bytes()).unwrap();
        let compressed = encoder.finish().unwrap();

        let mut response = format!(
            "HTTP/1.1 200 OK\r\nContent-Encoding: gzip\r\nContent-Length: {}\r\n\r\n",
            compressed.len()
        )
        .into_bytes();
        response.extend_from_slice(&compressed);
        let (addr, _server) = serve_once(response).await;

        let report = time_get(&transport(), &format!("http://{}/", addr)).await.unwrap();

        assert!(report.compressed);
        assert_eq!(report.bytes, original.len() as u64);
        assert!(report
            .headers
            .iter()
            .all(|(name, _)| name != "Content-Encoding" && name != "Content-Length"));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = time_get(&transport(), &format!("http://{}/", addr)).await.unwrap_err();
        assert!(matches!(err, AppError::Transport(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_custom_reason_phrase() {
        let (addr, _server) =
            serve_once(b"HTTP/1.1 200 Fine\r\nContent-Length: 0\r\n\r\n".to_vec()).await;

        let report = time_get(&transport(), &format!("http://{}/", addr)).await.unwrap();

        assert_eq!(report.reason.as_deref(), Some("Fine"));
        assert_eq!(report.status_line(), "200 Fine");
    }

    #[tokio::test]
    async fn test_https_http1_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let acceptor = tls_acceptor(ALPN_HTTP11);
        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut tls = acceptor.accept(tcp).await.unwrap();
            respond(&mut tls, b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok").await
        });

        let url = format!("https://localhost:{}/secure", port);
        let report = time_get(&tls_transport(), &url).await.unwrap();

        assert_eq!(report.status.as_u16(), 200);
        assert_eq!(report.bytes, 2);
        assert!(report.timings.tls > Duration::ZERO);

        let tls = report.tls.as_ref().unwrap();
        assert_eq!(tls.server_name, "localhost");
        assert_eq!(tls.negotiated_protocol, "http/1.1");
        assert_eq!(tls.peer_certificates.len(), 2);
        let leaf = &tls.peer_certificates[0];
        assert_eq!(leaf.dns_names, vec!["localhost", "www.localhost"]);
        assert!(!leaf.is_ca);
        assert!(tls.peer_certificates[1].is_ca);

        let request = String::from_utf8(server.await.unwrap()).unwrap().to_lowercase();
        assert!(request.starts_with("get /secure http/1.1\r\n"));
        assert!(request.contains(&format!("host: localhost:{}\r\n", port)));
    }

    #[tokio::test]
    async fn test_https_alpn_selects_h2() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let acceptor = tls_acceptor(ALPN_H2);
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let tls = acceptor.accept(tcp).await.unwrap();
            let service = service_fn(|_req: Request<Incoming>| async {
                Ok::<_, Infallible>(Response::new(Full::new(Bytes::from_static(b"hello h2"))))
            });
            server_http2::Builder::new(TokioExecutor::new())
                .serve_connection(TokioIo::new(tls), service)
                .await
                .ok();
        });

        let url = format!("https://localhost:{}/", port);
        let report = time_get(&tls_transport(), &url).await.unwrap();

        assert_eq!(report.status.as_u16(), 200);
        assert_eq!(report.bytes, 8);
        assert_eq!(report.reason, None);
        assert_eq!(report.tls.as_ref().unwrap().negotiated_protocol, "h2");
    }

    #[tokio::test]
    async fn test_untrusted_certificate_is_tls_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let acceptor = tls_acceptor(ALPN_HTTP11);
        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            acceptor.accept(tcp).await.ok();
        });

        // Mozilla roots do not include the test CA
        let transport = HyperTransport::with_parts(
            LoopbackResolver,
            RustlsTlsProvider::new().unwrap(),
            "http-info-test".to_string(),
        );
        let err = time_get(&transport, &format!("https://localhost:{}/", port))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Tls(_)), "got {:?}", err);
    }
}

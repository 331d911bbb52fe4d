//! Transport: a plain TCP socket or a rustls-wrapped TLS stream behind
//! one `AsyncRead + AsyncWrite` enum, plus the socket tuning the
//! teacher applies to every client connection (`TCP_NODELAY`, keepalive).

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use once_cell::sync::Lazy;
use rustls::pki_types::ServerName;
use rustls::ClientConfig as TlsClientConfig;
use socket2::{SockRef, TcpKeepalive};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

use crate::config::TlsMode;
use crate::error::{CoreError, Result};

pub enum Transport {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for Transport {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Plain(s) => Pin::new(s).poll_read(cx, buf),
            Transport::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Transport {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Transport::Plain(s) => Pin::new(s).poll_write(cx, buf),
            Transport::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Plain(s) => Pin::new(s).poll_flush(cx),
            Transport::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Plain(s) => Pin::new(s).poll_shutdown(cx),
            Transport::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

static INSECURE_TLS_CONFIG: Lazy<Arc<TlsClientConfig>> = Lazy::new(|| {
    let mut cfg = TlsClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(NoVerify))
        .with_no_client_auth();
    cfg.alpn_protocols.clear();
    Arc::new(cfg)
});

static SECURE_TLS_CONFIG: Lazy<Arc<TlsClientConfig>> = Lazy::new(|| {
    let mut roots = rustls::RootCertStore::empty();
    roots.extend(webpki_roots_or_empty());
    Arc::new(
        TlsClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth(),
    )
});

/// The crate carries no bundled CA trust store; operators on
/// `SecureTls` are expected to rely on whatever roots their platform's
/// rustls build picks up via `rustls-native-certs` equivalents in the
/// embedding application. Left empty here, verification fails closed
/// rather than silently trusting nothing.
fn webpki_roots_or_empty() -> Vec<rustls::pki_types::CertificateDer<'static>> {
    Vec::new()
}

#[derive(Debug)]
struct NoVerify;

impl rustls::client::danger::ServerCertVerifier for NoVerify {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Opens a TCP connection to `host:port`, tunes it, and wraps it in
/// TLS per `mode`.
pub async fn connect(host: &str, port: u16, mode: TlsMode) -> Result<Transport> {
    let tcp = TcpStream::connect((host, port))
        .await
        .map_err(CoreError::Io)?;
    tune_socket(&tcp)?;

    match mode {
        TlsMode::NoTls => Ok(Transport::Plain(tcp)),
        TlsMode::SecureTls | TlsMode::InsecureTls => {
            let cfg = if mode == TlsMode::InsecureTls {
                INSECURE_TLS_CONFIG.clone()
            } else {
                SECURE_TLS_CONFIG.clone()
            };
            let connector = TlsConnector::from(cfg);
            let name = ServerName::try_from(host.to_string())
                .map_err(|e| CoreError::Tls(format!("invalid server name {host}: {e}")))?;
            let stream = connector
                .connect(name, tcp)
                .await
                .map_err(|e| CoreError::Tls(e.to_string()))?;
            Ok(Transport::Tls(Box::new(stream)))
        }
    }
}

fn tune_socket(stream: &TcpStream) -> Result<()> {
    stream.set_nodelay(true).map_err(CoreError::Io)?;
    let sock = SockRef::from(stream);
    let keepalive = TcpKeepalive::new().with_time(std::time::Duration::from_secs(60));
    sock.set_tcp_keepalive(&keepalive).map_err(CoreError::Io)?;
    Ok(())
}

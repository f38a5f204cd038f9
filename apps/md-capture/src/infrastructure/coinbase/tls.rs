//! TLS Configuration
//!
//! Certificate validation for the feed connection is a configuration
//! choice, not a hidden default:
//!
//! - [`TlsVerification::Relaxed`] (default) accepts any server certificate.
//!   Handshake signatures are still checked, but the chain and host name
//!   are not. This matches how sandbox endpoints are usually recorded.
//! - [`TlsVerification::Strict`] validates against the webpki root store.

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};
use tokio_tungstenite::Connector;

/// Server certificate validation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsVerification {
    /// Accept any server certificate.
    #[default]
    Relaxed,
    /// Validate the chain and host name against webpki roots.
    Strict,
}

impl TlsVerification {
    /// Get the mode name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Relaxed => "relaxed",
            Self::Strict => "strict",
        }
    }

    /// Connector for `connect_async_tls_with_config`.
    ///
    /// `None` lets tokio-tungstenite build its default webpki-rooted config.
    ///
    /// # Errors
    ///
    /// Returns an error if the rustls configuration cannot be built.
    pub fn connector(&self) -> Result<Option<Connector>, rustls::Error> {
        match self {
            Self::Strict => Ok(None),
            Self::Relaxed => Ok(Some(Connector::Rustls(Arc::new(relaxed_client_config()?)))),
        }
    }
}

/// Client config that skips certificate chain validation.
fn relaxed_client_config() -> Result<ClientConfig, rustls::Error> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let verifier = Arc::new(AcceptAnyServerCert {
        provider: Arc::clone(&provider),
    });

    Ok(ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .dangerous()
        .with_custom_certificate_verifier(verifier)
        .with_no_client_auth())
}

/// Verifier that trusts any certificate but still checks signatures.
#[derive(Debug)]
struct AcceptAnyServerCert {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

// TLS client configuration for the message backbones.
//
// Both backbones honour the session's `TlsMode`. The XMPP stream runs on
// our tokio-rustls; rumqttc pins an older rustls and only accepts a
// config built from its own re-export, so the builder below is
// instantiated once per rustls version.

use std::io::BufReader;
use std::path::Path;

use rustls_pki_types::CertificateDer;

use crate::error::Error;

/// Read every certificate from a PEM file.
fn load_ca(path: &Path) -> Result<Vec<CertificateDer<'static>>, Error> {
    let file = std::fs::File::open(path)
        .map_err(|e| Error::Tls(format!("failed to read CA cert {}: {e}", path.display())))?;
    let certs = rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
    if certs.is_empty() {
        return Err(Error::Tls(format!("no certificate in {}", path.display())));
    }
    Ok(certs)
}

macro_rules! client_config_for {
    ($module:ident, $($rustls:ident)::+) => {
        pub(crate) mod $module {
            use std::sync::Arc;

            use $($rustls)::+ as rustls;
            use rustls::client::danger::{
                HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
            };
            use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
            use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
            use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};

            use crate::error::Error;
            use crate::transport::TlsMode;

            /// Client config for `mode`: web PKI roots, plus a custom CA
            /// when configured, or no verification at all.
            pub(crate) fn client_config(mode: &TlsMode) -> Result<Arc<ClientConfig>, Error> {
                let provider = Arc::new(rustls::crypto::ring::default_provider());
                let builder = ClientConfig::builder_with_provider(Arc::clone(&provider))
                    .with_safe_default_protocol_versions()
                    .map_err(|e| Error::Tls(e.to_string()))?;

                let config = match mode {
                    TlsMode::DangerAcceptInvalid => builder
                        .dangerous()
                        .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert(provider)))
                        .with_no_client_auth(),
                    TlsMode::System => builder.with_root_certificates(web_roots()).with_no_client_auth(),
                    TlsMode::CustomCa(path) => {
                        let mut roots = web_roots();
                        for cert in super::load_ca(path)? {
                            roots
                                .add(cert)
                                .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
                        }
                        builder.with_root_certificates(roots).with_no_client_auth()
                    }
                };
                Ok(Arc::new(config))
            }

            fn web_roots() -> RootCertStore {
                let mut roots = RootCertStore::empty();
                roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
                roots
            }

            /// Skips chain and name checks; handshake signatures are still verified.
            #[derive(Debug)]
            struct AcceptAnyServerCert(Arc<CryptoProvider>);

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
                    verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
                }

                fn verify_tls13_signature(
                    &self,
                    message: &[u8],
                    cert: &CertificateDer<'_>,
                    dss: &DigitallySignedStruct,
                ) -> Result<HandshakeSignatureValid, rustls::Error> {
                    verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
                }

                fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
                    self.0.signature_verification_algorithms.supported_schemes()
                }
            }
        }
    };
}

client_config_for!(stream, tokio_rustls::rustls);
client_config_for!(broker, rumqttc::tokio_rustls::rustls);

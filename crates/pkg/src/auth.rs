//! Transport auth adapter.
//!
//! The PKG sits behind a mutually-authenticated TLS transport. That layer
//! verifies the peer's self-signed certificate and forwards it (base64 DER)
//! in the `x-client-cert` header; the middleware here re-checks the
//! certificate binding and exposes the peer's Ed25519 key to handlers as a
//! request extension. Deployments must ensure only the TLS terminator can
//! set the header.

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use sotto_crypto::cert::peer_key_from_cert_der;
use sotto_types::{CLIENT_CERT_HEADER, SIGNING_KEY_LEN};

use crate::error::PkgError;

/// The authenticated peer's signing key, if the transport presented one.
#[derive(Clone, Copy, Debug)]
pub struct Peer(pub Option<[u8; SIGNING_KEY_LEN]>);

/// Middleware that resolves the forwarded peer certificate into a [`Peer`].
///
/// An absent or unparseable certificate yields `Peer(None)`; the decision
/// to reject is made per-route by [`authorized`] / [`peer_signing_key`].
pub async fn peer_cert_middleware(mut req: Request, next: Next) -> Response {
    let peer = req
        .headers()
        .get(CLIENT_CERT_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|b64| BASE64.decode(b64).ok())
        .and_then(|der| peer_key_from_cert_der(&der).ok());
    req.extensions_mut().insert(Peer(peer));
    next.run(req).await
}

/// The peer's signing key, or `Unauthorized` if none was presented.
pub fn peer_signing_key(peer: &Peer) -> Result<[u8; SIGNING_KEY_LEN], PkgError> {
    peer.0
        .ok_or_else(|| PkgError::unauthorized("no peer tls certificate"))
}

/// Require the peer to hold exactly `expected`.
pub fn authorized(peer: &Peer, expected: &[u8; SIGNING_KEY_LEN]) -> Result<(), PkgError> {
    let key = peer_signing_key(peer)?;
    if key != *expected {
        return Err(PkgError::unauthorized("peer key is not authorized"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sotto_types::ErrorCode;

    #[test]
    fn test_no_peer_rejected() {
        let err = authorized(&Peer(None), &[1u8; 32]).unwrap_err();
        assert_eq!(err.code, ErrorCode::Unauthorized);
    }

    #[test]
    fn test_wrong_peer_rejected() {
        let err = authorized(&Peer(Some([2u8; 32])), &[1u8; 32]).unwrap_err();
        assert_eq!(err.code, ErrorCode::Unauthorized);
    }

    #[test]
    fn test_exact_peer_accepted() {
        assert!(authorized(&Peer(Some([1u8; 32])), &[1u8; 32]).is_ok());
    }
}

//! HTTP handlers for the PKG request paths.
//!
//! Handlers are thin shims: check the peer key, decode the JSON body under
//! the path's size cap, call into the server, and encode the reply.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::{Extension, Json};
use serde::de::DeserializeOwned;
use tracing::info;

use sotto_types::wire::{
    CommitArgs, CommitReply, ExtractArgs, ExtractReply, PreregisterArgs, RegisterArgs, RevealArgs,
    RevealReply, StatusArgs, UserFilterArgs, UserFilterReply, MAX_COMMIT_BODY, MAX_REVEAL_BODY,
    MAX_USER_BODY,
};

use crate::auth::{self, Peer};
use crate::error::PkgError;
use crate::Server;

fn decode<T: DeserializeOwned>(body: &Bytes, limit: usize) -> Result<T, PkgError> {
    if body.len() > limit {
        return Err(PkgError::bad_request("request body too large"));
    }
    serde_json::from_slice(body).map_err(PkgError::bad_request)
}

pub async fn register(
    State(srv): State<Arc<Server>>,
    Extension(peer): Extension<Peer>,
    body: Bytes,
) -> Result<Json<&'static str>, PkgError> {
    let peer_key = auth::peer_signing_key(&peer)?;
    let args: RegisterArgs = decode(&body, MAX_USER_BODY)?;
    srv.register(peer_key, &args)?;
    Ok(Json("OK"))
}

pub async fn status(
    State(srv): State<Arc<Server>>,
    Extension(peer): Extension<Peer>,
    body: Bytes,
) -> Result<Json<&'static str>, PkgError> {
    let peer_key = auth::peer_signing_key(&peer)?;
    let args: StatusArgs = decode(&body, MAX_USER_BODY)?;
    srv.status(peer_key, &args)?;
    Ok(Json("OK"))
}

pub async fn extract(
    State(srv): State<Arc<Server>>,
    Extension(peer): Extension<Peer>,
    body: Bytes,
) -> Result<Json<ExtractReply>, PkgError> {
    let peer_key = auth::peer_signing_key(&peer)?;
    let args: ExtractArgs = decode(&body, MAX_USER_BODY)?;
    let reply = srv.extract(peer_key, &args)?;
    Ok(Json(reply))
}

pub async fn commit(
    State(srv): State<Arc<Server>>,
    Extension(peer): Extension<Peer>,
    body: Bytes,
) -> Result<Json<CommitReply>, PkgError> {
    auth::authorized(&peer, &srv.coordinator_key)?;
    let args: CommitArgs = decode(&body, MAX_COMMIT_BODY)?;

    let commitment = srv.rounds.commit(args.round);
    info!(round = args.round, "commit");

    Ok(Json(CommitReply {
        commitment: commitment.to_vec(),
    }))
}

pub async fn reveal(
    State(srv): State<Arc<Server>>,
    Extension(peer): Extension<Peer>,
    body: Bytes,
) -> Result<Json<RevealReply>, PkgError> {
    auth::authorized(&peer, &srv.coordinator_key)?;
    let args: RevealArgs = decode(&body, MAX_REVEAL_BODY)?;

    let reply = srv
        .rounds
        .reveal(args.round, &args.commitments, &srv.signing_key)?;
    info!(round = args.round, "reveal");

    Ok(Json(reply))
}

pub async fn preregister(
    State(srv): State<Arc<Server>>,
    Extension(peer): Extension<Peer>,
    body: Bytes,
) -> Result<Json<&'static str>, PkgError> {
    auth::authorized(&peer, &srv.registrar_key)?;
    let args: PreregisterArgs = decode(&body, MAX_USER_BODY)?;
    srv.preregister(&args).await?;
    Ok(Json("OK"))
}

pub async fn userfilter(
    State(srv): State<Arc<Server>>,
    Extension(peer): Extension<Peer>,
    body: Bytes,
) -> Result<Json<UserFilterReply>, PkgError> {
    auth::authorized(&peer, &srv.registrar_key)?;
    let args: UserFilterArgs = decode(&body, MAX_USER_BODY)?;
    Ok(Json(srv.user_filter(&args)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;
    use tower::ServiceExt;

    use sotto_crypto::cert::generate_self_signed;
    use sotto_types::token::RegToken;
    use sotto_types::wire::ErrorReply;
    use sotto_types::{ErrorCode, CLIENT_CERT_HEADER};

    use crate::{Config, Mailer, RegTokenHandler};

    struct NullMailer;

    #[async_trait]
    impl Mailer for NullMailer {
        async fn send_verification(
            &self,
            _username: &str,
            _token: &RegToken,
            _pkg_index: u32,
            _num_pkgs: u32,
        ) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn test_router(dir: &tempfile::TempDir, coordinator_key: [u8; 32]) -> axum::Router {
        let server = crate::Server::new(Config {
            db_path: dir.path().to_path_buf(),
            signing_key: SigningKey::generate(&mut OsRng),
            coordinator_key,
            registrar_key: [2u8; 32],
            mailer: Arc::new(NullMailer),
            token_handler: RegTokenHandler::NoopForTesting,
        })
        .unwrap();
        Arc::new(server).router()
    }

    fn commit_request(cert_header: Option<String>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/coordinator/commit")
            .header("content-type", "application/json");
        if let Some(value) = cert_header {
            builder = builder.header(CLIENT_CERT_HEADER, value);
        }
        builder
            .body(Body::from(r#"{"Round":42}"#))
            .unwrap()
    }

    #[tokio::test]
    async fn test_commit_without_certificate_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let router = test_router(&dir, [1u8; 32]);

        let response = router.oneshot(commit_request(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        let reply: ErrorReply = serde_json::from_slice(&body).unwrap();
        assert_eq!(reply.code, ErrorCode::Unauthorized);
    }

    #[tokio::test]
    async fn test_commit_with_wrong_key_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = SigningKey::generate(&mut OsRng);
        let router = test_router(&dir, coordinator.verifying_key().to_bytes());

        let stranger = SigningKey::generate(&mut OsRng);
        let cert = BASE64.encode(generate_self_signed(&stranger).unwrap());

        let response = router.oneshot(commit_request(Some(cert))).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_commit_with_coordinator_key_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = SigningKey::generate(&mut OsRng);
        let router = test_router(&dir, coordinator.verifying_key().to_bytes());

        let cert = BASE64.encode(generate_self_signed(&coordinator).unwrap());
        let response = router.oneshot(commit_request(Some(cert))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        let reply: CommitReply = serde_json::from_slice(&body).unwrap();
        assert_eq!(reply.commitment.len(), 32);
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let router = test_router(&dir, [1u8; 32]);
        let request = Request::builder()
            .method("POST")
            .uri("/no/such/path")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_json_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = SigningKey::generate(&mut OsRng);
        let router = test_router(&dir, coordinator.verifying_key().to_bytes());

        let cert = BASE64.encode(generate_self_signed(&coordinator).unwrap());
        let request = Request::builder()
            .method("POST")
            .uri("/coordinator/commit")
            .header(CLIENT_CERT_HEADER, cert)
            .body(Body::from("{not json"))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        let reply: ErrorReply = serde_json::from_slice(&body).unwrap();
        assert_eq!(reply.code, ErrorCode::BadRequestJSON);
    }

    #[tokio::test]
    async fn test_oversized_commit_body_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let coordinator = SigningKey::generate(&mut OsRng);
        let router = test_router(&dir, coordinator.verifying_key().to_bytes());

        let cert = BASE64.encode(generate_self_signed(&coordinator).unwrap());
        let padding = " ".repeat(MAX_COMMIT_BODY + 1);
        let request = Request::builder()
            .method("POST")
            .uri("/coordinator/commit")
            .header(CLIENT_CERT_HEADER, cert)
            .body(Body::from(format!("{{\"Round\":42}}{padding}")))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

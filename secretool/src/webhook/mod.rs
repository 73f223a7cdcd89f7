//! HTTPS admission endpoint and its registration with the API server.

mod error;
mod mutate;
mod registration;
pub mod review;

use std::{future::Future, net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_server::{Handle, tls_rustls::RustlsConfig};
use secretool_base::consts::webhook;
use snafu::ResultExt;

pub use self::{
    error::Error,
    mutate::mutate,
    registration::{cluster_ca_bundle, desired_configuration, register},
    review::{AdmissionRequest, AdmissionResponse, AdmissionReview},
};
use crate::{cluster::ClusterApi, credentials::CredentialSources, tls::TlsMaterial};

const EXPECTED_CONTENT_TYPE: &str = "application/json";

const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

pub struct WebhookState<C> {
    pub cluster: C,
    pub sources: CredentialSources,
}

impl<C> WebhookState<C> {
    pub const fn new(cluster: C, sources: CredentialSources) -> Self { Self { cluster, sources } }
}

pub fn router<C: ClusterApi + 'static>(state: Arc<WebhookState<C>>) -> Router {
    Router::new()
        .route(webhook::LIVE_PATH, get(|| async { StatusCode::OK }))
        .route(webhook::MUTATE_PATH, post(mutate_handler::<C>))
        .route(webhook::VALIDATE_PATH, post(validate_handler::<C>))
        .with_state(state)
}

/// Checks the body and content type, then decodes the review into its
/// `apiVersion` and request.
///
/// Decoding failures are answered with an allowing response carrying the
/// decoder error, the request itself is never rejected.
fn decode_review(
    headers: &HeaderMap,
    body: &[u8],
) -> Result<(String, AdmissionRequest), Response> {
    if body.is_empty() {
        tracing::info!("Receive empty body");
        return Err((StatusCode::BAD_REQUEST, "empty body").into_response());
    }

    let content_type = headers.get(header::CONTENT_TYPE).and_then(|value| value.to_str().ok());
    if content_type != Some(EXPECTED_CONTENT_TYPE) {
        tracing::error!(
            content_type = content_type.unwrap_or_default(),
            "Content-Type is not {EXPECTED_CONTENT_TYPE}"
        );
        return Err((
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "invalid Content-Type, expect `application/json`",
        )
            .into_response());
    }

    let review = serde_json::from_slice::<AdmissionReview>(body)
        .map_err(|err| err.to_string())
        .and_then(|review| match review.request {
            Some(request) => Ok((review.api_version, request)),
            None => Err("missing admission request".to_string()),
        });
    review.map_err(|message| {
        tracing::error!("Failed to decode admission review, error: {message}");
        respond("", AdmissionResponse::allow("").with_message(message))
    })
}

fn respond(api_version: &str, response: AdmissionResponse) -> Response {
    Json(AdmissionReview::from_response(api_version, response)).into_response()
}

async fn mutate_handler<C: ClusterApi>(
    State(state): State<Arc<WebhookState<C>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let (api_version, request) = match decode_review(&headers, &body) {
        Ok(decoded) => decoded,
        Err(response) => return response,
    };
    tracing::debug!(
        uid = %request.uid,
        kind = %request.kind.kind,
        namespace = %request.namespace,
        name = %request.name,
        "Receive mutate request"
    );
    respond(&api_version, mutate(&state.cluster, &state.sources, &request).await)
}

async fn validate_handler<C: ClusterApi>(
    State(_state): State<Arc<WebhookState<C>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match decode_review(&headers, &body) {
        Ok((api_version, request)) => respond(&api_version, AdmissionResponse::allow(request.uid)),
        Err(response) => response,
    }
}

/// Serves `router` over HTTPS until `shutdown_signal` resolves, then lets
/// in-flight requests finish.
pub async fn serve(
    addr: SocketAddr,
    tls: TlsMaterial,
    router: Router,
    shutdown_signal: impl Future<Output = ()> + Send + Unpin,
) -> Result<(), Error> {
    let TlsMaterial { certificate, private_key } = tls;
    let config =
        RustlsConfig::from_pem(certificate, private_key).await.context(error::LoadKeyPairSnafu)?;

    let handle = Handle::new();
    let server =
        axum_server::bind_rustls(addr, config).handle(handle.clone()).serve(router.into_make_service());
    tokio::pin!(server);

    tracing::info!("Webhook server is listening on {addr}");
    tokio::select! {
        result = &mut server => return result.context(error::ServeSnafu { addr }),
        () = shutdown_signal => {
            tracing::info!("Webhook server is shutting down");
            handle.graceful_shutdown(Some(GRACEFUL_SHUTDOWN_TIMEOUT));
        }
    }
    server.await.context(error::ServeSnafu { addr })
}

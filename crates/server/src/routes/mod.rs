use axum::{
    Router,
    http::{Request, header::HeaderName},
    middleware,
    routing::get,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultOnFailure, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, field};

use crate::{DeploymentImpl, middleware::require_session};

pub mod boards;
pub mod columns;
pub mod events;
pub mod health;
pub mod identity;
pub mod members;
pub mod notifications;
pub mod push;
pub mod sync;
pub mod tasks;

const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn router(deployment: DeploymentImpl) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<_>| {
            let request_id = request
                .extensions()
                .get::<RequestId>()
                .and_then(|id| id.header_value().to_str().ok());
            let span = tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = field::Empty
            );
            if let Some(request_id) = request_id {
                span.record("request_id", field::display(request_id));
            }
            span
        })
        .on_response(DefaultOnResponse::new().level(Level::INFO))
        .on_failure(DefaultOnFailure::new().level(Level::ERROR));

    let public = Router::<DeploymentImpl>::new().route("/health", get(health::health_check));

    let protected = Router::<DeploymentImpl>::new()
        .merge(identity::router())
        .merge(boards::router())
        .merge(columns::router())
        .merge(tasks::router(&deployment))
        .merge(members::router())
        .merge(notifications::router())
        .merge(push::router())
        .merge(sync::router())
        .merge(events::router())
        .layer(middleware::from_fn_with_state(
            deployment.clone(),
            require_session,
        ));

    let mut app = Router::<DeploymentImpl>::new()
        .nest("/api", public)
        .nest("/api", protected);

    if let Some(static_dir) = deployment.config().static_dir.clone() {
        let spa = ServeDir::new(&static_dir).fallback(ServeFile::new(static_dir.join("index.html")));
        app = app.fallback_service(spa);
    }

    app.layer(CorsLayer::permissive())
        .layer(trace_layer)
        .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
            REQUEST_ID_HEADER,
        )))
        .layer(SetRequestIdLayer::new(
            HeaderName::from_static(REQUEST_ID_HEADER),
            MakeRequestUuid,
        ))
        .with_state(deployment)
}

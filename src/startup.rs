use axum::{
    extract::Request,
    http::{header, HeaderName, HeaderValue, Method},
    middleware::from_fn,
    response::Html,
    routing::{get, post, put},
    Json, Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;

use crate::{
    extractors::caller::{CALLER_HEADER, ORGANIZATION_HEADER},
    handlers,
    middleware::{metrics_middleware, request_id_middleware, REQUEST_ID_HEADER},
    openapi::ApiDoc,
};

pub fn build_router(state: Arc<crate::AppState>) -> Router {
    let cors = cors_layer(&state.config.cors_origin);

    let trace = TraceLayer::new_for_http().make_span_with(|request: &Request| {
        tracing::info_span!(
            "http_request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = tracing::field::Empty,
        )
    });

    // Allocation routes; static segments win over /{id}
    let allocation_routes = Router::new()
        .route("/", post(handlers::allocations_handler::create_allocation))
        .route("/validate", post(handlers::allocations_handler::validate_allocation))
        .route("/conflicts", get(handlers::allocations_handler::check_conflicts))
        .route(
            "/{id}",
            get(handlers::allocations_handler::get_allocation)
                .put(handlers::allocations_handler::update_allocation)
                .delete(handlers::allocations_handler::delete_allocation),
        );

    // Project routes
    let project_routes = Router::new()
        .route("/{id}", put(handlers::projects_handler::upsert_project))
        .route(
            "/{id}/allocations",
            get(handlers::projects_handler::get_project_allocations),
        );

    // Utilization routes
    let utilization_routes = Router::new()
        .route(
            "/resources/{id}",
            get(handlers::utilization_handler::get_resource_utilization),
        )
        .route("/capacity", get(handlers::utilization_handler::get_available_capacity))
        .route("/cross-project", get(handlers::utilization_handler::get_cross_project_view))
        .route("/overallocations", get(handlers::utilization_handler::get_overallocations));

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
        .nest("/api/allocations", allocation_routes)
        .nest("/api/projects", project_routes)
        .nest("/api/utilization", utilization_routes)
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .route("/swagger-ui", get(swagger_ui))
        .layer(from_fn(metrics_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(trace)
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(ORGANIZATION_HEADER),
            HeaderName::from_static(CALLER_HEADER),
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
        .expose_headers([HeaderName::from_static(REQUEST_ID_HEADER)])
        .allow_credentials(true);

    match origin.parse::<HeaderValue>() {
        Ok(origin) => cors.allow_origin(origin),
        Err(_) => {
            tracing::warn!(origin, "CORS_ORIGIN is not a valid header value, cross-origin requests disabled");
            cors
        }
    }
}

async fn swagger_ui() -> Html<&'static str> {
    Html(r#"
<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Capacity API Documentation</title>
    <link rel="stylesheet" type="text/css" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css" />
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-standalone-preset.js"></script>
    <script>
        window.onload = () => {
            window.ui = SwaggerUIBundle({
                url: '/api-docs/openapi.json',
                dom_id: '#swagger-ui',
                presets: [
                    SwaggerUIBundle.presets.apis,
                    SwaggerUIStandalonePreset
                ],
                layout: "StandaloneLayout"
            });
        };
    </script>
</body>
</html>
    "#)
}

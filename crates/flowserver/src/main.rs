use actix_cors::Cors;
use actix_web::{
    error::InternalError, get, http::StatusCode, post, web, App, HttpResponse, HttpServer,
    Responder,
};
use flowcore::{RunErrorKind, RunResult, WorkflowRequest};
use flowruntime::{EngineConfig, ExecutionEngine};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Largest request body accepted by `/api/execute`
const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

/// Application state shared across handlers
struct AppState {
    engine: Arc<ExecutionEngine>,
}

/// Error response
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// HTTP status for a finished run. Failed nodes are still a 200: the body
/// carries the per-node breakdown.
fn status_for(result: &RunResult) -> StatusCode {
    match result.error_kind {
        Some(RunErrorKind::Validation) => StatusCode::BAD_REQUEST,
        Some(RunErrorKind::Internal) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::OK,
    }
}

/// Health check endpoint
#[get("/health")]
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "flowengine"
    }))
}

/// Execute a workflow graph
#[post("/api/execute")]
async fn execute_workflow(
    data: web::Data<AppState>,
    request: web::Json<WorkflowRequest>,
) -> impl Responder {
    let request = request.into_inner();

    if let Err(e) = request.validate_shape() {
        warn!("Rejected workflow request: {}", e);
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: e.to_string(),
        });
    }

    info!(
        "Executing workflow: {} nodes, {} edges, {} variables",
        request.nodes.len(),
        request.edges.len(),
        request.variables.len()
    );

    let result = data
        .engine
        .execute(&request.nodes, &request.edges, &request.variables)
        .await;

    let status = status_for(&result);
    if status.is_server_error() {
        error!(
            "Workflow {} aborted: {}",
            result.execution_id,
            result.error.as_deref().unwrap_or_default()
        );
    } else {
        info!(
            "Workflow {} finished: success={} in {}ms",
            result.execution_id, result.success, result.duration_ms
        );
    }

    HttpResponse::build(status).json(result)
}

/// List available node types
#[get("/api/nodes")]
async fn list_node_types(data: web::Data<AppState>) -> impl Responder {
    let registry = data.engine.registry();

    let nodes: Vec<_> = registry
        .list_node_types()
        .iter()
        .map(|node_type| {
            let metadata = registry.get_metadata(node_type);
            serde_json::json!({
                "type": node_type,
                "description": metadata.map(|m| m.description.clone()).unwrap_or_default(),
                "category": metadata.map(|m| m.category.clone()).unwrap_or_default(),
                "inputs": metadata.map(|m| m.inputs.clone()).unwrap_or_default(),
                "outputs": metadata.map(|m| m.outputs.clone()).unwrap_or_default(),
            })
        })
        .collect();

    HttpResponse::Ok().json(nodes)
}

/// Malformed JSON bodies get the same error shape as every other 400.
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(MAX_BODY_BYTES)
        .error_handler(|err, _req| {
            let response = HttpResponse::BadRequest().json(ErrorResponse {
                error: err.to_string(),
            });
            InternalError::from_response(err, response).into()
        })
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting Flow Engine Server");

    let engine = ExecutionEngine::with_config(
        Arc::new(flownodes::standard_registry()),
        EngineConfig::default(),
    );

    info!(
        "Engine initialized with {} node types",
        engine.registry().len()
    );

    let app_state = web::Data::new(AppState {
        engine: Arc::new(engine),
    });

    let bind_address =
        std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

    info!("Server starting on http://{}", bind_address);

    // Start HTTP server
    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(app_state.clone())
            .app_data(json_config())
            .wrap(cors)
            .wrap(actix_web::middleware::Logger::default())
            .service(health_check)
            .service(execute_workflow)
            .service(list_node_types)
    })
    .bind(&bind_address)?
    .run()
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test;
    use serde_json::{json, Value};

    fn state() -> web::Data<AppState> {
        web::Data::new(AppState {
            engine: Arc::new(ExecutionEngine::with_config(
                Arc::new(flownodes::standard_registry()),
                EngineConfig::default(),
            )),
        })
    }

    macro_rules! app {
        () => {
            test::init_service(
                App::new()
                    .app_data(state())
                    .app_data(json_config())
                    .service(health_check)
                    .service(execute_workflow)
                    .service(list_node_types),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn successful_run_returns_ok() {
        let app = app!();
        let req = test::TestRequest::post()
            .uri("/api/execute")
            .set_json(json!({
                "nodes": [
                    { "id": "greet", "type": "text.template", "data": { "template": "Hello {{name}}" } }
                ],
                "edges": [],
                "variables": [
                    { "id": "v1", "name": "name", "type": "text", "value": "World" }
                ]
            }))
            .to_request();

        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["order"], json!(["greet"]));
        assert_eq!(body["nodes"][0]["data"]["template"], json!("Hello World"));
    }

    #[actix_web::test]
    async fn cycle_is_a_bad_request() {
        let app = app!();
        let req = test::TestRequest::post()
            .uri("/api/execute")
            .set_json(json!({
                "nodes": [
                    { "id": "a", "type": "const", "data": {} },
                    { "id": "b", "type": "const", "data": {} }
                ],
                "edges": [
                    { "id": "e1", "source": "a", "target": "b" },
                    { "id": "e2", "source": "b", "target": "a" }
                ]
            }))
            .to_request();

        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["errorKind"], json!("validation"));
        assert!(body.get("nodes").is_none());
    }

    #[actix_web::test]
    async fn empty_node_id_fails_shape_check() {
        let app = app!();
        let req = test::TestRequest::post()
            .uri("/api/execute")
            .set_json(json!({ "nodes": [ { "id": " ", "type": "const", "data": {} } ] }))
            .to_request();

        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"].as_str().unwrap().contains("id must not be empty"));
    }

    #[actix_web::test]
    async fn failed_node_still_returns_ok() {
        let app = app!();
        let req = test::TestRequest::post()
            .uri("/api/execute")
            .set_json(json!({
                "nodes": [
                    { "id": "n", "type": "input.number", "data": { "value": "not a number" } }
                ]
            }))
            .to_request();

        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["results"]["n"]["status"], json!("failed"));
    }

    #[actix_web::test]
    async fn lists_builtin_nodes() {
        let app = app!();
        let req = test::TestRequest::get().uri("/api/nodes").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let types: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|n| n["type"].as_str())
            .collect();
        assert!(types.contains(&"input.image"));
        assert!(types.contains(&"http.request"));
    }

    #[::core::prelude::v1::test]
    fn status_mapping() {
        let id = uuid_nil();
        assert_eq!(
            status_for(&RunResult::failed(id, RunErrorKind::Validation, "x", 0)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&RunResult::failed(id, RunErrorKind::Internal, "x", 0)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_for(&RunResult::failed(id, RunErrorKind::Cancelled, "x", 0)),
            StatusCode::OK
        );
    }

    fn uuid_nil() -> flowcore::ExecutionId {
        flowcore::ExecutionId::nil()
    }
}

use anyhow::{Context, Result};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use weaver_api::{build_router, jobs, processes, AppState};

/// OpenAPI documentation for the deploy/describe and job submission/status
/// surface; the legacy `/ows/wps` endpoint is intentionally absent from
/// this document, matching its own KVP/XML-only clients.
#[derive(OpenApi)]
#[openapi(
    paths(
        processes::list_processes,
        processes::deploy_process,
        processes::describe_process,
        processes::undeploy_process,
        jobs::submit_job,
        jobs::get_job_status,
        jobs::get_job_results,
        jobs::get_job_outputs,
        jobs::get_job_exceptions,
        jobs::get_job_logs,
        jobs::dismiss_job,
    ),
    components(schemas(
        processes::ProcessSummary,
        processes::ProcessDescription,
        processes::DeployRequest,
        processes::ProcessDescriptionPayload,
        processes::ExecutionUnit,
        jobs::ExecuteInput,
        jobs::ExecuteOutput,
        jobs::ExecuteRequest,
        jobs::SubmitJobResponse,
        weaver_status::StatusDocument,
        weaver_status::Link,
    )),
    tags(
        (name = "processes", description = "Process deployment and description endpoints"),
        (name = "jobs", description = "Job submission, status, and results endpoints"),
    ),
    info(
        title = "Weaver Execution Management Service",
        version = "0.1.0",
        description = "OGC API — Processes and legacy WPS 1.0/2.0 execution surface",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    )
)]
struct ApiDoc;

/// Exit code, per the worker binary's exit code table: 0 normal shutdown, 1
/// config error, 2 store unreachable, 3 WPS sub-process (bind) failure.
enum StartupFailure {
    Config(anyhow::Error),
    StoreUnreachable(anyhow::Error),
    BindFailure(anyhow::Error),
}

impl StartupFailure {
    fn exit_code(&self) -> i32 {
        match self {
            StartupFailure::Config(_) => 1,
            StartupFailure::StoreUnreachable(_) => 2,
            StartupFailure::BindFailure(_) => 3,
        }
    }

    fn into_error(self) -> anyhow::Error {
        match self {
            StartupFailure::Config(e) | StartupFailure::StoreUnreachable(e) | StartupFailure::BindFailure(e) => e,
        }
    }
}

async fn run() -> std::result::Result<(), StartupFailure> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "weaver_api=info,tower_http=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("weaver-api starting...");

    let state = AppState::from_env()
        .context("failed to assemble application state")
        .map_err(StartupFailure::Config)?;
    let bind_addr = state.config.bind_addr.clone();
    let mode = state.config.mode;
    tracing::info!(?mode, %bind_addr, "configuration loaded");

    let app = build_router(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .context("failed to bind to address")
        .map_err(StartupFailure::BindFailure)?;
    tracing::info!("listening on {}", bind_addr);

    axum::serve(listener, app).await.context("server error").map_err(StartupFailure::StoreUnreachable)?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(failure) = run().await {
        let code = failure.exit_code();
        let err = failure.into_error();
        tracing::error!(%err, exit_code = code, "weaver-api exiting");
        std::process::exit(code);
    }
    Ok(())
}

use crate::error::AppError;
use crate::state::SharedState;
use axum::extract::{Query, State};
use axum::Json;
use codex_core::{
    Catalog, CatalogStats, FixReport, IndexReport, Project, ReconcileAnalysis, SearchPage,
    SearchQuery, Tag,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Run `f` against the locked catalog on the blocking pool
async fn with_catalog<T, F>(state: &SharedState, f: F) -> Result<T, AppError>
where
    F: FnOnce(&mut Catalog) -> codex_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || {
        let mut catalog = state.catalog()?;
        f(&mut *catalog)
    })
    .await
    .map_err(AppError::internal)?
    .map_err(AppError::from)
}

fn directory_or_default(catalog: &Catalog, directory: Option<String>) -> PathBuf {
    directory
        .map(PathBuf::from)
        .unwrap_or_else(|| catalog.config().catalog.repository.clone())
}

// POST /index, POST /reindex/smart
#[derive(Deserialize, Default)]
pub struct IndexRequest {
    pub directory: Option<String>,
    pub project_id: Option<i64>,
}

#[derive(Serialize)]
pub struct IndexResponse {
    #[serde(flatten)]
    pub report: IndexReport,
    /// Error count before capping
    pub errors_total: usize,
}

pub async fn index(
    State(state): State<SharedState>,
    Json(req): Json<IndexRequest>,
) -> Result<Json<IndexResponse>, AppError> {
    run_index(state, req, false).await
}

pub async fn smart_reindex(
    State(state): State<SharedState>,
    Json(req): Json<IndexRequest>,
) -> Result<Json<IndexResponse>, AppError> {
    run_index(state, req, true).await
}

async fn run_index(
    state: SharedState,
    req: IndexRequest,
    smart: bool,
) -> Result<Json<IndexResponse>, AppError> {
    let response = with_catalog(&state, move |catalog| {
        let root = directory_or_default(catalog, req.directory);
        let report = if smart {
            catalog.smart_reindex(&root, req.project_id)?
        } else {
            catalog.index_directory(&root, req.project_id)?
        };
        let max_errors = catalog.config().service.max_errors;
        Ok(IndexResponse {
            errors_total: report.errors.len(),
            report: report.capped(max_errors),
        })
    })
    .await?;

    tracing::info!(
        smart,
        indexed = response.report.files_indexed,
        errors = response.errors_total,
        "index request complete"
    );
    Ok(Json(response))
}

// POST /reconcile/analyze
#[derive(Deserialize, Default)]
pub struct AnalyzeRequest {
    pub directory: Option<String>,
}

pub async fn analyze(
    State(state): State<SharedState>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<ReconcileAnalysis>, AppError> {
    let analysis = with_catalog(&state, move |catalog| {
        let root = directory_or_default(catalog, req.directory);
        catalog.analyze(&root)
    })
    .await?;
    Ok(Json(analysis))
}

// POST /reconcile/fix
#[derive(Deserialize, Default)]
pub struct FixRequest {
    pub directory: Option<String>,
    #[serde(default)]
    pub confirm: bool,
}

pub async fn fix(
    State(state): State<SharedState>,
    Json(req): Json<FixRequest>,
) -> Result<Json<FixReport>, AppError> {
    let outcome = with_catalog(&state, move |catalog| {
        let root = directory_or_default(catalog, req.directory);
        if !req.confirm && !catalog.config().reconcile.auto_fix {
            let fixable = catalog.analyze(&root)?.fixable_issues();
            if fixable > 0 {
                return Ok(Err(fixable));
            }
        }
        catalog.fix(&root).map(Ok)
    })
    .await?;

    match outcome {
        Ok(report) => Ok(Json(report)),
        Err(fixable) => Err(AppError::confirmation_required(fixable)),
    }
}

// GET /stats
pub async fn stats(State(state): State<SharedState>) -> Result<Json<CatalogStats>, AppError> {
    let stats = with_catalog(&state, |catalog| catalog.stats()).await?;
    Ok(Json(stats))
}

// GET /search?q=...
#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    pub project: Option<String>,
    pub filetype: Option<String>,
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

pub async fn search(
    State(state): State<SharedState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchPage>, AppError> {
    let query = SearchQuery {
        text: params.q,
        project: params.project,
        filetype: params.filetype,
        page: params.page,
        per_page: params.per_page,
    };
    let page = with_catalog(&state, move |catalog| catalog.search(&query)).await?;
    Ok(Json(page))
}

// GET /projects
pub async fn projects(State(state): State<SharedState>) -> Result<Json<Vec<Project>>, AppError> {
    let projects = with_catalog(&state, |catalog| catalog.list_projects()).await?;
    Ok(Json(projects))
}

// GET /tags
pub async fn tags(State(state): State<SharedState>) -> Result<Json<Vec<Tag>>, AppError> {
    let tags = with_catalog(&state, |catalog| catalog.list_tags()).await?;
    Ok(Json(tags))
}

// GET /status
#[derive(Serialize)]
pub struct ServiceStatus {
    pub service: String,
    pub version: String,
    pub database: Option<String>,
    pub repository: String,
    pub files_active: usize,
    pub started_at: String,
}

pub async fn status(State(state): State<SharedState>) -> Result<Json<ServiceStatus>, AppError> {
    let started_at = codex_core::format_timestamp(state.started_at);
    let status = with_catalog(&state, move |catalog| {
        Ok(ServiceStatus {
            service: "codex-service".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            database: catalog.db_path().map(|p| p.display().to_string()),
            repository: catalog.config().catalog.repository.display().to_string(),
            files_active: catalog.stats()?.files_active,
            started_at,
        })
    })
    .await?;
    Ok(Json(status))
}

//! Movement and disposal logs.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Router,
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
};
use tracing::instrument;

use crate::db::{disposals, movements};
use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::models::{CurrentUser, Disposal, Movement, Page, Pagination};
use crate::state::AppState;

use super::{Flash, ListQuery};

/// Movement log, newest first.
#[derive(Template, WebTemplate)]
#[template(path = "history/movements.html")]
pub struct MovementsTemplate {
    pub user: CurrentUser,
    pub flash: Flash,
    pub query: String,
    pub page: Page<Movement>,
}

/// Disposal log, newest first.
#[derive(Template, WebTemplate)]
#[template(path = "history/disposals.html")]
pub struct DisposalsTemplate {
    pub user: CurrentUser,
    pub flash: Flash,
    pub query: String,
    pub page: Page<Disposal>,
}

/// Build the history router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/movements", get(movement_log))
        .route("/disposals", get(disposal_log))
}

/// GET /movements?q=&page=
#[instrument(skip(state, user, query))]
async fn movement_log(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let pagination = Pagination::new(query.page, state.per_page());
    let page = movements::list(state.pool(), query.search(), pagination).await?;

    Ok(MovementsTemplate {
        user,
        flash: query.flash(),
        query: query.search().unwrap_or_default().to_owned(),
        page,
    })
}

/// GET /disposals?q=&page=
#[instrument(skip(state, user, query))]
async fn disposal_log(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let pagination = Pagination::new(query.page, state.per_page());
    let page = disposals::list(state.pool(), query.search(), pagination).await?;

    Ok(DisposalsTemplate {
        user,
        flash: query.flash(),
        query: query.search().unwrap_or_default().to_owned(),
        page,
    })
}

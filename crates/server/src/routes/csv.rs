//! CSV import, export and import templates.

use axum::{
    Router,
    extract::{Multipart, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;
use tracing::instrument;

use crate::error::AppError;
use crate::middleware::RequireAuth;
use crate::services::export::{self, ExportFile, ExportKind};
use crate::services::import::{ImportContext, ImportError, import_csv};
use crate::state::AppState;

use super::{redirect_error, redirect_success};

/// Query parameters for downloads.
#[derive(Debug, Default, Deserialize)]
pub struct DownloadQuery {
    /// `inventory`, `movements`, `disposals` or `all`; defaults to `inventory`.
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl DownloadQuery {
    fn kind(&self) -> Result<ExportKind, AppError> {
        Ok(self
            .kind
            .as_deref()
            .unwrap_or("inventory")
            .parse::<ExportKind>()?)
    }
}

/// Build the CSV router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/csv/import", post(import))
        .route("/csv/export", get(export_download))
        .route("/csv/template", get(template_download))
}

/// Page listing the rows of an import context.
const fn listing_path(context: ImportContext) -> &'static str {
    match context {
        ImportContext::Inventory => "/",
        ImportContext::Movements => "/movements",
        ImportContext::Disposals => "/disposals",
    }
}

/// Upload fields, read in any order.
struct Upload {
    context: Option<String>,
    file: Option<Vec<u8>>,
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, AppError> {
    let mut upload = Upload {
        context: None,
        file: None,
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        match field.name() {
            Some("context") => {
                upload.context = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| AppError::BadRequest(e.body_text()))?,
                );
            }
            Some("csv_file") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                if !bytes.is_empty() {
                    upload.file = Some(bytes.to_vec());
                }
            }
            _ => {}
        }
    }

    Ok(upload)
}

/// Import an uploaded CSV file in one transaction.
///
/// POST /csv/import
#[instrument(skip(state, user, multipart), fields(user = %user.username))]
async fn import(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let upload = read_upload(multipart).await?;

    let context = match upload.context.as_deref().unwrap_or_default().parse::<ImportContext>() {
        Ok(context) => context,
        Err(e) => return Ok(redirect_error("/", &e.to_string()).into_response()),
    };
    let back = listing_path(context);

    let Some(data) = upload.file else {
        return Ok(redirect_error(back, "No file uploaded").into_response());
    };

    match import_csv(state.pool(), &user, context, &data).await {
        Ok(summary) => Ok(redirect_success(
            back,
            &format!(
                "Imported {} {} row(s), {} new item(s)",
                summary.rows, summary.context, summary.items_created
            ),
        )
        .into_response()),
        Err(ImportError::Repository(e)) => Err(e.into()),
        Err(e) => {
            tracing::warn!(error = %e, context = %context, "Import rejected");
            Ok(redirect_error(back, &format!("Import failed: {e}")).into_response())
        }
    }
}

/// Download current data.
///
/// GET /csv/export?type=
#[instrument(skip(state, _user))]
async fn export_download(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, AppError> {
    let file = export::export(state.pool(), query.kind()?, Utc::now()).await?;
    Ok(attachment(file))
}

/// Download an import template.
///
/// GET /csv/template?type=
#[instrument(skip(_user))]
async fn template_download(
    RequireAuth(_user): RequireAuth,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, AppError> {
    let file = export::template(query.kind()?, Utc::now())?;
    Ok(attachment(file))
}

fn attachment(file: ExportFile) -> Response {
    (
        [
            (header::CONTENT_TYPE, file.content_type.to_owned()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file.filename),
            ),
        ],
        file.bytes,
    )
        .into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_download_kind_defaults_to_inventory() {
        let query = DownloadQuery::default();
        assert_eq!(query.kind().unwrap(), ExportKind::Inventory);

        let query = DownloadQuery {
            kind: Some("ALL".to_owned()),
        };
        assert_eq!(query.kind().unwrap(), ExportKind::All);
    }

    #[test]
    fn test_unknown_download_kind_is_bad_request() {
        let query = DownloadQuery {
            kind: Some("users".to_owned()),
        };
        assert!(matches!(query.kind(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_attachment_headers() {
        let response = attachment(ExportFile {
            filename: "inventory_20240101_120000.csv".to_owned(),
            content_type: "text/csv; charset=utf-8",
            bytes: b"a,b\n".to_vec(),
        });
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "text/csv; charset=utf-8");
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=\"inventory_20240101_120000.csv\""
        );
    }
}

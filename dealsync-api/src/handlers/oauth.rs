use actix_web::{http::header, web, HttpResponse, Result};
use serde::Deserialize;
use shared_types::ErrorResponse;
use std::sync::Arc;

use crate::helpers::hubspot_oauth::HubSpotOAuthClient;

const CONNECTED_PAGE: &str = r#"
<!DOCTYPE html>
<html>
<head><title>HubSpot Connected</title></head>
<body>
    <h1>Authorization successful!</h1>
    <p>The access and refresh tokens were written to the dealsync log.</p>
    <p>You can close this window.</p>
</body>
</html>
"#;

pub async fn initiate_hubspot_oauth(
    oauth_client: web::Data<Arc<HubSpotOAuthClient>>,
) -> HttpResponse {
    let (auth_url, _csrf_token) = oauth_client.authorize_url();

    HttpResponse::Found()
        .insert_header((header::LOCATION, auth_url))
        .finish()
}

#[derive(Deserialize)]
pub struct OAuthCallbackQuery {
    code: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

pub async fn hubspot_oauth_callback(
    query: web::Query<OAuthCallbackQuery>,
    oauth_client: web::Data<Arc<HubSpotOAuthClient>>,
) -> Result<HttpResponse> {
    if let Some(error) = &query.error {
        let detail = query.error_description.as_deref().unwrap_or(error);
        tracing::warn!("OAuth authorization was refused: {}", detail);
        return Ok(HttpResponse::BadRequest().json(ErrorResponse {
            error: format!("OAuth authorization failed: {}", detail),
        }));
    }

    let Some(code) = query
        .code
        .as_deref()
        .map(str::trim)
        .filter(|code| !code.is_empty())
    else {
        return Ok(HttpResponse::BadRequest().json(ErrorResponse {
            error: "Missing authorization code".to_string(),
        }));
    };

    let tokens = oauth_client
        .exchange_code(code.to_string())
        .await
        .map_err(|e| {
            tracing::error!("Error exchanging authorization code: {}", e);
            actix_web::error::ErrorInternalServerError(e.to_string())
        })?;

    // tokens are not stored; the operator copies them from the log
    tracing::info!(
        access_token = %tokens.access_token,
        refresh_token = %tokens.refresh_token,
        expires_in_secs = tokens.expires_in.map(|d| d.as_secs()),
        "HubSpot OAuth tokens received"
    );

    Ok(HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(CONNECTED_PAGE))
}

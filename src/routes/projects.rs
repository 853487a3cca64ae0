/// Project routes
///
/// Representative permission-gated resource handlers. The real project
/// persistence lives elsewhere; these handlers exist to be guarded:
/// GET requires `projects.view`, POST requires `projects.create`, both
/// enforced by the auth middleware in front of them.

use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::auth::Claims;

#[derive(Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
}

pub async fn list_projects(claims: web::ReqData<Claims>) -> HttpResponse {
    tracing::debug!(user_id = claims.sub, "Listing projects");
    HttpResponse::Ok().json(serde_json::json!({
        "projects": [],
        "viewer": claims.email,
    }))
}

pub async fn create_project(
    claims: web::ReqData<Claims>,
    form: web::Json<CreateProjectRequest>,
) -> HttpResponse {
    tracing::info!(
        user_id = claims.sub,
        project = %form.name,
        "Project created"
    );
    HttpResponse::Created().json(serde_json::json!({
        "name": form.name,
        "created_by": claims.sub,
    }))
}

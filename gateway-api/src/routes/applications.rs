use actix_web::{
    Responder,
    web::{self, Data, Json, Path, Query},
};
use tracing_actix_web::RootSpan;

use crate::gateway::{GatewayError, ListOutcome};
use crate::routes::resources::{self, CreateResourceRequest, Gateways};
use crate::routes::{ErrorMessage, MessageResponse};

/// Registers the application routes under `/argo`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource(["/argo", "/argo/"])
            .route(web::get().to(list_applications))
            .route(web::post().to(create_application)),
    )
    .service(
        web::resource("/argo/{id}")
            .route(web::patch().to(update_application))
            .route(web::delete().to(delete_application)),
    );
}

#[utoipa::path(
    get,
    path = "/argo",
    summary = "List applications",
    description = "Returns the ids of all managed applications. When one or more `id` parameters are given, returns the matching applications with their plan and status.",
    context_path = "/api/v1",
    params(
        ("id" = Option<Vec<String>>, Query, description = "Ids of the applications to describe"),
    ),
    responses(
        (status = 200, description = "Managed applications", body = ListOutcome),
        (status = 500, description = "Internal server error", body = ErrorMessage),
    ),
    tag = "Applications"
)]
pub async fn list_applications(
    gateways: Data<Gateways>,
    query: Query<Vec<(String, String)>>,
) -> Result<impl Responder, GatewayError> {
    resources::list(&gateways.applications, query).await
}

#[utoipa::path(
    post,
    path = "/argo",
    summary = "Create an application",
    description = "Submits the MinIO tenant Argo CD Application labelled with the given id. Only one application can exist at a time.",
    context_path = "/api/v1",
    request_body = CreateResourceRequest,
    responses(
        (status = 201, description = "Application creation submitted", body = MessageResponse),
        (status = 400, description = "Invalid id", body = ErrorMessage),
        (status = 409, description = "An application already exists", body = ErrorMessage),
        (status = 500, description = "Internal server error", body = ErrorMessage),
    ),
    tag = "Applications"
)]
pub async fn create_application(
    gateways: Data<Gateways>,
    request: Json<CreateResourceRequest>,
    root_span: RootSpan,
) -> Result<impl Responder, GatewayError> {
    resources::create(&gateways.applications, request.into_inner(), &root_span).await
}

#[utoipa::path(
    patch,
    path = "/argo/{id}",
    summary = "Update an application",
    description = "Acknowledges the update. Applications have a single plan and no configuration, so nothing changes.",
    context_path = "/api/v1",
    params(
        ("id" = String, Path, description = "Id of the application"),
    ),
    responses(
        (status = 200, description = "Update acknowledged", body = MessageResponse),
    ),
    tag = "Applications"
)]
pub async fn update_application(
    gateways: Data<Gateways>,
    id: Path<String>,
    root_span: RootSpan,
) -> Result<impl Responder, GatewayError> {
    resources::update(&gateways.applications, id.into_inner(), &root_span).await
}

#[utoipa::path(
    delete,
    path = "/argo/{id}",
    summary = "Delete an application",
    description = "Deletes the application labelled with the id.",
    context_path = "/api/v1",
    params(
        ("id" = String, Path, description = "Id of the application"),
    ),
    responses(
        (status = 202, description = "Application deletion accepted", body = MessageResponse),
        (status = 404, description = "No application carries the id", body = ErrorMessage),
        (status = 500, description = "Internal server error", body = ErrorMessage),
    ),
    tag = "Applications"
)]
pub async fn delete_application(
    gateways: Data<Gateways>,
    id: Path<String>,
    root_span: RootSpan,
) -> Result<impl Responder, GatewayError> {
    resources::delete(&gateways.applications, id.into_inner(), &root_span).await
}

use actix_web::{
    Responder,
    web::{self, Data, Json, Path, Query},
};
use tracing_actix_web::RootSpan;

use crate::gateway::{GatewayError, ListOutcome};
use crate::routes::resources::{self, CreateResourceRequest, Gateways};
use crate::routes::{ErrorMessage, MessageResponse};

/// Registers the cluster routes under `/kubernetes`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource(["/kubernetes", "/kubernetes/"])
            .route(web::get().to(list_clusters))
            .route(web::post().to(create_cluster)),
    )
    .service(
        web::resource("/kubernetes/{id}")
            .route(web::patch().to(update_cluster))
            .route(web::delete().to(delete_cluster)),
    );
}

#[utoipa::path(
    get,
    path = "/kubernetes",
    summary = "List clusters",
    description = "Returns the ids of all managed clusters. When one or more `id` parameters are given, returns the matching clusters with their plan and a freshly issued admin kubeconfig.",
    context_path = "/api/v1",
    params(
        ("id" = Option<Vec<String>>, Query, description = "Ids of the clusters to describe"),
    ),
    responses(
        (status = 200, description = "Managed clusters", body = ListOutcome),
        (status = 500, description = "Internal server error", body = ErrorMessage),
    ),
    tag = "Clusters"
)]
pub async fn list_clusters(
    gateways: Data<Gateways>,
    query: Query<Vec<(String, String)>>,
) -> Result<impl Responder, GatewayError> {
    resources::list(&gateways.clusters, query).await
}

#[utoipa::path(
    post,
    path = "/kubernetes",
    summary = "Create a cluster",
    description = "Submits a new Gardener Shoot labelled with the given id.",
    context_path = "/api/v1",
    request_body = CreateResourceRequest,
    responses(
        (status = 201, description = "Cluster creation submitted", body = MessageResponse),
        (status = 400, description = "Invalid id", body = ErrorMessage),
        (status = 409, description = "A cluster with the derived name already exists", body = ErrorMessage),
        (status = 500, description = "Internal server error", body = ErrorMessage),
    ),
    tag = "Clusters"
)]
pub async fn create_cluster(
    gateways: Data<Gateways>,
    request: Json<CreateResourceRequest>,
    root_span: RootSpan,
) -> Result<impl Responder, GatewayError> {
    resources::create(&gateways.clusters, request.into_inner(), &root_span).await
}

#[utoipa::path(
    patch,
    path = "/kubernetes/{id}",
    summary = "Update a cluster",
    description = "Acknowledges the update. Clusters have a single plan and no configuration, so nothing changes.",
    context_path = "/api/v1",
    params(
        ("id" = String, Path, description = "Id of the cluster"),
    ),
    responses(
        (status = 200, description = "Update acknowledged", body = MessageResponse),
    ),
    tag = "Clusters"
)]
pub async fn update_cluster(
    gateways: Data<Gateways>,
    id: Path<String>,
    root_span: RootSpan,
) -> Result<impl Responder, GatewayError> {
    resources::update(&gateways.clusters, id.into_inner(), &root_span).await
}

#[utoipa::path(
    delete,
    path = "/kubernetes/{id}",
    summary = "Delete a cluster",
    description = "Confirms the deletion of the cluster labelled with the id, then deletes it.",
    context_path = "/api/v1",
    params(
        ("id" = String, Path, description = "Id of the cluster"),
    ),
    responses(
        (status = 202, description = "Cluster deletion accepted", body = MessageResponse),
        (status = 404, description = "No cluster carries the id", body = ErrorMessage),
        (status = 500, description = "Internal server error", body = ErrorMessage),
    ),
    tag = "Clusters"
)]
pub async fn delete_cluster(
    gateways: Data<Gateways>,
    id: Path<String>,
    root_span: RootSpan,
) -> Result<impl Responder, GatewayError> {
    resources::delete(&gateways.clusters, id.into_inner(), &root_span).await
}

//! Request handling shared by every backend family.

use actix_web::{
    HttpResponse, ResponseError,
    http::{StatusCode, header::ContentType},
    web::{Json, Query},
};
use serde::{Deserialize, Serialize};
use tracing_actix_web::RootSpan;
use utoipa::ToSchema;

use crate::gateway::{CustomResourceGateway, GatewayError, ListOutcome};
use crate::routes::{ErrorMessage, MessageResponse};

/// Query parameter naming the ids a listing is filtered by.
const ID_QUERY_PARAMETER: &str = "id";

/// The gateways serving each route family.
#[derive(Clone)]
pub struct Gateways {
    pub clusters: CustomResourceGateway,
    pub applications: CustomResourceGateway,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateResourceRequest {
    #[schema(example = "3f2504e0-4f89-11d3-9a0c-0305e82c3301", required = true)]
    pub id: String,
}

impl GatewayError {
    pub fn to_message(&self) -> String {
        match self {
            // Do not expose control plane details in error messages
            GatewayError::BackendUnavailable(_) => "internal server error".to_string(),
            // Every other message is ok, as they do not divulge sensitive information
            e => e.to_string(),
        }
    }
}

impl ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::InvalidIdentifier(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::BackendConflict(_) => StatusCode::CONFLICT,
            GatewayError::BackendUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error_message = ErrorMessage {
            error: self.to_message(),
        };
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .json(error_message)
    }
}

/// Collects the values of every repeated `id` query parameter.
pub fn filter_ids(query: Query<Vec<(String, String)>>) -> Vec<String> {
    query
        .into_inner()
        .into_iter()
        .filter(|(key, _)| key == ID_QUERY_PARAMETER)
        .map(|(_, value)| value)
        .collect()
}

pub async fn list(
    gateway: &CustomResourceGateway,
    query: Query<Vec<(String, String)>>,
) -> Result<Json<ListOutcome>, GatewayError> {
    let filter = filter_ids(query);
    let outcome = gateway.list(&filter).await?;

    Ok(Json(outcome))
}

pub async fn create(
    gateway: &CustomResourceGateway,
    request: CreateResourceRequest,
    root_span: &RootSpan,
) -> Result<HttpResponse, GatewayError> {
    root_span.record("external_id", &request.id);

    gateway.create(&request.id).await?;
    let response = MessageResponse {
        message: format!("{} created successfully", gateway.profile().display_name),
    };

    Ok(HttpResponse::Created().json(response))
}

pub async fn update(
    gateway: &CustomResourceGateway,
    external_id: String,
    root_span: &RootSpan,
) -> Result<HttpResponse, GatewayError> {
    root_span.record("external_id", &external_id);

    gateway.update(&external_id).await?;
    let response = MessageResponse {
        message: format!(
            "{} {external_id} is up to date",
            gateway.profile().display_name
        ),
    };

    Ok(HttpResponse::Ok().json(response))
}

pub async fn delete(
    gateway: &CustomResourceGateway,
    external_id: String,
    root_span: &RootSpan,
) -> Result<HttpResponse, GatewayError> {
    root_span.record("external_id", &external_id);

    let name = gateway.delete(&external_id).await?;
    let response = MessageResponse {
        message: format!(
            "{} {name} deleted successfully",
            gateway.profile().display_name
        ),
    };

    Ok(HttpResponse::Accepted().json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::identity::IdentifierError;
    use crate::k8s::K8sError;
    use actix_web::body::to_bytes;

    #[actix_web::test]
    async fn backend_failures_hide_details() {
        let err = GatewayError::BackendUnavailable(K8sError::InvalidObject(
            "secret detail".to_string(),
        ));

        let response = err.error_response();
        let body = to_bytes(response.into_body()).await.unwrap();

        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            serde_json::from_slice::<serde_json::Value>(&body).unwrap(),
            serde_json::json!({ "error": "internal server error" })
        );
    }

    #[test]
    fn error_kinds_map_to_statuses() {
        assert_eq!(
            GatewayError::InvalidIdentifier(IdentifierError::Empty).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            GatewayError::NotFound("abc".to_string()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            GatewayError::from(K8sError::AlreadyExists("managed-abc".to_string())).status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn only_id_parameters_filter() {
        let query = Query(vec![
            ("id".to_string(), "a".to_string()),
            ("other".to_string(), "x".to_string()),
            ("id".to_string(), "b".to_string()),
        ]);

        assert_eq!(filter_ids(query), vec!["a".to_string(), "b".to_string()]);
    }
}

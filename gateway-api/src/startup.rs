use std::{net::TcpListener, sync::Arc};

use actix_web::{App, HttpServer, dev::Server, web};
use actix_web_httpauth::middleware::HttpAuthentication;
use gateway_telemetry::metrics::init_metrics_handle;
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::info;
use tracing_actix_web::TracingLogger;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    authentication::auth_validator,
    config::ApiConfig,
    gateway::{
        CustomResourceGateway, ListOutcome, ResourceConfig, ResourceDetail,
        backends::{
            ApplicationDetails, ApplicationPlan, BackendProfile, ClusterDetails, ClusterPlan,
            Plan, ResourceStatus, SHOOT_COORDINATES,
        },
    },
    k8s::{
        CustomObjectClient,
        credentials::{AdminKubeconfigIssuer, CredentialIssuer},
        http::HttpK8sClient,
    },
    routes::{
        ErrorMessage, MessageResponse, applications, clusters,
        health_check::health_check,
        metrics::metrics,
        resources::{CreateResourceRequest, Gateways},
    },
    span_builder::ApiRootSpanBuilder,
};

pub struct Application {
    port: u16,
    server: Server,
}

impl Application {
    pub async fn build(config: ApiConfig) -> Result<Self, anyhow::Error> {
        config.kubernetes.validate()?;

        let address = format!("{}:{}", config.application.host, config.application.port);
        let listener = TcpListener::bind(address)?;
        let port = listener.local_addr()?.port();

        // kube and reqwest both link rustls, so the process-wide provider
        // must be chosen before either builds a TLS config. An error means
        // a provider is already installed.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let kube_config = kube::Config::infer().await?;
        info!(
            cluster_url = %kube_config.cluster_url,
            "inferred kubernetes configuration"
        );

        let issuer = AdminKubeconfigIssuer::try_from_config(
            &kube_config,
            SHOOT_COORDINATES,
            config.kubernetes.credential_expiration_seconds,
        )?;
        let client = HttpK8sClient::try_from_config(kube_config)?;
        let metrics_handle = init_metrics_handle()?;

        let server = run(
            config,
            listener,
            Arc::new(client),
            Arc::new(issuer),
            metrics_handle,
        )
        .await?;

        Ok(Self { port, server })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        self.server.await
    }
}

/// Builds the gateways for both backend families on top of `client`.
pub fn build_gateways(
    client: Arc<dyn CustomObjectClient>,
    issuer: Arc<dyn CredentialIssuer>,
) -> Gateways {
    Gateways {
        clusters: CustomResourceGateway::new(
            client.clone(),
            BackendProfile::cluster(),
            Arc::new(ClusterDetails::new(issuer)),
        ),
        applications: CustomResourceGateway::new(
            client,
            BackendProfile::application(),
            Arc::new(ApplicationDetails),
        ),
    }
}

// The control plane client and the credential issuer are passed in so tests
// can run the server against in-memory doubles.
pub async fn run(
    config: ApiConfig,
    listener: TcpListener,
    client: Arc<dyn CustomObjectClient>,
    issuer: Arc<dyn CredentialIssuer>,
    metrics_handle: PrometheusHandle,
) -> Result<Server, anyhow::Error> {
    let config = web::Data::new(config);
    let gateways = web::Data::new(build_gateways(client, issuer));
    let metrics_handle = web::ThinData(metrics_handle);

    #[derive(OpenApi)]
    #[openapi(
        paths(
            crate::routes::health_check::health_check,
            crate::routes::metrics::metrics,
            crate::routes::clusters::list_clusters,
            crate::routes::clusters::create_cluster,
            crate::routes::clusters::update_cluster,
            crate::routes::clusters::delete_cluster,
            crate::routes::applications::list_applications,
            crate::routes::applications::create_application,
            crate::routes::applications::update_application,
            crate::routes::applications::delete_application,
        ),
        components(schemas(
            CreateResourceRequest,
            MessageResponse,
            ErrorMessage,
            ListOutcome,
            ResourceDetail,
            ResourceConfig,
            ResourceStatus,
            Plan,
            ClusterPlan,
            ApplicationPlan,
        ))
    )]
    struct ApiDoc;

    let openapi = ApiDoc::openapi();

    let server = HttpServer::new(move || {
        let tracing_logger = TracingLogger::<ApiRootSpanBuilder>::new();
        let authentication = HttpAuthentication::bearer(auth_validator);
        App::new()
            .wrap(
                sentry::integrations::actix::Sentry::builder()
                    .capture_server_errors(true)
                    .start_transaction(true)
                    .finish(),
            )
            .wrap(tracing_logger)
            .service(health_check)
            .service(metrics)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", openapi.clone()),
            )
            .service(
                web::scope("/api/v1")
                    .wrap(authentication)
                    .configure(clusters::configure)
                    .configure(applications::configure),
            )
            .app_data(config.clone())
            .app_data(gateways.clone())
            .app_data(metrics_handle.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}

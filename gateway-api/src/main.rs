use gateway_api::{config::ApiConfig, startup::Application};
use gateway_config::{Environment, load_config};
use gateway_telemetry::tracing::init_tracing;
use std::sync::Arc;
use tracing::info;

fn main() -> anyhow::Result<()> {
    // Initialize tracing from the binary name
    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME"))?;

    // Initialize Sentry before the async runtime starts
    let _sentry_guard = init_sentry()?;

    // We start the runtime.
    actix_web::rt::System::new().block_on(async_main())?;

    Ok(())
}

async fn async_main() -> anyhow::Result<()> {
    let config = load_config::<ApiConfig>()?;
    info!(
        host = config.application.host,
        port = config.application.port,
        api_keys = config.api_keys.len(),
        credential_expiration_seconds = config.kubernetes.credential_expiration_seconds,
        "gateway configuration loaded",
    );

    let application = Application::build(config).await?;
    application.run_until_stopped().await?;

    Ok(())
}

fn init_sentry() -> anyhow::Result<Option<sentry::ClientInitGuard>> {
    if let Ok(config) = load_config::<ApiConfig>()
        && let Some(sentry_config) = &config.sentry
    {
        info!("initializing sentry with supplied dsn");

        let environment = Environment::load()?;
        let guard = sentry::init(sentry::ClientOptions {
            dsn: Some(sentry_config.dsn.expose().parse()?),
            environment: Some(environment.to_string().into()),
            traces_sample_rate: 1.0,
            max_request_body_size: sentry::MaxRequestBodySize::Always,
            integrations: vec![Arc::new(
                sentry::integrations::panic::PanicIntegration::new(),
            )],
            ..Default::default()
        });

        sentry::configure_scope(|scope| {
            scope.set_tag("service", "gateway-api");
        });

        return Ok(Some(guard));
    }

    info!("sentry not configured for gateway, skipping initialization");

    Ok(None)
}

use aws_config::BehaviorVersion;
use aws_lambda_events::event::kafka::KafkaEvent;
use aws_sdk_secretsmanager::Client as SecretsManagerClient;
use chronicle_hub_shipper::chronicle::set_up_chronicle_client;
use chronicle_hub_shipper::config;
use chronicle_hub_shipper::Forwarder;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Error> {
    chronicle_hub_shipper::set_up_logging();

    info!(
        "Initializing {} version {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let mut config = config::Config::load_from_env()?;

    // if the service account provided is an ARN, get the key from Secrets Manager
    if config.service_account_is_secret_arn() {
        let aws_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        config
            .resolve_service_account(&SecretsManagerClient::new(&aws_config))
            .await
            .map_err(chronicle_hub_shipper::Error::from)?;
    }

    let ingestor = set_up_chronicle_client(&config)?;
    let forwarder = Forwarder::new(config.data_type.clone(), ingestor);

    run(service_fn(|request: LambdaEvent<KafkaEvent>| {
        chronicle_hub_shipper::function_handler(&forwarder, request)
    }))
    .await
}

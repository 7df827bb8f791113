use aws_lambda_events::event::kafka::KafkaEvent;
use lambda_runtime::{Error as LambdaError, LambdaEvent};
use tracing::level_filters::LevelFilter;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

pub mod auth;
pub mod chronicle;
pub mod config;
pub mod error;
pub mod events;
pub mod process;

pub use error::Error;
pub use process::Forwarder;

pub fn set_up_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .from_env_lossy(),
        )
        .init();
}

// lambda handler
pub async fn function_handler(
    forwarder: &Forwarder,
    evt: LambdaEvent<KafkaEvent>,
) -> Result<(), LambdaError> {
    info!("Handling lambda invocation");
    debug!("Handling event payload: {:?}", evt.payload);

    let batch = events::batch_from_kafka(evt.payload);
    forwarder.process(batch).await?;

    Ok(())
}

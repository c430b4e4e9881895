//! Event delivery through RabbitMQ.
//!
//! Events travel as CloudEvents JSON. The worker acknowledges a delivery once
//! every handler succeeded; infrastructure failures are requeued so the
//! event is retried, which relies on handlers being idempotent.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions,
    BasicQosOptions, BasicRejectOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::uri::{
    AMQPAuthority, AMQPQueryString, AMQPScheme, AMQPUri, AMQPUserInfo,
};
use lapin::{
    BasicProperties, Channel, Connection, ConnectionProperties, RecoveryConfig,
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::Broker;
use crate::error::{ApplicationError, Result, ToInternal};
use crate::events::{Dispatcher, Event};
use crate::ports::EventPublisher;

const DEFAULT_AMPQ_HOST: &str = "localhost";
const DEFAULT_AMPQ_PORT: u16 = 5672;
const DEFAULT_AMPQ_VHOST: &str = "/";
const DEFAULT_PREFETCH: u16 = 16;

const CONTENT_ENCODING: &str = "utf8";
const CONTENT_TYPE: &str = "application/cloudevents+json";
const DATA_CONTENT_TYPE: &str = "application/json";
const CLOUDEVENT_VERSION: &str = "1.0";
const EVENT_SOURCE: &str = "com.tessera.core";
const TYPE_PREFIX: &str = "com.tessera.";
const CONSUMER_TAG: &str = "tessera_worker";

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("unsupported AMQP scheme `{0}`")]
    InvalidScheme(String),
    #[error("unexpected event type `{0}`")]
    UnexpectedType(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct Cloudevent<T> {
    specversion: String,
    r#type: String,
    source: String,
    id: String,
    time: String,
    datacontenttype: String,
    data: T,
}

fn create_event(event: &Event) -> Cloudevent<&Event> {
    Cloudevent {
        specversion: CLOUDEVENT_VERSION.into(),
        r#type: format!("{TYPE_PREFIX}{}", event.kind()),
        source: EVENT_SOURCE.into(),
        id: event.id.clone(),
        time: event.time.with_timezone(&Utc).to_rfc3339(),
        datacontenttype: DATA_CONTENT_TYPE.into(),
        data: event,
    }
}

/// Decode a delivery body into an [`Event`].
///
/// # Errors
///
/// Returns `Err` if the body is not a CloudEvent or its `type` does not
/// match the embedded payload.
pub fn decode_event(body: &[u8]) -> Result<Event> {
    let envelope: Cloudevent<Event> = serde_json::from_slice(body).catch()?;
    let expected = format!("{TYPE_PREFIX}{}", envelope.data.kind());
    if envelope.r#type != expected {
        return Err(ApplicationError::internal(BrokerError::UnexpectedType(
            envelope.r#type,
        )));
    }
    Ok(envelope.data)
}

/// Open a connection to the broker described by `config`.
pub async fn connect(config: &Broker, name: &str) -> Result<Connection> {
    let addr = Url::parse(&config.address).catch()?;
    let uri = AMQPUri {
        scheme: AMQPScheme::from_str(addr.scheme()).map_err(|_| {
            ApplicationError::internal(BrokerError::InvalidScheme(
                addr.scheme().to_owned(),
            ))
        })?,
        authority: AMQPAuthority {
            userinfo: AMQPUserInfo {
                username: config.username.clone(),
                password: config.password.clone(),
            },
            host: addr.host_str().unwrap_or(DEFAULT_AMPQ_HOST).into(),
            port: addr.port().unwrap_or(DEFAULT_AMPQ_PORT),
        },
        vhost: config
            .vhost
            .clone()
            .unwrap_or(DEFAULT_AMPQ_VHOST.to_string()),
        query: AMQPQueryString {
            channel_max: config.pool,
            ..Default::default()
        },
    };

    let recovery_config = RecoveryConfig::default().auto_recover_connection();
    let conn_config = ConnectionProperties::default()
        .with_connection_name(name.into())
        .with_experimental_recovery_config(recovery_config);
    let conn = Connection::connect_uri(uri, conn_config).await.catch()?;

    tracing::info!(%addr, "rabbitmq connected");
    Ok(conn)
}

async fn create_channel(conn: &Connection, queue: &str) -> Result<Channel> {
    let channel = conn.create_channel().await.catch()?;
    channel
        .queue_declare(
            queue,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .catch()?;

    tracing::debug!(queue, "rabbitmq queue declared");
    Ok(channel)
}

/// Publishes events to a durable RabbitMQ queue.
#[derive(Clone)]
pub struct RabbitMqPublisher {
    queue: String,
    channel: Channel,
    _conn: Arc<Connection>,
}

impl RabbitMqPublisher {
    /// Create a new [`RabbitMqPublisher`].
    pub async fn new(config: &Broker) -> Result<Self> {
        let conn = connect(config, "tessera_publisher").await?;
        let channel = create_channel(&conn, &config.queue).await?;

        Ok(Self {
            queue: config.queue.clone(),
            channel,
            _conn: Arc::new(conn),
        })
    }
}

#[async_trait]
impl EventPublisher for RabbitMqPublisher {
    async fn publish(&self, event: Event) -> Result<()> {
        let payload = serde_json::to_string(&create_event(&event)).catch()?;

        self.channel
            .basic_publish(
                "",
                &self.queue,
                BasicPublishOptions::default(),
                payload.as_bytes(),
                BasicProperties::default()
                    .with_content_encoding(CONTENT_ENCODING.into())
                    .with_content_type(CONTENT_TYPE.into()),
            )
            .await
            .catch()?;

        tracing::trace!(id = %event.id, kind = %event.kind(), "event published");
        Ok(())
    }
}

/// Consumes events from RabbitMQ and hands them to a [`Dispatcher`].
pub struct RabbitMqConsumer {
    queue: String,
    channel: Channel,
    _conn: Arc<Connection>,
}

impl RabbitMqConsumer {
    /// Create a new [`RabbitMqConsumer`].
    pub async fn new(config: &Broker) -> Result<Self> {
        let conn = connect(config, "tessera_worker").await?;
        let channel = create_channel(&conn, &config.queue).await?;
        channel
            .basic_qos(
                config.prefetch.unwrap_or(DEFAULT_PREFETCH),
                BasicQosOptions::default(),
            )
            .await
            .catch()?;

        Ok(Self {
            queue: config.queue.clone(),
            channel,
            _conn: Arc::new(conn),
        })
    }

    /// Consume deliveries until the stream closes.
    pub async fn run(&self, dispatcher: &Dispatcher) -> Result<()> {
        let mut consumer = self
            .channel
            .basic_consume(
                &self.queue,
                CONSUMER_TAG,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .catch()?;

        tracing::info!(queue = %self.queue, "consuming events");

        while let Some(delivery) = consumer.next().await {
            let delivery = delivery.catch()?;
            handle_delivery(dispatcher, delivery).await?;
        }

        tracing::warn!(queue = %self.queue, "consumer stream closed");
        Ok(())
    }
}

async fn handle_delivery(dispatcher: &Dispatcher, delivery: Delivery) -> Result<()> {
    let event = match decode_event(&delivery.data) {
        Ok(event) => event,
        Err(err) => {
            tracing::error!(error = %err, "undecodable delivery rejected");
            delivery
                .acker
                .reject(BasicRejectOptions { requeue: false })
                .await
                .catch()?;
            return Ok(());
        },
    };

    let id = event.id.clone();
    match dispatcher.dispatch(event).await {
        Ok(()) => {
            delivery.acker.ack(BasicAckOptions::default()).await.catch()?;
        },
        Err(ApplicationError::Internal(err)) => {
            tracing::error!(%id, error = %err, "event requeued");
            delivery
                .acker
                .nack(BasicNackOptions {
                    requeue: true,
                    ..Default::default()
                })
                .await
                .catch()?;
        },
        Err(err) => {
            // a domain rejection will not change on retry.
            tracing::warn!(%id, error = %err, "event dropped");
            delivery.acker.ack(BasicAckOptions::default()).await.catch()?;
        },
    }

    Ok(())
}

use crate::error::{map_lapin_error, QueueError};
use crate::queue::{ClickQueue, Delivery};
use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::acker::Acker;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions, BasicQosOptions,
    BasicRejectOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer};
use tracing::{debug, info};
use typed_builder::TypedBuilder;
use wormhole_core::ClickEvent;

const PERSISTENT: u8 = 2;

#[derive(Debug, Clone, TypedBuilder)]
pub struct AmqpSettings {
    #[builder(setter(into))]
    pub url: String,
    #[builder(default = "clicks".to_string(), setter(into))]
    pub queue: String,
    /// Maximum number of unacknowledged deliveries held by the consumer.
    #[builder(default = 100)]
    pub prefetch: u16,
    #[builder(default = "analytics-worker".to_string(), setter(into))]
    pub consumer_tag: String,
}

async fn open_channel(url: &str, queue: &str) -> Result<(Connection, Channel), QueueError> {
    let connection = Connection::connect(url, ConnectionProperties::default())
        .await
        .map_err(map_lapin_error)?;
    let channel = connection.create_channel().await.map_err(map_lapin_error)?;

    channel
        .queue_declare(
            queue,
            QueueDeclareOptions {
                durable: true,
                ..QueueDeclareOptions::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(map_lapin_error)?;

    Ok((connection, channel))
}

/// Consumer side of the durable click queue on a RabbitMQ broker.
pub struct AmqpClickQueue {
    // kept so the connection outlives the consumer
    _connection: Connection,
    _channel: Channel,
    consumer: Consumer,
}

impl AmqpClickQueue {
    /// Connects, declares the durable queue, applies the prefetch limit and
    /// starts consuming with manual acknowledgement.
    pub async fn connect(settings: &AmqpSettings) -> Result<Self, QueueError> {
        let (connection, channel) = open_channel(&settings.url, &settings.queue).await?;

        channel
            .basic_qos(settings.prefetch, BasicQosOptions::default())
            .await
            .map_err(map_lapin_error)?;

        let consumer = channel
            .basic_consume(
                &settings.queue,
                &settings.consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(map_lapin_error)?;

        info!(
            queue = %settings.queue,
            prefetch = settings.prefetch,
            consumer_tag = %settings.consumer_tag,
            "consuming click queue"
        );

        Ok(Self {
            _connection: connection,
            _channel: channel,
            consumer,
        })
    }
}

#[async_trait]
impl ClickQueue for AmqpClickQueue {
    type Handle = Acker;

    async fn next_delivery(&mut self) -> Option<Result<Delivery<Acker>, QueueError>> {
        let delivery = self.consumer.next().await?;
        Some(
            delivery
                .map(|delivery| Delivery {
                    body: delivery.data,
                    redelivered: delivery.redelivered,
                    handle: delivery.acker,
                })
                .map_err(map_lapin_error),
        )
    }

    async fn ack(&mut self, handle: &Acker) -> Result<(), QueueError> {
        handle
            .ack(BasicAckOptions::default())
            .await
            .map(|_| ())
            .map_err(map_lapin_error)
    }

    async fn requeue(&mut self, handle: &Acker) -> Result<(), QueueError> {
        handle
            .nack(BasicNackOptions {
                requeue: true,
                ..BasicNackOptions::default()
            })
            .await
            .map(|_| ())
            .map_err(map_lapin_error)
    }

    async fn reject(&mut self, handle: &Acker) -> Result<(), QueueError> {
        handle
            .reject(BasicRejectOptions { requeue: false })
            .await
            .map(|_| ())
            .map_err(map_lapin_error)
    }
}

/// Producer side of the click queue: publishes events as persistent messages
/// through the default exchange.
pub struct ClickPublisher {
    _connection: Connection,
    channel: Channel,
    queue: String,
}

impl ClickPublisher {
    pub async fn connect(url: &str, queue: impl Into<String>) -> Result<Self, QueueError> {
        let queue = queue.into();
        let (connection, channel) = open_channel(url, &queue).await?;
        Ok(Self {
            _connection: connection,
            channel,
            queue,
        })
    }

    pub async fn publish(&self, event: &ClickEvent) -> Result<(), QueueError> {
        let body = event.to_vec()?;
        self.publish_raw(&body).await?;
        debug!(code = %event.short_code, "published click event");
        Ok(())
    }

    /// Publishes an arbitrary body and waits for the broker to take it.
    pub async fn publish_raw(&self, body: &[u8]) -> Result<(), QueueError> {
        self.channel
            .basic_publish(
                "",
                &self.queue,
                BasicPublishOptions::default(),
                body,
                BasicProperties::default().with_delivery_mode(PERSISTENT),
            )
            .await
            .map_err(|e| QueueError::Publish(e.to_string()))?
            .await
            .map_err(|e| QueueError::Publish(e.to_string()))?;
        Ok(())
    }
}

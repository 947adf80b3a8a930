use crate::Result;
use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::ImageExt;
use testcontainers::{ContainerAsync, GenericImage};
use typed_builder::TypedBuilder;

const AMQP_PORT: u16 = 5672;

#[derive(TypedBuilder)]
pub struct RabbitMqConfig {
    // the built-in guest account only accepts loopback connections
    #[builder(default = "wormhole".to_string())]
    username: String,
    #[builder(default = "wormhole".to_string())]
    password: String,
}

/// Test fixture for a disposable RabbitMQ broker.
pub struct RabbitMqServer {
    container: ContainerAsync<GenericImage>,
    config: RabbitMqConfig,
}

impl RabbitMqServer {
    /// Starts a RabbitMQ container suitable for integration tests.
    pub async fn new(config: RabbitMqConfig) -> Result<Self> {
        let container = GenericImage::new("rabbitmq", "3.13-alpine")
            .with_exposed_port(AMQP_PORT.tcp())
            .with_wait_for(WaitFor::message_on_stdout("Server startup complete"))
            .with_env_var("RABBITMQ_DEFAULT_USER", config.username.as_str())
            .with_env_var("RABBITMQ_DEFAULT_PASS", config.password.as_str())
            .start()
            .await?;

        Ok(Self { container, config })
    }

    pub async fn host(&self) -> Result<String> {
        let host = self.container.get_host().await?.to_string();
        match host.as_str() {
            "localhost" => Ok(String::from("127.0.0.1")),
            _ => Ok(host),
        }
    }

    pub async fn port(&self) -> Result<u16> {
        Ok(self.container.get_host_port_ipv4(AMQP_PORT).await?)
    }

    /// Returns an `amqp://` URL for the default vhost.
    pub async fn amqp_url(&self) -> Result<String> {
        let host = self.host().await?;
        let port = self.port().await?;
        Ok(format!(
            "amqp://{}:{}@{}:{}/%2f",
            self.config.username, self.config.password, host, port
        ))
    }

    /// Returns the underlying container reference.
    pub fn container(&self) -> &ContainerAsync<GenericImage> {
        &self.container
    }
}

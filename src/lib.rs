//! Tessera is the authorization core of a social network backend.
//!
//! It answers permission questions over users, friendships, chats,
//! communities, posts and messages, and drives the lifecycle of pending
//! requests and invitations through domain events.

#![forbid(unsafe_code)]

pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod permission;
pub mod ports;
pub mod telemetry;

use std::sync::Arc;

use adapters::postgres::PgStore;
use adapters::rabbitmq::RabbitMqPublisher;
use events::Dispatcher;
use lifecycle::Lifecycle;
use permission::Permissions;
use ports::{EntityStore, EventPublisher};

/// State shared by every consumer of the core.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Configuration>,
    pub store: Arc<dyn EntityStore>,
    pub dispatcher: Dispatcher,
    pub publisher: Arc<dyn EventPublisher>,
    pub permissions: Permissions,
    pub lifecycle: Lifecycle,
}

impl AppState {
    /// Wire services over `store`.
    ///
    /// Without a publisher, events are dispatched in-process.
    pub fn new(
        config: Arc<config::Configuration>,
        store: Arc<dyn EntityStore>,
        publisher: Option<Arc<dyn EventPublisher>>,
    ) -> Result<Self, events::GraphError> {
        let dispatcher = events::default_dispatcher(Arc::clone(&store))?;
        let publisher = publisher
            .unwrap_or_else(|| Arc::new(dispatcher.clone()) as Arc<dyn EventPublisher>);
        let permissions = Permissions::new(Arc::clone(&store));
        let lifecycle = Lifecycle::new(
            Arc::clone(&store),
            &permissions,
            Arc::clone(&publisher),
        );

        Ok(Self {
            config,
            store,
            dispatcher,
            publisher,
            permissions,
            lifecycle,
        })
    }
}

/// Initialize the application state.
pub async fn initialize_state(
    config: Arc<config::Configuration>,
) -> Result<AppState, Box<dyn std::error::Error + Send + Sync>> {
    let Some(postgres) = &config.postgres else {
        return Err("missing `postgres` entry on `config.yaml` file".into());
    };
    let store = PgStore::connect(postgres).await?;

    // execute migrations scripts on start.
    store.migrate().await?;

    let publisher = match &config.broker {
        Some(broker) => {
            Some(Arc::new(RabbitMqPublisher::new(broker).await?)
                as Arc<dyn EventPublisher>)
        },
        None => {
            tracing::warn!("missing `broker` entry, events stay in-process");
            None
        },
    };

    Ok(AppState::new(
        Arc::clone(&config),
        Arc::new(store),
        publisher,
    )?)
}

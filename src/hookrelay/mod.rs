pub mod allowlist;
pub mod backoff;
pub mod broadcaster;
pub mod cli;
pub mod config;
pub mod handler;
pub mod idset;
pub mod ingress;
pub mod store;
pub mod subscriptions;
pub mod telegram;
pub mod types;
pub mod updates;

use std::net::SocketAddr;
use std::sync::Arc;

use log::{info, warn};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use allowlist::AllowList;
use backoff::BackoffPolicy;
use broadcaster::Publisher;
use config::RelayConfig;
use handler::CommandDispatcher;
use ingress::run_ingress;
use store::open_store;
use subscriptions::SubscriptionManager;
use telegram::{BotClient, ChatApi};
use updates::UpdateLoop;

/// Long-lived components shared by the update loop and the ingress listener
pub struct Relay {
    pub dispatcher: Arc<CommandDispatcher>,
    pub publisher: Arc<Publisher>,
    updates: UpdateLoop,
}

impl Relay {
    pub fn new(
        api: Arc<dyn ChatApi>,
        subscriptions: Arc<SubscriptionManager>,
        allowlist: Arc<AllowList>,
        bot_id: i64,
        config: &RelayConfig,
    ) -> Self {
        let dispatcher = Arc::new(CommandDispatcher::new(
            api.clone(),
            subscriptions.clone(),
            allowlist,
            bot_id,
        ));
        let publisher = Arc::new(
            Publisher::new(api.clone(), subscriptions)
                .with_parse_mode(config.parse_mode.clone())
                .with_min_interval(config.min_send_interval()),
        );
        let updates = UpdateLoop::new(api, dispatcher.clone(), config.max_concurrent_updates)
            .with_poll_timeout(config.poll_timeout())
            .with_retries(config.transport_retries, BackoffPolicy::default());

        Self {
            dispatcher,
            publisher,
            updates,
        }
    }

    /// Runs the update loop and the ingress listener until either fails or
    /// `shutdown` is cancelled
    pub async fn run(self, addr: SocketAddr, shutdown: CancellationToken) -> Result<()> {
        let Relay { publisher, updates, .. } = self;
        tokio::try_join!(
            updates.run(shutdown.clone()),
            run_ingress(addr, publisher, shutdown.clone())
        )?;
        Ok(())
    }
}

/// Starts the relay: store, bot identity, update loop and HTTP ingress
pub async fn init(config: RelayConfig) -> Result<()> {
    config.validate()?;
    let addr = config.listen_addr()?;

    let store = open_store(&config).await?;
    let subscriptions = Arc::new(SubscriptionManager::load(store.clone()).await);
    let allowlist = Arc::new(
        AllowList::load(store, config.admin_id.clone(), config.enforce_allowlist).await,
    );

    let api: Arc<dyn ChatApi> = Arc::new(BotClient::new(&config.bot_token, config.debug));
    let me = api.get_me().await?;
    info!("Authorized telegram robot as @{}", me.username.as_deref().unwrap_or(&me.first_name));

    let shutdown = CancellationToken::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install ctrl-c handler: {}", e);
            return;
        }
        info!("Shutdown requested");
        on_signal.cancel();
    });

    Relay::new(api, subscriptions, allowlist, me.id, &config)
        .run(addr, shutdown)
        .await
}

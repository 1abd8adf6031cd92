//! MongoDB connection supervisor.
//!
//! Keeps trying to (re)connect with exponential backoff, installs the store
//! handles on success and clears them (flipping the application into degraded
//! mode) whenever the health ping starts failing.

use std::{sync::Arc, time::Duration};

use tokio::time::{MissedTickBehavior, interval, sleep};
use tracing::{error, info, warn};

use crate::{
    dao::session_store::{
        SessionStore,
        mongodb::{MongoConfig, MongoStore},
    },
    state::{SharedState, StoreHandles},
};

const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(10);
const INITIAL_RETRY_DELAY: Duration = Duration::from_secs(1);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Supervise the MongoDB connection for the lifetime of the process.
pub async fn run(state: SharedState) {
    let config = match MongoConfig::from_env().await {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "invalid MongoDB configuration; staying in degraded mode");
            return;
        }
    };

    let mut retry_delay = INITIAL_RETRY_DELAY;
    loop {
        match MongoStore::connect(config.clone()).await {
            Ok(store) => {
                info!(database = %config.database_name, "MongoDB connected");
                retry_delay = INITIAL_RETRY_DELAY;
                state
                    .install_stores(StoreHandles {
                        sessions: Arc::new(store.clone()),
                        scores: Arc::new(store.clone()),
                    })
                    .await;

                monitor(&store).await;
                warn!("MongoDB health check failed; entering degraded mode");
                state.clear_stores().await;
            }
            Err(err) => {
                warn!(
                    error = %err,
                    retry_in = ?retry_delay,
                    "MongoDB connection failed"
                );
            }
        }

        sleep(retry_delay).await;
        retry_delay = (retry_delay * 2).min(MAX_RETRY_DELAY);
    }
}

/// Ping until the connection goes bad.
async fn monitor(store: &MongoStore) {
    let mut ticker = interval(HEALTH_CHECK_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        if let Err(err) = SessionStore::health_check(store).await {
            warn!(error = %err, "MongoDB ping failed");
            return;
        }
    }
}

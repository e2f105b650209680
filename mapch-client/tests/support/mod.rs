#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use mapch_client::ApiClient;
use mapch_client::infra::testing::stubs::ScriptedTransport;
use mapch_config::Config;
use mapch_model::ViewportSnapshot;

pub fn config() -> Config {
    Config::defaults().expect("default config")
}

pub fn client(transport: &ScriptedTransport) -> ApiClient {
    ApiClient::new(&config(), Arc::new(transport.clone()))
}

pub fn tokyo() -> ViewportSnapshot {
    ViewportSnapshot::new(35.681, 139.767, 0.05, 0.05)
}

pub fn osaka() -> ViewportSnapshot {
    ViewportSnapshot::new(34.702, 135.495, 0.05, 0.05)
}

/// Let spawned tasks run without moving the paused clock.
pub async fn drain() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// Advance the paused clock by `ms`, then drain.
pub async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    drain().await;
}

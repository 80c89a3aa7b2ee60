#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use tokensmith::{EngineConfig, MemoryStore, TokenEngine};
use uuid::Uuid;

pub const HMAC_KEY: &str = "0123456789abcdef0123456789abcdef";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .try_init();
}

pub fn subject() -> Uuid {
    Uuid::parse_str("11111111-1111-1111-1111-111111111111").expect("subject uuid")
}

pub fn session() -> Uuid {
    Uuid::parse_str("22222222-2222-2222-2222-222222222222").expect("session uuid")
}

pub fn roles() -> Vec<String> {
    vec!["user".to_string()]
}

pub fn hmac_config() -> EngineConfig {
    EngineConfig {
        symmetric_key: Some(HMAC_KEY.to_string()),
        issuer: "auth.test".to_string(),
        audience: vec!["api.test".to_string()],
        access_expiry: Duration::from_secs(15 * 60),
        access_max_lifetime: Duration::from_secs(24 * 60 * 60),
        refresh_expiry: Duration::from_secs(60 * 60),
        refresh_max_lifetime: Duration::from_secs(7 * 24 * 60 * 60),
        cleanup_interval: Duration::from_secs(1),
        ..EngineConfig::default()
    }
}

pub fn stateless_engine() -> TokenEngine {
    init_tracing();
    TokenEngine::new(hmac_config()).expect("stateless engine")
}

pub fn stateful_engine() -> (TokenEngine, Arc<MemoryStore>) {
    stateful_engine_with(hmac_config())
}

pub fn stateful_engine_with(config: EngineConfig) -> (TokenEngine, Arc<MemoryStore>) {
    init_tracing();
    let store = Arc::new(MemoryStore::new());
    let config = EngineConfig {
        revocation_enabled: true,
        rotation_enabled: true,
        ..config
    };
    let engine = TokenEngine::with_store(config, store.clone()).expect("stateful engine");
    (engine, store)
}

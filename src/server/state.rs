use axum::extract::FromRef;
use std::sync::Arc;
use std::time::Instant;

use crate::audio::AudioResolver;
use crate::cache::ResponseCache;
use crate::catalog_store::CatalogStore;
use crate::radio::RadioManager;

use super::ServerConfig;

pub type GuardedCatalogStore = Arc<dyn CatalogStore>;
pub type GuardedRadioManager = Arc<RadioManager>;
pub type GuardedResponseCache = Arc<ResponseCache>;
pub type GuardedAudioResolver = Arc<dyn AudioResolver>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub catalog_store: GuardedCatalogStore,
    pub radio_manager: GuardedRadioManager,
    pub cache: GuardedResponseCache,
    pub audio_resolver: GuardedAudioResolver,
}

impl FromRef<ServerState> for GuardedCatalogStore {
    fn from_ref(input: &ServerState) -> Self {
        input.catalog_store.clone()
    }
}

impl FromRef<ServerState> for GuardedRadioManager {
    fn from_ref(input: &ServerState) -> Self {
        input.radio_manager.clone()
    }
}

impl FromRef<ServerState> for GuardedResponseCache {
    fn from_ref(input: &ServerState) -> Self {
        input.cache.clone()
    }
}

impl FromRef<ServerState> for GuardedAudioResolver {
    fn from_ref(input: &ServerState) -> Self {
        input.audio_resolver.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

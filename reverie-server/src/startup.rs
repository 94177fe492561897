//! Wiring from configuration to the live store and agent context.

use std::sync::Arc;

use reverie_core::config::{LlmConfig, StorageBackend};
use reverie_core::store::{MemoryStore, PgStore, Store};
use reverie_core::{LlmClientConfig, OpenRouterClient, ReverieConfig, ReverieError};

use crate::agents::{AgentContext, ModelSet};

/// Open the configured backend. Postgres gets its schema ensured first.
pub async fn open_store(config: &ReverieConfig) -> Result<Arc<dyn Store>, ReverieError> {
    match config.storage.backend {
        StorageBackend::Postgres => {
            let pool = reverie_core::db::create_pool(&config.database).await?;
            reverie_core::db::ensure_schema(&pool).await?;
            tracing::info!(max_connections = config.database.max_connections, "Postgres store ready");
            Ok(Arc::new(PgStore::new(pool)))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory store; entries are lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Build the agent context. `llm.api_key` wins over `env_key`.
pub fn build_agents(config: &LlmConfig, env_key: Option<String>) -> Result<AgentContext, ReverieError> {
    let api_key = config
        .api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .or(env_key)
        .unwrap_or_default();
    let client = OpenRouterClient::new(LlmClientConfig::from_settings(config, api_key))?;
    Ok(AgentContext::new(Arc::new(client), ModelSet::from(config)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reverie_core::config::StorageConfig;
    use reverie_core::LlmError;

    #[tokio::test]
    async fn test_memory_backend_needs_no_database() {
        let config = ReverieConfig {
            storage: StorageConfig {
                backend: StorageBackend::Memory,
            },
            ..ReverieConfig::default()
        };
        let store = open_store(&config).await.unwrap();
        assert_eq!(store.name(), "memory");
    }

    #[test]
    fn test_missing_api_key_is_fatal() {
        let err = build_agents(&LlmConfig::default(), None).err().unwrap();
        assert!(matches!(err, ReverieError::Llm(LlmError::MissingApiKey)));
    }

    #[test]
    fn test_env_key_is_fallback() {
        let ctx = build_agents(&LlmConfig::default(), Some("from-env".to_string())).unwrap();
        assert_eq!(ctx.models, ModelSet::default());

        let config = LlmConfig {
            api_key: Some("  ".to_string()),
            ..LlmConfig::default()
        };
        assert!(build_agents(&config, Some("from-env".to_string())).is_ok());
    }
}

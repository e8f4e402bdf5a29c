use crate::database::repository::TestConfigStore;
use crate::error::{Error, Result};
use crate::models::question::TestLevel;
use crate::models::test_config::TestConfig;
use std::sync::Arc;

#[derive(Clone)]
pub struct TestConfigService {
    configs: Arc<dyn TestConfigStore>,
}

impl TestConfigService {
    pub fn new(configs: Arc<dyn TestConfigStore>) -> Self {
        Self { configs }
    }

    pub async fn list(&self) -> Result<Vec<TestConfig>> {
        self.configs.list_configs().await
    }

    pub async fn get(&self, level: TestLevel) -> Result<TestConfig> {
        self.configs
            .get_config(level)
            .await?
            .ok_or_else(|| Error::NotFound(format!("No configuration for level {}", level)))
    }

    pub async fn upsert(&self, level: TestLevel, duration_minutes: i32) -> Result<TestConfig> {
        let config = self.configs.upsert_config(level, duration_minutes).await?;
        tracing::info!(%level, duration_minutes, "test duration configured");
        Ok(config)
    }

    /// Only updates an existing level; use `upsert` to create one.
    pub async fn update(&self, level: TestLevel, duration_minutes: i32) -> Result<TestConfig> {
        self.get(level).await?;
        self.upsert(level, duration_minutes).await
    }

    pub async fn delete(&self, level: TestLevel) -> Result<()> {
        if !self.configs.delete_config(level).await? {
            return Err(Error::NotFound(format!("No configuration for level {}", level)));
        }
        Ok(())
    }
}

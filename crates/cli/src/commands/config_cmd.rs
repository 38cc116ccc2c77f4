//! `oracle config` — Configuration commands.

use oracle_config::AppConfig;
use oracle_core::provider::LanguageModel;
use oracle_providers::OpenAiCompatModel;
use std::time::Duration;

const HEALTH_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn run(check: bool) -> anyhow::Result<()> {
    if !check {
        print!("{}", AppConfig::default_toml());
        return Ok(());
    }

    println!("🔍 Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let mut warnings = Vec::new();
            if !config.has_api_key() {
                warnings.push("No model API key set (set GOOGLE_API_KEY, OPENAI_API_KEY or ORACLE_API_KEY)".to_string());
            }
            if config.memory.backend == "mem0" && config.memory.api_key.is_none() {
                warnings.push("Memory backend is mem0 but MEM0_API_KEY is not set".to_string());
            }
            if config.memory.backend == "none" {
                warnings.push("Memory is disabled; nothing will be remembered between sessions".to_string());
            }
            if !config.email.is_configured() {
                warnings.push("Email sender not configured (GMAIL_USER, GMAIL_APP_PASSWORD)".to_string());
            }
            if config.has_api_key() {
                match OpenAiCompatModel::from_config(&config.model) {
                    Ok(model) => warnings.extend(check_model(&model).await),
                    Err(e) => warnings.push(format!("Model client could not be built: {e}")),
                }
            }

            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   User:      {}", config.user_id);
            println!("   Model:     {} @ {}", config.model.model, config.model.base_url);
            println!("   Memory:    {}", config.memory.backend);
            if config.memory.backend == "file" {
                println!("   Facts:     {}", config.memory_path().display());
            }
            println!("   City:      {}", config.default_city);
            println!("   Timeouts:  {}s per tool", config.tool_timeout_seconds);
            if config.email.is_configured() {
                println!("   Email:     {}:{}", config.email.smtp_host, config.email.smtp_port);
            }
            Ok(())
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            Err(e.into())
        }
    }
}

/// Ask the model endpoint whether it is reachable; a warning if not.
async fn check_model(model: &dyn LanguageModel) -> Option<String> {
    match tokio::time::timeout(HEALTH_TIMEOUT, model.health_check()).await {
        Ok(Ok(true)) => None,
        Ok(Ok(false)) => Some(format!("Model endpoint for {} rejected the health check", model.name())),
        Ok(Err(e)) => Some(format!("Model endpoint unreachable: {e}")),
        Err(_) => Some(format!("Model endpoint did not answer within {}s", HEALTH_TIMEOUT.as_secs())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use oracle_core::error::ProviderError;
    use oracle_core::provider::{Decision, ModelContext};
    use oracle_core::tool::ToolDefinition;

    struct Endpoint(Result<bool, &'static str>);

    #[async_trait]
    impl LanguageModel for Endpoint {
        fn name(&self) -> &str {
            "endpoint"
        }

        async fn decide(&self, _: &ModelContext, _: &[ToolDefinition]) -> Result<Decision, ProviderError> {
            Err(ProviderError::NotConfigured("unused".into()))
        }

        async fn generate(&self, _: &ModelContext) -> Result<String, ProviderError> {
            Err(ProviderError::NotConfigured("unused".into()))
        }

        async fn health_check(&self) -> Result<bool, ProviderError> {
            self.0.map_err(|e| ProviderError::Network(e.into()))
        }
    }

    #[tokio::test]
    async fn healthy_model_adds_no_warning() {
        assert!(check_model(&Endpoint(Ok(true))).await.is_none());
    }

    #[tokio::test]
    async fn unhealthy_model_is_reported() {
        let rejected = check_model(&Endpoint(Ok(false))).await.unwrap();
        assert!(rejected.contains("rejected"));

        let down = check_model(&Endpoint(Err("connection refused"))).await.unwrap();
        assert!(down.contains("refused"));
    }
}

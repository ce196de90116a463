use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    pub data_dir: PathBuf,
    pub retrieval: RetrievalConfig,
    pub llm: LlmSettings,
    pub qa: QaConfig,
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Passages requested per retrieval pass.
    pub top_k: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    /// Custom OpenAI-compatible endpoint; None selects local Ollama.
    pub endpoint: Option<String>,
    pub model: String,
    pub api_key: String,
    pub max_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaConfig {
    /// Rewrite-retry ceiling; grading forces acceptance once the
    /// recursion count reaches this value.
    pub max_rewrites: u32,
    /// Most recent exchanges kept when bounding caller history.
    pub history_window: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub dataset_path: PathBuf,
    pub python_bin: String,
    pub timeout_secs: u64,
    pub max_output_bytes: usize,
    pub sample_values_per_column: usize,
}

impl AssistantConfig {
    /// Validate config values, returning errors for clearly broken
    /// configurations.
    pub fn validate(&self) -> Result<(), String> {
        if self.retrieval.top_k == 0 {
            return Err("retrieval.top_k must be > 0".into());
        }
        if self.llm.model.is_empty() {
            return Err("llm.model must not be empty".into());
        }
        if self.llm.max_tokens == 0 {
            return Err("llm.max_tokens must be > 0".into());
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err("llm.temperature must be in [0.0, 2.0]".into());
        }
        if self.qa.history_window == 0 {
            return Err("qa.history_window must be > 0".into());
        }
        if self.analysis.timeout_secs == 0 {
            return Err("analysis.timeout_secs must be > 0".into());
        }
        if self.analysis.max_output_bytes == 0 {
            return Err("analysis.max_output_bytes must be > 0".into());
        }
        if self.analysis.sample_values_per_column == 0 {
            return Err("analysis.sample_values_per_column must be > 0".into());
        }
        Ok(())
    }

    /// Load config from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        let config: Self =
            serde_json::from_str(&content).map_err(|e| format!("Failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for AssistantConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("parakh-rag");

        Self {
            data_dir: data_dir.clone(),
            retrieval: RetrievalConfig { top_k: 3 },
            llm: LlmSettings {
                endpoint: None,
                model: "llama3.2:latest".to_string(),
                api_key: String::new(),
                max_tokens: 2000,
                temperature: 0.0,
                top_p: 0.95,
            },
            qa: QaConfig {
                max_rewrites: 2,
                history_window: 3,
            },
            analysis: AnalysisConfig {
                dataset_path: data_dir.join("clean_data.csv"),
                python_bin: "python".to_string(),
                timeout_secs: 30,
                max_output_bytes: 1_048_576,
                sample_values_per_column: 10,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(AssistantConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_top_k_is_rejected() {
        let mut config = AssistantConfig::default();
        config.retrieval.top_k = 0;
        let err = config.validate().unwrap_err();
        assert!(err.contains("top_k"));
    }

    #[test]
    fn empty_model_is_rejected() {
        let mut config = AssistantConfig::default();
        config.llm.model.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_sandbox_timeout_is_rejected() {
        let mut config = AssistantConfig::default();
        config.analysis.timeout_secs = 0;
        assert!(config.validate().is_err());
    }
}

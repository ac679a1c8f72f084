// Chat-completions fallback provider (cargo feature `llm`).
//
// Speaks the OpenAI-compatible chat JSON protocol. Responses are parsed
// strictly; anything that does not match the requested schema becomes an
// error, which the extractor treats as "no result".

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{FallbackRole, HeaderRoleFallback, PatientNameFallback};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4.1-mini";
const REQUEST_TIMEOUT_SECS: u64 = 30;

const HEADER_SYSTEM_PROMPT: &str = "You are an expert at labeling table columns in veterinary lab reports. \
Given sample rows (array of token arrays), infer column roles among: name, result, unit, reference, min, max. \
Return a single JSON object mapping each role to an object with fields: {\"col_index\": <int>, \"confidence\": <float>}. \
Rules: name is the first column with test codes; result is numeric values (may include H/L/N suffix); \
unit is measurement units; reference is a range (a-b). If the document splits the range into two separate \
columns, use min and max instead of reference. Choose either 'reference' OR ('min' and 'max'); never both. \
Do not assign the same column index to multiple roles. Output only the JSON object.";

const PATIENT_SYSTEM_PROMPT: &str = "You are an expert at extracting patient names from veterinary lab report headers. \
Given a text block from the document header, extract ONLY the patient (pet) name. Do not confuse the patient \
name with the client/owner name. If uncertain, return an empty string. \
Output format: plain text, just the name or empty string.";

/// OpenAI-compatible provider for both fallback capabilities.
pub struct OpenAiFallback {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiFallback {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .expect("reqwest client"),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn chat(&self, system: &str, user: String, json_mode: bool) -> Result<String> {
        let mut payload = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "temperature": 0,
        });
        if json_mode {
            payload["response_format"] = json!({"type": "json_object"});
        }

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .context("fallback request failed")?
            .error_for_status()
            .context("fallback returned an error status")?;

        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: Message,
        }
        #[derive(Deserialize)]
        struct Message {
            content: Option<String>,
        }

        let body: ChatResponse = resp.json().await.context("malformed chat response")?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| anyhow!("empty fallback response"))
    }
}

fn parse_role_object(value: &Value) -> Option<(usize, f64)> {
    match value {
        // Recommended shape: {"col_index": 2, "confidence": 0.9}
        Value::Object(map) => {
            let col = map.get("col_index")?.as_i64()?;
            if col < 0 {
                return None;
            }
            let conf = map
                .get("confidence")
                .and_then(Value::as_f64)
                .unwrap_or(0.9);
            Some((col as usize, conf))
        }
        // Simple shape: a bare index.
        Value::Number(n) => {
            let col = n.as_i64()?;
            if col < 0 {
                return None;
            }
            Some((col as usize, 0.9))
        }
        _ => None,
    }
}

#[async_trait]
impl HeaderRoleFallback for OpenAiFallback {
    async fn infer_header_roles(&self, sample_rows: &[Vec<String>]) -> Result<Vec<FallbackRole>> {
        let user = serde_json::to_string_pretty(&json!({
            "sample_rows": sample_rows,
            "notes": "Pick exactly one index per applicable role. Use reference OR (min and max), not both.",
        }))?;
        let content = self.chat(HEADER_SYSTEM_PROMPT, user, true).await?;
        let parsed: Value =
            serde_json::from_str(&content).context("fallback did not return JSON")?;
        let object = parsed
            .as_object()
            .ok_or_else(|| anyhow!("fallback JSON is not an object"))?;

        let mut roles = Vec::new();
        for (role, value) in object {
            let Some((col_index, confidence)) = parse_role_object(value) else {
                continue;
            };
            roles.push(FallbackRole {
                role: role.clone(),
                col_index,
                confidence,
            });
        }
        debug!(roles = roles.len(), "fallback header roles parsed");
        Ok(roles)
    }
}

#[async_trait]
impl PatientNameFallback for OpenAiFallback {
    async fn extract_patient_name(
        &self,
        header_region_text: &str,
        known_client_name: Option<&str>,
    ) -> Result<String> {
        let mut user = format!("Header text:\n{header_region_text}");
        if let Some(client) = known_client_name.filter(|c| !c.trim().is_empty()) {
            user.push_str(&format!(
                "\nNote: the client/owner name is already known as '{client}'. Do NOT return this value."
            ));
        }
        let name = self.chat(PATIENT_SYSTEM_PROMPT, user, false).await?;
        Ok(name.trim().trim_matches(['"', '\'']).to_string())
    }
}

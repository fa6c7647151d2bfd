use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::{json, Value};
use shared::ExtractedExpense;
use thiserror::Error;
use tracing::debug;

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const EXTRACTION_MODEL: &str = "gpt-4o";
const MAX_COMPLETION_TOKENS: u32 = 300;

const EXTRACTION_PROMPT: &str = r#"
Analyze the receipt image and extract the following details precisely into a single JSON object.
Do not add any extra text, comments, or markdown formatting like ```json.
The JSON object must have these exact keys: "Date", "Expense_Name", "Amount", "Currency", "Category".
- "Date": The date in YYYY-MM-DD format.
- "Expense_Name": The merchant's name.
- "Amount": The total amount as a number (float or integer).
- "Currency": The 3-letter currency code (e.g., THB, EUR, USD).
- "Category": A relevant category from this list: Food, Transport, Lodging, Entertainment, Supplies, Other.
"#;

/// Failure classes of the extraction call. Each carries enough detail to
/// diagnose from the log; none of them must take the process down.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("extraction request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected model response shape: {0}")]
    MalformedResponse(String),
    #[error("model content is not valid JSON: {0}")]
    InvalidContent(#[from] serde_json::Error),
}

impl ExtractError {
    /// Short kind label for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractError::Http(_) => "http",
            ExtractError::MalformedResponse(_) => "malformed_response",
            ExtractError::InvalidContent(_) => "invalid_content",
        }
    }
}

/// Client for the vision model that pre-fills expense fields from a receipt
/// photo. Constructed once at startup with its credential and injected into
/// the handlers that need it.
pub struct ExtractionClient {
    http: reqwest::Client,
    api_key: String,
}

impl ExtractionClient {
    pub fn new(api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
        }
    }

    /// Send the receipt image to the vision model and parse its best-effort
    /// field guesses.
    pub async fn extract(&self, image: &[u8]) -> Result<ExtractedExpense, ExtractError> {
        debug!("Encoding {} byte receipt image", image.len());
        let encoded = BASE64.encode(image);

        let request = json!({
            "model": EXTRACTION_MODEL,
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "text", "text": EXTRACTION_PROMPT},
                    {
                        "type": "image_url",
                        "image_url": {"url": format!("data:image/jpeg;base64,{}", encoded)}
                    }
                ]
            }],
            "max_tokens": MAX_COMPLETION_TOKENS
        });

        debug!("Sending extraction request to {}", EXTRACTION_MODEL);
        let response: Value = self
            .http
            .post(OPENAI_API_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let content = response["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                ExtractError::MalformedResponse("missing choices[0].message.content".to_string())
            })?;

        parse_model_content(content)
    }
}

/// Parse the model's reply into the extraction contract. The model is told
/// not to wrap its output, but sometimes does anyway; markdown fences are
/// stripped before parsing.
fn parse_model_content(content: &str) -> Result<ExtractedExpense, ExtractError> {
    let cleaned = content.trim().replace("```json", "").replace("```", "");
    let extracted = serde_json::from_str(cleaned.trim())?;
    Ok(extracted)
}

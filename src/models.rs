use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: &str) -> Self {
        Message {
            role: "system".to_string(),
            content: content.to_string(),
        }
    }

    pub fn user(content: &str) -> Self {
        Message {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }
}

/// Body sent to the completions endpoint.
#[derive(Debug, Serialize, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub stream: bool,
}

/// One `data: ` payload of the upstream event stream.
#[derive(Debug, Deserialize)]
pub struct Chunk {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub delta: Option<Delta>,
}

#[derive(Debug, Deserialize)]
pub struct Delta {
    #[serde(default)]
    pub content: Option<String>,
}

impl Chunk {
    /// `choices[0].delta.content`, when present and non-empty.
    pub fn into_content(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta)
            .and_then(|delta| delta.content)
            .filter(|content| !content.is_empty())
    }
}

/// Inbound `POST /api/chat` payload. Fields are kept as raw JSON so that a
/// missing or mistyped field is reported as a client error rather than a
/// decode failure.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct ChatRequest {
    #[serde(default)]
    pub role: Option<Value>,
    #[serde(default)]
    pub message: Option<Value>,
}

impl ChatRequest {
    pub fn new(role: &str, message: &str) -> Self {
        ChatRequest {
            role: Some(Value::from(role)),
            message: Some(Value::from(message)),
        }
    }
}

/// `null`, `false`, `0` and `""` count as absent.
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::Bool(b)) => !b,
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => false,
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

/// One entry of the client-side transcript.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: Speaker,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: &str) -> Self {
        ChatTurn {
            role: Speaker::User,
            content: content.to_string(),
        }
    }

    pub fn assistant(content: &str) -> Self {
        ChatTurn {
            role: Speaker::Assistant,
            content: content.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_content() {
        let chunk: Chunk =
            serde_json::from_str(r#"{"choices":[{"delta":{"content":"Hello"}}]}"#).unwrap();
        assert_eq!(chunk.into_content(), Some("Hello".to_string()));
    }

    #[test]
    fn test_chunk_without_content() {
        let role_only: Chunk =
            serde_json::from_str(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#).unwrap();
        assert_eq!(role_only.into_content(), None);

        let finish: Chunk =
            serde_json::from_str(r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#).unwrap();
        assert_eq!(finish.into_content(), None);

        let empty: Chunk =
            serde_json::from_str(r#"{"choices":[{"delta":{"content":""}}]}"#).unwrap();
        assert_eq!(empty.into_content(), None);

        let no_choices: Chunk = serde_json::from_str(r#"{"usage":{"total_tokens":3}}"#).unwrap();
        assert_eq!(no_choices.into_content(), None);
    }

    #[test]
    fn test_completion_request_shape() {
        let request = CompletionRequest {
            model: "llama-3.1-8b-instant".to_string(),
            messages: vec![Message::system("be brief"), Message::user("hi")],
            stream: true,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "model": "llama-3.1-8b-instant",
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "hi"}
                ],
                "stream": true
            })
        );
    }

    #[test]
    fn test_blank_values() {
        for blank in [
            serde_json::json!(null),
            serde_json::json!(false),
            serde_json::json!(0),
            serde_json::json!(0.0),
            serde_json::json!(""),
        ] {
            assert!(is_blank(Some(&blank)), "{}", blank);
        }
        assert!(is_blank(None));
        assert!(!is_blank(Some(&serde_json::json!(5))));
        assert!(!is_blank(Some(&serde_json::json!("HR"))));
        assert!(!is_blank(Some(&serde_json::json!([]))));
    }

    #[test]
    fn test_chat_turn_serializes_lowercase_role() {
        let turn = ChatTurn::assistant("ok");
        assert_eq!(
            serde_json::to_string(&turn).unwrap(),
            r#"{"role":"assistant","content":"ok"}"#
        );
    }
}

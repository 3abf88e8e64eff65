//! Typed view of the messages an agent runtime streams back
//!
//! Mirrors the newline-delimited JSON the agent CLI emits in stream-json
//! mode. Unknown fields are ignored so newer runtimes keep parsing.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One message from the runtime's response stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentMessage {
    /// Runtime bookkeeping such as the `init` message listing tools and servers
    System {
        subtype: String,
        #[serde(flatten)]
        data: Map<String, Value>,
    },
    Assistant {
        message: ConversationMessage,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_tool_use_id: Option<String>,
    },
    /// Tool results fed back to the model
    User {
        message: ConversationMessage,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_tool_use_id: Option<String>,
    },
    /// End-of-turn marker
    Result(ResultMessage),
}

/// Role-tagged message body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub content: MessageContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Content is either a bare string or a list of blocks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Thinking {
        thinking: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
    #[serde(other)]
    Unknown,
}

/// Final message of a turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMessage {
    pub subtype: String,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_turns: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_cost_usd: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl AgentMessage {
    /// Short name of the message type, for logs
    pub fn kind(&self) -> &'static str {
        match self {
            AgentMessage::System { .. } => "system",
            AgentMessage::Assistant { .. } => "assistant",
            AgentMessage::User { .. } => "user",
            AgentMessage::Result(_) => "result",
        }
    }

    pub fn is_end_of_turn(&self) -> bool {
        matches!(self, AgentMessage::Result(_))
    }

    /// Concatenated text blocks of an assistant message
    pub fn text(&self) -> Option<String> {
        match self {
            AgentMessage::Assistant { message, .. } => Some(message.content.text()),
            _ => None,
        }
    }

    /// Assistant message with a single text block
    pub fn assistant_text(text: impl Into<String>) -> Self {
        AgentMessage::Assistant {
            message: ConversationMessage {
                role: Some("assistant".to_string()),
                content: MessageContent::Blocks(vec![ContentBlock::Text { text: text.into() }]),
                model: None,
            },
            parent_tool_use_id: None,
        }
    }

    /// Successful end-of-turn marker
    pub fn result_success(result: impl Into<String>) -> Self {
        AgentMessage::Result(ResultMessage {
            subtype: "success".to_string(),
            is_error: false,
            result: Some(result.into()),
            duration_ms: None,
            num_turns: Some(1),
            total_cost_usd: None,
            session_id: None,
        })
    }

    /// Failed end-of-turn marker, as sent for auth or configuration problems
    pub fn result_error(result: impl Into<String>) -> Self {
        AgentMessage::Result(ResultMessage {
            subtype: "error_during_execution".to_string(),
            is_error: true,
            result: Some(result.into()),
            duration_ms: None,
            num_turns: None,
            total_cost_usd: None,
            session_id: None,
        })
    }
}

impl MessageContent {
    /// Text blocks joined without separators; non-text blocks are skipped
    pub fn text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect(),
        }
    }
}

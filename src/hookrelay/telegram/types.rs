//! Subset of the Bot API wire types the relay reads and writes.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub first_name: String,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub username: Option<String>,
    pub title: Option<String>,
}

impl Chat {
    pub fn is_private(&self) -> bool {
        self.kind == "private"
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MessageEntity {
    #[serde(rename = "type")]
    pub kind: String,
    pub offset: usize,
    pub length: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub entities: Vec<MessageEntity>,
    pub reply_to_message: Option<Box<Message>>,
}

impl Message {
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    /// A command is a `bot_command` entity starting the text
    pub fn is_command(&self) -> bool {
        self.entities
            .iter()
            .any(|e| e.kind == "bot_command" && e.offset == 0)
    }

    /// Command name without the leading `/` or a trailing `@botname`
    pub fn command(&self) -> Option<&str> {
        if !self.is_command() {
            return None;
        }
        let first = self.text().split_whitespace().next()?;
        let name = first.strip_prefix('/')?;
        Some(name.split('@').next().unwrap_or(name))
    }

    /// Raw text following the command
    pub fn command_arguments(&self) -> &str {
        if !self.is_command() {
            return "";
        }
        let text = self.text();
        match text.find(char::is_whitespace) {
            Some(idx) => text[idx..].trim(),
            None => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InlineQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChosenInlineResult {
    pub result_id: String,
    pub from: User,
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    pub data: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub inline_query: Option<InlineQuery>,
    pub chosen_inline_result: Option<ChosenInlineResult>,
    pub callback_query: Option<CallbackQuery>,
    pub channel_post: Option<Message>,
}

/// `sendMessage` body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutgoingMessage {
    pub chat_id: i64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub disable_web_page_preview: bool,
}

impl OutgoingMessage {
    pub fn new(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            parse_mode: None,
            disable_web_page_preview: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command_message(text: &str) -> Message {
        let len = text.split_whitespace().next().map(str::len).unwrap_or(0);
        Message {
            text: Some(text.to_string()),
            entities: vec![MessageEntity {
                kind: "bot_command".into(),
                offset: 0,
                length: len,
            }],
            ..Message::default()
        }
    }

    #[test]
    fn parses_private_message_update() {
        let raw = r#"{
            "update_id": 10,
            "message": {
                "message_id": 1,
                "from": {"id": 42, "is_bot": false, "first_name": "A", "username": "a"},
                "chat": {"id": 42, "type": "private", "username": "a"},
                "text": "/addid 77",
                "entities": [{"type": "bot_command", "offset": 0, "length": 6}]
            }
        }"#;
        let update: Update = serde_json::from_str(raw).unwrap();
        let msg = update.message.unwrap();

        assert!(msg.chat.is_private());
        assert_eq!(msg.command(), Some("addid"));
        assert_eq!(msg.command_arguments(), "77");
    }

    #[test]
    fn strips_bot_mention_from_command() {
        let msg = command_message("/start@relay_bot");
        assert_eq!(msg.command(), Some("start"));
        assert_eq!(msg.command_arguments(), "");
    }

    #[test]
    fn plain_text_is_not_a_command() {
        let msg = Message {
            text: Some("/start".into()),
            ..Message::default()
        };
        assert!(!msg.is_command());
        assert_eq!(msg.command(), None);
    }

    #[test]
    fn outgoing_message_omits_unset_options() {
        let body = serde_json::to_value(OutgoingMessage::new(5, "hi")).unwrap();
        assert_eq!(body, serde_json::json!({"chat_id": 5, "text": "hi"}));
    }
}

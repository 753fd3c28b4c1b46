//! services/bot/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between a chat client and the bot.
//! Each connection plays the role of one chat channel: the bot renders quiz
//! pages into it and the client answers by pressing the attached controls.

use lexicon_core::{Control, Page, PageField, QuestionKind};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Messages Sent FROM the Client TO the Server
//=========================================================================================

/// Question style requested by the client.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum QuizKind {
    #[default]
    Flashcard,
    Recall,
}

impl From<QuizKind> for QuestionKind {
    fn from(kind: QuizKind) -> Self {
        match kind {
            QuizKind::Flashcard => QuestionKind::Flashcard,
            QuizKind::Recall => QuestionKind::Recall,
        }
    }
}

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Starts a quiz over the learner's due words, replacing any running quiz.
    StartQuiz {
        #[serde(default)]
        size: Option<usize>,
        #[serde(default)]
        kind: QuizKind,
    },

    /// The "Reveal" control was pressed.
    Reveal { session_id: Uuid },

    /// One of the rating controls was pressed.
    Rate { session_id: Uuid, quality: i32 },

    /// Requests one page of the learner's journal.
    JournalPage {
        #[serde(default)]
        page: usize,
        #[serde(default)]
        page_size: Option<usize>,
    },
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once the connection has been registered as a chat target.
    Connected {
        connection_id: String,
        learner_id: String,
    },

    /// Confirms that a quiz is running; `session_id` must accompany every control event.
    QuizStarted { session_id: Uuid },

    /// Shows a page. The client keeps it on screen until a matching `delete`.
    Render {
        message_id: String,
        page: PageDto,
        controls: Vec<ControlDto>,
    },

    /// Removes a previously rendered page.
    Delete { message_id: String },

    /// One page of the learner's journal.
    Journal { page: usize, entries: Vec<PageDto> },

    /// Reports a rejected request. The connection stays open.
    Error { message: String },
}

//=========================================================================================
// Page Payloads
//=========================================================================================

#[derive(Serialize, Debug, Clone, PartialEq, ToSchema)]
pub struct PageDto {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub fields: Vec<FieldDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq, ToSchema)]
pub struct FieldDto {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// A pressable control. `action` is `reveal` or `rate`; `quality` is set for ratings.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ControlDto {
    pub action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<i32>,
    pub label: String,
}

impl From<&Page> for PageDto {
    fn from(page: &Page) -> Self {
        Self {
            title: page.title.clone(),
            description: page.description.clone(),
            fields: page.fields.iter().map(FieldDto::from).collect(),
            footer: page.footer.clone(),
        }
    }
}

impl From<&PageField> for FieldDto {
    fn from(field: &PageField) -> Self {
        Self {
            name: field.name.clone(),
            value: field.value.clone(),
            inline: field.inline,
        }
    }
}

impl From<&Control> for ControlDto {
    fn from(control: &Control) -> Self {
        let (action, quality) = match control {
            Control::Reveal => ("reveal", None),
            Control::Rate(q) => ("rate", Some(*q)),
        };
        Self {
            action,
            quality,
            label: control.label(),
        }
    }
}

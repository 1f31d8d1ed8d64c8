use serde::Serialize;
use serde_json::Value;

/// Trait for getting the wire name of an event
pub trait EventName {
    fn event_name(&self) -> &'static str;
}

/// Events the client emits.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientEvent {
    // Chat
    JoinChat {
        chat_id: String,
        user_id: String,
    },
    SendMessage {
        chat_id: String,
        user_id: String,
        text: String,
        files_id: Vec<String>,
        /// Ids of the optimistic messages the server echoes back on confirmation.
        temp_user_id: String,
        temp_bot_id: String,
    },

    // Meetings
    JoinMeeting {
        user_id: String,
    },
    LeaveMeeting {
        user_id: String,
    },
    CreateMeeting {
        user_id: String,
        title: String,
        url: String,
        temp_meeting_id: String,
    },
}

impl ClientEvent {
    /// Payload sent alongside the event name.
    pub fn data(&self) -> Result<Value, serde_json::Error> {
        let mut tagged = serde_json::to_value(self)?;
        Ok(tagged
            .get_mut("data")
            .map(Value::take)
            .unwrap_or(Value::Null))
    }
}

impl EventName for ClientEvent {
    fn event_name(&self) -> &'static str {
        match self {
            ClientEvent::JoinChat { .. } => "joinChat",
            ClientEvent::SendMessage { .. } => "sendMessage",
            ClientEvent::JoinMeeting { .. } => "joinMeeting",
            ClientEvent::LeaveMeeting { .. } => "leaveMeeting",
            ClientEvent::CreateMeeting { .. } => "createMeeting",
        }
    }
}

/// Events the server pushes. Payloads are handed to page-level handlers as-is.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    MessageConfirmed(Value),
    /// A streamed chunk of the assistant's answer.
    ChatResponse(Value),
    MessageCreated(Value),
    MeetingCreated(Value),
    MeetingStatusUpdated(Value),
}

impl ServerEvent {
    pub const NAMES: [&'static str; 5] = [
        "messageConfirmed",
        "chatResponse",
        "messageCreated",
        "meetingCreated",
        "meetingStatusUpdated",
    ];

    /// Recognise a received event. Unknown names yield `None`.
    pub fn parse(name: &str, data: Value) -> Option<Self> {
        match name {
            "messageConfirmed" => Some(ServerEvent::MessageConfirmed(data)),
            "chatResponse" => Some(ServerEvent::ChatResponse(data)),
            "messageCreated" => Some(ServerEvent::MessageCreated(data)),
            "meetingCreated" => Some(ServerEvent::MeetingCreated(data)),
            "meetingStatusUpdated" => Some(ServerEvent::MeetingStatusUpdated(data)),
            _ => None,
        }
    }

    pub fn data(&self) -> &Value {
        match self {
            ServerEvent::MessageConfirmed(data)
            | ServerEvent::ChatResponse(data)
            | ServerEvent::MessageCreated(data)
            | ServerEvent::MeetingCreated(data)
            | ServerEvent::MeetingStatusUpdated(data) => data,
        }
    }
}

impl EventName for ServerEvent {
    fn event_name(&self) -> &'static str {
        match self {
            ServerEvent::MessageConfirmed(_) => "messageConfirmed",
            ServerEvent::ChatResponse(_) => "chatResponse",
            ServerEvent::MessageCreated(_) => "messageCreated",
            ServerEvent::MeetingCreated(_) => "meetingCreated",
            ServerEvent::MeetingStatusUpdated(_) => "meetingStatusUpdated",
        }
    }
}

use serde::{Deserialize, Serialize};

use crate::error::ClientError;

// --- REFERENCE DATA ---

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Location {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub min_level: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CharacterClass {
    #[default]
    Warrior,
    Mage,
    Archer,
    Rogue,
}

impl std::str::FromStr for CharacterClass {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "warrior" => Ok(CharacterClass::Warrior),
            "mage" => Ok(CharacterClass::Mage),
            "archer" => Ok(CharacterClass::Archer),
            "rogue" => Ok(CharacterClass::Rogue),
            other => Err(ClientError::Rejected(format!("unknown class '{other}'"))),
        }
    }
}

// --- CHARACTERS ---

/// The viewer's own character as `GET /character` returns it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Character {
    pub user_id: i64,
    pub character_name: String,
    #[serde(default)]
    pub character_class: String,
    #[serde(default = "one")]
    pub level: u32,
    #[serde(default)]
    pub hp: i32,
    #[serde(default)]
    pub max_hp: i32,
    #[serde(default)]
    pub xp: i64,
    #[serde(default)]
    pub xp_to_next: i64,
    #[serde(default)]
    pub gold: i64,
    #[serde(default)]
    pub attack: i32,
    #[serde(default)]
    pub defense: i32,
    #[serde(default)]
    pub speed: i32,
    pub location_id: i64,
    #[serde(default)]
    pub x_pos: Option<i32>,
    #[serde(default)]
    pub y_pos: Option<i32>,
}

impl Character {
    /// Both coordinates, once the server has placed the character.
    pub fn position(&self) -> Option<(i32, i32)> {
        Some((self.x_pos?, self.y_pos?))
    }

    pub fn hp_percent(&self) -> f64 {
        percent(self.hp as f64, self.max_hp as f64)
    }

    pub fn xp_percent(&self) -> f64 {
        percent(self.xp as f64, self.xp_to_next as f64)
    }
}

fn percent(value: f64, max: f64) -> f64 {
    if max <= 0.0 {
        return 0.0;
    }
    (value / max * 100.0).clamp(0.0, 100.0)
}

pub const PLACEHOLDER_NAME: &str = "Player";

/// Another session's character, as far as the realtime channel told us.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RemotePlayer {
    pub user_id: i64,
    #[serde(default = "placeholder_name")]
    pub character_name: String,
    #[serde(default = "one")]
    pub level: u32,
    #[serde(default)]
    pub location_id: Option<i64>,
    #[serde(default)]
    pub x_pos: Option<i32>,
    #[serde(default)]
    pub y_pos: Option<i32>,
}

impl RemotePlayer {
    pub fn placeholder(user_id: i64) -> RemotePlayer {
        RemotePlayer {
            user_id,
            character_name: placeholder_name(),
            level: 1,
            location_id: None,
            x_pos: None,
            y_pos: None,
        }
    }

    pub fn position(&self) -> Option<(i32, i32)> {
        Some((self.x_pos?, self.y_pos?))
    }
}

fn one() -> u32 {
    1
}

fn placeholder_name() -> String {
    PLACEHOLDER_NAME.to_string()
}

// --- REALTIME MESSAGES ---

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct PositionUpdate {
    pub x_pos: i32,
    pub y_pos: i32,
    pub location_id: i64,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct PlayerMoved {
    pub user_id: i64,
    pub x_pos: i32,
    pub y_pos: i32,
    pub location_id: i64,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ChatPayload {
    pub user_name: String,
    pub message: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    StateUpdate(PositionUpdate),
    Players(Vec<RemotePlayer>),
    PlayerMoved(PlayerMoved),
    Chat(ChatPayload),
    // Notices arrive without a `data` envelope; see `decode`.
    #[serde(skip)]
    System(String),
    #[serde(skip)]
    Error(String),
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Notice {
    System { message: String },
    Error { message: String },
}

impl ServerMessage {
    pub fn decode(text: &str) -> Result<ServerMessage, ClientError> {
        match serde_json::from_str::<ServerMessage>(text) {
            Ok(msg) => Ok(msg),
            Err(err) => match serde_json::from_str::<Notice>(text) {
                Ok(Notice::System { message }) => Ok(ServerMessage::System(message)),
                Ok(Notice::Error { message }) => Ok(ServerMessage::Error(message)),
                Err(_) => Err(err.into()),
            },
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Move { x: i32, y: i32 },
    Chat { message: String },
}

impl ClientMessage {
    pub fn encode(&self) -> Result<String, ClientError> {
        Ok(serde_json::to_string(self)?)
    }

    /// A chat message for the input text, or nothing when it is blank.
    pub fn chat(input: &str) -> Option<ClientMessage> {
        let text = input.trim();
        if text.is_empty() {
            return None;
        }
        Some(ClientMessage::Chat { message: text.to_string() })
    }
}

// --- HTTP BODIES ---

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CreateCharacterRequest<'a> {
    pub name: &'a str,
    pub character_class: CharacterClass,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TravelRequest {
    pub location_id: i64,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct TravelResponse {
    pub location_id: i64,
    pub x_pos: i32,
    pub y_pos: i32,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ErrorDetail {
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

impl ErrorDetail {
    /// FastAPI sends either a string or a list of validation issues.
    pub fn message(&self) -> Option<String> {
        match self.detail.as_ref()? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Array(items) => {
                let parts: Vec<String> = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(|m| m.as_str()).map(str::to_string))
                    .collect();
                if parts.is_empty() {
                    None
                } else {
                    Some(parts.join("; "))
                }
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_state_update() {
        let raw = r#"{"type":"state_update","data":{"x_pos":3,"y_pos":4,"location_id":5}}"#;
        let msg = ServerMessage::decode(raw).unwrap();
        let update = PositionUpdate { x_pos: 3, y_pos: 4, location_id: 5 };
        assert_eq!(msg, ServerMessage::StateUpdate(update));
    }

    #[test]
    fn decodes_players_with_missing_fields() {
        let raw = r#"{"type":"players","data":[{"user_id":2,"location_id":5}]}"#;
        let msg = ServerMessage::decode(raw).unwrap();
        let ServerMessage::Players(list) = msg else { panic!("expected players") };
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].character_name, "Player");
        assert_eq!(list[0].level, 1);
        assert_eq!(list[0].location_id, Some(5));
        assert_eq!(list[0].position(), None);
    }

    #[test]
    fn decodes_chat_and_notices() {
        let raw = r#"{"type":"chat","data":{"user_name":"Ann","message":"hi"}}"#;
        let chat = ServerMessage::decode(raw).unwrap();
        let payload = ChatPayload { user_name: "Ann".into(), message: "hi".into() };
        assert_eq!(chat, ServerMessage::Chat(payload));

        let sys = ServerMessage::decode(r#"{"type":"system","message":"Bob joined"}"#).unwrap();
        assert_eq!(sys, ServerMessage::System("Bob joined".into()));

        let raw = r#"{"type":"error","message":"Create a character"}"#;
        let err = ServerMessage::decode(raw).unwrap();
        assert_eq!(err, ServerMessage::Error("Create a character".into()));
    }

    #[test]
    fn rejects_missing_required_fields() {
        let partial = r#"{"type":"player_moved","data":{"user_id":2,"x_pos":1}}"#;
        assert!(ServerMessage::decode(partial).is_err());
        assert!(ServerMessage::decode(r#"{"type":"teleport","data":{}}"#).is_err());
        assert!(ServerMessage::decode("not json").is_err());
    }

    #[test]
    fn encodes_outbound_messages() {
        let mv = ClientMessage::Move { x: 2, y: 7 }.encode().unwrap();
        assert_eq!(mv, r#"{"type":"move","x":2,"y":7}"#);
        let chat = ClientMessage::chat("  hello  ").unwrap().encode().unwrap();
        assert_eq!(chat, r#"{"type":"chat","message":"hello"}"#);
    }

    #[test]
    fn blank_chat_produces_nothing() {
        assert_eq!(ClientMessage::chat(""), None);
        assert_eq!(ClientMessage::chat(" \t\n "), None);
    }

    #[test]
    fn character_defaults_and_bars() {
        let raw = concat!(
            r#"{"user_id":1,"character_name":"Ada","location_id":1,"#,
            r#""hp":50,"max_hp":200,"xp":0,"xp_to_next":0}"#,
        );
        let c: Character = serde_json::from_str(raw).unwrap();
        assert_eq!(c.level, 1);
        assert_eq!(c.position(), None);
        assert_eq!(c.hp_percent(), 25.0);
        assert_eq!(c.xp_percent(), 0.0);
    }

    #[test]
    fn create_request_uses_lowercase_class() {
        let request = CreateCharacterRequest { name: "Ada", character_class: CharacterClass::Mage };
        let body = serde_json::to_string(&request).unwrap();
        assert_eq!(body, r#"{"name":"Ada","character_class":"mage"}"#);
        assert_eq!("rogue".parse::<CharacterClass>().unwrap(), CharacterClass::Rogue);
        assert!("bard".parse::<CharacterClass>().is_err());
    }

    #[test]
    fn error_detail_variants() {
        let plain: ErrorDetail = serde_json::from_str(r#"{"detail":"Name taken"}"#).unwrap();
        assert_eq!(plain.message().as_deref(), Some("Name taken"));
        let raw = r#"{"detail":[{"msg":"field required"},{"msg":"too short"}]}"#;
        let list: ErrorDetail = serde_json::from_str(raw).unwrap();
        assert_eq!(list.message().as_deref(), Some("field required; too short"));
        let none: ErrorDetail = serde_json::from_str("{}").unwrap();
        assert_eq!(none.message(), None);
    }
}

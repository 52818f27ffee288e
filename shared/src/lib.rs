//! Wire protocol shared by the Cman server and its clients.
//!
//! Every datagram carries one UTF-8 JSON object tagged by an integer
//! `opcode` field. Inbound (client to server) and outbound (server to client)
//! messages are closed enums with typed payloads; decoding yields either a
//! variant or a [`DecodeError`], never a panic.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 1337;
pub const BUFFER_SIZE: usize = 1024;

pub const OP_JOIN: u8 = 0x00;
pub const OP_MOVE: u8 = 0x01;
pub const OP_QUIT: u8 = 0x0F;
pub const OP_GAME_STATE: u8 = 0x80;
pub const OP_GAME_OVER: u8 = 0x8F;
pub const OP_ERROR: u8 = 0xFF;

/// Board coordinates as sent on the wire: `[x, y]`.
pub type Coords = (u32, u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Cman,
    Spirit,
    Watcher,
}

impl Role {
    pub fn code(self) -> u8 {
        match self {
            Role::Cman => 0,
            Role::Spirit => 1,
            Role::Watcher => 2,
        }
    }

    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(Role::Cman),
            1 => Some(Role::Spirit),
            2 => Some(Role::Watcher),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Cman => write!(f, "cman"),
            Role::Spirit => write!(f, "spirit"),
            Role::Watcher => write!(f, "watcher"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Left,
    Down,
    Right,
}

impl Direction {
    pub fn code(self) -> u8 {
        match self {
            Direction::Up => 0,
            Direction::Left => 1,
            Direction::Down => 2,
            Direction::Right => 3,
        }
    }

    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(Direction::Up),
            1 => Some(Direction::Left),
            2 => Some(Direction::Down),
            3 => Some(Direction::Right),
            _ => None,
        }
    }

    /// Column/row offset of one step in this direction. Rows grow downwards.
    pub fn delta(self) -> (i64, i64) {
        match self {
            Direction::Up => (0, -1),
            Direction::Left => (-1, 0),
            Direction::Down => (0, 1),
            Direction::Right => (1, 0),
        }
    }
}

/// Why an inbound datagram could not be turned into a [`ClientMessage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    NotUtf8,
    Malformed(String),
    MissingOpcode,
    UnknownOpcode(u64),
    InvalidRole,
    InvalidDirection,
}

impl DecodeError {
    /// Text of the Error message sent back to the originating endpoint.
    pub fn reply_text(&self) -> &'static str {
        match self {
            DecodeError::NotUtf8 | DecodeError::Malformed(_) => "Malformed message.",
            DecodeError::MissingOpcode | DecodeError::UnknownOpcode(_) => "Invalid OPCODE",
            DecodeError::InvalidRole => "Role already taken or invalid.",
            DecodeError::InvalidDirection => "Invalid move.",
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::NotUtf8 => write!(f, "payload is not valid UTF-8"),
            DecodeError::Malformed(reason) => write!(f, "malformed message: {}", reason),
            DecodeError::MissingOpcode => write!(f, "message has no integer opcode"),
            DecodeError::UnknownOpcode(op) => write!(f, "unknown opcode: 0x{:02x}", op),
            DecodeError::InvalidRole => write!(f, "join carries no valid role"),
            DecodeError::InvalidDirection => write!(f, "move carries no valid direction"),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Messages sent by clients to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientMessage {
    Join { role: Role },
    Move { direction: Direction },
    Quit,
}

#[derive(Serialize, Deserialize)]
struct JoinFields {
    role: u64,
}

#[derive(Serialize, Deserialize)]
struct MoveFields {
    direction: u64,
}

impl ClientMessage {
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let (opcode, value) = parse_envelope(bytes)?;

        match opcode {
            op if op == OP_JOIN as u64 => {
                let fields: JoinFields =
                    serde_json::from_value(value).map_err(|_| DecodeError::InvalidRole)?;
                let role = Role::from_code(fields.role).ok_or(DecodeError::InvalidRole)?;
                Ok(ClientMessage::Join { role })
            }
            op if op == OP_MOVE as u64 => {
                let fields: MoveFields =
                    serde_json::from_value(value).map_err(|_| DecodeError::InvalidDirection)?;
                let direction =
                    Direction::from_code(fields.direction).ok_or(DecodeError::InvalidDirection)?;
                Ok(ClientMessage::Move { direction })
            }
            op if op == OP_QUIT as u64 => Ok(ClientMessage::Quit),
            op => Err(DecodeError::UnknownOpcode(op)),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let (opcode, fields) = match self {
            ClientMessage::Join { role } => (
                OP_JOIN,
                to_fields(&JoinFields {
                    role: role.code() as u64,
                }),
            ),
            ClientMessage::Move { direction } => (
                OP_MOVE,
                to_fields(&MoveFields {
                    direction: direction.code() as u64,
                }),
            ),
            ClientMessage::Quit => (OP_QUIT, Map::new()),
        };
        seal(opcode, fields)
    }
}

/// Full view of the match pushed to every registered endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStateUpdate {
    #[serde(rename = "freez")]
    pub freeze: u8,
    pub c_coords: Coords,
    pub s_coords: Coords,
    pub collected: u32,
    pub attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameOverReport {
    /// 1 for Cman, 2 for Spirit.
    pub winner: u8,
    #[serde(rename = "S_SCORE")]
    pub s_score: u32,
    #[serde(rename = "C_SCORE")]
    pub c_score: u32,
}

#[derive(Serialize, Deserialize)]
struct NoticeFields {
    message: String,
}

#[derive(Serialize, Deserialize)]
struct ErrorFields {
    error: String,
}

/// Messages sent by the server to clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    GameState(GameStateUpdate),
    /// Plain text carried under the game state opcode: quit confirmations and
    /// departure notices.
    Notice(String),
    GameOver(GameOverReport),
    Error(String),
}

impl ServerMessage {
    pub fn opcode(&self) -> u8 {
        match self {
            ServerMessage::GameState(_) | ServerMessage::Notice(_) => OP_GAME_STATE,
            ServerMessage::GameOver(_) => OP_GAME_OVER,
            ServerMessage::Error(_) => OP_ERROR,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let fields = match self {
            ServerMessage::GameState(update) => to_fields(update),
            ServerMessage::Notice(message) => to_fields(&NoticeFields {
                message: message.clone(),
            }),
            ServerMessage::GameOver(report) => to_fields(report),
            ServerMessage::Error(error) => to_fields(&ErrorFields {
                error: error.clone(),
            }),
        };
        seal(self.opcode(), fields)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let (opcode, value) = parse_envelope(bytes)?;
        let malformed = |e: serde_json::Error| DecodeError::Malformed(e.to_string());

        match opcode {
            op if op == OP_GAME_STATE as u64 => {
                if value.get("message").is_some() {
                    let fields: NoticeFields = serde_json::from_value(value).map_err(malformed)?;
                    Ok(ServerMessage::Notice(fields.message))
                } else {
                    Ok(ServerMessage::GameState(
                        serde_json::from_value(value).map_err(malformed)?,
                    ))
                }
            }
            op if op == OP_GAME_OVER as u64 => Ok(ServerMessage::GameOver(
                serde_json::from_value(value).map_err(malformed)?,
            )),
            op if op == OP_ERROR as u64 => {
                let fields: ErrorFields = serde_json::from_value(value).map_err(malformed)?;
                Ok(ServerMessage::Error(fields.error))
            }
            op => Err(DecodeError::UnknownOpcode(op)),
        }
    }
}

fn parse_envelope(bytes: &[u8]) -> Result<(u64, Value), DecodeError> {
    let text = std::str::from_utf8(bytes).map_err(|_| DecodeError::NotUtf8)?;
    let value: Value =
        serde_json::from_str(text).map_err(|e| DecodeError::Malformed(e.to_string()))?;
    if !value.is_object() {
        return Err(DecodeError::Malformed("expected a JSON object".to_string()));
    }
    let opcode = value
        .get("opcode")
        .and_then(Value::as_u64)
        .ok_or(DecodeError::MissingOpcode)?;
    Ok((opcode, value))
}

fn to_fields<T: Serialize>(payload: &T) -> Map<String, Value> {
    // Payload structs only hold integers, strings and integer pairs, which
    // always serialize to a JSON object.
    match serde_json::to_value(payload) {
        Ok(Value::Object(fields)) => fields,
        _ => Map::new(),
    }
}

fn seal(opcode: u8, mut fields: Map<String, Value>) -> Vec<u8> {
    fields.insert("opcode".to_string(), Value::from(opcode));
    Value::Object(fields).to_string().into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_str(text: &str) -> Result<ClientMessage, DecodeError> {
        ClientMessage::decode(text.as_bytes())
    }

    #[test]
    fn test_decode_join_roles() {
        assert_eq!(
            decode_str(r#"{"opcode": 0, "role": 0}"#),
            Ok(ClientMessage::Join { role: Role::Cman })
        );
        assert_eq!(
            decode_str(r#"{"opcode": 0, "role": 1}"#),
            Ok(ClientMessage::Join { role: Role::Spirit })
        );
        assert_eq!(
            decode_str(r#"{"role": 2, "opcode": 0}"#),
            Ok(ClientMessage::Join {
                role: Role::Watcher
            })
        );
    }

    #[test]
    fn test_decode_join_invalid_role() {
        assert_eq!(
            decode_str(r#"{"opcode": 0, "role": 7}"#),
            Err(DecodeError::InvalidRole)
        );
        assert_eq!(
            decode_str(r#"{"opcode": 0}"#),
            Err(DecodeError::InvalidRole)
        );
        assert_eq!(
            decode_str(r#"{"opcode": 0, "role": "cman"}"#),
            Err(DecodeError::InvalidRole)
        );
    }

    #[test]
    fn test_decode_move_directions() {
        let expected = [
            Direction::Up,
            Direction::Left,
            Direction::Down,
            Direction::Right,
        ];
        for (code, direction) in expected.iter().enumerate() {
            let text = format!(r#"{{"opcode": 1, "direction": {}}}"#, code);
            assert_eq!(
                decode_str(&text),
                Ok(ClientMessage::Move {
                    direction: *direction
                })
            );
        }
        assert_eq!(
            decode_str(r#"{"opcode": 1, "direction": 4}"#),
            Err(DecodeError::InvalidDirection)
        );
        assert_eq!(
            decode_str(r#"{"opcode": 1}"#),
            Err(DecodeError::InvalidDirection)
        );
    }

    #[test]
    fn test_decode_quit_ignores_extra_fields() {
        assert_eq!(decode_str(r#"{"opcode": 15}"#), Ok(ClientMessage::Quit));
        assert_eq!(
            decode_str(r#"{"opcode": 15, "role": 3}"#),
            Ok(ClientMessage::Quit)
        );
    }

    #[test]
    fn test_decode_failures() {
        assert_eq!(
            decode_str(r#"{"opcode": 128}"#),
            Err(DecodeError::UnknownOpcode(128))
        );
        assert_eq!(decode_str(r#"{"role": 0}"#), Err(DecodeError::MissingOpcode));
        assert_eq!(
            decode_str(r#"{"opcode": -1}"#),
            Err(DecodeError::MissingOpcode)
        );
        assert!(matches!(decode_str("not json"), Err(DecodeError::Malformed(_))));
        assert!(matches!(decode_str("[0, 1]"), Err(DecodeError::Malformed(_))));
        assert_eq!(
            ClientMessage::decode(&[0xff, 0xfe, 0x00]),
            Err(DecodeError::NotUtf8)
        );
    }

    #[test]
    fn test_decode_error_reply_text() {
        assert_eq!(DecodeError::UnknownOpcode(9).reply_text(), "Invalid OPCODE");
        assert_eq!(DecodeError::MissingOpcode.reply_text(), "Invalid OPCODE");
        assert_eq!(
            DecodeError::InvalidRole.reply_text(),
            "Role already taken or invalid."
        );
        assert_eq!(DecodeError::InvalidDirection.reply_text(), "Invalid move.");
    }

    #[test]
    fn test_game_state_wire_shape() {
        let message = ServerMessage::GameState(GameStateUpdate {
            freeze: 1,
            c_coords: (1, 2),
            s_coords: (7, 5),
            collected: 4,
            attempts: 3,
        });

        let value: Value = serde_json::from_slice(&message.encode()).unwrap();
        assert_eq!(value["opcode"], 0x80);
        assert_eq!(value["freez"], 1);
        assert_eq!(value["c_coords"], serde_json::json!([1, 2]));
        assert_eq!(value["s_coords"], serde_json::json!([7, 5]));
        assert_eq!(value["collected"], 4);
        assert_eq!(value["attempts"], 3);
    }

    #[test]
    fn test_game_over_wire_shape() {
        let message = ServerMessage::GameOver(GameOverReport {
            winner: 2,
            s_score: 3,
            c_score: 11,
        });

        let value: Value = serde_json::from_slice(&message.encode()).unwrap();
        assert_eq!(value["opcode"], 0x8F);
        assert_eq!(value["winner"], 2);
        assert_eq!(value["S_SCORE"], 3);
        assert_eq!(value["C_SCORE"], 11);
    }

    #[test]
    fn test_notice_and_error_wire_shape() {
        let notice: Value =
            serde_json::from_slice(&ServerMessage::Notice("Quit confirmed".into()).encode())
                .unwrap();
        assert_eq!(notice["opcode"], 0x80);
        assert_eq!(notice["message"], "Quit confirmed");

        let error: Value =
            serde_json::from_slice(&ServerMessage::Error("Invalid move.".into()).encode())
                .unwrap();
        assert_eq!(error["opcode"], 0xFF);
        assert_eq!(error["error"], "Invalid move.");
    }

    #[test]
    fn test_server_message_decode_distinguishes_notice() {
        let notice = ServerMessage::Notice("Quit confirmed".to_string());
        assert_eq!(ServerMessage::decode(&notice.encode()), Ok(notice));

        let state = ServerMessage::GameState(GameStateUpdate {
            freeze: 0,
            c_coords: (1, 1),
            s_coords: (4, 3),
            collected: 0,
            attempts: 3,
        });
        assert_eq!(ServerMessage::decode(&state.encode()), Ok(state));
    }

    #[test]
    fn test_client_encode_matches_wire_table() {
        let join: Value =
            serde_json::from_slice(&ClientMessage::Join { role: Role::Spirit }.encode()).unwrap();
        assert_eq!(join, serde_json::json!({"opcode": 0, "role": 1}));

        let quit: Value = serde_json::from_slice(&ClientMessage::Quit.encode()).unwrap();
        assert_eq!(quit, serde_json::json!({"opcode": 15}));
    }
}

use chrono::{ DateTime, Utc };
use serde::{ Serialize, Deserialize };

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: u64,
    pub chat: u64,
    pub sender: UserSummary,
    pub text: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_read: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Chat {
    pub id: u64,
    #[serde(default)]
    pub users: Vec<UserSummary>,
    #[serde(default)]
    pub last_message: Option<Message>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Chat {
    pub fn participant_names(&self) -> String {
        self.users
            .iter()
            .map(|u| u.username.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Serialize, Debug)]
pub struct SendMessageRequest<'a> {
    pub text: &'a str,
}

#[derive(Serialize, Debug)]
pub struct StartChatRequest {
    pub receiver_id: u64,
}

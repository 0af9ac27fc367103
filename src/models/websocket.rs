use serde::{ Serialize, Deserialize };

use super::chat::Message;

#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
pub enum ClientFrame {
    #[serde(rename = "message")] Message {
        text: String,
    },
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
pub enum ServerFrame {
    #[serde(rename = "message")] Message {
        message: Message,
    },
}

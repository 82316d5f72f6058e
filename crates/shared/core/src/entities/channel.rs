use serde::{Deserialize, Serialize};

use crate::values::Id;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: Id,
    /// Channel type as the raw wire integer (0 text, 2 voice, 4 category, ...)
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub guild_id: Option<Id>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub position: Option<i64>,
    #[serde(default)]
    pub parent_id: Option<Id>,
    #[serde(default)]
    pub topic: Option<String>,
}

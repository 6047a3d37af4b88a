use serde::{Deserialize, Serialize};

use crate::models::{Channel, Message, User};

// -- Messages --

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Pagination {
    pub current_page: u32,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub total_count: u64,
    pub next_page: Option<u32>,
    #[serde(default)]
    pub prev_page: Option<u32>,
}

/// One page of history. Page 1 holds the most recent messages; the order of
/// messages inside a page is not guaranteed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagesResponse {
    pub messages: Vec<Message>,
    pub pagination: Pagination,
}

// -- Session --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeResponse {
    pub user: User,
    #[serde(default, rename = "servers")]
    pub channels: Vec<Channel>,
}

// -- Errors --

/// Error body the backend sends with non-2xx responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub status: String,
    pub message: String,
    #[serde(default)]
    pub details: Option<String>,
}

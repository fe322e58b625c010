//! Messaging API endpoints and limits.

/// Production API host.
pub const DEFAULT_API_BASE: &str = "https://api.line.me";

/// Messages accepted by one reply/push/multicast request.
pub const MAX_MESSAGES_PER_REQUEST: usize = 5;

/// Recipients accepted by one multicast or bulk rich-menu request.
pub const MAX_MULTICAST_RECIPIENTS: usize = 500;

/// Execution key shared by all multicast traffic in the process.
pub const MULTICAST_EXECUTION_KEY: &str = "line.multicast";

/// Idempotency header accepted on push and multicast requests.
pub const RETRY_KEY_HEADER: &str = "X-Line-Retry-Key";

/// Request id echoed by the platform on every response.
pub const REQUEST_ID_HEADER: &str = "x-line-request-id";

pub const REPLY_PATH: &str = "v2/bot/message/reply";
pub const PUSH_PATH: &str = "v2/bot/message/push";
pub const MULTICAST_PATH: &str = "v2/bot/message/multicast";
pub const BULK_LINK_RICH_MENU_PATH: &str = "v2/bot/richmenu/bulk/link";
pub const BULK_UNLINK_RICH_MENU_PATH: &str = "v2/bot/richmenu/bulk/unlink";

pub fn link_rich_menu_path(user_id: &str, rich_menu_id: &str) -> String {
    format!("v2/bot/user/{}/richmenu/{}", user_id, rich_menu_id)
}

pub fn unlink_rich_menu_path(user_id: &str) -> String {
    format!("v2/bot/user/{}/richmenu", user_id)
}

pub fn leave_group_path(group_id: &str) -> String {
    format!("v2/bot/group/{}/leave", group_id)
}

pub fn leave_room_path(room_id: &str) -> String {
    format!("v2/bot/room/{}/leave", room_id)
}

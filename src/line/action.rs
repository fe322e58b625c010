use super::api;
use super::thread::{ChatKind, ChatThread, MulticastTarget};
use reqwest::Method;
use serde_json::{json, Value};

/// Non-send output of a render: an API call that is not a message.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatAction {
    /// Link a rich menu to the user (or to every multicast recipient).
    LinkRichMenu { rich_menu_id: String },
    /// Remove the per-user rich menu.
    UnlinkRichMenu,
    /// Make the bot leave a group or room.
    LeaveChat,
    /// Any other endpoint, passed through as-is.
    Api {
        method: Method,
        path: String,
        payload: Option<Value>,
    },
}

/// Method, path and body of one call derived from an action.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub payload: Option<Value>,
}

impl ApiRequest {
    fn post(path: impl Into<String>, payload: Option<Value>) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            payload,
        }
    }

    fn passthrough(method: &Method, path: &str, payload: &Option<Value>) -> Self {
        Self {
            method: method.clone(),
            path: path.to_string(),
            payload: payload.clone(),
        }
    }
}

impl ChatAction {
    pub fn link_rich_menu(rich_menu_id: impl Into<String>) -> Self {
        ChatAction::LinkRichMenu {
            rich_menu_id: rich_menu_id.into(),
        }
    }

    pub fn api(method: Method, path: impl Into<String>, payload: Option<Value>) -> Self {
        ChatAction::Api {
            method,
            path: path.into(),
            payload,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ChatAction::LinkRichMenu { .. } => "link_rich_menu",
            ChatAction::UnlinkRichMenu => "unlink_rich_menu",
            ChatAction::LeaveChat => "leave_chat",
            ChatAction::Api { .. } => "api",
        }
    }

    /// Request for this action in one conversation, `None` if the thread
    /// kind does not support it.
    pub fn chat_request(&self, thread: &ChatThread) -> Option<ApiRequest> {
        match (self, thread.kind()) {
            (ChatAction::LinkRichMenu { rich_menu_id }, ChatKind::User) => Some(ApiRequest::post(
                api::link_rich_menu_path(thread.id(), rich_menu_id),
                None,
            )),
            (ChatAction::UnlinkRichMenu, ChatKind::User) => Some(ApiRequest {
                method: Method::DELETE,
                path: api::unlink_rich_menu_path(thread.id()),
                payload: None,
            }),
            (ChatAction::LinkRichMenu { .. } | ChatAction::UnlinkRichMenu, _) => None,
            (ChatAction::LeaveChat, ChatKind::Group) => {
                Some(ApiRequest::post(api::leave_group_path(thread.id()), None))
            }
            (ChatAction::LeaveChat, ChatKind::Room) => {
                Some(ApiRequest::post(api::leave_room_path(thread.id()), None))
            }
            (ChatAction::LeaveChat, ChatKind::User) => None,
            (
                ChatAction::Api {
                    method,
                    path,
                    payload,
                },
                _,
            ) => Some(ApiRequest::passthrough(method, path, payload)),
        }
    }

    /// Request for this action across a multicast recipient list.
    pub fn multicast_request(&self, target: &MulticastTarget) -> Option<ApiRequest> {
        match self {
            ChatAction::LinkRichMenu { rich_menu_id } => Some(ApiRequest::post(
                api::BULK_LINK_RICH_MENU_PATH,
                Some(json!({
                    "richMenuId": rich_menu_id,
                    "userIds": target.user_ids(),
                })),
            )),
            ChatAction::UnlinkRichMenu => Some(ApiRequest::post(
                api::BULK_UNLINK_RICH_MENU_PATH,
                Some(json!({ "userIds": target.user_ids() })),
            )),
            ChatAction::LeaveChat => None,
            ChatAction::Api {
                method,
                path,
                payload,
            } => Some(ApiRequest::passthrough(method, path, payload)),
        }
    }
}

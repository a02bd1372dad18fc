use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::{
    bot::MessengerError,
    db::dao::NewMember,
    error::AppError,
    response::{ApiResult, JsonApiResponse},
    state::AppState,
};

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ToolInfo {
    pub name: &'static str,
    pub description: &'static str,
}

pub const TOOLS: &[ToolInfo] = &[
    ToolInfo {
        name: "create_group",
        description: "Create a group with a unique name, optionally adding members by telegram id",
    },
    ToolInfo {
        name: "delete_group",
        description: "Delete a group by id; its members are kept",
    },
    ToolInfo {
        name: "add_user_to_group",
        description: "Add a known user to a group",
    },
    ToolInfo {
        name: "remove_user_from_group",
        description: "Remove a user from a group",
    },
    ToolInfo {
        name: "create_user",
        description: "Register a chat user by telegram id",
    },
    ToolInfo {
        name: "get_all_groups",
        description: "List groups with their member counts",
    },
    ToolInfo {
        name: "get_group_by_id",
        description: "Fetch a group and its members by id",
    },
    ToolInfo {
        name: "get_group_by_name",
        description: "Fetch a group and its members by name",
    },
    ToolInfo {
        name: "get_all_users",
        description: "List users with the number of groups they belong to",
    },
    ToolInfo {
        name: "get_user_by_telegram_id",
        description: "Fetch a user and their groups by telegram id",
    },
    ToolInfo {
        name: "send_message_to_user",
        description: "Send a text message to a telegram chat",
    },
    ToolInfo {
        name: "issue_token",
        description: "Create an access token, optionally bound to a user, granting actions",
    },
    ToolInfo {
        name: "revoke_token",
        description: "Delete a token; with an owner, only if that user holds it",
    },
];

#[derive(Debug, Deserialize)]
pub struct ToolCallRequest {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Deserialize)]
struct CreateGroupArgs {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    member_ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
struct GroupIdArgs {
    group_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct GroupNameArgs {
    name: String,
}

#[derive(Debug, Deserialize)]
struct MembershipArgs {
    group_id: Uuid,
    telegram_id: i64,
}

#[derive(Debug, Deserialize)]
struct TelegramIdArgs {
    telegram_id: i64,
}

#[derive(Debug, Deserialize)]
struct SendMessageArgs {
    chat_id: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct IssueTokenArgs {
    token_id: String,
    #[serde(default)]
    owner: Option<String>,
    #[serde(default)]
    actions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RevokeTokenArgs {
    token_id: String,
    #[serde(default)]
    owner: Option<String>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/tools", get(list_tools))
        .route("/tools/call", post(call_tool))
        .with_state(state)
}

async fn list_tools() -> ApiResult<&'static [ToolInfo]> {
    JsonApiResponse::ok(TOOLS)
}

async fn call_tool(
    State(state): State<Arc<AppState>>,
    Json(call): Json<ToolCallRequest>,
) -> ApiResult<Value> {
    info!(tool = %call.name, "tool call");
    let data = dispatch(&state, &call.name, call.arguments).await?;
    JsonApiResponse::ok(data)
}

async fn dispatch(state: &AppState, name: &str, arguments: Value) -> Result<Value, AppError> {
    let services = state.services();
    match name {
        "create_group" => {
            let args: CreateGroupArgs = parse_args(name, arguments)?;
            let created = services
                .group()
                .create_group(&args.name, args.description.as_deref(), &args.member_ids)
                .await?;
            to_data(created)
        }
        "delete_group" => {
            let args: GroupIdArgs = parse_args(name, arguments)?;
            services.group().delete_group(args.group_id).await?;
            to_data(serde_json::json!({ "deleted": args.group_id }))
        }
        "add_user_to_group" => {
            let args: MembershipArgs = parse_args(name, arguments)?;
            if !services
                .group()
                .add_member_to_group(args.group_id, args.telegram_id)
                .await?
            {
                return Err(AppError::not_found("group or user not found"));
            }
            to_data(serde_json::json!({ "group_id": args.group_id, "telegram_id": args.telegram_id }))
        }
        "remove_user_from_group" => {
            let args: MembershipArgs = parse_args(name, arguments)?;
            if !services
                .group()
                .remove_member_from_group(args.group_id, args.telegram_id)
                .await?
            {
                return Err(AppError::not_found("membership not found"));
            }
            to_data(serde_json::json!({ "group_id": args.group_id, "telegram_id": args.telegram_id }))
        }
        "create_user" => {
            let args: NewMember = parse_args(name, arguments)?;
            to_data(services.group().create_member(args).await?)
        }
        "get_all_groups" => to_data(services.group().list_groups().await?),
        "get_group_by_id" => {
            let args: GroupIdArgs = parse_args(name, arguments)?;
            to_data(services.group().group_by_id(args.group_id).await?)
        }
        "get_group_by_name" => {
            let args: GroupNameArgs = parse_args(name, arguments)?;
            to_data(services.group().group_by_name(&args.name).await?)
        }
        "get_all_users" => to_data(services.group().list_members().await?),
        "get_user_by_telegram_id" => {
            let args: TelegramIdArgs = parse_args(name, arguments)?;
            to_data(services.group().member_detail(args.telegram_id).await?)
        }
        "send_message_to_user" => {
            let args: SendMessageArgs = parse_args(name, arguments)?;
            state
                .messenger
                .send_message(args.chat_id, &args.message)
                .await
                .map_err(|err| match err {
                    MessengerError::Rejected(reason) => AppError::bad_request(reason),
                    other => AppError::internal(format!("failed to send message: {other}")),
                })?;
            to_data(serde_json::json!({ "chat_id": args.chat_id, "sent": true }))
        }
        "issue_token" => {
            let args: IssueTokenArgs = parse_args(name, arguments)?;
            let issued = services
                .auth()
                .issue_token(&args.token_id, args.owner.as_deref(), &args.actions)
                .await?;
            to_data(issued)
        }
        "revoke_token" => {
            let args: RevokeTokenArgs = parse_args(name, arguments)?;
            let auth = services.auth();
            let revoked = match args.owner.as_deref() {
                Some(owner) => auth.revoke_token(owner, &args.token_id).await?,
                None => auth.delete_token(&args.token_id).await?,
            };
            if !revoked {
                return Err(AppError::not_found(format!("token {} not found", args.token_id)));
            }
            to_data(serde_json::json!({ "revoked": args.token_id }))
        }
        other => Err(AppError::bad_request(format!("unknown tool '{other}'"))),
    }
}

fn parse_args<T: DeserializeOwned>(tool: &str, arguments: Value) -> Result<T, AppError> {
    let arguments = if arguments.is_null() {
        Value::Object(Default::default())
    } else {
        arguments
    };
    serde_json::from_value(arguments)
        .map_err(|err| AppError::bad_request(format!("invalid arguments for {tool}: {err}")))
}

fn to_data<T: Serialize>(value: T) -> Result<Value, AppError> {
    serde_json::to_value(value).map_err(|err| AppError::internal(err.to_string()))
}

use std::error::Error;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;
use whereabouts_server::config::ServerConfig;
use whereabouts_server::handlers::groups::{CreateGroupRequest, GroupRequest, RenameGroupRequest};
use whereabouts_server::handlers::invites::{InviteCodeRequest, InviteTokenRequest};
use whereabouts_server::handlers::locations::ReportLocationRequest;
use whereabouts_server::handlers::members::{
    RemoveMemberRequest, SetSharingAllRequest, SetSharingRequest, UpdateRoleRequest,
};
use whereabouts_server::handlers::users::EnsureUserRequest;
use whereabouts_server::handlers::{groups, invites, locations, members, users};
use whereabouts_server::request::{Principal, Request};
use whereabouts_server::server::WhereaboutsServer;
use whereabouts_storage::{GroupId, UserId};

// ────────────────────────────────────── CLI Types ──────────────────────────────────────

#[derive(Parser)]
#[command(name = "whereabouts-server")]
#[command(about = "Whereabouts administration CLI")]
struct Cli {
    /// Database URL (sqlite://path/to/store.db)
    #[arg(long, global = true, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// User accounts and device keys
    User {
        #[command(subcommand)]
        user_cmd: UserCommand,
    },
    /// Group management
    Group {
        #[command(subcommand)]
        group_cmd: GroupCommand,
    },
    /// Membership management
    Member {
        #[command(subcommand)]
        member_cmd: MemberCommand,
    },
    /// Invite tokens
    Invite {
        #[command(subcommand)]
        invite_cmd: InviteCommand,
    },
    /// Join a group with an invite token or the group's invite code
    Join {
        #[arg(long = "as", value_name = "USER_ID")]
        as_user: UserId,
        #[arg(long, conflicts_with = "code", required_unless_present = "code")]
        token: Option<String>,
        #[arg(long)]
        code: Option<String>,
    },
    /// Report a location with a device API key
    Report {
        #[arg(long, env = "WHEREABOUTS_API_KEY")]
        api_key: String,
        #[arg(long)]
        world_id: Option<String>,
        #[arg(long)]
        world_name: Option<String>,
        #[arg(long)]
        instance_id: Option<String>,
        #[arg(long)]
        display_name: Option<String>,
    },
    /// Turn location sharing on or off (one group, or all groups)
    Sharing {
        #[arg(long = "as", value_name = "USER_ID")]
        as_user: UserId,
        #[arg(long)]
        group: Option<GroupId>,
        #[arg(value_parser = clap::builder::BoolishValueParser::new())]
        shared: bool,
    },
}

#[derive(Subcommand)]
enum UserCommand {
    /// Create a user as if signing in for the first time
    Create {
        #[arg(long)]
        name: Option<String>,
    },
    /// Issue a new device API key (the old one stops working)
    RotateKey {
        #[arg(long = "as", value_name = "USER_ID")]
        as_user: UserId,
    },
    /// Show the user's profile
    Show {
        #[arg(long = "as", value_name = "USER_ID")]
        as_user: UserId,
    },
}

#[derive(Subcommand)]
enum GroupCommand {
    Create {
        #[arg(long = "as", value_name = "USER_ID")]
        as_user: UserId,
        #[arg(long)]
        name: String,
    },
    List {
        #[arg(long = "as", value_name = "USER_ID")]
        as_user: UserId,
    },
    Show {
        #[arg(long = "as", value_name = "USER_ID")]
        as_user: UserId,
        group_id: GroupId,
    },
    Rename {
        #[arg(long = "as", value_name = "USER_ID")]
        as_user: UserId,
        group_id: GroupId,
        name: String,
    },
    Delete {
        #[arg(long = "as", value_name = "USER_ID")]
        as_user: UserId,
        group_id: GroupId,
    },
}

#[derive(Subcommand)]
enum MemberCommand {
    /// Change a member's role (admin, co-admin, member)
    Role {
        #[arg(long = "as", value_name = "USER_ID")]
        as_user: UserId,
        #[arg(long)]
        group: GroupId,
        member_id: UserId,
        role: String,
    },
    Remove {
        #[arg(long = "as", value_name = "USER_ID")]
        as_user: UserId,
        #[arg(long)]
        group: GroupId,
        member_id: UserId,
    },
    Leave {
        #[arg(long = "as", value_name = "USER_ID")]
        as_user: UserId,
        #[arg(long)]
        group: GroupId,
    },
}

#[derive(Subcommand)]
enum InviteCommand {
    /// Issue a 24h invite token
    Create {
        #[arg(long = "as", value_name = "USER_ID")]
        as_user: UserId,
        #[arg(long)]
        group: GroupId,
        /// Output only the token (for scripts)
        #[arg(long)]
        plain: bool,
    },
    /// Show which group a token or code leads to
    Preview {
        #[arg(long, conflicts_with = "code", required_unless_present = "code")]
        token: Option<String>,
        #[arg(long)]
        code: Option<String>,
    },
}

// ────────────────────────────────────── Helpers ──────────────────────────────────────

fn as_user<T>(user_id: UserId, body: T) -> Request<T> {
    Request::new(body).with_principal(Principal { user_id })
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// ────────────────────────────────────── Main ──────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let mut config = ServerConfig::from_env()?;
    if let Some(url) = cli.database_url {
        config = config.with_database_url(url)?;
    }
    init_tracing(&config.log_filter);

    let store = config.open_store().await?;
    let server = WhereaboutsServer::new(Arc::new(store));

    match cli.command {
        Command::User { user_cmd } => match user_cmd {
            UserCommand::Create { name } => {
                let user_id = UserId(Uuid::now_v7());
                let profile =
                    users::sign_in(&server, as_user(user_id, EnsureUserRequest { name })).await?;
                print_json(&profile)?;
            }
            UserCommand::RotateKey { as_user: user_id } => {
                let key = users::regenerate_api_key(&server, as_user(user_id, ())).await?;
                print_json(&key)?;
            }
            UserCommand::Show { as_user: user_id } => {
                let profile = users::profile(&server, as_user(user_id, ())).await?;
                print_json(&profile)?;
            }
        },
        Command::Group { group_cmd } => match group_cmd {
            GroupCommand::Create {
                as_user: user_id,
                name,
            } => {
                let view =
                    groups::create_group(&server, as_user(user_id, CreateGroupRequest { name }))
                        .await?;
                print_json(&view)?;
            }
            GroupCommand::List { as_user: user_id } => {
                let summaries = groups::list_groups(&server, as_user(user_id, ())).await?;
                print_json(&summaries)?;
            }
            GroupCommand::Show {
                as_user: user_id,
                group_id,
            } => {
                let view =
                    groups::get_group(&server, as_user(user_id, GroupRequest { group_id })).await?;
                print_json(&view)?;
            }
            GroupCommand::Rename {
                as_user: user_id,
                group_id,
                name,
            } => {
                let view = groups::rename_group(
                    &server,
                    as_user(user_id, RenameGroupRequest { group_id, name }),
                )
                .await?;
                print_json(&view)?;
            }
            GroupCommand::Delete {
                as_user: user_id,
                group_id,
            } => {
                groups::delete_group(
                    &server,
                    as_user(
                        user_id,
                        GroupRequest {
                            group_id: group_id.clone(),
                        },
                    ),
                )
                .await?;
                print_json(&serde_json::json!({ "deleted": group_id }))?;
            }
        },
        Command::Member { member_cmd } => match member_cmd {
            MemberCommand::Role {
                as_user: user_id,
                group,
                member_id,
                role,
            } => {
                let view = members::update_member_role(
                    &server,
                    as_user(
                        user_id,
                        UpdateRoleRequest {
                            group_id: group,
                            member_id,
                            role,
                        },
                    ),
                )
                .await?;
                print_json(&view)?;
            }
            MemberCommand::Remove {
                as_user: user_id,
                group,
                member_id,
            } => {
                let view = members::remove_member(
                    &server,
                    as_user(
                        user_id,
                        RemoveMemberRequest {
                            group_id: group,
                            member_id,
                        },
                    ),
                )
                .await?;
                print_json(&view)?;
            }
            MemberCommand::Leave {
                as_user: user_id,
                group,
            } => {
                members::leave_group(
                    &server,
                    as_user(
                        user_id,
                        GroupRequest {
                            group_id: group.clone(),
                        },
                    ),
                )
                .await?;
                print_json(&serde_json::json!({ "left": group }))?;
            }
        },
        Command::Invite { invite_cmd } => match invite_cmd {
            InviteCommand::Create {
                as_user: user_id,
                group,
                plain,
            } => {
                let invite = invites::create_invite(
                    &server,
                    as_user(user_id, GroupRequest { group_id: group }),
                )
                .await?;
                if plain {
                    println!("{}", invite.token);
                } else {
                    print_json(&invite)?;
                }
            }
            InviteCommand::Preview { token, code } => {
                let preview = match (token, code) {
                    (Some(token), _) => {
                        invites::preview_invite(&server, Request::new(InviteTokenRequest { token }))
                            .await?
                    }
                    (None, Some(code)) => {
                        invites::preview_invite_code(
                            &server,
                            Request::new(InviteCodeRequest { code }),
                        )
                        .await?
                    }
                    (None, None) => return Err("either --token or --code is required".into()),
                };
                print_json(&preview)?;
            }
        },
        Command::Join {
            as_user: user_id,
            token,
            code,
        } => {
            let outcome = match (token, code) {
                (Some(token), _) => {
                    invites::join_by_token(&server, as_user(user_id, InviteTokenRequest { token }))
                        .await?
                }
                (None, Some(code)) => {
                    invites::join_by_code(&server, as_user(user_id, InviteCodeRequest { code }))
                        .await?
                }
                (None, None) => return Err("either --token or --code is required".into()),
            };
            print_json(&outcome)?;
        }
        Command::Report {
            api_key,
            world_id,
            world_name,
            instance_id,
            display_name,
        } => {
            let location = locations::report_location(
                &server,
                Request::new(ReportLocationRequest {
                    world_id,
                    world_name,
                    instance_id,
                    display_name,
                })
                .with_api_key(api_key),
            )
            .await?;
            print_json(&location)?;
        }
        Command::Sharing {
            as_user: user_id,
            group,
            shared,
        } => match group {
            Some(group_id) => {
                let state = members::set_location_sharing(
                    &server,
                    as_user(
                        user_id,
                        SetSharingRequest {
                            group_id,
                            is_location_shared: shared,
                        },
                    ),
                )
                .await?;
                print_json(&state)?;
            }
            None => {
                let update = members::set_location_sharing_all(
                    &server,
                    as_user(
                        user_id,
                        SetSharingAllRequest {
                            is_location_shared: shared,
                        },
                    ),
                )
                .await?;
                print_json(&update)?;
            }
        },
    }

    Ok(())
}

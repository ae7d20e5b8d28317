use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use serde::Serialize;
use storefront_api::{
    auth::{AuthConfig, AuthService},
    config::{self, AppConfig},
    db,
    events::{handlers::register_default_handlers, EventBus},
    services::{users::NewUser, UserService},
};

#[derive(Parser)]
#[command(name = "storefront", about = "Storefront admin CLI for identities and tokens", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a user identity; its customer profile is provisioned automatically
    CreateUser(CreateUserArgs),
    /// Issue an access token for an existing user
    IssueToken(IssueTokenArgs),
}

#[derive(Args)]
struct CreateUserArgs {
    #[arg(long)]
    username: String,
    #[arg(long)]
    email: String,
    #[arg(long, default_value = "")]
    first_name: String,
    #[arg(long, default_value = "")]
    last_name: String,
    #[arg(long, action = ArgAction::SetTrue)]
    staff: bool,
}

#[derive(Args)]
struct IssueTokenArgs {
    #[arg(long)]
    username: String,
    /// Permission code to embed, e.g. customers:view_history (repeatable)
    #[arg(long = "permission")]
    permissions: Vec<String>,
}

#[derive(Serialize)]
struct TokenOutput<'a> {
    user_id: i32,
    username: &'a str,
    access_token: String,
    expires_in: usize,
}

struct CliContext {
    config: AppConfig,
    users: UserService,
    auth: AuthService,
}

impl CliContext {
    async fn initialize() -> Result<Self> {
        let config = config::load_config().context("failed to load application config")?;
        config::init_tracing(&config.log_level, config.log_json);

        let db = Arc::new(
            db::establish_connection_from_app_config(&config)
                .await
                .context("failed to connect to database")?,
        );

        let events = Arc::new(EventBus::new());
        register_default_handlers(&events, db.clone());

        Ok(Self {
            users: UserService::new(db, events),
            auth: AuthService::new(AuthConfig::from(&config)),
            config,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let context = CliContext::initialize().await?;

    match cli.command {
        Commands::CreateUser(args) => {
            let user = context
                .users
                .create_user(NewUser {
                    username: args.username,
                    email: args.email,
                    first_name: args.first_name,
                    last_name: args.last_name,
                    is_staff: args.staff,
                })
                .await
                .context("failed to create user")?;

            if cli.json {
                print_json(&user)?;
            } else {
                println!(
                    "Created user {} ({}){}",
                    user.id,
                    user.username,
                    if user.is_staff { " [staff]" } else { "" }
                );
            }
        }
        Commands::IssueToken(args) => {
            let user = context
                .users
                .find_by_username(&args.username)
                .await?
                .with_context(|| format!("no user named {}", args.username))?;
            let token = context
                .auth
                .issue_token(&user, &args.permissions)
                .context("failed to sign token")?;

            if cli.json {
                print_json(&TokenOutput {
                    user_id: user.id,
                    username: &user.username,
                    access_token: token,
                    expires_in: context.config.jwt_expiration,
                })?;
            } else {
                println!("{}", token);
            }
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

use crate::client::BackendClient;
use crate::config::{Config, config_file_path, save_config_to};
use crate::errors::AppError;
use crate::guard::{self, Access, AppRoute};
use crate::models::Credentials;
use crate::session::{SessionAuthenticator, SessionState};
use crate::token_storage::{TokenStorage, storage_dir};
use crate::traits::TokenStore;
use clap::{Args, Parser, Subcommand};
use reqwest::Method;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

/// kbadmin - session client for the knowledge-base admin backend
#[derive(Parser)]
#[command(name = "kbadmin")]
#[command(about = "Log in to the knowledge-base admin backend and keep the session alive", long_about = None)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Logging level (overrides the config file)
    #[arg(short, long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Check whether the stored session is still valid
    Status,

    /// Log in with a username and password
    Login(LoginArgs),

    /// Log out and clear the stored token
    Logout,

    /// Rotate the security token now
    Refresh,

    /// Keep the session alive with periodic refreshes until Ctrl+C
    Watch(WatchArgs),

    /// Send a request to the backend through the session
    Request(RequestArgs),

    /// Write a default configuration file
    InitConfig(InitConfigArgs),
}

#[derive(Args, Clone)]
pub struct LoginArgs {
    /// Username (prompted when omitted)
    #[arg(short, long)]
    pub username: Option<String>,
}

#[derive(Args, Clone)]
pub struct WatchArgs {
    /// Username to use if a login is needed
    #[arg(short, long)]
    pub username: Option<String>,

    /// Log out when the watch stops
    #[arg(long)]
    pub logout_on_exit: bool,
}

#[derive(Args, Clone)]
pub struct RequestArgs {
    /// HTTP method (GET, POST, PUT, PATCH, DELETE)
    #[arg(value_name = "METHOD")]
    pub method: String,

    /// Path relative to the backend base URL, e.g. /api/categories
    #[arg(value_name = "PATH")]
    pub path: String,

    /// JSON request body
    #[arg(short, long)]
    pub data: Option<String>,
}

#[derive(Args, Clone)]
pub struct InitConfigArgs {
    /// Overwrite an existing file
    #[arg(short, long)]
    pub force: bool,
}

/// Wire the token slot, transport and session together
pub fn build_session(config: &Config) -> Result<SessionAuthenticator<BackendClient>, AppError> {
    let store: Arc<dyn TokenStore> = Arc::new(TokenStorage::new(
        &config.session.token_key,
        config.session.use_keyring,
    )?);
    let client = if config.session.persist_cookies {
        let cookie_file = storage_dir().join(format!("{}.cookies", config.session.token_key));
        BackendClient::with_cookie_file(config.backend.clone(), Arc::clone(&store), cookie_file)?
    } else {
        BackendClient::new(config.backend.clone(), Arc::clone(&store))?
    };
    Ok(SessionAuthenticator::new(
        client,
        store,
        config.refresh_interval(),
    ))
}

pub async fn handle_command(
    command: Commands,
    config: Config,
    config_path: Option<PathBuf>,
) -> Result<(), AppError> {
    if let Commands::InitConfig(args) = &command {
        return init_config(args, &config, config_path);
    }

    let session = build_session(&config)?;

    match command {
        Commands::Status => {
            let access = guard::enter(&session, AppRoute::Dashboard).await;
            print_state(&session.state());
            if access != Access::Allow {
                println!("Login required: run `kbadmin login`.");
            }
        }
        Commands::Login(args) => {
            if !login_interactive(&session, args.username).await? {
                return Err(AppError::Generic {
                    message: "Login failed".to_string(),
                });
            }
            print_state(&session.state());
        }
        Commands::Logout => {
            session.logout().await;
            println!("Logged out.");
        }
        Commands::Refresh => {
            let outcome = session.refresh_now().await?;
            println!("Refresh: {:?}", outcome);
        }
        Commands::Watch(args) => watch(&session, args).await?,
        Commands::Request(args) => request(&session, args).await?,
        Commands::InitConfig(_) => {}
    }

    Ok(())
}

fn init_config(
    args: &InitConfigArgs,
    config: &Config,
    config_path: Option<PathBuf>,
) -> Result<(), AppError> {
    let path = config_path.unwrap_or_else(config_file_path);
    if path.exists() && !args.force {
        return Err(AppError::Generic {
            message: format!("{} already exists (use --force to overwrite)", path.display()),
        });
    }

    save_config_to(config, &path)?;
    println!("Wrote {}", path.display());
    Ok(())
}

async fn login_interactive(
    session: &SessionAuthenticator<BackendClient>,
    username: Option<String>,
) -> Result<bool, AppError> {
    let username = match username {
        Some(username) => username,
        None => prompt("Username: ")?,
    };
    let password = rpassword::prompt_password("Password: ").map_err(|e| AppError::Generic {
        message: format!("Failed to read password: {}", e),
    })?;

    if username.trim().is_empty() || password.is_empty() {
        return Err(AppError::Generic {
            message: "Username and password cannot be empty".to_string(),
        });
    }

    Ok(session
        .login(&Credentials::new(username.trim(), password))
        .await)
}

async fn watch(
    session: &SessionAuthenticator<BackendClient>,
    args: WatchArgs,
) -> Result<(), AppError> {
    if guard::enter(session, AppRoute::Dashboard).await != Access::Allow
        && !login_interactive(session, args.username).await?
    {
        return Err(AppError::Generic {
            message: "Login failed".to_string(),
        });
    }

    println!(
        "Session active. Refreshing every {:?}; press Ctrl+C to stop.",
        session.refresh_interval()
    );

    let mut rx = session.subscribe();
    let observer = tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let state = rx.borrow_and_update().clone();
            tracing::info!(
                authenticated = state.is_authenticated,
                has_token = state.has_security_token,
                issued_at = ?state.token_issued_at,
                "Session state changed"
            );
        }
    });

    shutdown_signal().await;
    tracing::info!("Shutdown signal received");

    if args.logout_on_exit {
        session.logout().await;
    }
    observer.abort();
    Ok(())
}

async fn request(
    session: &SessionAuthenticator<BackendClient>,
    args: RequestArgs,
) -> Result<(), AppError> {
    let method =
        Method::from_bytes(args.method.to_uppercase().as_bytes()).map_err(|e| AppError::Generic {
            message: format!("Invalid HTTP method {:?}: {}", args.method, e),
        })?;
    let body = args
        .data
        .as_deref()
        .map(serde_json::from_str::<serde_json::Value>)
        .transpose()
        .map_err(|e| AppError::Generic {
            message: format!("Invalid JSON body: {}", e),
        })?;

    session.check_login_status().await;
    if !session.is_authenticated() {
        tracing::warn!("Sending request without an authenticated session");
    }

    let response = session
        .backend()
        .execute(method, &args.path, body.as_ref())
        .await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&response).unwrap_or_else(|_| response.to_string())
    );
    Ok(())
}

fn prompt(label: &str) -> Result<String, AppError> {
    print!("{}", label);
    io::stdout().flush().map_err(|e| AppError::Generic {
        message: format!("Failed to flush stdout: {}", e),
    })?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| AppError::Generic {
            message: format!("Failed to read input: {}", e),
        })?;
    Ok(line.trim().to_string())
}

pub fn print_state(state: &SessionState) {
    println!("Authenticated:  {}", state.is_authenticated);
    println!("Security token: {}", if state.has_security_token { "stored" } else { "none" });
    if let Some(issued_at) = state.token_issued_at {
        println!("Token issued:   {}", issued_at.to_rfc3339());
    }
    if let Some(profile) = &state.profile {
        let name = profile.display_name.as_deref().unwrap_or(&profile.username);
        println!("User:           {}", name);
        if let Some(department) = &profile.department {
            println!("Department:     {}", department);
        }
    }
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_request_command() {
        let cli = Cli::parse_from([
            "kbadmin",
            "--config",
            "/tmp/kb.toml",
            "request",
            "post",
            "/api/categories",
            "--data",
            r#"{"name":"Manuals"}"#,
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/kb.toml")));
        match cli.command {
            Commands::Request(args) => {
                assert_eq!(args.method, "post");
                assert_eq!(args.path, "/api/categories");
                assert!(args.data.is_some());
            }
            _ => panic!("expected request command"),
        }
    }

    #[test]
    fn test_parse_watch_flags() {
        let cli = Cli::parse_from(["kbadmin", "watch", "-u", "admin", "--logout-on-exit"]);
        match cli.command {
            Commands::Watch(args) => {
                assert_eq!(args.username.as_deref(), Some("admin"));
                assert!(args.logout_on_exit);
            }
            _ => panic!("expected watch command"),
        }
    }

    #[test]
    fn test_init_config_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        init_config(&InitConfigArgs { force: false }, &Config::default(), Some(path.clone()))
            .unwrap();
        assert!(path.exists());

        assert!(
            init_config(&InitConfigArgs { force: false }, &Config::default(), Some(path.clone()))
                .is_err()
        );
        assert!(init_config(&InitConfigArgs { force: true }, &Config::default(), Some(path)).is_ok());
    }
}

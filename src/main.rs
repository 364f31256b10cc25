use anyhow::{Context, Result};
use std::sync::Arc;

use salvage_client::api::SalvageApi;
use salvage_client::auth::{Credentials, SessionGuard, SqliteTokenStore, TokenStore};
use salvage_client::config::{Command, Config};
use salvage_client::error::ApiError;
use salvage_client::models::NewFile;
use salvage_client::nav::{Navigator, Route};

#[tokio::main]
async fn main() -> Result<()> {
    let (config, command) = Config::load()?;
    config.validate()?;

    // Initialize logging with the configured level; stderr so command output
    // stays clean on stdout
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("Backend: {}", config.api_url);
    tracing::debug!("Session file: {}", config.session_file.display());

    let store: Arc<dyn TokenStore> = Arc::new(SqliteTokenStore::open(&config.session_file)?);
    let api = SalvageApi::from_config(&config, store.clone())?;
    let navigator = Navigator::new(SessionGuard::new(store));

    if let Err(e) = run(command, &api, navigator).await {
        if let Some(api_error) = e.downcast_ref::<ApiError>() {
            if api_error.requires_login() {
                eprintln!("{}. Run `salvage login`.", api_error);
                std::process::exit(1);
            }
        }
        return Err(e);
    }

    Ok(())
}

async fn run(command: Command, api: &SalvageApi, mut navigator: Navigator) -> Result<()> {
    match command {
        Command::Login { username } => {
            let credentials = prompt_credentials(username, false)?;
            api.login(&credentials).await?;
            println!("Logged in as {}.", credentials.username);
        }

        Command::Signup { username } => {
            let credentials = prompt_credentials(username, true)?;
            api.signup(&credentials).await?;
            println!("Account created. Log in with `salvage login`.");
        }

        Command::Logout => {
            api.logout()?;
            println!("Logged out.");
        }

        Command::Status => match navigator.navigate(Route::Workspace) {
            Route::Workspace => println!("Authorized."),
            _ => println!("Unauthorized. Run `salvage login`."),
        },

        Command::Files => {
            ensure_authorized(&mut navigator, api).await?;
            let files = api.list_files().await?;
            if files.is_empty() {
                println!("No files yet.");
            }
            for file in files {
                let created = file
                    .created_at
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default();
                println!("{:>6}  {:<30}  {}", file.id, file.name, created);
            }
        }

        Command::Save { path, name } => {
            ensure_authorized(&mut navigator, api).await?;
            let c_code = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let name = name.unwrap_or_else(|| {
                path.file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| "untitled.c".to_string())
            });

            let stored = api
                .save_file(&NewFile {
                    name,
                    c_code,
                    rust_code: String::new(),
                })
                .await?;
            println!("Saved {} as record {}.", stored.name, stored.id);
        }

        Command::Delete { id } => {
            ensure_authorized(&mut navigator, api).await?;
            api.delete_file(id).await?;
            println!("Deleted record {}.", id);
        }

        Command::Transpile { path } => {
            ensure_authorized(&mut navigator, api).await?;
            let c_code = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;

            let rust_code = api.transpile(&c_code).await?;
            println!("{}", rust_code);
        }
    }

    Ok(())
}

/// Gate a protected command on the session guard. An unauthorized evaluation
/// redirects through an interactive login, then resumes the requested
/// destination.
async fn ensure_authorized(navigator: &mut Navigator, api: &SalvageApi) -> Result<()> {
    if navigator.navigate(Route::Workspace) == Route::Login {
        eprintln!("No valid session, please log in.");
        let credentials = prompt_credentials(None, false)?;
        api.login(&credentials).await?;

        let destination = navigator.take_pending();
        let resumed = navigator.navigate(destination);
        anyhow::ensure!(
            resumed == Route::Workspace,
            "login did not establish a session"
        );
    }
    Ok(())
}

/// Collect username/password interactively, skipping prompts for values
/// already given on the command line
fn prompt_credentials(username: Option<String>, confirm: bool) -> Result<Credentials> {
    let username = match username {
        Some(username) => username,
        None => dialoguer::Input::new()
            .with_prompt("Username")
            .interact_text()
            .context("Failed to read username")?,
    };

    let mut password = dialoguer::Password::new().with_prompt("Password");
    if confirm {
        password = password.with_confirmation("Confirm password", "Passwords do not match");
    }
    let password = password.interact().context("Failed to read password")?;

    Ok(Credentials { username, password })
}

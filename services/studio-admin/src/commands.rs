//! Admin console commands
//!
//! Each command maps to one or two `ApiClient` calls. Output is returned as
//! text so `main` decides where it goes; failures (including a rejected
//! envelope) come back as `anyhow` errors and end the process non-zero.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;
use studio_client::{ApiClient, Envelope, Error};

use crate::config::Config;

#[derive(Debug, Parser)]
#[command(name = "studio-admin")]
#[command(about = "Admin console for the studio site backend")]
#[command(version)]
pub struct Cli {
    /// Config file (falls back to CONFIG_PATH, then ./studio-admin.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Log in (password from STUDIO_ADMIN_PASSWORD or admin.password_file)
    Login {
        /// Defaults to admin.username from the config
        username: Option<String>,
    },

    /// Log out and forget stored tokens
    Logout,

    /// Show whether a session is stored
    Status,

    /// List projects
    Projects,

    /// List services
    Services,

    /// List inbound messages
    Messages,

    /// Show a message and mark it read
    Read { id: String },

    /// Delete a message
    DeleteMessage { id: String },

    /// Show public contact info
    Contact,

    /// Upload an image
    Upload { path: PathBuf },
}

/// Run one command against the backend.
pub async fn run(client: &ApiClient, config: &Config, command: Command) -> Result<String> {
    match command {
        Command::Login { username } => {
            let username = username
                .or_else(|| config.admin.username.clone())
                .context("no username given and admin.username is not configured")?;
            let password = config
                .admin
                .password
                .as_ref()
                .context("no password: set STUDIO_ADMIN_PASSWORD or admin.password_file")?;
            let envelope = client
                .login(&username, password.expose())
                .await
                .map_err(session_hint)?;
            if !envelope.success {
                bail!("login failed: {}", envelope.message);
            }
            Ok(format!("logged in as {username}"))
        }
        Command::Logout => {
            client.logout().await?;
            Ok("logged out".to_owned())
        }
        Command::Status => {
            if client.is_authenticated().await {
                Ok(format!(
                    "logged in to {} (tokens in {})",
                    client.config().base_url,
                    config.storage.token_file.display()
                ))
            } else {
                Ok("not logged in".to_owned())
            }
        }
        Command::Projects => render(client.projects().await),
        Command::Services => render(client.services().await),
        Command::Messages => render(client.messages().await),
        Command::Read { id } => {
            let output = render(client.message(&id).await)?;
            client
                .mark_message_read(&id)
                .await
                .map_err(session_hint)?;
            Ok(output)
        }
        Command::DeleteMessage { id } => {
            render(client.delete_message(&id).await)?;
            Ok(format!("deleted message {id}"))
        }
        Command::Contact => render(client.contact_info().await),
        Command::Upload { path } => {
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .context("upload path has no file name")?
                .to_owned();
            render(
                client
                    .upload_image(&file_name, image_content_type(&path), bytes)
                    .await,
            )
        }
    }
}

/// Pretty-print the data of a successful envelope.
fn render<T: Serialize>(result: studio_client::Result<Envelope<T>>) -> Result<String> {
    let envelope = result.map_err(session_hint)?;
    if !envelope.success {
        bail!("backend refused: {}", envelope.message);
    }
    match envelope.data {
        Some(data) => serde_json::to_string_pretty(&data).context("failed to format response"),
        None if envelope.message.is_empty() => Ok("ok".to_owned()),
        None => Ok(envelope.message),
    }
}

fn session_hint(err: Error) -> anyhow::Error {
    if err.is_session_expired() {
        anyhow::anyhow!("session expired, run `studio-admin login` again")
    } else {
        err.into()
    }
}

fn image_content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Line-oriented shell over a [`SessionClient`].

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::api::SessionClient;
use crate::dispatch::ApiRequest;
use crate::error::ClientError;
use crate::token::describe_expiry;

pub const HELP: &str = "\
commands:
  login <email> <password>            sign in
  register <name> <email> <password>  create an account (does not sign in)
  me                                  fetch the current identity from the backend
  whoami                              show the cached identity
  get <path>                          authenticated GET, prints the JSON body
  refresh                             renew the access credential now
  logout                              sign out and clear the session
  expiry                              time left on the access credential
  help                                show this text
  quit                                exit";

/// A parsed shell line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Login { email: String, password: String },
    Register { name: String, email: String, password: String },
    Me,
    WhoAmI,
    Get { path: String },
    Refresh,
    Logout,
    Expiry,
    Help,
    Quit,
}

impl ShellCommand {
    /// Command keyword, safe to log (arguments may hold a password).
    pub fn name(&self) -> &'static str {
        match self {
            Self::Login { .. } => "login",
            Self::Register { .. } => "register",
            Self::Me => "me",
            Self::WhoAmI => "whoami",
            Self::Get { .. } => "get",
            Self::Refresh => "refresh",
            Self::Logout => "logout",
            Self::Expiry => "expiry",
            Self::Help => "help",
            Self::Quit => "quit",
        }
    }
}

/// Parse one input line. Blank lines and `#` comments yield `None`.
pub fn parse_line(line: &str) -> anyhow::Result<Option<ShellCommand>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let words: Vec<&str> = line.split_whitespace().collect();
    let command = match words.as_slice() {
        ["login", email, password] => {
            ShellCommand::Login { email: (*email).to_owned(), password: (*password).to_owned() }
        }
        ["register", name, email, password] => ShellCommand::Register {
            name: (*name).to_owned(),
            email: (*email).to_owned(),
            password: (*password).to_owned(),
        },
        ["me"] => ShellCommand::Me,
        ["whoami"] => ShellCommand::WhoAmI,
        ["get", path] if path.starts_with('/') => ShellCommand::Get { path: (*path).to_owned() },
        ["get", path] => anyhow::bail!("path must start with '/': {path}"),
        ["refresh"] => ShellCommand::Refresh,
        ["logout"] => ShellCommand::Logout,
        ["expiry"] => ShellCommand::Expiry,
        ["help"] | ["?"] => ShellCommand::Help,
        ["quit"] | ["exit"] => ShellCommand::Quit,
        [cmd, ..] => anyhow::bail!("unknown command or wrong arguments: {cmd} (try `help`)"),
        [] => return Ok(None),
    };
    Ok(Some(command))
}

/// Execute one command and render its output.
pub async fn execute(client: &SessionClient, command: ShellCommand) -> Result<String, ClientError> {
    let output = match command {
        ShellCommand::Login { email, password } => {
            let identity = client.login(&email, &password).await?;
            format!("signed in as {} <{}>", identity.name, identity.email)
        }
        ShellCommand::Register { name, email, password } => {
            client.register(&name, &email, &password).await?
        }
        ShellCommand::Me => to_json(&client.me().await?),
        ShellCommand::WhoAmI => match client.session().current_identity() {
            Some(identity) => to_json(&identity),
            None => "not signed in".to_owned(),
        },
        ShellCommand::Get { path } => to_json(&client.fetch_json(ApiRequest::get(path)).await?),
        ShellCommand::Refresh => {
            let credential = client.refresh().await?;
            match describe_expiry(credential.as_str()) {
                Some(left) => format!("credential renewed, expires in {left}"),
                None => "credential renewed".to_owned(),
            }
        }
        ShellCommand::Logout => {
            client.logout().await?;
            "signed out".to_owned()
        }
        ShellCommand::Expiry => match client.session().current_credential() {
            Some(credential) => describe_expiry(credential.as_str())
                .unwrap_or_else(|| "credential carries no expiry".to_owned()),
            None => "not signed in".to_owned(),
        },
        ShellCommand::Help => HELP.to_owned(),
        ShellCommand::Quit => String::new(),
    };
    Ok(output)
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("<unprintable: {e}>"))
}

/// Read commands from `input` until EOF or `quit`, writing results to `output`.
pub async fn run<R, W>(client: &SessionClient, input: R, output: &mut W) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let command = match parse_line(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                output.write_all(format!("error: {e}\n").as_bytes()).await?;
                continue;
            }
        };
        if command == ShellCommand::Quit {
            break;
        }

        debug!(command = command.name(), "executing");
        let rendered = match execute(client, command).await {
            Ok(text) => text,
            Err(e) => format!("error [{}]: {e}", e.code()),
        };
        output.write_all(rendered.as_bytes()).await?;
        output.write_all(b"\n").await?;
        output.flush().await?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "shell_tests.rs"]
mod tests;

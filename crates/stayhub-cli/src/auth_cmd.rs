//! Auth subcommands: login, logout, status.
//!
//! User-facing output uses writeln! to stdout.

use std::io::{self, Write};

use anyhow::Context as _;

use stayhub_client::ApiError;

use crate::context::CliContext;
use crate::fmt;

/// Auth subcommand actions.
#[derive(clap::Subcommand, Debug)]
pub enum AuthAction {
    /// Sign in with email and password.
    Login {
        #[arg(short, long)]
        email: String,
        #[arg(short, long, env = "STAYHUB_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign out and forget the stored session.
    Logout,
    /// Show who is signed in.
    Status,
}

/// Execute an auth subcommand.
pub async fn run(action: AuthAction, ctx: &mut CliContext) -> anyhow::Result<()> {
    match action {
        AuthAction::Login { email, password } => login(ctx, &email, &password).await,
        AuthAction::Logout => logout(ctx),
        AuthAction::Status => {
            fmt::write_user_status(&mut io::stdout(), ctx.session.current())?;
            Ok(())
        }
    }
}

async fn login(ctx: &mut CliContext, email: &str, password: &str) -> anyhow::Result<()> {
    let api = ctx.api()?;
    let user = match api.login(email, password).await {
        Ok(user) => user,
        Err(ApiError::Unauthorized) => anyhow::bail!("Login failed: wrong email or password"),
        Err(e) => return Err(e).context("Login failed"),
    };
    if user.token.is_none() {
        anyhow::bail!("Login failed: server returned no token");
    }
    let name = user.display_name();
    ctx.session.login(user)?;

    writeln!(io::stdout(), "Logged in as {name}")?;
    Ok(())
}

fn logout(ctx: &mut CliContext) -> anyhow::Result<()> {
    let mut out = io::stdout();
    if !ctx.session.is_authenticated() {
        writeln!(out, "Not logged in")?;
        return Ok(());
    }
    ctx.session.logout()?;
    writeln!(out, "Logged out")?;
    Ok(())
}

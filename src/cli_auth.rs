use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::{path::PathBuf, sync::Arc};

use blog_engagement_server::user::{NewUser, SqliteUserStore, UserManager};

fn parse_path(s: &str) -> Result<PathBuf> {
    let original_path = PathBuf::from(s);
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

/// Provisions user accounts for the engagement server. Signup happens in the
/// external account-management frontend in production; this tool covers
/// operator-driven setups and local development.
#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to the SQLite database file for users and engagement data.
    /// Created with a fresh schema if it does not exist yet.
    #[clap(value_parser = parse_path)]
    pub db_path: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Creates a user with the given handle and email.
    AddUser {
        handle: String,
        email: String,
        #[clap(long)]
        display_name: Option<String>,
        #[clap(long)]
        profile_image: Option<String>,
    },

    /// Sets (or replaces) the password for an existing user.
    SetPassword { handle: String, password: String },

    /// Lists all user handles.
    ListUsers,
}

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    let store = Arc::new(
        SqliteUserStore::new(&cli_args.db_path)
            .with_context(|| format!("Failed to open {:?}", cli_args.db_path))?,
    );
    let user_manager = UserManager::new(store);

    match cli_args.command {
        Command::AddUser {
            handle,
            email,
            display_name,
            profile_image,
        } => {
            let user_id = user_manager.add_user(NewUser {
                handle: handle.clone(),
                email,
                display_name,
                profile_image,
            })?;
            println!("Created user {} with id {}", handle, user_id);
        }
        Command::SetPassword { handle, password } => {
            user_manager.set_user_password(&handle, password)?;
            println!("Password set for {}", handle);
        }
        Command::ListUsers => {
            for handle in user_manager.get_all_user_handles()? {
                println!("{}", handle);
            }
        }
    }

    Ok(())
}

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "grantor", version)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create or update the database tables.
    Migrate,
    CreateUser {
        #[arg(long)]
        name: String,
        #[arg(long)]
        password: String,
    },
    CreateRole {
        #[arg(long)]
        name: String,
    },
    CreatePermission {
        #[arg(long)]
        name: String,
    },
    GrantRole {
        #[arg(long)]
        user: String,
        #[arg(long)]
        role: String,
    },
    GrantPermission {
        #[arg(long)]
        role: String,
        #[arg(long)]
        permission: String,
    },
    /// Print a user's roles and effective permissions.
    ShowPermissions {
        #[arg(long)]
        user: String,
    },
    /// Page through registered users.
    ListUsers {
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
}

//! portal: operator CLI for customer portal access gating.
//!
//! Runs the gating core against the local file backend in `~/.portal/`
//! (or `--root DIR`). Every command prints one JSON object to stdout; logs go
//! to stderr.
//!
//! ## Subcommands
//!
//! - `decide`: evaluate the access gate for a route
//! - `status`: profile completeness, subscription, content access and mode
//! - `set-mode`: switch app mode (exit 2 when the plan does not allow it)
//! - `bootstrap-admin`: promote a bearer's identity to admin
//! - `put-profile`, `put-subscription`, `register-bearer`: seed the local backend

mod bootstrap_admin;
mod context;
mod decide;
mod error;
mod logging;
mod seed;
mod set_mode;
mod status;

use clap::{Parser, Subcommand};
use portal_backend_protocol::{AppMode, UserId};
use serde_json::{json, Value};
use std::path::PathBuf;

use crate::context::Context;
use crate::error::CliError;

#[derive(Parser)]
#[command(name = "portal")]
#[command(about = "Customer portal access gating")]
#[command(version)]
struct Cli {
    /// Storage root (defaults to ~/.portal)
    #[arg(long, global = true, value_name = "DIR")]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate the access gate for a route (omit --user for a signed-out visitor)
    Decide {
        #[arg(long)]
        user: Option<String>,

        /// Location path, e.g. /dashboard
        #[arg(long)]
        route: String,
    },

    /// Show what the accessors resolve for a user
    Status {
        #[arg(long)]
        user: String,
    },

    /// Switch a user's app mode
    SetMode {
        #[arg(long)]
        user: String,

        /// documents or operations
        #[arg(long)]
        mode: AppMode,
    },

    /// Grant the admin role to the identity behind a bearer token
    BootstrapAdmin {
        #[arg(long)]
        bearer: Option<String>,

        /// Setup secret (must match the configured one)
        #[arg(long)]
        secret: Option<String>,
    },

    /// Insert or replace a profile row (JSON)
    PutProfile {
        #[arg(value_name = "JSON")]
        row: String,
    },

    /// Insert or replace a subscription row (JSON)
    PutSubscription {
        #[arg(value_name = "JSON")]
        row: String,
    },

    /// Map a bearer token to a user for admin bootstrap
    RegisterBearer {
        #[arg(long)]
        token: String,

        #[arg(long)]
        user: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    let storage = Context::storage(cli.root);
    let logging_guard = logging::init(&storage.logs_dir());

    let result = match Context::open(storage) {
        Ok(ctx) => run(&ctx, cli.command).await,
        Err(err) => Err(err),
    };

    let code = match result {
        Ok(output) => {
            print_json(&output);
            0
        }
        Err(err) => {
            tracing::error!(error = %err, "portal command failed");
            print_json(&error_output(&err));
            err.exit_code()
        }
    };

    drop(logging_guard);
    std::process::exit(code);
}

async fn run(ctx: &Context, command: Commands) -> Result<Value, CliError> {
    match command {
        Commands::Decide { user, route } => {
            decide::run(ctx, user.map(UserId::from), &route).await
        }
        Commands::Status { user } => status::run(ctx, UserId::from(user)).await,
        Commands::SetMode { user, mode } => set_mode::run(ctx, UserId::from(user), mode).await,
        Commands::BootstrapAdmin { bearer, secret } => {
            bootstrap_admin::run(ctx, bearer, secret).await
        }
        Commands::PutProfile { row } => seed::put_profile(ctx, &row),
        Commands::PutSubscription { row } => seed::put_subscription(ctx, &row),
        Commands::RegisterBearer { token, user } => {
            seed::register_bearer(ctx, &token, UserId::from(user))
        }
    }
}

fn error_output(err: &CliError) -> Value {
    let mut output = json!({
        "status": "error",
        "error": err.info(),
    });
    if let Some(status) = err.http_status() {
        output["http_status"] = json!(status);
    }
    output
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(err) => eprintln!("portal: failed to render output: {err}"),
    }
}

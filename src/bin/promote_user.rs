//! Promote a registered user to admin.
//!
//! Registration only ever creates employees, so this is how the first admin
//! account is bootstrapped.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use dayflow::config::Config;
use dayflow::db::init_db;
use dayflow::model::user::User;
use dayflow::model::role::Role;
use dayflow::utils::email_registry::normalize;

#[derive(Parser)]
#[command(about = "Promote a Dayflow user to admin", version)]
struct Args {
    /// Email the user registered with, e.g. john@example.com
    email: String,
}

#[actix_web::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match promote(&normalize(&args.email)).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns false when no user has that email.
async fn promote(email: &str) -> Result<bool> {
    let config = Config::from_env()?;
    let pool = init_db(&config.database_url).await?;

    let Some(user) = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(&pool)
        .await
        .context("Failed to look up user")?
    else {
        println!("User with email '{email}' not found");
        return Ok(false);
    };

    if user.role == Role::Admin {
        println!("User '{}' is already an admin", user.name);
        return Ok(true);
    }

    sqlx::query("UPDATE users SET role = ? WHERE id = ?")
        .bind(Role::Admin)
        .bind(user.id)
        .execute(&pool)
        .await
        .context("Failed to update role")?;

    println!("Promoted '{}' ({email}) to admin", user.name);
    Ok(true)
}

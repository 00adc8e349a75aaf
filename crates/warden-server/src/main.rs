// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Warden administrative binary.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use warden_server::{build_context, init_tracing, read_secret_line, version};
use warden_server_accounts::CreateUserRequest;
use warden_server_auth::encode_info_header;
use warden_server_config::ServerConfig;

/// Warden - role-scoped credential vault administration.
#[derive(Parser, Debug)]
#[command(name = "warden-server", about = "Warden credential vault administration", version)]
struct Args {
	/// Config file to use instead of /etc/warden/server.toml
	#[arg(long, env = "WARDEN_SERVER_CONFIG", global = true)]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Show version and build information
	Version,
	/// Create or upgrade the database schema and builtin rows
	Migrate,
	/// Generate the ABE public and master keys
	Setup {
		/// Replace existing keys. Every sealed password becomes unreadable.
		#[arg(long)]
		force: bool,
	},
	/// Create an op_service user (password on stdin)
	AddOperator {
		name: String,
		#[arg(long)]
		display_name: Option<String>,
	},
	/// Seal one user's legacy plaintext password
	SealUser { name: String },
	/// Seal every legacy plaintext password
	SealAll,
	/// Authenticate (password on stdin) and print a session token
	Login {
		name: String,
		#[arg(long)]
		ttl_minutes: Option<u64>,
	},
	/// Decode a session token (on stdin) and print the subject info header
	Whoami,
	/// Print the resolved configuration and key status
	CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	if let Command::Version = args.command {
		println!("{}", version::format_version_info());
		return Ok(());
	}

	dotenvy::dotenv().ok();

	let config = match &args.config {
		Some(path) => warden_server_config::load_config_with_file(path),
		None => warden_server_config::load_config(),
	}
	.context("failed to load configuration")?;

	init_tracing(&config.logging);

	match args.command {
		Command::Version => Ok(()),
		Command::CheckConfig => check_config(&config).await,
		Command::Setup { force } => {
			let vault = warden_server::build_vault(&config.vault);
			vault.setup(force).await.context("engine setup failed")?;
			println!("keys written to {}", config.vault.key_dir.display());
			Ok(())
		}
		command => run(config, command).await,
	}
}

async fn run(config: ServerConfig, command: Command) -> anyhow::Result<()> {
	let ctx = build_context(config).await?;

	match command {
		Command::Migrate => {
			println!("database is up to date");
		}
		Command::AddOperator { name, display_name } => {
			let password = read_secret_line(&mut std::io::stdin().lock())?;
			let profile = ctx
				.users
				.create_operator(CreateUserRequest {
					name,
					password,
					display_name,
					email: None,
					phone: None,
					role_ids: vec![],
					group_id: None,
				})
				.await?;
			println!("created {} ({})", profile.name, profile.id);
		}
		Command::SealUser { name } => {
			ctx.users.seal_legacy_password(&name).await?;
			println!("sealed password of {name}");
		}
		Command::SealAll => {
			let report = ctx.users.seal_all_legacy().await?;
			println!(
				"sealed {}, already sealed {}, failed {}",
				report.sealed,
				report.already_sealed,
				report.failed.len()
			);
			for (name, reason) in &report.failed {
				println!("  {name}: {reason}");
			}
		}
		Command::Login { name, ttl_minutes } => {
			let sessions = ctx.sessions()?;
			let password = read_secret_line(&mut std::io::stdin().lock())?;
			let issued = sessions.login(&name, &password, ttl_minutes).await?;
			println!("{}", issued.token);
		}
		Command::Whoami => {
			let sessions = ctx.sessions()?;
			let token = read_secret_line(&mut std::io::stdin().lock())?;
			let identity = sessions.resolve(token.expose())?;
			println!("{}", encode_info_header(&identity)?);
		}
		Command::Version | Command::CheckConfig | Command::Setup { .. } => {}
	}

	ctx.pool.close().await;
	Ok(())
}

async fn check_config(config: &ServerConfig) -> anyhow::Result<()> {
	let vault = warden_server::build_vault(&config.vault);
	let keys = vault.key_status().await;

	println!("database:        {}", config.database.url);
	println!("key dir:         {}", config.vault.key_dir.display());
	println!("  public key:    {}", if keys.public_key { "present" } else { "missing" });
	println!("  master key:    {}", if keys.master_key { "present" } else { "missing" });
	println!("scratch dir:     {}", config.vault.scratch_dir.display());
	println!("engine timeout:  {}s", config.vault.engine_timeout_secs);
	println!(
		"token ttl:       {} min (max {} min)",
		config.token.default_ttl_minutes, config.token.max_ttl_minutes
	);
	println!(
		"signing secret:  {}",
		if config.token.signing_secret.is_some() { "configured" } else { "missing" }
	);
	println!("log level:       {} ({:?})", config.logging.level, config.logging.format);
	Ok(())
}

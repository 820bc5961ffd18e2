/*
 * This file is part of laptopctl.
 *
 * Copyright (C) 2025 laptopctl contributors
 *
 * laptopctl is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * laptopctl is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with laptopctl. If not, see <https://www.gnu.org/licenses/>.
 */

mod cli;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, error, warn};

use cli::Cli;
use laptopctl::config::{load_settings_from, EscalationTool};
use laptopctl::hw::is_root;

fn init_logging(verbose: u8) {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
        .to_string()
    });
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_env_filter(&log_level)
        .init();
}

fn run(cli: &Cli) -> anyhow::Result<ExitCode> {
    let path = cli::settings_path(cli);
    let settings = load_settings_from(&path)
        .with_context(|| format!("failed to load settings from {}", path.display()))?;
    debug!(path = %path.display(), escalation = settings.escalation.as_str(), "Settings loaded");

    if settings.escalation == EscalationTool::Direct && !is_root() {
        warn!("escalation is 'direct' but laptopctl is not running as root; writes will fail");
    }

    cli::run_cli(cli, settings)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

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

//! Command Line Interface
//!
//! Thin front-end over [`ControlCenter`]: every subcommand maps onto one of
//! `probe`, `sample` or `apply`.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::warn;

use laptopctl::config::{self, Settings};
use laptopctl::data::{
    CapabilityFlags, CapabilityMap, ControlRequest, ControlResult, CpuUsage, FanMode,
    SensorSnapshot,
};
use laptopctl::hw::sysfs::read_available_governors;
use laptopctl::{CancelToken, ControlCenter, Poller};

#[derive(Parser)]
#[command(name = "laptopctl")]
#[command(version)]
#[command(about = "laptopctl - Laptop telemetry and hardware control for Linux")]
#[command(long_about = "laptopctl - Laptop telemetry and hardware control for Linux

Reads battery, CPU, memory, disk, temperature and fan telemetry, and changes
the CPU governor, display brightness, fan mode/speed and battery charge
thresholds through pkexec (or sudo/doas).

EXAMPLES:
    laptopctl probe                        Show which controls this machine exposes
    laptopctl sample --json                One telemetry snapshot as JSON
    laptopctl watch --interval-ms 1000     Stream snapshots until Ctrl-C
    laptopctl governors                    List available CPU governors
    laptopctl set governor powersave
    laptopctl set brightness 40
    laptopctl set fan-mode auto
    laptopctl set fan-speed 60
    laptopctl set thresholds 40 80
    laptopctl config show

ENVIRONMENT VARIABLES:
    RUST_LOG=debug         Enable debug logging (overrides -v)
    LAPTOPCTL_CONFIG=PATH  Use an alternate settings file

FILES:
    ~/.config/laptopctl/config.json       Settings")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Settings file to use instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show detected capabilities and sensors
    Probe,

    /// Take one telemetry snapshot
    Sample {
        /// Gap between the warm-up and the reported sample
        #[arg(long, default_value_t = 500)]
        interval_ms: u64,
    },

    /// Stream snapshots until interrupted
    Watch {
        /// Polling interval (defaults to poll_interval_ms from settings)
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Stop after this many snapshots
        #[arg(long)]
        count: Option<usize>,
    },

    /// List the CPU governors the kernel offers
    Governors,

    /// Change a hardware setting (prompts for authorization)
    #[command(subcommand)]
    Set(SetCommands),

    /// Settings file management
    #[command(subcommand)]
    Config(ConfigCommands),
}

// ============================================================================
// Set Commands
// ============================================================================

#[derive(Subcommand)]
pub enum SetCommands {
    /// Set the scaling governor on every CPU
    Governor { name: String },
    /// Set display brightness in percent
    Brightness { percent: u8 },
    /// Hand fan control to firmware (auto) or take it (manual)
    FanMode { mode: FanMode },
    /// Set fan speed in percent; switches to manual mode
    FanSpeed {
        percent: u8,
        /// Allow speeds below the configured safety floor
        #[arg(long)]
        force: bool,
    },
    /// Set battery charge start/stop thresholds in percent
    Thresholds { start: u8, stop: u8 },
}

impl SetCommands {
    fn to_request(&self) -> ControlRequest {
        match self {
            SetCommands::Governor { name } => ControlRequest::SetGovernor { name: name.clone() },
            SetCommands::Brightness { percent } => ControlRequest::SetBrightness { percent: *percent },
            SetCommands::FanMode { mode } => ControlRequest::SetFanMode { mode: *mode },
            SetCommands::FanSpeed { percent, force } => ControlRequest::SetFanSpeed {
                percent: *percent,
                override_floor: *force,
            },
            SetCommands::Thresholds { start, stop } => ControlRequest::SetBatteryThresholds {
                start: *start,
                stop: *stop,
            },
        }
    }
}

// ============================================================================
// Config Commands
// ============================================================================

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective settings
    Show,
    /// Print the settings file location
    Path,
    /// Write the default settings to the settings file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

// ============================================================================
// CLI Execution
// ============================================================================

pub fn settings_path(cli: &Cli) -> PathBuf {
    cli.config.clone().unwrap_or_else(config::config_path)
}

pub fn run_cli(cli: &Cli, settings: Settings) -> anyhow::Result<ExitCode> {
    match &cli.command {
        Commands::Config(sub) => cmd_config(cli, sub, &settings),
        Commands::Probe => {
            let center = ControlCenter::new(&settings);
            print_capabilities(&center.capabilities(), cli.json)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Sample { interval_ms } => {
            let center = ControlCenter::new(&settings);
            center.sample();
            thread::sleep(Duration::from_millis(*interval_ms));
            print_snapshot(&center.sample(), cli.json)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Watch { interval_ms, count } => cmd_watch(cli, &settings, *interval_ms, *count),
        Commands::Governors => {
            let center = ControlCenter::new(&settings);
            let caps = center.capabilities();
            let Some(cpu) = caps.cpu_freq.as_ref() else {
                bail!("this machine does not expose cpufreq governors");
            };
            let governors = read_available_governors(cpu)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&governors)?);
            } else {
                for governor in governors {
                    println!("{governor}");
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Set(sub) => cmd_set(cli, &settings, sub),
    }
}

fn install_interrupt() -> CancelToken {
    let token = CancelToken::new();
    let handler_token = token.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_token.cancel()) {
        warn!("Failed to set signal handler: {}. Ctrl-C will not cancel cleanly.", e);
    }
    token
}

fn cmd_set(cli: &Cli, settings: &Settings, cmd: &SetCommands) -> anyhow::Result<ExitCode> {
    let center = ControlCenter::new(settings);
    let interrupt = install_interrupt();
    let result = center.apply_with_cancel(&cmd.to_request(), &interrupt);
    print_result(&result, cli.json)?;
    Ok(if result.succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn cmd_watch(
    cli: &Cli,
    settings: &Settings,
    interval_ms: Option<u64>,
    count: Option<usize>,
) -> anyhow::Result<ExitCode> {
    let interval = interval_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| settings.poll_interval());
    let center = Arc::new(ControlCenter::new(settings));
    let interrupt = install_interrupt();
    let delivered = Arc::new(AtomicUsize::new(0));

    let json = cli.json;
    let seen = Arc::clone(&delivered);
    let poller = Poller::spawn(center, interval, move |snapshot| {
        // the first snapshot has no CPU baseline yet
        if snapshot.cpu == CpuUsage::WarmingUp {
            return;
        }
        if let Err(e) = print_snapshot(&snapshot, json) {
            warn!("Failed to print snapshot: {}", e);
        }
        seen.fetch_add(1, Ordering::SeqCst);
    })
    .context("failed to start poller")?;

    while !interrupt.is_cancelled() {
        if count.is_some_and(|n| delivered.load(Ordering::SeqCst) >= n) {
            break;
        }
        thread::sleep(Duration::from_millis(100));
    }
    poller.stop();
    Ok(ExitCode::SUCCESS)
}

fn cmd_config(cli: &Cli, cmd: &ConfigCommands, settings: &Settings) -> anyhow::Result<ExitCode> {
    let path = settings_path(cli);
    match cmd {
        ConfigCommands::Show => println!("{}", serde_json::to_string_pretty(settings)?),
        ConfigCommands::Path => println!("{}", path.display()),
        ConfigCommands::Init { force } => {
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            config::save_settings_to(&path, &Settings::default())?;
            println!("Wrote default settings to {}", path.display());
        }
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// Output
// ============================================================================

#[derive(Serialize)]
struct ProbeReport<'a> {
    #[serde(flatten)]
    flags: CapabilityFlags,
    capabilities: &'a CapabilityMap,
}

fn print_capabilities(caps: &CapabilityMap, json: bool) -> anyhow::Result<()> {
    if json {
        let report = ProbeReport {
            flags: caps.flags(),
            capabilities: caps,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let yes_no = |b: bool| if b { "yes" } else { "no" };
    println!("Capabilities");
    println!("============");
    match &caps.power_supply {
        Some(b) => println!("Battery:            {} ({})", yes_no(true), b.name),
        None => println!("Battery:            no"),
    }
    match &caps.battery_thresholds {
        Some(t) => println!("Charge thresholds:  yes ({:?} layout)", t.layout),
        None => println!("Charge thresholds:  no"),
    }
    match &caps.cpu_freq {
        Some(c) => println!("CPU governor:       yes ({} CPUs)", c.governor_targets.len()),
        None => println!("CPU governor:       no"),
    }
    match &caps.backlight {
        Some(b) => println!("Backlight:          yes ({})", b.name),
        None => println!("Backlight:          no"),
    }
    match &caps.fan_control {
        Some(f) => println!("Fan control:        yes ({})", f.chip),
        None => println!("Fan control:        no"),
    }
    println!("AC adapter:         {}", yes_no(caps.ac_adapter.is_some()));
    println!();
    println!("Temperature sensors ({}):", caps.temperature_sources.len());
    for s in &caps.temperature_sources {
        println!("  {} ({})", s.name, s.path.display());
    }
    println!("Fan sensors ({}):", caps.fan_sources.len());
    for s in &caps.fan_sources {
        println!("  {} ({})", s.name, s.path.display());
    }
    Ok(())
}

fn print_snapshot(snap: &SensorSnapshot, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(snap)?);
        return Ok(());
    }

    const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
    let na = || "N/A".to_string();

    match &snap.cpu {
        CpuUsage::Measured { overall, per_core } => {
            let cores: Vec<String> = per_core.iter().map(|c| format!("{c:.0}")).collect();
            println!("CPU:        {overall:.1}% [{}]", cores.join(" "));
        }
        CpuUsage::WarmingUp => println!("CPU:        warming up"),
        CpuUsage::Unavailable => println!("CPU:        N/A"),
    }
    match &snap.memory {
        Some(m) => println!(
            "Memory:     {:.1}% ({:.1}/{:.1} GiB, swap {:.1}/{:.1} GiB)",
            m.percent(),
            m.used_bytes as f64 / GIB,
            m.total_bytes as f64 / GIB,
            m.swap_used_bytes as f64 / GIB,
            m.swap_total_bytes as f64 / GIB
        ),
        None => println!("Memory:     N/A"),
    }
    for d in &snap.disks {
        println!(
            "Disk {}: {:.1}% of {:.1} GiB",
            d.mount_point,
            d.percent(),
            d.total_bytes as f64 / GIB
        );
    }
    if let Some(io) = &snap.disk_io {
        println!(
            "Disk I/O:   read {:.1} KiB/s, write {:.1} KiB/s",
            io.read_bytes_per_sec / 1024.0,
            io.write_bytes_per_sec / 1024.0
        );
    }

    let battery = snap
        .battery_percent
        .map(|p| format!("{p}% ({})", snap.battery_state))
        .unwrap_or_else(na);
    println!("Battery:    {battery}");
    if let Some(online) = snap.ac_online {
        println!("AC:         {}", if online { "online" } else { "offline" });
    }
    if let Some(secs) = snap.battery_time_remaining_secs {
        println!("Remaining:  {}h {:02}m", secs / 3600, (secs % 3600) / 60);
    }
    if let Some(t) = &snap.charge_thresholds {
        println!("Thresholds: {t}");
    }
    println!("Governor:   {}", snap.governor.clone().unwrap_or_else(na));
    println!(
        "Brightness: {}",
        snap.brightness_percent.map(|p| format!("{p}%")).unwrap_or_else(na)
    );
    println!(
        "Fan mode:   {}",
        snap.fan_mode.map(|m| m.to_string()).unwrap_or_else(na)
    );
    for (name, celsius) in &snap.temperatures {
        println!("  {name}: {celsius:.1}°C");
    }
    for (name, rpm) in &snap.fan_speeds {
        println!("  {name}: {rpm} RPM");
    }
    println!();
    Ok(())
}

fn print_result(result: &ControlResult, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }
    match (&result.applied, &result.error) {
        (Some(applied), _) => println!("Applied {applied}"),
        (None, Some(kind)) => eprintln!(
            "Failed ({kind}): {}",
            result.message.as_deref().unwrap_or("no details")
        ),
        (None, None) => eprintln!("Failed: no details"),
    }
    Ok(())
}

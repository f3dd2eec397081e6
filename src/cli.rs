/// CLI interface and commands.

/// Common functions for CLI.
pub mod common;

/// VM lifecycle commands.
pub mod vm;

/// Template commands.
pub mod template;

/// Configuration commands.
pub mod config;

/// Version information.
pub mod version;

/// Connection diagnostics.
pub mod doctor;

/// Web API diagnostics.
pub mod api;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "syno-vm", version)]
#[command(
    about = "🖥️  Manage virtual machines on Synology NAS devices with Virtual Machine Manager"
)]
pub struct Cli {
    /// Config file (default is ~/.syno-vm/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", global = true)]
    pub log_level: String,

    /// Verbose output, same as --log-level debug
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 📋 List virtual machines
    List(vm::ListCommand),
    /// ✨ Create a new virtual machine
    Create(vm::CreateCommand),
    /// ▶️  Start a virtual machine
    Start(vm::VmName),
    /// ⏹️  Stop a virtual machine
    Stop(vm::VmName),
    /// 🔄 Restart a virtual machine
    Restart(vm::VmName),
    /// 🔍 Show virtual machine status
    Status(vm::StatusCommand),
    /// 🗑️  Delete a virtual machine
    Delete(vm::DeleteCommand),
    /// 📦 Manage VM templates
    Template(template::TemplateCommand),
    /// ⚙️  Manage syno-vm configuration
    Config(config::ConfigCommand),
    /// 🏷️  Show version information
    Version(version::VersionCommand),
    /// 🩺 Test the SSH connection and look for VMM on the NAS
    Doctor(doctor::DoctorCommand),
    /// 🌐 Test the Web API login
    ApiCheck(api::ApiCheckCommand),
}

/// The line printed to stderr when a command fails, with its full cause chain.
pub fn error_report(err: &anyhow::Error) -> String {
    format!("Error: {:#}", err)
}

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use clap::Args;
use log::{debug, info};

use crate::cli::common;
use crate::config::Settings;
use crate::models::VmConfig;

#[derive(Args, Debug)]
pub struct ListCommand {
    /// Show all VMs including stopped ones
    #[arg(short, long)]
    pub all: bool,
    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

impl ListCommand {
    pub async fn execute(&self, settings: &Settings) -> Result<()> {
        let mut hypervisor = common::hypervisor(settings)?;

        let pb = common::spinner("Listing virtual machines...".into());
        let result = hypervisor.list_vms().await;
        pb.finish_and_clear();
        common::close(hypervisor).await;

        let vms = result.context("failed to list VMs")?;
        info!("Found {} virtual machines", vms.len());

        if self.json {
            let shown: Vec<_> = vms.iter().filter(|vm| self.all || !vm.is_stopped()).collect();
            println!("{}", serde_json::to_string_pretty(&shown)?);
        } else {
            common::list_vms(&vms, self.all);
        }

        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct CreateCommand {
    /// Name of the virtual machine
    #[arg(long)]
    pub name: String,
    /// Template to use for VM creation
    #[arg(long)]
    pub template: Option<String>,
    /// Number of CPU cores
    #[arg(long, default_value = "2")]
    pub cpu: u32,
    /// Memory in MB
    #[arg(long, default_value = "2048")]
    pub memory: u64,
    /// Storage configuration
    #[arg(long)]
    pub storage: Option<String>,
}

impl CreateCommand {
    pub fn vm_config(&self) -> VmConfig {
        VmConfig {
            name: self.name.clone(),
            template: self.template.clone(),
            cpu: self.cpu,
            memory: self.memory,
            storage: self.storage.clone(),
        }
    }

    pub async fn execute(&self, settings: &Settings) -> Result<()> {
        let config = self.vm_config();
        let mut hypervisor = common::hypervisor(settings)?;

        println!("✨ Creating VM: {}", config.name);
        println!("   CPU: {} cores", config.cpu);
        println!("   Memory: {} MB", config.memory);
        if let Some(ref template) = config.template {
            println!("   Template: {}", template);
        }

        let result = hypervisor.create_vm(&config).await;
        common::close(hypervisor).await;
        result.context("failed to create VM")?;

        println!("✅ VM {} created successfully", config.name);
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct VmName {
    /// Name of the virtual machine
    pub name: String,
}

impl VmName {
    pub async fn start(&self, settings: &Settings) -> Result<()> {
        let mut hypervisor = common::hypervisor(settings)?;
        let pb = common::spinner(format!("Starting VM: {}", self.name));
        let result = hypervisor.start_vm(&self.name).await;
        pb.finish_and_clear();
        common::close(hypervisor).await;

        result.context("failed to start VM")?;
        println!("✅ VM {} started successfully", self.name);
        Ok(())
    }

    pub async fn stop(&self, settings: &Settings) -> Result<()> {
        let mut hypervisor = common::hypervisor(settings)?;
        let pb = common::spinner(format!("Stopping VM: {}", self.name));
        let result = hypervisor.stop_vm(&self.name).await;
        pb.finish_and_clear();
        common::close(hypervisor).await;

        result.context("failed to stop VM")?;
        println!("✅ VM {} stopped successfully", self.name);
        Ok(())
    }

    pub async fn restart(&self, settings: &Settings) -> Result<()> {
        let mut hypervisor = common::hypervisor(settings)?;
        let pb = common::spinner(format!("Restarting VM: {}", self.name));
        let result = hypervisor.restart_vm(&self.name).await;
        pb.finish_and_clear();
        common::close(hypervisor).await;

        result.context("failed to restart VM")?;
        println!("✅ VM {} restarted successfully", self.name);
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct StatusCommand {
    /// Name of the virtual machine
    pub name: String,
    /// Print as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatusCommand {
    pub async fn execute(&self, settings: &Settings) -> Result<()> {
        let mut hypervisor = common::hypervisor(settings)?;
        let result = hypervisor.vm_status(&self.name).await;
        common::close(hypervisor).await;

        let vm = result.context("failed to get VM status")?;
        if self.json {
            println!("{}", serde_json::to_string_pretty(&vm)?);
        } else {
            common::show_vm(&vm);
        }
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct DeleteCommand {
    /// Name of the virtual machine
    pub name: String,
    /// Force delete without confirmation
    #[arg(short, long)]
    pub force: bool,
}

impl DeleteCommand {
    pub async fn execute(&self, settings: &Settings) -> Result<()> {
        if !self.force {
            print!(
                "⚠️  Are you sure you want to delete VM '{}'? This action cannot be undone. (y/N): ",
                self.name
            );
            io::stdout().flush()?;

            if !read_confirmation(io::stdin().lock()) {
                println!("Delete cancelled.");
                return Ok(());
            }
        }

        let mut hypervisor = common::hypervisor(settings)?;
        println!("🗑️  Deleting VM: {}", self.name);
        let result = hypervisor.delete_vm(&self.name).await;
        common::close(hypervisor).await;

        result.context("failed to delete VM")?;
        println!("✅ VM {} deleted successfully", self.name);
        Ok(())
    }
}

/// Read one answer line. Unreadable input counts as "no".
fn read_confirmation<R: BufRead>(mut input: R) -> bool {
    let mut answer = String::new();
    match input.read_line(&mut answer) {
        Ok(_) => is_confirmed(&answer),
        Err(e) => {
            debug!("Failed to read confirmation: {}", e);
            false
        }
    }
}

fn is_confirmed(answer: &str) -> bool {
    matches!(answer.trim(), "y" | "Y" | "yes")
}

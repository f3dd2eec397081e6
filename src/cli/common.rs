/// Common functions for CLI.
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::Settings;
use crate::models::{Template, VirtualMachine};
use crate::ssh::Client;
use crate::virsh::Hypervisor;

/// Build a hypervisor handle over a (not yet connected) SSH client.
pub fn hypervisor(settings: &Settings) -> Result<Hypervisor<Client>> {
    let client = Client::new(settings.connection()).context("failed to create client")?;
    Ok(Hypervisor::new(client))
}

/// Close the SSH session behind `hypervisor`.
pub async fn close(hypervisor: Hypervisor<Client>) {
    hypervisor.into_runner().disconnect().await;
}

pub fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Print VMs as a table. Stopped VMs are skipped unless `all` is set.
pub fn list_vms(vms: &[VirtualMachine], all: bool) {
    let shown: Vec<&VirtualMachine> = vms.iter().filter(|vm| all || !vm.is_stopped()).collect();
    if shown.is_empty() {
        println!("📝 No virtual machines found.");
        return;
    }

    println!(
        "{:<20} {:<15} {:<10} {:<15}",
        "NAME", "STATUS", "CPU", "MEMORY"
    );
    println!("{}", "─".repeat(60));

    for vm in shown {
        println!(
            "{:<20} {:<15} {:<10} {:<15}",
            vm.name,
            vm.status,
            format!("{} cores", vm.cpu),
            format!("{} MB", vm.memory)
        );
    }
}

pub fn show_vm(vm: &VirtualMachine) {
    println!("\n🖥️  Virtual Machine: {}", vm.name);
    println!("{}", "─".repeat(40));
    println!("  Status:     {}", vm.status);
    println!("  CPU Cores:  {}", vm.cpu);
    println!("  Memory:     {} MB", vm.memory);
    println!("  Storage:    {}", vm.storage);
    if let Some(ref ip) = vm.ip_address {
        println!("  IP Address: {}", ip);
    }
}

pub fn list_templates(templates: &[Template]) {
    if templates.is_empty() {
        println!("📝 No templates found.");
        return;
    }

    println!("{:<20} {:<20} {:<15}", "NAME", "DESCRIPTION", "OS");
    println!("{}", "─".repeat(55));

    for template in templates {
        println!(
            "{:<20} {:<20} {:<15}",
            template.name, template.description, template.os
        );
    }
}

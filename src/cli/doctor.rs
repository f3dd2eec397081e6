use anyhow::{Context, Result};
use clap::Args;
use log::info;

use crate::config::Settings;
use crate::ssh::Client;
use crate::utils::truncate_lines;

/// A diagnostic command run on the NAS.
struct Check {
    label: &'static str,
    command: &'static str,
}

const CHECKS: [Check; 5] = [
    Check {
        label: "SSH connection",
        command: "echo 'SSH connection successful'",
    },
    Check {
        label: "synowebapi",
        command: "which synowebapi 2>/dev/null || echo 'synowebapi not found'",
    },
    Check {
        label: "VMM processes",
        command: "ps aux | grep -i vmm | head -3 || echo 'No VMM processes found'",
    },
    Check {
        label: "Virtual packages",
        command: "ls /var/packages/ | grep -i virtual || echo 'No virtual packages found'",
    },
    Check {
        label: "System info",
        command: "uname -a",
    },
];

#[derive(Args, Debug)]
pub struct DoctorCommand {
    /// Maximum output lines shown per check
    #[arg(long, default_value = "10")]
    pub max_lines: usize,
}

impl DoctorCommand {
    pub async fn execute(&self, settings: &Settings) -> Result<()> {
        let mut client = Client::new(settings.connection()).context("failed to create client")?;

        println!("\n🩺 Testing connection to {}", client);
        println!("{}", "═".repeat(50));

        let result = self.run_checks(&mut client).await;
        client.disconnect().await;
        result?;

        println!("{}", "═".repeat(50));
        println!("✅ Connection test completed successfully!");
        Ok(())
    }

    async fn run_checks(&self, client: &mut Client) -> Result<()> {
        for (i, check) in CHECKS.iter().enumerate() {
            info!("Running check '{}'", check.label);
            match client.execute_command(check.command).await {
                Ok(output) => {
                    println!("✅ {}", check.label);
                    for line in truncate_lines(output.trim_end(), self.max_lines).lines() {
                        println!("   {}", line);
                    }
                }
                // without a working session none of the later checks can run
                Err(e) if i == 0 => return Err(e).context("SSH connection failed"),
                Err(e) => println!("❌ {} - {}", check.label, e),
            }
        }
        Ok(())
    }
}

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use crate::cli::common;
use crate::config::Settings;

#[derive(Args, Debug)]
pub struct TemplateCommand {
    #[command(subcommand)]
    pub action: TemplateAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum TemplateAction {
    /// List available VM templates
    List,
    /// Create a new VM template from an existing VM
    Create {
        /// Name of the template
        #[arg(long)]
        name: String,
        /// VM to create the template from
        #[arg(long)]
        from_vm: String,
    },
    /// Delete a VM template
    Delete {
        /// Name of the template
        name: String,
    },
}

impl TemplateCommand {
    pub async fn execute(&self, settings: &Settings) -> Result<()> {
        let mut hypervisor = common::hypervisor(settings)?;

        let result = match &self.action {
            TemplateAction::List => hypervisor
                .list_templates()
                .await
                .map(|templates| common::list_templates(&templates))
                .context("failed to list templates"),
            TemplateAction::Create { name, from_vm } => {
                println!("📦 Creating template '{}' from VM '{}'", name, from_vm);
                hypervisor
                    .create_template(name, from_vm)
                    .await
                    .map(|_| println!("✅ Template {} created successfully", name))
                    .context("failed to create template")
            }
            TemplateAction::Delete { name } => {
                println!("🗑️  Deleting template: {}", name);
                hypervisor
                    .delete_template(name)
                    .await
                    .map(|_| println!("✅ Template {} deleted successfully", name))
                    .context("failed to delete template")
            }
        };

        common::close(hypervisor).await;
        result
    }
}

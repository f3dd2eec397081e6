use anyhow::{anyhow, Context, Result};
use clap::Args;
use log::warn;

use crate::config::Settings;
use crate::webapi::WebApiClient;

const GUEST_API: &str = "SYNO.Virtualization.API.Guest";

#[derive(Args, Debug)]
pub struct ApiCheckCommand {
    /// API name to call after login
    #[arg(long, default_value = GUEST_API)]
    pub api: String,
    /// API method
    #[arg(long, default_value = "list")]
    pub method: String,
    /// API version
    #[arg(long, default_value = "1")]
    pub api_version: String,
}

impl ApiCheckCommand {
    pub async fn execute(&self, settings: &Settings) -> Result<()> {
        let host = settings
            .host
            .as_deref()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| anyhow!("host not configured. Run 'syno-vm config set --host <hostname>'"))?;
        let username = settings
            .username
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                anyhow!("username not configured. Run 'syno-vm config set --username <username>'")
            })?;
        let password = match settings.password {
            Some(ref password) => password.clone(),
            None => rpassword::prompt_password(format!("🔐 Password for {}@{}: ", username, host))
                .context("Failed to read password")?,
        };

        let mut client = WebApiClient::new(host, settings.api_port, username, password)?;
        println!("\n🌐 Testing Web API connection to {}@{}", username, client.base_url());

        let result = self.run(&mut client).await;

        if client.is_authenticated() {
            match client.logout().await {
                Ok(()) => println!("✅ Logout successful!"),
                Err(e) => warn!("Logout failed: {}", e),
            }
        }

        result
    }

    async fn run(&self, client: &mut WebApiClient) -> Result<()> {
        client.login().await.context("login failed")?;
        println!("✅ Login successful!");

        let response = client
            .call_api(&self.api, &self.method, &self.api_version, &[])
            .await
            .context("API call failed")?;
        let data = response.into_data().context("API call failed")?;

        println!("✅ API call successful! Response:");
        println!("{}", serde_json::to_string_pretty(&data)?);
        Ok(())
    }
}

use anyhow::Result;
use clap::Args;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Args, Debug)]
pub struct VersionCommand {
    /// Show build information
    #[arg(short, long)]
    pub build: bool,
}

/// Build metadata injected at compile time, `unknown` when absent.
fn build_value(value: Option<&'static str>) -> &'static str {
    value.filter(|v| !v.is_empty()).unwrap_or("unknown")
}

impl VersionCommand {
    pub fn execute(&self) -> Result<()> {
        println!("syno-vm version {}", VERSION);

        if self.build {
            println!("\n🏷️  Build Information:");
            println!("  Version:    {}", VERSION);
            println!("  Commit:     {}", build_value(option_env!("SYNO_VM_BUILD_COMMIT")));
            println!("  Build Date: {}", build_value(option_env!("SYNO_VM_BUILD_DATE")));
            println!("  Built By:   {}", build_value(option_env!("SYNO_VM_BUILT_BY")));
            println!(
                "  Platform:   {}/{}",
                std::env::consts::OS,
                std::env::consts::ARCH
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_build_values_are_unknown() {
        assert_eq!(build_value(None), "unknown");
        assert_eq!(build_value(Some("")), "unknown");
        assert_eq!(build_value(Some("abc123")), "abc123");
    }
}

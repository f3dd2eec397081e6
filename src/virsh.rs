/// VM operations over the appliance's `virsh` tool.
use std::sync::OnceLock;

use log::debug;
use regex::Regex;

use crate::error::{Error, Result};
use crate::models::{Template, VirtualMachine, VmConfig};
use crate::ssh::CommandRunner;

pub const VIRSH_PATH: &str = "/usr/local/bin/virsh";

const LIST_HEADER_LINES: usize = 2;

/// Parse `virsh list --all` output.
///
/// Expects exactly two header lines. Rows with fewer than three
/// whitespace-separated fields are skipped, and the state is every field
/// after the name.
pub fn parse_list(output: &str) -> Vec<VirtualMachine> {
    let lines: Vec<&str> = output.trim().lines().collect();
    if lines.len() <= LIST_HEADER_LINES {
        return Vec::new();
    }

    lines[LIST_HEADER_LINES..]
        .iter()
        .filter_map(|line| {
            // " Id   Name         State"
            // " -    stopped-vm   shut off"
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 3 {
                return None;
            }
            Some(VirtualMachine {
                name: fields[1].to_string(),
                status: fields[2..].join(" "),
                ..Default::default()
            })
        })
        .collect()
}

/// Parse `virsh dominfo <name>` output.
pub fn parse_dominfo(name: &str, output: &str) -> VirtualMachine {
    let mut vm = VirtualMachine::new(name);

    for line in output.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();

        match key.trim() {
            "State" => vm.status = value.to_string(),
            "CPU(s)" => {
                if let Ok(cpu) = value.parse() {
                    vm.cpu = cpu;
                }
            }
            "Max memory" => {
                // "2097152 KiB"
                if let Some(Ok(kib)) = value.split_whitespace().next().map(str::parse::<f64>) {
                    if kib >= 0.0 {
                        vm.memory = (kib / 1024.0) as u64;
                    }
                }
            }
            _ => {}
        }
    }

    vm
}

fn ipv4_regex() -> &'static Regex {
    static IPV4: OnceLock<Regex> = OnceLock::new();
    IPV4.get_or_init(|| Regex::new(r"(\d+\.\d+\.\d+\.\d+)").expect("valid IPv4 pattern"))
}

/// First IPv4 address in `virsh domifaddr` output.
pub fn parse_ipv4(output: &str) -> Option<String> {
    output
        .lines()
        .find_map(|line| ipv4_regex().captures(line))
        .map(|caps| caps[1].to_string())
}

/// VM operations issued through a [`CommandRunner`].
pub struct Hypervisor<R> {
    runner: R,
}

impl<R: CommandRunner> Hypervisor<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    pub fn into_runner(self) -> R {
        self.runner
    }

    async fn virsh(&mut self, args: &str) -> Result<String> {
        self.runner.run(&format!("{} {}", VIRSH_PATH, args)).await
    }

    async fn virsh_on(&mut self, subcommand: &str, vm_name: &str) -> Result<String> {
        let args = format!("{} {}", subcommand, shell_words::quote(vm_name));
        self.virsh(&args).await
    }

    pub async fn list_vms(&mut self) -> Result<Vec<VirtualMachine>> {
        let output = self
            .virsh("list --all")
            .await
            .map_err(|e| e.context("failed to list VMs"))?;
        Ok(parse_list(&output))
    }

    pub async fn start_vm(&mut self, name: &str) -> Result<()> {
        self.virsh_on("start", name).await?;
        Ok(())
    }

    pub async fn stop_vm(&mut self, name: &str) -> Result<()> {
        self.virsh_on("shutdown", name).await?;
        Ok(())
    }

    pub async fn restart_vm(&mut self, name: &str) -> Result<()> {
        self.virsh_on("reboot", name).await?;
        Ok(())
    }

    /// Remove the domain definition.
    pub async fn delete_vm(&mut self, name: &str) -> Result<()> {
        self.virsh_on("undefine", name).await?;
        Ok(())
    }

    pub async fn vm_status(&mut self, name: &str) -> Result<VirtualMachine> {
        let output = self
            .virsh_on("dominfo", name)
            .await
            .map_err(|e| e.context("failed to get VM info"))?;
        let mut vm = parse_dominfo(name, &output);

        match self.virsh_on("domifaddr", name).await {
            Ok(output) => {
                vm.ip_address = parse_ipv4(&output);
                if vm.ip_address.is_none() {
                    debug!("No IP address reported for VM '{}'", name);
                }
            }
            Err(e) => debug!("Failed to look up IP address of VM '{}': {}", name, e),
        }

        Ok(vm)
    }

    pub async fn create_vm(&mut self, config: &VmConfig) -> Result<()> {
        config.validate()?;
        Err(Error::Unsupported(
            "VM creation via virsh requires XML configuration - please use the VMM interface for VM creation".into(),
        ))
    }

    /// Templates are managed in the VMM interface; none are visible over SSH.
    pub async fn list_templates(&mut self) -> Result<Vec<Template>> {
        Ok(Vec::new())
    }

    pub async fn create_template(&mut self, _name: &str, _from_vm: &str) -> Result<()> {
        Err(Error::Unsupported(
            "template creation requires the VMM interface - not implemented via virsh".into(),
        ))
    }

    pub async fn delete_template(&mut self, _name: &str) -> Result<()> {
        Err(Error::Unsupported(
            "template deletion requires the VMM interface - not implemented via virsh".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssh::MockCommandRunner;
    use mockall::predicate::eq;

    const LIST_OUTPUT: &str = " Id   Name         State
----------------------------------
 1    web-server   running
 -    stopped-vm   shut off
 3    db           paused
";

    const DOMINFO_OUTPUT: &str = "Id:             1
Name:           web-server
UUID:           4c4c4544-0035-4810-8044-b4c04f4a4d32
OS Type:        hvm
State:          running
CPU(s):         4
CPU time:       1234.5s
Max memory:     2097152 KiB
Used memory:    2097152 KiB
Persistent:     yes
Autostart:      disable
";

    const DOMIFADDR_OUTPUT: &str = " Name       MAC address          Protocol     Address
-------------------------------------------------------------------------------
 vnet0      52:54:00:12:34:56    ipv4         192.168.1.100/24
";

    #[test]
    fn parse_list_reads_rows() {
        let vms = parse_list(LIST_OUTPUT);
        assert_eq!(vms.len(), 3);
        assert_eq!(vms[0].name, "web-server");
        assert_eq!(vms[0].status, "running");
        assert_eq!(vms[2].status, "paused");
    }

    #[test]
    fn parse_list_joins_multi_word_state() {
        let vms = parse_list(LIST_OUTPUT);
        assert_eq!(vms[1].name, "stopped-vm");
        assert_eq!(vms[1].status, "shut off");
    }

    #[test]
    fn parse_list_header_only_is_empty() {
        assert!(parse_list("").is_empty());
        assert!(parse_list(" Id   Name   State\n------------------\n").is_empty());
    }

    #[test]
    fn parse_list_skips_short_rows() {
        let output = " Id Name State\n---\n 1 web running\n\n garbage\n 2 db\n";
        let vms = parse_list(output);
        assert_eq!(vms.len(), 1);
        assert_eq!(vms[0].name, "web");
    }

    #[test]
    fn parse_dominfo_reads_known_keys() {
        let vm = parse_dominfo("web-server", DOMINFO_OUTPUT);
        assert_eq!(vm.name, "web-server");
        assert_eq!(vm.status, "running");
        assert_eq!(vm.cpu, 4);
        assert_eq!(vm.memory, 2048);
        assert_eq!(vm.ip_address, None);
    }

    #[test]
    fn parse_dominfo_converts_memory_from_kib() {
        let vm = parse_dominfo("x", "Max memory: 2097152 KiB");
        assert_eq!(vm.memory, 2048);
        let vm = parse_dominfo("x", "Max memory: 1048575 KiB");
        assert_eq!(vm.memory, 1023);
    }

    #[test]
    fn parse_dominfo_tolerates_bad_values() {
        let vm = parse_dominfo("x", "State: shut off\nCPU(s): many\nMax memory: lots KiB\nbogus line\n");
        assert_eq!(vm.status, "shut off");
        assert_eq!(vm.cpu, 0);
        assert_eq!(vm.memory, 0);
    }

    #[test]
    fn parse_ipv4_finds_first_address() {
        assert_eq!(parse_ipv4(DOMIFADDR_OUTPUT).as_deref(), Some("192.168.1.100"));
        assert_eq!(parse_ipv4(" Name MAC address Protocol Address\n---\n"), None);
    }

    #[tokio::test]
    async fn list_vms_runs_virsh_list() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .with(eq("/usr/local/bin/virsh list --all"))
            .times(1)
            .returning(|_| Ok(LIST_OUTPUT.to_string()));

        let mut hypervisor = Hypervisor::new(runner);
        let vms = hypervisor.list_vms().await.unwrap();
        assert_eq!(vms.len(), 3);
    }

    #[tokio::test]
    async fn list_vms_wraps_command_error() {
        let mut runner = MockCommandRunner::new();
        runner.expect_run().returning(|cmd| {
            Err(Error::Command {
                command: cmd.to_string(),
                status: Some(1),
                stderr: "error: failed to connect to the hypervisor".into(),
            })
        });

        let mut hypervisor = Hypervisor::new(runner);
        let err = hypervisor.list_vms().await.unwrap_err();
        assert!(matches!(err, Error::Command { ref command, .. } if command.contains("failed to list VMs")));
    }

    #[tokio::test]
    async fn lifecycle_commands() {
        let mut runner = MockCommandRunner::new();
        for cmd in [
            "/usr/local/bin/virsh start web",
            "/usr/local/bin/virsh shutdown web",
            "/usr/local/bin/virsh reboot web",
            "/usr/local/bin/virsh undefine web",
        ] {
            runner
                .expect_run()
                .with(eq(cmd))
                .times(1)
                .returning(|_| Ok(String::new()));
        }

        let mut hypervisor = Hypervisor::new(runner);
        hypervisor.start_vm("web").await.unwrap();
        hypervisor.stop_vm("web").await.unwrap();
        hypervisor.restart_vm("web").await.unwrap();
        hypervisor.delete_vm("web").await.unwrap();
    }

    #[tokio::test]
    async fn vm_names_are_shell_quoted() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .with(eq("/usr/local/bin/virsh start 'my vm'"))
            .times(1)
            .returning(|_| Ok(String::new()));

        let mut hypervisor = Hypervisor::new(runner);
        hypervisor.start_vm("my vm").await.unwrap();
    }

    #[tokio::test]
    async fn vm_status_includes_ip_address() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .with(eq("/usr/local/bin/virsh dominfo web-server"))
            .times(1)
            .returning(|_| Ok(DOMINFO_OUTPUT.to_string()));
        runner
            .expect_run()
            .with(eq("/usr/local/bin/virsh domifaddr web-server"))
            .times(1)
            .returning(|_| Ok(DOMIFADDR_OUTPUT.to_string()));

        let mut hypervisor = Hypervisor::new(runner);
        let vm = hypervisor.vm_status("web-server").await.unwrap();
        assert_eq!(vm.status, "running");
        assert_eq!(vm.cpu, 4);
        assert_eq!(vm.memory, 2048);
        assert_eq!(vm.ip_address.as_deref(), Some("192.168.1.100"));
    }

    #[tokio::test]
    async fn vm_status_ignores_domifaddr_failure() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .with(eq("/usr/local/bin/virsh dominfo web-server"))
            .returning(|_| Ok(DOMINFO_OUTPUT.to_string()));
        runner
            .expect_run()
            .with(eq("/usr/local/bin/virsh domifaddr web-server"))
            .returning(|cmd| {
                Err(Error::Command {
                    command: cmd.to_string(),
                    status: Some(1),
                    stderr: "error: no interfaces".into(),
                })
            });

        let mut hypervisor = Hypervisor::new(runner);
        let vm = hypervisor.vm_status("web-server").await.unwrap();
        assert_eq!(vm.status, "running");
        assert!(vm.ip_address.is_none());
    }

    #[tokio::test]
    async fn create_vm_is_unsupported_after_validation() {
        let runner = MockCommandRunner::new();
        let mut hypervisor = Hypervisor::new(runner);

        let mut config = VmConfig {
            name: "new-vm".into(),
            template: None,
            cpu: 2,
            memory: 2048,
            storage: None,
        };
        let err = hypervisor.create_vm(&config).await.unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));

        config.cpu = 0;
        let err = hypervisor.create_vm(&config).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn templates_are_not_managed_over_ssh() {
        let mut hypervisor = Hypervisor::new(MockCommandRunner::new());
        assert!(hypervisor.list_templates().await.unwrap().is_empty());
        assert!(matches!(
            hypervisor.create_template("base", "web").await,
            Err(Error::Unsupported(_))
        ));
        assert!(matches!(
            hypervisor.delete_template("base").await,
            Err(Error::Unsupported(_))
        ));
    }
}

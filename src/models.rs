/// Virtual machine records and requests.
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A virtual machine as reported by the remote hypervisor.
///
/// Built fresh on every query. `status` is kept as the hypervisor's own
/// wording ("running", "shut off", ...), and zero in `cpu`/`memory` means the
/// value was not reported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualMachine {
    pub name: String,
    pub status: String,
    pub cpu: u32,
    pub memory: u64,
    pub storage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}

impl VirtualMachine {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Whether the hypervisor reports the VM as powered off.
    pub fn is_stopped(&self) -> bool {
        matches!(self.status.as_str(), "shut off" | "stopped")
    }
}

/// Parameters for a VM creation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmConfig {
    pub name: String,
    pub template: Option<String>,
    pub cpu: u32,
    /// Memory in MB
    pub memory: u64,
    pub storage: Option<String>,
}

impl VmConfig {
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::Validation("VM name is required".into()));
        }
        if self.cpu == 0 {
            return Err(Error::Validation("CPU must be greater than 0".into()));
        }
        if self.memory == 0 {
            return Err(Error::Validation("memory must be greater than 0".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    pub description: String,
    pub os: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(name: &str, cpu: u32, memory: u64) -> VmConfig {
        VmConfig {
            name: name.into(),
            template: None,
            cpu,
            memory,
            storage: None,
        }
    }

    #[test]
    fn validate_accepts_complete_config() {
        assert!(config("x", 2, 2048).validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_cpu() {
        let err = config("x", 0, 2048).validate().unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn validate_rejects_empty_name() {
        let err = config("", 2, 2048).validate().unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn validate_rejects_zero_memory() {
        assert!(config("x", 2, 0).validate().is_err());
    }

    #[test]
    fn stopped_states() {
        let mut vm = VirtualMachine::new("vm");
        vm.status = "shut off".into();
        assert!(vm.is_stopped());
        vm.status = "running".into();
        assert!(!vm.is_stopped());
    }

    #[test]
    fn ip_address_omitted_from_json_when_absent() {
        let vm = VirtualMachine {
            name: "web".into(),
            status: "running".into(),
            cpu: 2,
            memory: 2048,
            storage: String::new(),
            ip_address: None,
        };
        let json = serde_json::to_value(&vm).unwrap();
        assert!(json.get("ip_address").is_none());
        assert_eq!(json["memory"], 2048);
    }
}

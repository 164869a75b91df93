//! The satellite modules on the CAN network
//!
//! Module IDs are 4 bits wide, limiting the network to 16 modules.

use crate::{error::FrameIdError, frame_id::compute_frame_id, message_types::MessageType};

/// A satellite module
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Module {
    /// Module ID, 0-15
    pub id: u8,
    /// Short name, used for message and node names in the database
    pub name: &'static str,
    /// Human readable description
    pub description: &'static str,
    /// Inactive modules are left out of the database unless requested
    pub active: bool,
}

impl Module {
    /// The frame ID of a message of `message_type` sent by this module to `destination`
    pub fn message_id(
        &self,
        destination: u8,
        message_type: MessageType,
    ) -> Result<u32, FrameIdError> {
        compute_frame_id(
            self.id as i64,
            destination as i64,
            message_type.value() as i64,
        )
    }
}

/// All modules on the network
pub const MODULES: &[Module] = &[
    Module {
        id: 0x0,
        name: "EPS",
        description: "Electrical Power System",
        active: false,
    },
    Module {
        id: 0x1,
        name: "COMM",
        description: "UHF Communication System",
        active: true,
    },
    Module {
        id: 0x3,
        name: "LORA",
        description: "LoRa Communication System",
        active: false,
    },
    Module {
        id: 0x4,
        name: "SBAND",
        description: "S-Band Communication System",
        active: false,
    },
    Module {
        id: 0x5,
        name: "MB",
        description: "On-Board Computer Motherboard",
        active: false,
    },
    Module {
        id: 0x6,
        name: "OBC",
        description: "On-Board Computer Compute Module",
        active: true,
    },
    Module {
        id: 0x7,
        name: "ADCS",
        description: "Attitude Determination and Control System",
        active: false,
    },
];

/// The active modules, in table order
pub fn active_modules() -> impl Iterator<Item = &'static Module> {
    MODULES.iter().filter(|m| m.active)
}

/// Look up a module by its exact name
pub fn module_by_name(name: &str) -> Option<&'static Module> {
    MODULES.iter().find(|m| m.name == name)
}

/// Look up a module by ID
pub fn module_by_id(id: u8) -> Option<&'static Module> {
    MODULES.iter().find(|m| m.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let names: Vec<_> = active_modules().map(|m| m.name).collect();
        assert_eq!(vec!["COMM", "OBC"], names);
        assert_eq!(Some(6), module_by_name("OBC").map(|m| m.id));
        assert_eq!(None, module_by_name("obc"));
        assert_eq!(Some("LORA"), module_by_id(3).map(|m| m.name));
        assert_eq!(None, module_by_id(2));
    }

    #[test]
    fn test_module_ids_unique_and_in_range() {
        for (i, a) in MODULES.iter().enumerate() {
            assert!(a.id <= 15);
            for b in &MODULES[i + 1..] {
                assert_ne!(a.id, b.id);
                assert_ne!(a.name, b.name);
            }
        }
    }

    #[test]
    fn test_message_id() {
        let obc = module_by_name("OBC").unwrap();
        assert_eq!(Ok(0xFFF6), obc.message_id(15, MessageType::Heartbeat));
        assert!(obc.message_id(16, MessageType::Status).is_err());
    }
}

use std::{collections::BTreeMap, path::Path};

use log::{debug, info};
use snafu::ResultExt;

use crate::{
    error::{DatabaseError, DecodeError, EncodeError, FrameIdError, WriteSnafu},
    heartbeat,
    message::{MessageDef, SignalValues},
    modules::{active_modules, MODULES},
};

/// Version written to generated databases
pub const DB_VERSION: &str = "0.1.0";

const DBC_NEW_SYMBOLS: &[&str] = &[
    "NS_DESC_",
    "CM_",
    "BA_DEF_",
    "BA_",
    "VAL_",
    "CAT_DEF_",
    "CAT_",
    "FILTER",
    "BA_DEF_DEF_",
    "EV_DATA_",
    "ENVVAR_DATA_",
    "SGTYPE_",
    "SGTYPE_VAL_",
    "BA_DEF_SGTYPE_",
    "BA_SGTYPE_",
    "SIG_TYPE_REF_",
    "VAL_TABLE_",
    "SIG_GROUP_",
    "SIG_VALTYPE_",
    "SIGTYPE_VALTYPE_",
    "BO_TX_BU_",
    "BA_DEF_REL_",
    "BA_REL_",
    "BA_DEF_DEF_REL_",
    "BU_SG_REL_",
    "BU_EV_REL_",
    "BU_BO_REL_",
    "SG_MUL_VAL_",
];

/// Summary of a database's contents
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DatabaseInfo {
    /// Database version
    pub dbc_version: String,
    /// Number of messages
    pub total_messages: usize,
    /// Message names, grouped by their first sender
    pub messages_by_sender: BTreeMap<String, Vec<String>>,
    /// All message names
    pub message_names: Vec<String>,
    /// Message names with their frame IDs in hex
    pub message_ids: Vec<(String, String)>,
    /// Node names
    pub nodes: Vec<String>,
}

/// The set of messages exchanged between modules
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CanDatabase {
    version: String,
    messages: Vec<MessageDef>,
    nodes: Vec<String>,
}

impl CanDatabase {
    /// Create an empty database
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            messages: Vec::new(),
            nodes: Vec::new(),
        }
    }

    /// Build the database for the satellite's modules
    ///
    /// Only active modules are included unless `include_inactive` is set.
    pub fn create(include_inactive: bool) -> Result<Self, FrameIdError> {
        let modules: Vec<_> = if include_inactive {
            MODULES.iter().collect()
        } else {
            active_modules().collect()
        };
        let mut db = Self::new(DB_VERSION);
        for module in modules {
            db.add_node(module.name);
            db.add_message(heartbeat::create_message(module)?);
        }
        debug!("Created CAN database with {} messages", db.messages.len());
        Ok(db)
    }

    /// Add a node, if not already present
    pub fn add_node(&mut self, name: &str) {
        if !self.nodes.iter().any(|n| n == name) {
            self.nodes.push(name.to_string());
        }
    }

    /// Add a message definition
    pub fn add_message(&mut self, message: MessageDef) {
        self.messages.push(message);
    }

    /// The database version
    pub fn version(&self) -> &str {
        &self.version
    }

    /// All message definitions
    pub fn messages(&self) -> &[MessageDef] {
        &self.messages
    }

    /// All node names
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    /// Look up a message by name
    pub fn message_by_name(&self, name: &str) -> Option<&MessageDef> {
        self.messages.iter().find(|m| m.name == name)
    }

    /// Look up a message by frame ID
    pub fn message_by_frame_id(&self, frame_id: u32) -> Option<&MessageDef> {
        self.messages.iter().find(|m| m.frame_id == frame_id)
    }

    /// Encode a payload for the named message
    pub fn encode_message(&self, name: &str, values: &SignalValues) -> Result<Vec<u8>, EncodeError> {
        self.message_by_name(name)
            .ok_or_else(|| EncodeError::UnknownMessage {
                name: name.to_string(),
            })?
            .encode(values)
    }

    /// Decode a payload received with `frame_id`
    pub fn decode_message(&self, frame_id: u32, data: &[u8]) -> Result<SignalValues, DecodeError> {
        self.message_by_frame_id(frame_id)
            .ok_or(DecodeError::UnknownFrame { frame_id })?
            .decode(data)
    }

    /// Summarize the database
    pub fn info(&self) -> DatabaseInfo {
        let mut messages_by_sender: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for message in &self.messages {
            let sender = message
                .senders
                .first()
                .cloned()
                .unwrap_or_else(|| "Unknown".to_string());
            messages_by_sender
                .entry(sender)
                .or_default()
                .push(message.name.clone());
        }
        DatabaseInfo {
            dbc_version: self.version.clone(),
            total_messages: self.messages.len(),
            messages_by_sender,
            message_names: self.messages.iter().map(|m| m.name.clone()).collect(),
            message_ids: self
                .messages
                .iter()
                .map(|m| (m.name.clone(), format!("0x{:X}", m.frame_id)))
                .collect(),
            nodes: self.nodes.clone(),
        }
    }

    /// Serialize the database in DBC format
    pub fn to_dbc_string(&self) -> String {
        self.to_string()
    }

    /// Write the database to a DBC file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), DatabaseError> {
        let path = path.as_ref();
        std::fs::write(path, self.to_dbc_string()).context(WriteSnafu { path })?;
        info!(
            "Saved CAN database v{} with {} messages to {}",
            self.version,
            self.messages.len(),
            path.display()
        );
        Ok(())
    }
}

impl core::fmt::Display for CanDatabase {
    /// Formats the database as DBC file text
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        writeln!(f, "VERSION \"{}\"\n\n", self.version)?;
        writeln!(f, "NS_ :")?;
        for symbol in DBC_NEW_SYMBOLS {
            writeln!(f, "\t{symbol}")?;
        }
        writeln!(f, "\nBS_:\n")?;
        writeln!(f, "BU_: {}\n\n", self.nodes.join(" "))?;

        for message in &self.messages {
            let sender = message
                .senders
                .first()
                .map(String::as_str)
                .unwrap_or("Vector__XXX");
            writeln!(
                f,
                "BO_ {} {}: {} {}",
                message.dbc_id(),
                message.name,
                message.length,
                sender
            )?;
            for signal in &message.signals {
                writeln!(f, "{}", signal.to_dbc_line())?;
            }
            writeln!(f)?;
        }

        for message in &self.messages {
            if let Some(comment) = &message.comment {
                writeln!(f, "CM_ BO_ {} \"{}\";", message.dbc_id(), escape(comment))?;
            }
            for signal in &message.signals {
                if let Some(comment) = &signal.comment {
                    writeln!(
                        f,
                        "CM_ SG_ {} {} \"{}\";",
                        message.dbc_id(),
                        signal.name,
                        escape(comment)
                    )?;
                }
            }
        }
        Ok(())
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

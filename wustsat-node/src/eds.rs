//! Loading an [`ObjectDictionary`] from a CANopen EDS / DCF file
//!
//! Only the object sections are used. A variable object is described by a `[XXXX]` section, and the
//! sub objects of a record or array by `[XXXXsubY]` sections (index and sub in hex). Section and key
//! names are case insensitive.
//!
//! Default values may reference the node ID, e.g. `DefaultValue=$NODEID+0x180`. These are resolved
//! against the node being loaded.
//!
//! Objects with a data type the dictionary cannot represent (e.g. REAL32, UNSIGNED64, DOMAIN) are
//! skipped with a warning, and the rest of the file is still loaded.

use std::path::Path;

use configparser::ini::Ini;
use log::warn;
use snafu::{OptionExt, ResultExt};
use wustsat_common::NodeId;

use crate::{
    error::{
        EdsError, InvalidNumberSnafu, MissingKeySnafu, ParseSnafu, ReadSnafu,
        UnsupportedDataTypeSnafu,
    },
    object_dict::{
        parse_integer, AccessType, DataType, ObjectDictionary, ObjectEntry, Value,
    },
};

const OBJECT_TYPE_VAR: i64 = 0x7;
const OBJECT_TYPE_ARRAY: i64 = 0x8;
const OBJECT_TYPE_RECORD: i64 = 0x9;

/// Split a section name into its index and optional sub index
fn parse_section_name(section: &str) -> Option<(u16, Option<u8>)> {
    let (index, sub) = match section.split_once("sub") {
        Some((index, sub)) => (index, Some(sub)),
        None => (section, None),
    };
    if index.len() != 4 {
        return None;
    }
    let index = u16::from_str_radix(index, 16).ok()?;
    let sub = match sub {
        Some(sub) => Some(u8::from_str_radix(sub, 16).ok()?),
        None => None,
    };
    Some((index, sub))
}

/// Substitute `$NODEID` in a value expression
///
/// Expressions are a sum of terms, e.g. `$NODEID+0x180`. If any term fails to parse the text is
/// returned unchanged.
fn resolve_node_id(text: &str, node_id: NodeId) -> String {
    if !text.to_ascii_uppercase().contains("$NODEID") {
        return text.to_string();
    }
    let mut total = 0i64;
    for term in text.split('+') {
        let term = term.trim();
        if term.eq_ignore_ascii_case("$NODEID") {
            total += node_id.raw() as i64;
        } else if let Some(value) = parse_integer(term) {
            total += value;
        } else {
            return text.to_string();
        }
    }
    total.to_string()
}

fn non_empty(ini: &Ini, section: &str, key: &str) -> Option<String> {
    ini.get(section, key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn numeric(ini: &Ini, section: &str, key: &'static str) -> Result<Option<i64>, EdsError> {
    match non_empty(ini, section, key) {
        Some(text) => parse_integer(&text)
            .map(Some)
            .context(InvalidNumberSnafu {
                section,
                key,
                value: text,
            }),
        None => Ok(None),
    }
}

fn load_entry(
    ini: &Ini,
    section: &str,
    index: u16,
    sub: u8,
    node_id: NodeId,
) -> Result<ObjectEntry, EdsError> {
    let name = non_empty(ini, section, "parametername").unwrap_or_default();

    let code = numeric(ini, section, "datatype")?.context(MissingKeySnafu {
        section,
        key: "DataType",
    })?;
    let data_type =
        DataType::from_eds_code(code).context(UnsupportedDataTypeSnafu { section, code })?;

    let access = match non_empty(ini, section, "accesstype") {
        Some(text) => AccessType::from_eds(&text).context(InvalidNumberSnafu {
            section,
            key: "AccessType",
            value: text,
        })?,
        None => AccessType::default(),
    };

    let mut entry = ObjectEntry::new(index, sub, name, data_type).with_access(access);
    if let Some(default) = non_empty(ini, section, "defaultvalue") {
        entry = entry.with_default(resolve_node_id(&default, node_id));
    }
    if let Some(text) = non_empty(ini, section, "parametervalue") {
        let resolved = resolve_node_id(&text, node_id);
        let value = Value::parse(data_type, &resolved).context(InvalidNumberSnafu {
            section,
            key: "ParameterValue",
            value: text,
        })?;
        entry = entry.with_value(value);
    }
    Ok(entry)
}

/// Parse EDS text into an object dictionary for the given node
pub fn parse_eds(text: &str, node_id: NodeId) -> Result<ObjectDictionary, EdsError> {
    let mut ini = Ini::new();
    ini.read(text.to_string())
        .map_err(|message| ParseSnafu { message }.build())?;

    let mut od = ObjectDictionary::new();
    for section in ini.sections() {
        let Some((index, sub)) = parse_section_name(&section) else {
            continue;
        };
        let object_type = numeric(&ini, &section, "objecttype")?.unwrap_or(OBJECT_TYPE_VAR);
        let sub = match sub {
            Some(sub) => sub,
            // Arrays and records carry their data in the sub sections
            None if matches!(object_type, OBJECT_TYPE_ARRAY | OBJECT_TYPE_RECORD) => continue,
            None => 0,
        };
        match load_entry(&ini, &section, index, sub, node_id) {
            Ok(entry) => od.insert(entry),
            Err(e @ EdsError::UnsupportedDataType { .. }) => {
                warn!("Node ID {node_id}: skipping object 0x{index:04X}sub{sub}: {e}");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(od)
}

/// Read and parse an EDS file
pub fn load_eds(path: &Path, node_id: NodeId) -> Result<ObjectDictionary, EdsError> {
    let text = std::fs::read_to_string(path).context(ReadSnafu { path })?;
    parse_eds(&text, node_id)
}

impl ObjectDictionary {
    /// Load a dictionary from an EDS / DCF file, resolving `$NODEID` for `node_id`
    pub fn load_eds(path: impl AsRef<Path>, node_id: NodeId) -> Result<Self, EdsError> {
        load_eds(path.as_ref(), node_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
[FileInfo]
FileName=sample.eds
Description=Sample node

[DeviceInfo]
VendorName=WUST-Sat

[MandatoryObjects]
SupportedObjects=2
1=0x1017
2=0x1018

[1017]
ParameterName=Producer heartbeat time
ObjectType=0x7
DataType=0x0006
AccessType=rw
DefaultValue=1000

[1018]
ParameterName=Identity object
ObjectType=0x9
SubNumber=2

[1018sub0]
ParameterName=Highest sub-index supported
ObjectType=0x7
DataType=0x0005
AccessType=const
DefaultValue=1

[1018sub1]
ParameterName=Vendor-ID
ObjectType=0x7
DataType=0x0007
AccessType=ro
DefaultValue=0x0000ABCD

[1200sub1]
ParameterName=COB-ID client to server
DataType=0x0007
AccessType=ro
DefaultValue=$NODEID+0x600

[2000]
ParameterName=Control register
ObjectType=0x7
DataType=0x0005
AccessType=rw
DefaultValue=0
ParameterValue=3
"#;

    fn node() -> NodeId {
        NodeId::new(20).unwrap()
    }

    #[test]
    fn test_parse_sample() {
        let od = parse_eds(SAMPLE, node()).unwrap();
        assert_eq!(5, od.len());

        let hb = od.get(0x1017).unwrap();
        assert_eq!("Producer heartbeat time", hb.name());
        assert_eq!(DataType::Unsigned16, hb.data_type());
        assert_eq!(Some("1000"), hb.default_value());
        assert_eq!(None, hb.value());

        // Record header is not an entry, its subs are
        assert!(od.contains(0x1018, 0));
        assert!(od.contains(0x1018, 1));
        assert_eq!(AccessType::Const, od.get_sub(0x1018, 0).unwrap().access());

        let control = od.get(0x2000).unwrap();
        assert_eq!(Some(Value::U8(3)), control.value());
    }

    #[test]
    fn test_node_id_substitution() {
        let od = parse_eds(SAMPLE, node()).unwrap();
        let cob = od.get_sub(0x1200, 1).unwrap();
        assert_eq!(Some("1556"), cob.default_value());
    }

    #[test]
    fn test_section_names() {
        assert_eq!(Some((0x1017, None)), parse_section_name("1017"));
        assert_eq!(Some((0x1018, Some(0x1))), parse_section_name("1018sub1"));
        assert_eq!(Some((0x1600, Some(0x10))), parse_section_name("1600sub10"));
        assert_eq!(None, parse_section_name("deviceinfo"));
        assert_eq!(None, parse_section_name("mandatoryobjects"));
    }

    #[test]
    fn test_unsupported_data_type_is_skipped() {
        let text = "[1017]\nParameterName=Producer heartbeat time\nDataType=0x0006\n\
                    AccessType=rw\nDefaultValue=1000\n\n\
                    [1013]\nParameterName=High resolution time stamp\nDataType=0x001B\n\
                    AccessType=rw\n\n\
                    [2001]\nParameterName=Blob\nDataType=0x000F\nAccessType=rw\n";
        let od = parse_eds(text, node()).unwrap();
        assert_eq!(1, od.len());
        assert!(od.contains(0x1017, 0));
        assert!(!od.contains_index(0x1013));
        assert!(!od.contains_index(0x2001));

        let section = "[2001]\nDataType=0x0008\n";
        let mut ini = Ini::new();
        ini.read(section.to_string()).unwrap();
        let err = load_entry(&ini, "2001", 0x2001, 0, node()).unwrap_err();
        assert!(matches!(err, EdsError::UnsupportedDataType { code: 0x8, .. }));
    }

    #[test]
    fn test_missing_data_type() {
        let text = "[2001]\nParameterName=Untyped\nAccessType=rw\n";
        let err = parse_eds(text, node()).unwrap_err();
        assert!(matches!(err, EdsError::MissingKey { key: "DataType", .. }));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let od = ObjectDictionary::load_eds(file.path(), node()).unwrap();
        assert!(od.contains(0x2000, 0));

        let missing = ObjectDictionary::load_eds("/nonexistent/node.eds", node());
        assert!(matches!(missing, Err(EdsError::Read { .. })));
    }
}

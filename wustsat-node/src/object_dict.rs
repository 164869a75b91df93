//! The object dictionary store
//!
//! An [`ObjectDictionary`] is a table of [`ObjectEntry`] values keyed by index and sub index. It is
//! loaded from an EDS file each time a node starts, and shared between the node runtime, its bus
//! receiver, and device behaviors via `Arc`.
//!
//! Entries distinguish two write paths:
//!
//! - [`ObjectEntry::set_value`] is a direct, local assignment. Observers are not notified.
//! - [`ObjectEntry::write_from_bus`] is used when a peer writes the entry (an SDO download). The
//!   bytes are decoded according to the entry's data type, access rights are enforced, and every
//!   registered observer is called, in registration order, while the entry's lock is held.
//!
//! Because observers run under the entry lock, an observer must not access the entry it is
//! registered on.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use wustsat_common::sdo::AbortCode;

use crate::error::OdError;

/// Parse an integer as written in EDS files: decimal, or hex with a `0x` prefix
pub fn parse_integer(s: &str) -> Option<i64> {
    let s = s.trim();
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let value = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        i64::from_str_radix(hex, 16).ok()?
    } else {
        digits.parse::<i64>().ok()?
    };
    Some(if negative { -value } else { value })
}

/// Data types supported in the object dictionary
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DataType {
    /// BOOLEAN (0x0001)
    Boolean,
    /// INTEGER8 (0x0002)
    Integer8,
    /// INTEGER16 (0x0003)
    Integer16,
    /// INTEGER32 (0x0004)
    Integer32,
    /// UNSIGNED8 (0x0005)
    Unsigned8,
    /// UNSIGNED16 (0x0006)
    Unsigned16,
    /// UNSIGNED32 (0x0007)
    Unsigned32,
    /// VISIBLE_STRING (0x0009)
    VisibleString,
}

impl DataType {
    /// Look up a data type by its EDS code
    pub fn from_eds_code(code: i64) -> Option<Self> {
        Some(match code {
            0x1 => DataType::Boolean,
            0x2 => DataType::Integer8,
            0x3 => DataType::Integer16,
            0x4 => DataType::Integer32,
            0x5 => DataType::Unsigned8,
            0x6 => DataType::Unsigned16,
            0x7 => DataType::Unsigned32,
            0x9 => DataType::VisibleString,
            _ => return None,
        })
    }

    /// The encoded size in bytes, or None for variable length types
    pub fn size(&self) -> Option<usize> {
        match self {
            DataType::Boolean | DataType::Integer8 | DataType::Unsigned8 => Some(1),
            DataType::Integer16 | DataType::Unsigned16 => Some(2),
            DataType::Integer32 | DataType::Unsigned32 => Some(4),
            DataType::VisibleString => None,
        }
    }
}

/// Access rights of an entry, as seen from the bus
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum AccessType {
    /// Read only
    Ro,
    /// Write only
    Wo,
    /// Read / write
    #[default]
    Rw,
    /// Read / write, mappable to a receive PDO
    Rwr,
    /// Read / write, mappable to a transmit PDO
    Rww,
    /// Constant
    Const,
}

impl AccessType {
    /// Parse an EDS `AccessType` value
    pub fn from_eds(s: &str) -> Option<Self> {
        Some(match s.trim().to_ascii_lowercase().as_str() {
            "ro" => AccessType::Ro,
            "wo" => AccessType::Wo,
            "rw" => AccessType::Rw,
            "rwr" => AccessType::Rwr,
            "rww" => AccessType::Rww,
            "const" => AccessType::Const,
            _ => return None,
        })
    }

    /// True if peers may read the entry
    pub fn is_readable(&self) -> bool {
        !matches!(self, AccessType::Wo)
    }

    /// True if peers may write the entry
    pub fn is_writable(&self) -> bool {
        matches!(
            self,
            AccessType::Wo | AccessType::Rw | AccessType::Rwr | AccessType::Rww
        )
    }
}

/// A typed object value
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    /// BOOLEAN
    Bool(bool),
    /// INTEGER8
    I8(i8),
    /// INTEGER16
    I16(i16),
    /// INTEGER32
    I32(i32),
    /// UNSIGNED8
    U8(u8),
    /// UNSIGNED16
    U16(u16),
    /// UNSIGNED32
    U32(u32),
    /// VISIBLE_STRING
    Str(String),
}

impl Value {
    /// The data type of this value
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Bool(_) => DataType::Boolean,
            Value::I8(_) => DataType::Integer8,
            Value::I16(_) => DataType::Integer16,
            Value::I32(_) => DataType::Integer32,
            Value::U8(_) => DataType::Unsigned8,
            Value::U16(_) => DataType::Unsigned16,
            Value::U32(_) => DataType::Unsigned32,
            Value::Str(_) => DataType::VisibleString,
        }
    }

    /// The value as an integer, for all non-string types
    pub fn as_integer(&self) -> Option<i64> {
        Some(match self {
            Value::Bool(v) => *v as i64,
            Value::I8(v) => *v as i64,
            Value::I16(v) => *v as i64,
            Value::I32(v) => *v as i64,
            Value::U8(v) => *v as i64,
            Value::U16(v) => *v as i64,
            Value::U32(v) => *v as i64,
            Value::Str(_) => return None,
        })
    }

    /// Convert an integer to a value of the given type
    ///
    /// Returns None if the integer does not fit, or the type is not numeric.
    pub fn from_integer(data_type: DataType, value: i64) -> Option<Self> {
        Some(match data_type {
            DataType::Boolean => match value {
                0 => Value::Bool(false),
                1 => Value::Bool(true),
                _ => return None,
            },
            DataType::Integer8 => Value::I8(value.try_into().ok()?),
            DataType::Integer16 => Value::I16(value.try_into().ok()?),
            DataType::Integer32 => Value::I32(value.try_into().ok()?),
            DataType::Unsigned8 => Value::U8(value.try_into().ok()?),
            DataType::Unsigned16 => Value::U16(value.try_into().ok()?),
            DataType::Unsigned32 => Value::U32(value.try_into().ok()?),
            DataType::VisibleString => return None,
        })
    }

    /// Parse a value from its EDS text representation
    pub fn parse(data_type: DataType, text: &str) -> Option<Self> {
        match data_type {
            DataType::VisibleString => Some(Value::Str(text.to_string())),
            _ => Value::from_integer(data_type, parse_integer(text)?),
        }
    }

    /// Encode the value as it is sent on the bus
    pub fn to_le_bytes(&self) -> Vec<u8> {
        match self {
            Value::Bool(v) => vec![*v as u8],
            Value::I8(v) => v.to_le_bytes().to_vec(),
            Value::I16(v) => v.to_le_bytes().to_vec(),
            Value::I32(v) => v.to_le_bytes().to_vec(),
            Value::U8(v) => vec![*v],
            Value::U16(v) => v.to_le_bytes().to_vec(),
            Value::U32(v) => v.to_le_bytes().to_vec(),
            Value::Str(s) => s.as_bytes().to_vec(),
        }
    }

    /// Decode a value received from the bus
    pub fn from_le_bytes(data_type: DataType, bytes: &[u8]) -> Result<Self, AbortCode> {
        if let Some(size) = data_type.size() {
            if bytes.len() > size {
                return Err(AbortCode::DataTypeMismatchLengthHigh);
            } else if bytes.len() < size {
                return Err(AbortCode::DataTypeMismatchLengthLow);
            }
        }
        let b = bytes;
        Ok(match data_type {
            DataType::Boolean => match b[0] {
                0 => Value::Bool(false),
                1 => Value::Bool(true),
                _ => return Err(AbortCode::InvalidValue),
            },
            DataType::Integer8 => Value::I8(b[0] as i8),
            DataType::Integer16 => Value::I16(i16::from_le_bytes([b[0], b[1]])),
            DataType::Integer32 => Value::I32(i32::from_le_bytes([b[0], b[1], b[2], b[3]])),
            DataType::Unsigned8 => Value::U8(b[0]),
            DataType::Unsigned16 => Value::U16(u16::from_le_bytes([b[0], b[1]])),
            DataType::Unsigned32 => Value::U32(u32::from_le_bytes([b[0], b[1], b[2], b[3]])),
            DataType::VisibleString => Value::Str(
                core::str::from_utf8(b)
                    .map_err(|_| AbortCode::InvalidValue)?
                    .to_string(),
            ),
        })
    }
}

impl core::fmt::Display for Value {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Value::Str(s) => write!(f, "\"{s}\""),
            Value::Bool(v) => write!(f, "{v}"),
            // All remaining variants are integers
            other => write!(f, "{}", other.as_integer().unwrap_or_default()),
        }
    }
}

/// A write to an entry, as delivered to observers
#[derive(Debug)]
pub struct ObjectWrite<'a> {
    /// Object index
    pub index: u16,
    /// Object sub index
    pub sub: u8,
    /// The value before the write
    pub old: Option<&'a Value>,
    /// The value written
    pub new: &'a Value,
}

/// A callback invoked when an entry is written from the bus
pub type WriteObserver = Box<dyn Fn(&ObjectWrite<'_>) + Send + Sync>;

struct EntryState {
    value: Option<Value>,
    observers: Vec<WriteObserver>,
}

/// A single addressable value in the object dictionary
pub struct ObjectEntry {
    index: u16,
    sub: u8,
    name: String,
    data_type: DataType,
    access: AccessType,
    default: Option<String>,
    state: Mutex<EntryState>,
}

impl core::fmt::Debug for ObjectEntry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = self.lock();
        f.debug_struct("ObjectEntry")
            .field("index", &self.index)
            .field("sub", &self.sub)
            .field("name", &self.name)
            .field("data_type", &self.data_type)
            .field("access", &self.access)
            .field("default", &self.default)
            .field("value", &state.value)
            .field("observers", &state.observers.len())
            .finish()
    }
}

impl ObjectEntry {
    /// Create a new read/write entry with no value and no default
    pub fn new(index: u16, sub: u8, name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            index,
            sub,
            name: name.into(),
            data_type,
            access: AccessType::default(),
            default: None,
            state: Mutex::new(EntryState {
                value: None,
                observers: Vec::new(),
            }),
        }
    }

    /// Set the access type
    pub fn with_access(mut self, access: AccessType) -> Self {
        self.access = access;
        self
    }

    /// Set the declared default, as written in the definition file
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Set the initial value
    pub fn with_value(self, value: Value) -> Self {
        self.lock().value = Some(value);
        self
    }

    fn lock(&self) -> MutexGuard<'_, EntryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Object index
    pub fn index(&self) -> u16 {
        self.index
    }

    /// Object sub index
    pub fn sub(&self) -> u8 {
        self.sub
    }

    /// Parameter name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Data type
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Access type
    pub fn access(&self) -> AccessType {
        self.access
    }

    /// The declared default, if any
    pub fn default_value(&self) -> Option<&str> {
        self.default.as_deref()
    }

    /// The current live value, or None if it has never been set
    pub fn value(&self) -> Option<Value> {
        self.lock().value.clone()
    }

    /// Assign the value directly, without notifying observers
    pub fn set_value(&self, value: Value) -> Result<(), OdError> {
        if value.data_type() != self.data_type {
            return Err(OdError::TypeMismatch {
                index: self.index,
                sub: self.sub,
                expected: self.data_type,
                actual: value.data_type(),
            });
        }
        self.lock().value = Some(value);
        Ok(())
    }

    /// Assign an integer, converted to the entry's data type, without notifying observers
    pub fn set_integer(&self, value: i64) -> Result<(), OdError> {
        let converted =
            Value::from_integer(self.data_type, value).ok_or(OdError::ValueOutOfRange {
                index: self.index,
                sub: self.sub,
                value,
                data_type: self.data_type,
            })?;
        self.lock().value = Some(converted);
        Ok(())
    }

    /// Register a callback to be invoked whenever the entry is written from the bus
    ///
    /// Fails for entries which the bus cannot write, as the observer could never fire.
    pub fn add_observer<F>(&self, observer: F) -> Result<(), OdError>
    where
        F: Fn(&ObjectWrite<'_>) + Send + Sync + 'static,
    {
        if !self.access.is_writable() {
            return Err(OdError::NotWritable {
                index: self.index,
                sub: self.sub,
            });
        }
        self.lock().observers.push(Box::new(observer));
        Ok(())
    }

    /// The number of registered observers
    pub fn observer_count(&self) -> usize {
        self.lock().observers.len()
    }

    /// Handle a write arriving from the bus
    ///
    /// On success the new value is stored and observers are notified before the lock is released.
    pub fn write_from_bus(&self, data: &[u8]) -> Result<(), AbortCode> {
        if !self.access.is_writable() {
            return Err(AbortCode::ReadOnly);
        }
        let new = Value::from_le_bytes(self.data_type, data)?;
        let mut state = self.lock();
        let old = state.value.replace(new);
        let EntryState { value, observers } = &*state;
        if let Some(new) = value {
            let write = ObjectWrite {
                index: self.index,
                sub: self.sub,
                old: old.as_ref(),
                new,
            };
            for observer in observers {
                observer(&write);
            }
        }
        Ok(())
    }

    /// Read the value for a peer
    ///
    /// An entry which was never assigned reads as its declared default.
    pub fn read_for_bus(&self) -> Result<Vec<u8>, AbortCode> {
        if !self.access.is_readable() {
            return Err(AbortCode::WriteOnly);
        }
        if let Some(value) = self.value() {
            return Ok(value.to_le_bytes());
        }
        self.default
            .as_deref()
            .and_then(|text| Value::parse(self.data_type, text))
            .map(|value| value.to_le_bytes())
            .ok_or(AbortCode::NoData)
    }
}

/// A node's object dictionary
#[derive(Debug, Default)]
pub struct ObjectDictionary {
    entries: BTreeMap<(u16, u8), Arc<ObjectEntry>>,
}

impl ObjectDictionary {
    /// Create an empty dictionary
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry, replacing any existing entry at the same index and sub
    pub fn insert(&mut self, entry: ObjectEntry) {
        self.entries
            .insert((entry.index, entry.sub), Arc::new(entry));
    }

    /// Look up the entry at `index`, sub index 0
    pub fn get(&self, index: u16) -> Result<&Arc<ObjectEntry>, OdError> {
        self.get_sub(index, 0)
    }

    /// Look up the entry at `index` / `sub`
    pub fn get_sub(&self, index: u16, sub: u8) -> Result<&Arc<ObjectEntry>, OdError> {
        self.entries
            .get(&(index, sub))
            .ok_or(OdError::KeyMissing { index, sub })
    }

    /// True if an entry exists at `index` / `sub`
    pub fn contains(&self, index: u16, sub: u8) -> bool {
        self.entries.contains_key(&(index, sub))
    }

    /// True if any sub index exists at `index`
    pub fn contains_index(&self, index: u16) -> bool {
        self.entries
            .range((index, 0)..=(index, u8::MAX))
            .next()
            .is_some()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the dictionary has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all entries in index order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ObjectEntry>> {
        self.entries.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_parse_integer() {
        assert_eq!(Some(1000), parse_integer("1000"));
        assert_eq!(Some(1000), parse_integer(" 0x3E8 "));
        assert_eq!(Some(-5), parse_integer("-5"));
        assert_eq!(None, parse_integer("fast"));
        assert_eq!(None, parse_integer(""));
    }

    #[test]
    fn test_observers_called_in_order_with_old_and_new() {
        let entry = ObjectEntry::new(0x2000, 0, "Control", DataType::Unsigned8)
            .with_value(Value::U8(1));
        let calls = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second"] {
            let calls = calls.clone();
            entry
                .add_observer(move |write| {
                    calls
                        .lock()
                        .unwrap()
                        .push((tag, write.old.cloned(), write.new.clone()));
                })
                .unwrap();
        }

        entry.write_from_bus(&[7]).unwrap();

        let calls = calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec![
                ("first", Some(Value::U8(1)), Value::U8(7)),
                ("second", Some(Value::U8(1)), Value::U8(7)),
            ]
        );
        assert_eq!(Some(Value::U8(7)), entry.value());
    }

    #[test]
    fn test_direct_assignment_does_not_notify() {
        let entry = ObjectEntry::new(0x2000, 0, "Control", DataType::Unsigned8);
        let count = Arc::new(Mutex::new(0));
        let count_clone = count.clone();
        entry
            .add_observer(move |_| *count_clone.lock().unwrap() += 1)
            .unwrap();

        entry.set_value(Value::U8(3)).unwrap();
        entry.set_integer(4).unwrap();
        assert_eq!(0, *count.lock().unwrap());
        assert_eq!(Some(Value::U8(4)), entry.value());
    }

    #[test]
    fn test_bus_write_checks() {
        let entry = ObjectEntry::new(0x2000, 0, "Status", DataType::Unsigned16)
            .with_access(AccessType::Ro);
        assert_eq!(Err(AbortCode::ReadOnly), entry.write_from_bus(&[1, 0]));
        assert_eq!(
            Err(OdError::NotWritable {
                index: 0x2000,
                sub: 0
            }),
            entry.add_observer(|_| {})
        );

        let entry = ObjectEntry::new(0x2001, 0, "Value", DataType::Unsigned16);
        assert_eq!(
            Err(AbortCode::DataTypeMismatchLengthLow),
            entry.write_from_bus(&[1])
        );
        assert_eq!(
            Err(AbortCode::DataTypeMismatchLengthHigh),
            entry.write_from_bus(&[1, 2, 3])
        );
        assert_eq!(None, entry.value());
    }

    #[test]
    fn test_set_integer_range_and_type() {
        let entry = ObjectEntry::new(0x2000, 0, "Status", DataType::Unsigned8);
        assert_eq!(
            Err(OdError::ValueOutOfRange {
                index: 0x2000,
                sub: 0,
                value: 256,
                data_type: DataType::Unsigned8
            }),
            entry.set_integer(256)
        );
        assert!(matches!(
            entry.set_value(Value::U16(1)),
            Err(OdError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_read_falls_back_to_default() {
        let entry = ObjectEntry::new(0x1017, 0, "Producer heartbeat time", DataType::Unsigned16)
            .with_default("1000");
        assert_eq!(Ok(vec![0xE8, 0x03]), entry.read_for_bus());

        let entry = ObjectEntry::new(0x1017, 0, "Producer heartbeat time", DataType::Unsigned16);
        assert_eq!(Err(AbortCode::NoData), entry.read_for_bus());
    }

    #[test]
    fn test_missing_key() {
        let mut od = ObjectDictionary::new();
        od.insert(ObjectEntry::new(0x2000, 0, "Control", DataType::Unsigned8));
        assert!(od.get(0x2000).is_ok());
        assert_eq!(
            OdError::KeyMissing {
                index: 0x1017,
                sub: 0
            },
            od.get(0x1017).unwrap_err()
        );
    }
}

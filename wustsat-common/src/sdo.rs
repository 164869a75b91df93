//! Expedited SDO messages
//!
//! Only the expedited subset of the SDO protocol is represented: downloads and uploads of at most
//! 4 bytes, confirmed or aborted in a single response frame.

/// SDO abort codes
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum AbortCode {
    /// Client/server command specifier not valid or unknown
    InvalidCommandSpecifier = 0x0504_0001,
    /// Unsupported access to an object
    UnsupportedAccess = 0x0601_0000,
    /// Attempt to read a write only object
    WriteOnly = 0x0601_0001,
    /// Attempt to write a read only object
    ReadOnly = 0x0601_0002,
    /// Object does not exist in the object dictionary
    NoSuchObject = 0x0602_0000,
    /// Data type does not match, length of service parameter does not match
    DataTypeMismatch = 0x0607_0010,
    /// Data type does not match, length of service parameter too high
    DataTypeMismatchLengthHigh = 0x0607_0012,
    /// Data type does not match, length of service parameter too low
    DataTypeMismatchLengthLow = 0x0607_0013,
    /// Sub-index does not exist
    NoSuchSubIndex = 0x0609_0011,
    /// Invalid value for parameter
    InvalidValue = 0x0609_0030,
    /// No data available
    NoData = 0x0800_0024,
    /// General error
    General = 0x0800_0000,
}

impl TryFrom<u32> for AbortCode {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        use AbortCode::*;
        [
            InvalidCommandSpecifier,
            UnsupportedAccess,
            WriteOnly,
            ReadOnly,
            NoSuchObject,
            DataTypeMismatch,
            DataTypeMismatchLengthHigh,
            DataTypeMismatchLengthLow,
            NoSuchSubIndex,
            InvalidValue,
            NoData,
            General,
        ]
        .into_iter()
        .find(|code| *code as u32 == value)
        .ok_or(value)
    }
}

const CCS_DOWNLOAD: u8 = 1;
const CCS_UPLOAD: u8 = 2;
const CS_ABORT: u8 = 4;
const SCS_UPLOAD: u8 = 2;
const SCS_DOWNLOAD: u8 = 3;

fn index_sub(bytes: &[u8]) -> (u16, u8) {
    (u16::from_le_bytes([bytes[1], bytes[2]]), bytes[3])
}

/// A request received by an SDO server
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SdoRequest {
    /// Initiate a download (write). Only expedited downloads carry their data here.
    InitiateDownload {
        /// Expedited flag
        e: bool,
        /// Size indicated flag
        s: bool,
        /// Number of unused data bytes, valid when both `e` and `s` are set
        n: u8,
        /// Object index
        index: u16,
        /// Object sub index
        sub: u8,
        /// Data bytes
        data: [u8; 4],
    },
    /// Initiate an upload (read)
    InitiateUpload {
        /// Object index
        index: u16,
        /// Object sub index
        sub: u8,
    },
    /// The client aborted the transfer
    Abort {
        /// Object index
        index: u16,
        /// Object sub index
        sub: u8,
        /// Raw abort code
        abort_code: u32,
    },
    /// Any other command specifier (segments, block transfers)
    Unsupported {
        /// The client command specifier
        ccs: u8,
        /// Object index
        index: u16,
        /// Object sub index
        sub: u8,
    },
}

impl SdoRequest {
    /// Build an expedited download request for up to 4 bytes of data
    pub fn expedited_download(index: u16, sub: u8, data: &[u8]) -> Self {
        let len = data.len().min(4);
        let mut buf = [0u8; 4];
        buf[..len].copy_from_slice(&data[..len]);
        SdoRequest::InitiateDownload {
            e: true,
            s: true,
            n: (4 - len) as u8,
            index,
            sub,
            data: buf,
        }
    }

    /// Build an upload request
    pub fn initiate_upload(index: u16, sub: u8) -> Self {
        SdoRequest::InitiateUpload { index, sub }
    }

    /// The index and sub index addressed by the request
    pub fn object(&self) -> (u16, u8) {
        match self {
            SdoRequest::InitiateDownload { index, sub, .. }
            | SdoRequest::InitiateUpload { index, sub }
            | SdoRequest::Abort { index, sub, .. }
            | SdoRequest::Unsupported { index, sub, .. } => (*index, *sub),
        }
    }

    /// Serialize to frame data
    pub fn to_bytes(&self) -> [u8; 8] {
        let mut bytes = [0u8; 8];
        let (index, sub) = self.object();
        bytes[1..3].copy_from_slice(&index.to_le_bytes());
        bytes[3] = sub;
        match self {
            SdoRequest::InitiateDownload { e, s, n, data, .. } => {
                bytes[0] = (CCS_DOWNLOAD << 5) | (n << 2) | ((*e as u8) << 1) | (*s as u8);
                bytes[4..8].copy_from_slice(data);
            }
            SdoRequest::InitiateUpload { .. } => bytes[0] = CCS_UPLOAD << 5,
            SdoRequest::Abort { abort_code, .. } => {
                bytes[0] = CS_ABORT << 5;
                bytes[4..8].copy_from_slice(&abort_code.to_le_bytes());
            }
            SdoRequest::Unsupported { ccs, .. } => bytes[0] = ccs << 5,
        }
        bytes
    }

    /// The data carried by an expedited download, trimmed to its indicated size
    ///
    /// When the size is not indicated, all 4 bytes are returned.
    pub fn expedited_data(&self) -> Option<&[u8]> {
        match self {
            SdoRequest::InitiateDownload {
                e: true, s, n, data, ..
            } => {
                let len = if *s { 4 - (*n as usize).min(4) } else { 4 };
                Some(&data[..len])
            }
            _ => None,
        }
    }
}

/// Error returned when SDO frame data cannot be parsed
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MalformedSdoError;

impl TryFrom<&[u8]> for SdoRequest {
    type Error = MalformedSdoError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        if bytes.len() != 8 {
            return Err(MalformedSdoError);
        }
        let ccs = bytes[0] >> 5;
        let (index, sub) = index_sub(bytes);
        let tail = [bytes[4], bytes[5], bytes[6], bytes[7]];
        Ok(match ccs {
            CCS_DOWNLOAD => SdoRequest::InitiateDownload {
                e: bytes[0] & 0x02 != 0,
                s: bytes[0] & 0x01 != 0,
                n: (bytes[0] >> 2) & 0x3,
                index,
                sub,
                data: tail,
            },
            CCS_UPLOAD => SdoRequest::InitiateUpload { index, sub },
            CS_ABORT => SdoRequest::Abort {
                index,
                sub,
                abort_code: u32::from_le_bytes(tail),
            },
            _ => SdoRequest::Unsupported { ccs, index, sub },
        })
    }
}

/// A response sent by an SDO server
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SdoResponse {
    /// A download has been accepted
    ConfirmDownload {
        /// Object index
        index: u16,
        /// Object sub index
        sub: u8,
    },
    /// An expedited upload carrying the object's value
    ExpeditedUpload {
        /// Object index
        index: u16,
        /// Object sub index
        sub: u8,
        /// Number of valid bytes in `data`
        len: u8,
        /// Data bytes
        data: [u8; 4],
    },
    /// The request was refused
    Abort {
        /// Object index
        index: u16,
        /// Object sub index
        sub: u8,
        /// Raw abort code
        abort_code: u32,
    },
}

impl SdoResponse {
    /// Build an abort response
    pub fn abort(index: u16, sub: u8, abort_code: AbortCode) -> Self {
        SdoResponse::Abort {
            index,
            sub,
            abort_code: abort_code as u32,
        }
    }

    /// Build an expedited upload response for up to 4 bytes
    pub fn expedited_upload(index: u16, sub: u8, value: &[u8]) -> Self {
        let len = value.len().min(4);
        let mut data = [0u8; 4];
        data[..len].copy_from_slice(&value[..len]);
        SdoResponse::ExpeditedUpload {
            index,
            sub,
            len: len as u8,
            data,
        }
    }

    /// Serialize to frame data
    pub fn to_bytes(&self) -> [u8; 8] {
        let mut bytes = [0u8; 8];
        let (index, sub) = match self {
            SdoResponse::ConfirmDownload { index, sub } => {
                bytes[0] = SCS_DOWNLOAD << 5;
                (*index, *sub)
            }
            SdoResponse::ExpeditedUpload {
                index,
                sub,
                len,
                data,
            } => {
                let n = 4 - (*len).min(4);
                bytes[0] = (SCS_UPLOAD << 5) | (n << 2) | 0x3;
                bytes[4..8].copy_from_slice(data);
                (*index, *sub)
            }
            SdoResponse::Abort {
                index,
                sub,
                abort_code,
            } => {
                bytes[0] = CS_ABORT << 5;
                bytes[4..8].copy_from_slice(&abort_code.to_le_bytes());
                (*index, *sub)
            }
        };
        bytes[1..3].copy_from_slice(&index.to_le_bytes());
        bytes[3] = sub;
        bytes
    }

    /// The data bytes of an expedited upload
    pub fn upload_data(&self) -> Option<&[u8]> {
        match self {
            SdoResponse::ExpeditedUpload { len, data, .. } => Some(&data[..*len as usize]),
            _ => None,
        }
    }
}

impl TryFrom<&[u8]> for SdoResponse {
    type Error = MalformedSdoError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        if bytes.len() != 8 {
            return Err(MalformedSdoError);
        }
        let (index, sub) = index_sub(bytes);
        let tail = [bytes[4], bytes[5], bytes[6], bytes[7]];
        match bytes[0] >> 5 {
            SCS_DOWNLOAD => Ok(SdoResponse::ConfirmDownload { index, sub }),
            SCS_UPLOAD if bytes[0] & 0x3 == 0x3 => {
                let n = (bytes[0] >> 2) & 0x3;
                Ok(SdoResponse::ExpeditedUpload {
                    index,
                    sub,
                    len: 4 - n,
                    data: tail,
                })
            }
            CS_ABORT => Ok(SdoResponse::Abort {
                index,
                sub,
                abort_code: u32::from_le_bytes(tail),
            }),
            _ => Err(MalformedSdoError),
        }
    }
}

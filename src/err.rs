use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("An I/O error has occurred: {}", source)]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("An error has occurred while parsing: {}", detail)]
    Nom { detail: String },
    #[error("An unexpected error has occurred: {}", detail)]
    Any { detail: String },
    #[error("File does not have registry magic.")]
    NotARegistryFile,
    #[error("failed to open key: {}", path)]
    KeyNotFound { path: String },
    #[error("read of {} bytes at offset {} exceeds buffer of {} bytes", size, offset, len)]
    OutOfBounds {
        offset: usize,
        size: usize,
        len: usize,
    },
    #[error("SYSTEM hive: no current control set")]
    NoCurrentControlSet,
    #[error("SYSTEM hive: malformed boot key material: {}", detail)]
    MalformedBootKey { detail: String },
    #[error("SAM hive: failed to open domain account key")]
    FailedToOpenDomain,
    #[error("SAM hive: failed to find domain F structure")]
    FailedToParseDomainF,
    #[error("SAM hive: domain F structure too short: {} bytes", len)]
    DomainFTooShort { len: usize },
    #[error("SAM hive: unknown domain key revision: {}", revision)]
    UnknownSamKeyRevision { revision: u32 },
    #[error("SAM hive: syskey verifier mismatch")]
    VerifierMismatch,
    #[error("derived syskey has unexpected length: {} bytes", len)]
    MalformedSyskey { len: usize },
    #[error("SAM hive: failed to list users")]
    FailedToParseUsers,
    #[error("SAM hive: failed to load user registry for RID {}", rid)]
    FailedToLoadUser { rid: String },
    #[error("SAM hive: failed to find V or F structures for RID {}", rid)]
    MissingUserStructures { rid: String },
    #[error("account F structure too short: {} bytes", len)]
    AccountFTooShort { len: usize },
    #[error("account V structure too short: {} bytes", len)]
    AccountVTooShort { len: usize },
    #[error("account has no hash info")]
    NoHashInfo,
    #[error("RID is not a hexadecimal account identifier: {}", rid)]
    InvalidRid { rid: String },
    #[error("RID must be 4 bytes, got {}", len)]
    InvalidRidSize { len: usize },
    #[error("encrypted hash data has unexpected length: {} bytes", len)]
    HashDataLength { len: usize },
    #[error("unknown hash revision: {}", revision)]
    UnknownHashRevision { revision: u16 },
    #[error("encrypted data is not block aligned: {} bytes", len)]
    BlockAlignment { len: usize },
    #[error("cipher key rejected: {}", detail)]
    CipherKey { detail: String },
}

impl<'a> From<nom::Err<nom::error::Error<&'a [u8]>>> for Error {
    fn from(error: nom::Err<nom::error::Error<&'a [u8]>>) -> Self {
        let detail = match error {
            nom::Err::Incomplete(needed) => format!("incomplete input: {:?}", needed),
            nom::Err::Error(e) | nom::Err::Failure(e) => {
                format!("{:?} with {} bytes remaining", e.code, e.input.len())
            }
        };
        Error::Nom { detail }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Any {
            detail: error.to_string(),
        }
    }
}

/// A failure scoped to a single user record; the enumeration of the
/// remaining users is unaffected.
#[derive(Debug, Error)]
#[error("user {}: {}", rid, source)]
pub struct UserError {
    pub rid: String,
    #[source]
    pub source: Error,
}

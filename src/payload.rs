//! Top-level payload framing: a one-byte type tag in front of the user data.

use crate::error::{Error, Result};

const TYPE_TEXT: u8 = 0;
const TYPE_FILE: u8 = 1;
const TYPE_RAW: u8 = 2;

/// Length of the NUL-padded file name field.
const FILE_NAME_LEN: usize = 64;

/// What is being hidden.
///
/// The first byte of the recovered plaintext is a type discriminator; the
/// encoder prepends the matching tag so the decoder can hand the data back in
/// its original shape.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Payload {
    /// UTF-8 text.
    Text(String),
    /// A file: 64-byte NUL-padded name followed by the file bytes.
    File { name: String, bytes: Vec<u8> },
    /// Raw bytes.
    Raw(Vec<u8>),
}

impl Payload {
    /// Serializes the payload with its type tag.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match self {
            Payload::Text(text) => {
                let mut out = Vec::with_capacity(1 + text.len());
                out.push(TYPE_TEXT);
                out.extend_from_slice(text.as_bytes());
                Ok(out)
            }
            Payload::File { name, bytes } => {
                if name.len() > FILE_NAME_LEN {
                    return Err(Error::UnsupportedValueForParameter {
                        parameter: "file name",
                        value: name.clone(),
                        expected: "a name of at most 64 bytes",
                    });
                }

                let mut out = Vec::with_capacity(1 + FILE_NAME_LEN + bytes.len());
                out.push(TYPE_FILE);
                out.extend_from_slice(name.as_bytes());
                out.resize(1 + FILE_NAME_LEN, 0);
                out.extend_from_slice(bytes);
                Ok(out)
            }
            Payload::Raw(bytes) => {
                let mut out = Vec::with_capacity(1 + bytes.len());
                out.push(TYPE_RAW);
                out.extend_from_slice(bytes);
                Ok(out)
            }
        }
    }

    /// Parses a recovered plaintext buffer back into a payload.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (&tag, rest) = bytes
            .split_first()
            .ok_or(Error::RequiredParameterMissing("data"))?;

        match tag {
            TYPE_TEXT => Ok(Payload::Text(String::from_utf8(rest.to_vec())?)),
            TYPE_FILE => {
                if rest.len() < FILE_NAME_LEN {
                    return Err(Error::InvalidDataTypeEncountered(tag));
                }
                let (name, bytes) = rest.split_at(FILE_NAME_LEN);
                let name = name.iter().take_while(|&&b| b != 0).copied().collect();
                Ok(Payload::File {
                    name: String::from_utf8(name)?,
                    bytes: bytes.to_vec(),
                })
            }
            TYPE_RAW => Ok(Payload::Raw(rest.to_vec())),
            other => Err(Error::InvalidDataTypeEncountered(other)),
        }
    }
}

//! Checksum and CRC engine.
//!
//! The algorithm is selected per protocol and its output width is fixed:
//!
//! | algorithm | width | output |
//! |---|---|---|
//! | `sum8`  | 1 | byte sum mod 256 |
//! | `sum16` | 2 | byte sum mod 65536, big-endian |
//! | `xor8`  | 1 | XOR of all bytes |
//! | `crc8`  | 1 | CRC-8/SMBUS (poly 0x07, init 0x00) |
//! | `crc16` | 2 | CRC-16/MODBUS (poly 0xA001 reflected, init 0xFFFF), little-endian |
//! | `crc32` | 4 | CRC-32/ISO-HDLC (IEEE 802.3), little-endian |
//!
//! Hardware that expects a different CRC-8/CRC-16 convention needs its own
//! parameters; these are the common instantiations.

use std::fmt;
use std::str::FromStr;

use crc::{CRC_8_SMBUS, CRC_16_MODBUS, CRC_32_ISO_HDLC, Crc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

const CRC8: Crc<u8> = Crc::<u8>::new(&CRC_8_SMBUS);
const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);
const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Supported checksum algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    Sum8,
    Sum16,
    Xor8,
    Crc8,
    Crc16,
    Crc32,
}

impl ChecksumAlgorithm {
    pub const ALL: [ChecksumAlgorithm; 6] = [
        ChecksumAlgorithm::Sum8,
        ChecksumAlgorithm::Sum16,
        ChecksumAlgorithm::Xor8,
        ChecksumAlgorithm::Crc8,
        ChecksumAlgorithm::Crc16,
        ChecksumAlgorithm::Crc32,
    ];

    /// Output size in bytes.
    pub fn width(self) -> usize {
        match self {
            ChecksumAlgorithm::Sum8 | ChecksumAlgorithm::Xor8 | ChecksumAlgorithm::Crc8 => 1,
            ChecksumAlgorithm::Sum16 | ChecksumAlgorithm::Crc16 => 2,
            ChecksumAlgorithm::Crc32 => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChecksumAlgorithm::Sum8 => "sum8",
            ChecksumAlgorithm::Sum16 => "sum16",
            ChecksumAlgorithm::Xor8 => "xor8",
            ChecksumAlgorithm::Crc8 => "crc8",
            ChecksumAlgorithm::Crc16 => "crc16",
            ChecksumAlgorithm::Crc32 => "crc32",
        }
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown checksum algorithm: {name}")]
pub struct UnknownAlgorithm {
    pub name: String,
}

impl FromStr for ChecksumAlgorithm {
    type Err = UnknownAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sum8" => Ok(ChecksumAlgorithm::Sum8),
            "sum16" => Ok(ChecksumAlgorithm::Sum16),
            "xor8" | "xor" => Ok(ChecksumAlgorithm::Xor8),
            "crc8" => Ok(ChecksumAlgorithm::Crc8),
            "crc16" | "crc16_modbus" => Ok(ChecksumAlgorithm::Crc16),
            "crc32" => Ok(ChecksumAlgorithm::Crc32),
            _ => Err(UnknownAlgorithm {
                name: s.to_string(),
            }),
        }
    }
}

/// Accepts an algorithm name, `"none"`, an empty string, or null.
pub(crate) fn deserialize_optional<'de, D>(
    deserializer: D,
) -> Result<Option<ChecksumAlgorithm>, D::Error>
where
    D: Deserializer<'de>,
{
    let name: Option<String> = Option::deserialize(deserializer)?;
    match name.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(name) if name.eq_ignore_ascii_case("none") => Ok(None),
        Some(name) => name.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

pub fn sum8(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &byte| acc.wrapping_add(byte))
}

pub fn sum16(data: &[u8]) -> u16 {
    data.iter().fold(0u16, |acc, &byte| acc.wrapping_add(u16::from(byte)))
}

pub fn xor8(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &byte| acc ^ byte)
}

pub fn crc8(data: &[u8]) -> u8 {
    CRC8.checksum(data)
}

pub fn crc16(data: &[u8]) -> u16 {
    CRC16.checksum(data)
}

pub fn crc32(data: &[u8]) -> u32 {
    CRC32.checksum(data)
}

/// Compute the checksum bytes in wire order.
///
/// # Examples
/// ```
/// use framekit_core::checksum::{ChecksumAlgorithm, compute};
///
/// assert_eq!(compute(ChecksumAlgorithm::Crc16, b"123456789"), vec![0x37, 0x4B]);
/// assert_eq!(compute(ChecksumAlgorithm::Sum8, &[1, 2, 3, 4]), vec![0x0A]);
/// ```
pub fn compute(algorithm: ChecksumAlgorithm, data: &[u8]) -> Vec<u8> {
    match algorithm {
        ChecksumAlgorithm::Sum8 => vec![sum8(data)],
        ChecksumAlgorithm::Sum16 => sum16(data).to_be_bytes().to_vec(),
        ChecksumAlgorithm::Xor8 => vec![xor8(data)],
        ChecksumAlgorithm::Crc8 => vec![crc8(data)],
        ChecksumAlgorithm::Crc16 => crc16(data).to_le_bytes().to_vec(),
        ChecksumAlgorithm::Crc32 => crc32(data).to_le_bytes().to_vec(),
    }
}

/// Check `expected` against the checksum of `data`. A wrong-sized
/// `expected` never matches.
pub fn validate(algorithm: ChecksumAlgorithm, data: &[u8], expected: &[u8]) -> bool {
    expected.len() == algorithm.width() && compute(algorithm, data) == expected
}

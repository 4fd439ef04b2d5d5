//! Intel HEX firmware images.

use crate::error::FirmwareError;

/// A run of contiguous bytes starting at `address`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    pub address: u32,
    pub data: Vec<u8>,
}

impl Segment {
    /// One past the last address, widened so a segment ending at 4 GiB fits.
    pub fn end(&self) -> u64 {
        u64::from(self.address) + self.data.len() as u64
    }
}

/// A firmware image decoded from Intel HEX records.
///
/// Records are kept as address-ordered segments; adjacent and overlapping
/// records are merged, gaps are left to the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FirmwareImage {
    segments: Vec<Segment>,
    pub start_address: Option<u32>,
}

const RECORD_DATA: u8 = 0x00;
const RECORD_EOF: u8 = 0x01;
const RECORD_EXT_SEGMENT: u8 = 0x02;
const RECORD_START_SEGMENT: u8 = 0x03;
const RECORD_EXT_LINEAR: u8 = 0x04;
const RECORD_START_LINEAR: u8 = 0x05;

impl FirmwareImage {
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Lowest address carrying data.
    pub fn base_address(&self) -> u32 {
        self.segments.first().map_or(0, |s| s.address)
    }

    /// Number of data bytes, not counting gaps between segments.
    pub fn len(&self) -> usize {
        self.segments.iter().map(|s| s.data.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn parse_intel_hex(source: &str) -> Result<Self, FirmwareError> {
        let mut chunks: Vec<(u32, Vec<u8>)> = Vec::new();
        let mut upper: u32 = 0;
        let mut start_address = None;
        let mut saw_eof = false;

        for (idx, raw) in source.lines().enumerate() {
            let line = idx + 1;
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            if saw_eof {
                break;
            }
            let Some(hex) = raw.strip_prefix(':') else {
                return Err(FirmwareError::MissingStartCode { line });
            };
            let bytes = decode_hex(hex).ok_or(FirmwareError::InvalidHex { line })?;
            if bytes.len() < 5 {
                return Err(FirmwareError::LengthMismatch {
                    line,
                    declared: bytes.first().copied().unwrap_or(0) as usize,
                    found: bytes.len().saturating_sub(5),
                });
            }
            let declared = bytes[0] as usize;
            let found = bytes.len() - 5;
            if declared != found {
                return Err(FirmwareError::LengthMismatch {
                    line,
                    declared,
                    found,
                });
            }
            let (body, checksum) = bytes.split_at(bytes.len() - 1);
            let computed = body
                .iter()
                .fold(0u8, |acc, b| acc.wrapping_add(*b))
                .wrapping_neg();
            if computed != checksum[0] {
                return Err(FirmwareError::Checksum {
                    line,
                    expected: checksum[0],
                    computed,
                });
            }

            let offset = u16::from_be_bytes([bytes[1], bytes[2]]) as u32;
            let record_type = bytes[3];
            let payload = &body[4..];
            match record_type {
                RECORD_DATA if payload.is_empty() => {}
                RECORD_DATA => chunks.push((upper.wrapping_add(offset), payload.to_vec())),
                RECORD_EOF => saw_eof = true,
                RECORD_EXT_SEGMENT if payload.len() == 2 => {
                    upper = (u16::from_be_bytes([payload[0], payload[1]]) as u32) << 4;
                }
                RECORD_EXT_LINEAR if payload.len() == 2 => {
                    upper = (u16::from_be_bytes([payload[0], payload[1]]) as u32) << 16;
                }
                RECORD_START_SEGMENT | RECORD_START_LINEAR if payload.len() == 4 => {
                    start_address = Some(u32::from_be_bytes([
                        payload[0], payload[1], payload[2], payload[3],
                    ]));
                }
                other => {
                    return Err(FirmwareError::UnsupportedRecord {
                        line,
                        record_type: other,
                    })
                }
            }
        }

        if !saw_eof {
            return Err(FirmwareError::MissingEof);
        }
        let segments = coalesce(chunks);
        if segments.is_empty() {
            return Err(FirmwareError::Empty);
        }

        Ok(Self {
            segments,
            start_address,
        })
    }
}

/// Orders chunks by address and merges the ones that touch. Where records
/// overlap, the later one in address order wins.
fn coalesce(mut chunks: Vec<(u32, Vec<u8>)>) -> Vec<Segment> {
    chunks.sort_by_key(|(address, _)| *address);
    let mut segments: Vec<Segment> = Vec::new();
    for (address, data) in chunks {
        match segments.last_mut() {
            Some(last) if u64::from(address) <= last.end() => {
                let at = (address - last.address) as usize;
                let overlap = (last.data.len() - at).min(data.len());
                last.data[at..at + overlap].copy_from_slice(&data[..overlap]);
                last.data.extend_from_slice(&data[overlap..]);
            }
            _ => segments.push(Segment { address, data }),
        }
    }
    segments
}

fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok())
        .collect()
}

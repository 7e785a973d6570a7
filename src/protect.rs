//! # MQB frame protection
//!
//! Safety relevant MQB frames carry an AUTOSAR E2E Profile 22 style header:
//! - 8-bit CRC8H2F (AUTOSAR CRC-8, polynomial 0x2F) in byte 0
//! - 4-bit counter (0-15) in the low nibble of byte 1
//! - a Data ID byte that depends on the message and on the counter value,
//!   never transmitted but fed into the CRC after the payload
//!
//! # Data layout
//! [CRC(1B) | HDR(1B) | DATA ...]
//! - HDR (bits 3..0) : counter
//!
//! Payload packing is done by the caller; this module only seals and checks
//! the header.

use crate::{ControlError, ControlResult};
use crc::{Crc, CRC_8_AUTOSAR};
use std::collections::BTreeMap;

// Constants
const COUNTER_MASK: u8 = 0x0F;
const COUNTER_MAX: u8 = 15;
const COUNTER_MODULO: u8 = 16;
const HEADER_LENGTH_BYTES: usize = 2;
const DATA_ID_NUMBER: usize = 16;

/// HCA_01 heading control assist
pub const HCA_01_ID: u32 = 0x126;
/// GRA_ACC_01 steering wheel controls for ACC
pub const GRA_ACC_01_ID: u32 = 0x12B;
/// LDW_02 lane departure warning display
pub const LDW_02_ID: u32 = 0x397;

/// Data IDs of HCA_01, identical for every counter value.
pub const HCA_01_DATA_IDS: [u8; DATA_ID_NUMBER] = [0xDA; DATA_ID_NUMBER];

/// Status of a received protected frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectionStatus {
    /// CRC matches and the counter advanced by one
    Ok,
    /// CRC mismatch, data corrupted or wrong Data ID
    CrcError,
    /// Same counter as the previous frame
    Repeated,
    /// Counter advanced within the allowed delta
    OkSomeLost,
    /// Counter jumped further than allowed
    WrongSequence,
}

/// Protection settings of one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectionConfig {
    /// Payload length in bytes.
    pub data_length: usize,
    /// Data ID for each counter value.
    pub data_id_list: [u8; DATA_ID_NUMBER],
    /// Maximum allowed delta between consecutive received counters.
    pub max_delta_counter: u8,
}

impl Default for ProtectionConfig {
    fn default() -> Self {
        Self {
            data_length: 8,
            data_id_list: HCA_01_DATA_IDS,
            max_delta_counter: 1,
        }
    }
}

/// Seals outgoing frames of one message and checks incoming ones.
#[derive(Debug, Clone)]
pub struct FrameProtector {
    config: ProtectionConfig,
    counter: u8,
}

impl FrameProtector {
    /// # Errors
    /// Returns `ControlError::InvalidConfiguration` if the payload cannot hold
    /// the header or does not fit a CAN frame, or the counter delta is out of
    /// range.
    pub fn new(config: ProtectionConfig) -> ControlResult<Self> {
        Self::validate_config(&config)?;
        Ok(Self { config, counter: 0 })
    }

    fn validate_config(config: &ProtectionConfig) -> ControlResult<()> {
        if !(HEADER_LENGTH_BYTES..=8).contains(&config.data_length) {
            return Err(ControlError::InvalidConfiguration(format!(
                "Data length must be between {} and 8 bytes, got {}",
                HEADER_LENGTH_BYTES, config.data_length
            )));
        }
        if config.max_delta_counter == 0 || config.max_delta_counter > COUNTER_MAX {
            return Err(ControlError::InvalidConfiguration(format!(
                "Max delta counter must be between 1 and {}",
                COUNTER_MAX
            )));
        }
        Ok(())
    }

    fn validate_length(&self, len: usize) -> ControlResult<()> {
        if len != self.config.data_length {
            return Err(ControlError::InvalidDataFormat(format!(
                "Expected {} bytes, got {} bytes",
                self.config.data_length, len
            )));
        }
        Ok(())
    }

    fn compute_crc(&self, data: &[u8]) -> u8 {
        let crc = Crc::<u8>::new(&CRC_8_AUTOSAR);
        let mut digest = crc.digest();
        digest.update(&data[1..]);
        let counter = data[1] & COUNTER_MASK;
        digest.update(&[self.config.data_id_list[counter as usize]]);
        digest.finalize()
    }

    /// Advance the counter and write counter and CRC into `data`.
    pub fn protect(&mut self, data: &mut [u8]) -> ControlResult<()> {
        self.validate_length(data.len())?;
        self.counter = (self.counter + 1) % COUNTER_MODULO;
        data[1] = (data[1] & !COUNTER_MASK) | self.counter;
        data[0] = self.compute_crc(data);
        Ok(())
    }

    /// Verify a received frame and track its counter.
    pub fn check(&mut self, data: &[u8]) -> ControlResult<ProtectionStatus> {
        self.validate_length(data.len())?;
        if self.compute_crc(data) != data[0] {
            return Ok(ProtectionStatus::CrcError);
        }

        let rx_counter = data[1] & COUNTER_MASK;
        let delta = (COUNTER_MODULO + rx_counter - self.counter) % COUNTER_MODULO;
        self.counter = rx_counter;

        Ok(if delta == 0 {
            ProtectionStatus::Repeated
        } else if delta == 1 {
            ProtectionStatus::Ok
        } else if delta <= self.config.max_delta_counter {
            ProtectionStatus::OkSomeLost
        } else {
            ProtectionStatus::WrongSequence
        })
    }

    /// Counter written into the most recent sealed frame.
    pub fn counter(&self) -> u8 {
        self.counter
    }
}

/// Message ID → protection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectionTable {
    entries: BTreeMap<u32, ProtectionConfig>,
}

impl Default for ProtectionTable {
    /// Protection for HCA_01. Other messages go out as encoded.
    fn default() -> Self {
        Self::empty().with(HCA_01_ID, ProtectionConfig::default())
    }
}

impl ProtectionTable {
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn with(mut self, id: u32, config: ProtectionConfig) -> Self {
        self.entries.insert(id, config);
        self
    }

    pub fn get(&self, id: u32) -> Option<&ProtectionConfig> {
        self.entries.get(&id)
    }

    /// Build one protector per configured message.
    pub fn protectors(&self) -> ControlResult<BTreeMap<u32, FrameProtector>> {
        self.entries
            .iter()
            .map(|(id, config)| Ok((*id, FrameProtector::new(config.clone())?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequential_ids() -> ProtectionConfig {
        ProtectionConfig {
            data_id_list: [
                0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d,
                0x0e, 0x0f, 0x10,
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_profile22_reference_vectors() {
        let mut tx = FrameProtector::new(sequential_ids()).unwrap();
        let mut rx = FrameProtector::new(sequential_ids()).unwrap();

        let mut data = [0u8; 8];
        for (counter, crc) in [(0x01, 0x1b), (0x02, 0x98), (0x03, 0x31), (0x04, 0x0d)] {
            tx.protect(&mut data).unwrap();
            assert_eq!(data[0], crc);
            assert_eq!(data[1], counter);
            assert_eq!(rx.check(&data).unwrap(), ProtectionStatus::Ok);
        }
    }

    #[test]
    fn test_hca_frame() {
        let mut tx = FrameProtector::new(ProtectionConfig::default()).unwrap();
        let mut data = [0x00, 0x30, 0x2C, 0x01, 0x80, 0xFE, 0x07, 0x00];
        tx.protect(&mut data).unwrap();
        assert_eq!(data[..2], [0x75, 0x31]);
        // Upper nibble of the header belongs to the payload.
        tx.protect(&mut data).unwrap();
        assert_eq!(data[..2], [0xD9, 0x32]);
    }

    #[test]
    fn test_counter_wraps() {
        let mut tx = FrameProtector::new(ProtectionConfig::default()).unwrap();
        let mut rx = FrameProtector::new(ProtectionConfig::default()).unwrap();
        let mut data = [0u8; 8];
        for _ in 0..40 {
            tx.protect(&mut data).unwrap();
            assert_eq!(rx.check(&data).unwrap(), ProtectionStatus::Ok);
        }
        assert_eq!(tx.counter(), 40 % 16);
    }

    #[test]
    fn test_check_detects_errors() {
        let mut tx = FrameProtector::new(ProtectionConfig::default()).unwrap();
        let mut rx = FrameProtector::new(ProtectionConfig {
            max_delta_counter: 2,
            ..Default::default()
        })
        .unwrap();
        let mut data = [0u8; 8];

        tx.protect(&mut data).unwrap();
        assert_eq!(rx.check(&data).unwrap(), ProtectionStatus::Ok);
        assert_eq!(rx.check(&data).unwrap(), ProtectionStatus::Repeated);

        tx.protect(&mut data).unwrap();
        tx.protect(&mut data).unwrap();
        assert_eq!(rx.check(&data).unwrap(), ProtectionStatus::OkSomeLost);

        for _ in 0..3 {
            tx.protect(&mut data).unwrap();
        }
        assert_eq!(rx.check(&data).unwrap(), ProtectionStatus::WrongSequence);

        tx.protect(&mut data).unwrap();
        data[5] ^= 0x01;
        assert_eq!(rx.check(&data).unwrap(), ProtectionStatus::CrcError);
    }

    #[test]
    fn test_length_is_enforced() {
        let mut tx = FrameProtector::new(ProtectionConfig::default()).unwrap();
        let mut short = [0u8; 4];
        assert!(matches!(
            tx.protect(&mut short),
            Err(ControlError::InvalidDataFormat(_))
        ));
        assert!(FrameProtector::new(ProtectionConfig {
            data_length: 1,
            ..Default::default()
        })
        .is_err());
        assert!(FrameProtector::new(ProtectionConfig {
            max_delta_counter: 0,
            ..Default::default()
        })
        .is_err());
    }

    #[test]
    fn test_default_table() {
        let table = ProtectionTable::default();
        assert!(table.get(HCA_01_ID).is_some());
        assert!(table.get(LDW_02_ID).is_none());
        assert!(table.get(GRA_ACC_01_ID).is_none());
        assert_eq!(table.protectors().unwrap().len(), 1);
    }
}

//! # Fingerprint database
//!
//! Maps each [`VehicleVariant`] to one or more signatures of the traffic it
//! puts on the powertrain bus: the set of arbitration IDs it emits and the
//! payload length of each. Trim and market variants of one platform may emit
//! slightly different ID sets, so a variant can own several alternative
//! signatures.
//!
//! The built-in table is process-wide read-only data, initialised on first
//! use. A replacement table can be loaded from TOML:
//!
//! ```toml
//! [[variant]]
//! name = "SKODA_SUPERB_MK3"
//! signatures = [[[64, 8], [134, 8], [1471, 4]]]
//! ```

use crate::{ControlError, ControlResult, VehicleVariant};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::OnceLock;

/// Shortest CAN 2.0 payload a signature may declare.
pub const MIN_PAYLOAD_LENGTH: u8 = 1;
/// Longest CAN 2.0 payload a signature may declare.
pub const MAX_PAYLOAD_LENGTH: u8 = 8;

// Recorded with every ECU on the powertrain bus present.
const SKODA_OCTAVIA_MK3: &[(u32, u8)] = &[
    (64, 8), (134, 8), (159, 8), (173, 8), (178, 8), (253, 8), (257, 8), (260, 8), (262, 8),
    (264, 8), (278, 8), (279, 8), (283, 8), (285, 8), (286, 8), (288, 8), (289, 8), (290, 8),
    (294, 8), (295, 8), (299, 8), (302, 8), (314, 8), (346, 8), (376, 8), (385, 8), (389, 8),
    (391, 8), (418, 8), (427, 8), (568, 8), (569, 8), (592, 8), (593, 8), (594, 8), (595, 8),
    (596, 8), (668, 8), (679, 8), (681, 8), (684, 8), (695, 8), (779, 8), (780, 8), (783, 8),
    (787, 8), (788, 8), (789, 8), (791, 8), (792, 8), (795, 8), (799, 8), (802, 8), (804, 8),
    (806, 8), (807, 8), (808, 8), (809, 8), (826, 8), (827, 8), (838, 8), (839, 8), (840, 8),
    (841, 8), (842, 8), (843, 8), (844, 8), (845, 8), (870, 8), (896, 8), (897, 8), (898, 8),
    (901, 8), (917, 8), (919, 8), (927, 8), (929, 8), (930, 8), (949, 8), (958, 8), (960, 4),
    (981, 8), (987, 8), (988, 8), (991, 8), (997, 8), (1000, 8), (1019, 8), (1120, 8),
    (1122, 8), (1123, 8), (1124, 8), (1153, 8), (1156, 8), (1157, 8), (1158, 8), (1162, 8),
    (1175, 8), (1312, 8), (1332, 8), (1351, 8), (1385, 8), (1413, 8), (1438, 8), (1440, 5),
    (1461, 8), (1471, 8), (1511, 8), (1514, 8), (1515, 8), (1516, 8), (1520, 8), (1600, 8),
    (1601, 8), (1603, 8), (1605, 8), (1624, 8), (1626, 8), (1629, 8), (1631, 8), (1635, 8),
    (1646, 8), (1648, 8), (1712, 6), (1714, 8), (1716, 8), (1717, 8), (1719, 8), (1720, 8),
    (1721, 8), (1792, 8), (1872, 8), (1976, 8), (1977, 8), (1985, 8), (2015, 8),
];

const SKODA_SUPERB_MK3: &[(u32, u8)] = &[
    (64, 8), (134, 8), (159, 8), (173, 8), (178, 8), (253, 8), (257, 8), (260, 8), (262, 8),
    (278, 8), (279, 8), (283, 8), (286, 8), (288, 8), (289, 8), (290, 8), (294, 8), (299, 8),
    (302, 8), (346, 8), (376, 8), (385, 8), (391, 8), (418, 8), (427, 8), (605, 8), (619, 8),
    (668, 8), (679, 8), (681, 8), (695, 8), (779, 8), (780, 8), (783, 8), (787, 8), (788, 8),
    (789, 8), (791, 8), (792, 8), (795, 8), (799, 8), (804, 8), (806, 8), (807, 8), (808, 8),
    (809, 8), (828, 8), (838, 8), (839, 8), (840, 8), (841, 8), (842, 8), (843, 8), (846, 8),
    (847, 8), (870, 8), (873, 8), (879, 8), (884, 8), (888, 8), (891, 8), (896, 8), (897, 8),
    (898, 8), (901, 8), (913, 8), (917, 8), (919, 8), (927, 8), (949, 8), (958, 8), (960, 4),
    (981, 8), (987, 8), (988, 8), (991, 8), (997, 8), (1000, 8), (1019, 8), (1120, 8),
    (1122, 8), (1123, 8), (1124, 8), (1153, 8), (1156, 8), (1157, 8), (1158, 8), (1162, 8),
    (1175, 8), (1312, 8), (1343, 8), (1385, 8), (1413, 8), (1440, 5), (1471, 4), (1514, 8),
    (1515, 8), (1520, 8), (1600, 8), (1601, 8), (1603, 8), (1624, 8), (1626, 8), (1629, 8),
    (1631, 8), (1635, 8), (1646, 8), (1648, 8), (1712, 6), (1714, 8), (1716, 8), (1717, 8),
    (1719, 8), (1720, 8), (1721, 8),
];

const BUILTIN_FINGERPRINTS: &[(VehicleVariant, &[(u32, u8)])] = &[
    (VehicleVariant::SkodaOctaviaMk3, SKODA_OCTAVIA_MK3),
    (VehicleVariant::SkodaSuperbMk3, SKODA_SUPERB_MK3),
];

/// One alternative traffic signature: arbitration ID → payload length.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FingerprintSignature {
    frames: BTreeMap<u32, u8>,
}

impl FingerprintSignature {
    /// Build a signature from `(id, length)` pairs.
    ///
    /// # Errors
    /// Returns `ControlError::InvalidConfiguration` if a length is outside
    /// 1..=8 or an ID is declared twice with different lengths.
    pub fn new<I>(pairs: I) -> ControlResult<Self>
    where
        I: IntoIterator<Item = (u32, u8)>,
    {
        let mut frames = BTreeMap::new();
        for (id, len) in pairs {
            if !(MIN_PAYLOAD_LENGTH..=MAX_PAYLOAD_LENGTH).contains(&len) {
                return Err(ControlError::InvalidConfiguration(format!(
                    "Payload length of 0x{:03X} must be between {} and {}, got {}",
                    id, MIN_PAYLOAD_LENGTH, MAX_PAYLOAD_LENGTH, len
                )));
            }
            if let Some(previous) = frames.insert(id, len) {
                if previous != len {
                    return Err(ControlError::InvalidConfiguration(format!(
                        "ID 0x{:03X} declared with lengths {} and {}",
                        id, previous, len
                    )));
                }
            }
        }
        Ok(Self { frames })
    }

    /// Expected payload length for `id`, if this signature declares it.
    pub fn expected_length(&self, id: u32) -> Option<u8> {
        self.frames.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Declared `(id, length)` pairs in ascending ID order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, u8)> + '_ {
        self.frames.iter().map(|(id, len)| (*id, *len))
    }
}

/// Read-only mapping of variants to their signatures.
#[derive(Debug, Clone, Default)]
pub struct FingerprintDatabase {
    entries: BTreeMap<VehicleVariant, Vec<FingerprintSignature>>,
    known_ids: BTreeSet<u32>,
}

#[derive(Debug, Deserialize)]
struct DatabaseFile {
    #[serde(rename = "variant", default)]
    variants: Vec<VariantEntry>,
}

#[derive(Debug, Deserialize)]
struct VariantEntry {
    name: VehicleVariant,
    #[serde(default)]
    signatures: Vec<Vec<(u32, u8)>>,
}

impl FingerprintDatabase {
    /// Built-in fingerprints recorded from production vehicles.
    pub fn builtin() -> &'static FingerprintDatabase {
        static BUILTIN: OnceLock<FingerprintDatabase> = OnceLock::new();
        BUILTIN.get_or_init(|| {
            let mut db = FingerprintDatabase::default();
            for (variant, pairs) in BUILTIN_FINGERPRINTS {
                // Lengths in the static tables are all within 1..=8.
                let frames = pairs.iter().copied().collect();
                db.insert(*variant, FingerprintSignature { frames });
            }
            db
        })
    }

    /// Build a database from explicit entries.
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (VehicleVariant, FingerprintSignature)>,
    {
        let mut db = FingerprintDatabase::default();
        for (variant, signature) in entries {
            db.insert(variant, signature);
        }
        db
    }

    /// Parse a database from TOML text.
    pub fn from_toml_str(content: &str) -> ControlResult<Self> {
        let file: DatabaseFile = toml::from_str(content)
            .map_err(|e| ControlError::InvalidConfiguration(e.to_string()))?;

        let mut db = FingerprintDatabase::default();
        for entry in file.variants {
            for pairs in entry.signatures {
                db.insert(entry.name, FingerprintSignature::new(pairs)?);
            }
        }
        Ok(db)
    }

    /// Load a database from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> ControlResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ControlError::InvalidConfiguration(format!("{}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    fn insert(&mut self, variant: VehicleVariant, signature: FingerprintSignature) {
        if signature.is_empty() {
            return;
        }
        self.known_ids.extend(signature.frames.keys().copied());
        self.entries.entry(variant).or_default().push(signature);
    }

    /// Signatures registered for `variant`; empty if it has none.
    pub fn signatures(&self, variant: VehicleVariant) -> &[FingerprintSignature] {
        self.entries.get(&variant).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Variants owning at least one signature, in ascending order.
    pub fn variants(&self) -> impl Iterator<Item = VehicleVariant> + '_ {
        self.entries.keys().copied()
    }

    /// Whether any signature in the database declares `id`.
    pub fn is_known_id(&self, id: u32) -> bool {
        self.known_ids.contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_tables() {
        let db = FingerprintDatabase::builtin();
        let variants: Vec<_> = db.variants().collect();
        assert_eq!(
            variants,
            vec![VehicleVariant::SkodaSuperbMk3, VehicleVariant::SkodaOctaviaMk3]
        );

        let octavia = &db.signatures(VehicleVariant::SkodaOctaviaMk3)[0];
        let superb = &db.signatures(VehicleVariant::SkodaSuperbMk3)[0];
        assert_eq!(octavia.expected_length(1471), Some(8));
        assert_eq!(superb.expected_length(1471), Some(4));
        assert_eq!(octavia.expected_length(1712), Some(6));
        assert_eq!(superb.expected_length(605), Some(8));
        assert_eq!(octavia.expected_length(605), None);
        assert!(db.signatures(VehicleVariant::GolfMk7).is_empty());
    }

    #[test]
    fn test_known_ids() {
        let db = FingerprintDatabase::builtin();
        assert!(db.is_known_id(64));
        assert!(db.is_known_id(605));
        assert!(db.is_known_id(2015));
        assert!(!db.is_known_id(0x7E8));
    }

    #[test]
    fn test_signature_rejects_bad_length() {
        assert!(FingerprintSignature::new([(0x100, 0)]).is_err());
        assert!(FingerprintSignature::new([(0x100, 9)]).is_err());
        assert!(FingerprintSignature::new([(0x100, 8), (0x100, 4)]).is_err());
        assert!(FingerprintSignature::new([(0x100, 8), (0x100, 8)]).is_ok());
    }

    #[test]
    fn test_from_toml() {
        let db = FingerprintDatabase::from_toml_str(
            r#"
            [[variant]]
            name = "GOLF_MK7"
            signatures = [[[64, 8], [1440, 5]], [[64, 8], [1440, 6]]]

            [[variant]]
            name = "PASSAT_MK8"
            signatures = []
            "#,
        )
        .unwrap();

        assert_eq!(db.signatures(VehicleVariant::GolfMk7).len(), 2);
        assert!(db.signatures(VehicleVariant::PassatMk8).is_empty());
        assert_eq!(db.variants().count(), 1);
        assert!(db.is_known_id(1440));
    }

    #[test]
    fn test_from_toml_rejects_unknown_variant() {
        let err = FingerprintDatabase::from_toml_str(
            r#"
            [[variant]]
            name = "PORSCHE_911"
            signatures = [[[64, 8]]]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ControlError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_from_toml_rejects_bad_length() {
        let err = FingerprintDatabase::from_toml_str(
            r#"
            [[variant]]
            name = "GOLF_MK7"
            signatures = [[[64, 12]]]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ControlError::InvalidConfiguration(_)));
    }
}

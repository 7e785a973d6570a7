//! # Supported vehicle variants
//!
//! Every platform listed here shares MQB-style CAN messaging. Check the 7th
//! and 8th characters of the VIN before adding a new variant: if the chassis
//! code is already listed, the car belongs to the existing variant.
//! SEAT Leon and SEAT Ateca are the exception, they share chassis code 5F.

use crate::{ControlError, ControlResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A supported vehicle platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleVariant {
    /// Chassis CA, Mk1 VW Atlas and Atlas Cross Sport
    AtlasMk1,
    /// Chassis 5G/AU/BA/BE, Mk7 VW Golf and variants
    GolfMk7,
    /// Chassis BU, Mk7 Jetta
    JettaMk7,
    /// Chassis 3G, Mk8 Passat and variants
    PassatMk8,
    /// Chassis C1, Mk1 VW T-Cross SWB and LWB variants
    TcrossMk1,
    /// Chassis AD/BW, Mk2 VW Tiguan and variants
    TiguanMk2,
    /// Chassis 1T, Mk2 VW Touran and variants
    TouranMk2,
    /// Chassis 8V/FF, Mk3 Audi A3 and variants
    AudiA3Mk3,
    /// Chassis GA, Mk1 Audi Q2 (RoW) and Q2L (China only)
    AudiQ2Mk1,
    /// Chassis 5F, Mk1 SEAT Ateca and CUPRA Ateca
    SeatAtecaMk1,
    /// Chassis 5F, Mk3 SEAT Leon and variants
    SeatLeonMk3,
    /// Chassis NS, Mk1 Skoda Kodiaq
    SkodaKodiaqMk1,
    /// Chassis NW, Mk1 Skoda Scala and Skoda Kamiq
    SkodaScalaMk1,
    /// Chassis 3V/NP, Mk3 Skoda Superb and variants
    SkodaSuperbMk3,
    /// Chassis NE, Mk3 Skoda Octavia and variants
    SkodaOctaviaMk3,
}

impl VehicleVariant {
    /// All variants, in declaration order.
    pub const ALL: [VehicleVariant; 15] = [
        VehicleVariant::AtlasMk1,
        VehicleVariant::GolfMk7,
        VehicleVariant::JettaMk7,
        VehicleVariant::PassatMk8,
        VehicleVariant::TcrossMk1,
        VehicleVariant::TiguanMk2,
        VehicleVariant::TouranMk2,
        VehicleVariant::AudiA3Mk3,
        VehicleVariant::AudiQ2Mk1,
        VehicleVariant::SeatAtecaMk1,
        VehicleVariant::SeatLeonMk3,
        VehicleVariant::SkodaKodiaqMk1,
        VehicleVariant::SkodaScalaMk1,
        VehicleVariant::SkodaSuperbMk3,
        VehicleVariant::SkodaOctaviaMk3,
    ];

    /// Stable identifier used in configuration files, e.g. `SKODA_OCTAVIA_MK3`.
    pub fn id(self) -> &'static str {
        match self {
            VehicleVariant::AtlasMk1 => "ATLAS_MK1",
            VehicleVariant::GolfMk7 => "GOLF_MK7",
            VehicleVariant::JettaMk7 => "JETTA_MK7",
            VehicleVariant::PassatMk8 => "PASSAT_MK8",
            VehicleVariant::TcrossMk1 => "TCROSS_MK1",
            VehicleVariant::TiguanMk2 => "TIGUAN_MK2",
            VehicleVariant::TouranMk2 => "TOURAN_MK2",
            VehicleVariant::AudiA3Mk3 => "AUDI_A3_MK3",
            VehicleVariant::AudiQ2Mk1 => "AUDI_Q2_MK1",
            VehicleVariant::SeatAtecaMk1 => "SEAT_ATECA_MK1",
            VehicleVariant::SeatLeonMk3 => "SEAT_LEON_MK3",
            VehicleVariant::SkodaKodiaqMk1 => "SKODA_KODIAQ_MK1",
            VehicleVariant::SkodaScalaMk1 => "SKODA_SCALA_MK1",
            VehicleVariant::SkodaSuperbMk3 => "SKODA_SUPERB_MK3",
            VehicleVariant::SkodaOctaviaMk3 => "SKODA_OCTAVIA_MK3",
        }
    }

    /// Human readable platform name.
    pub fn name(self) -> &'static str {
        match self {
            VehicleVariant::AtlasMk1 => "VOLKSWAGEN ATLAS 1ST GEN",
            VehicleVariant::GolfMk7 => "VOLKSWAGEN GOLF 7TH GEN",
            VehicleVariant::JettaMk7 => "VOLKSWAGEN JETTA 7TH GEN",
            VehicleVariant::PassatMk8 => "VOLKSWAGEN PASSAT 8TH GEN",
            VehicleVariant::TcrossMk1 => "VOLKSWAGEN T-CROSS 1ST GEN",
            VehicleVariant::TiguanMk2 => "VOLKSWAGEN TIGUAN 2ND GEN",
            VehicleVariant::TouranMk2 => "VOLKSWAGEN TOURAN 2ND GEN",
            VehicleVariant::AudiA3Mk3 => "AUDI A3 3RD GEN",
            VehicleVariant::AudiQ2Mk1 => "AUDI Q2 1ST GEN",
            VehicleVariant::SeatAtecaMk1 => "SEAT ATECA 1ST GEN",
            VehicleVariant::SeatLeonMk3 => "SEAT LEON 3RD GEN",
            VehicleVariant::SkodaKodiaqMk1 => "SKODA KODIAQ 1ST GEN",
            VehicleVariant::SkodaScalaMk1 => "SKODA SCALA 1ST GEN",
            VehicleVariant::SkodaSuperbMk3 => "SKODA SUPERB 3RD GEN",
            VehicleVariant::SkodaOctaviaMk3 => "SKODA OCTAVIA 3RD GEN",
        }
    }
}

impl fmt::Display for VehicleVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VehicleVariant {
    type Err = ControlError;

    /// Accepts either the identifier (`SKODA_SUPERB_MK3`) or the display name.
    fn from_str(s: &str) -> ControlResult<Self> {
        let s = s.trim();
        VehicleVariant::ALL
            .iter()
            .copied()
            .find(|v| v.id().eq_ignore_ascii_case(s) || v.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ControlError::UnknownVariant(s.to_string()))
    }
}

//! Edge flag encoding.
//!
//! Flags are an opaque `u32` to the storage; the only operation it needs is
//! the direction swap applied when an edge is written or read against its
//! canonical orientation. Everything else (access, speed) is the encoder's
//! business.
//!
//! Bit layout of [`CarEncoder`]:
//!
//! ```text
//! bit 0      forward (canonical direction)
//! bit 1      backward
//! bits 2..10 speed in km/h
//! ```

/// Direction handling of an edge flag word.
pub trait CombinedEncoder {
    /// Default flags for a new edge: one-way forward, or both directions.
    fn flags_default(&self, both_directions: bool) -> u32;

    /// Flags as seen when traversing the edge the other way round.
    fn swap_direction(&self, flags: u32) -> u32;
}

/// Vehicle-specific reading of a flag word.
pub trait VehicleEncoder {
    /// Travel speed in km/h for the direction the flags are oriented in.
    fn speed(&self, flags: u32) -> f64;

    fn forward(&self, flags: u32) -> bool;

    fn backward(&self, flags: u32) -> bool;
}

const FORWARD: u32 = 0b01;
const BACKWARD: u32 = 0b10;
const DIRECTION_MASK: u32 = FORWARD | BACKWARD;
const SPEED_SHIFT: u32 = 2;
const SPEED_MASK: u32 = 0xff << SPEED_SHIFT;

/// Standard car flag codec with per-highway-class default speeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct CarEncoder;

impl CarEncoder {
    pub const DEFAULT_SPEED_KMH: u32 = 50;

    /// Build flags from a speed and a direction choice.
    pub fn flags(speed_kmh: u32, both_directions: bool) -> u32 {
        let dir = if both_directions {
            DIRECTION_MASK
        } else {
            FORWARD
        };
        ((speed_kmh & 0xff) << SPEED_SHIFT) | dir
    }

    /// Default speed for an OSM highway class, for ingesters that have
    /// nothing better.
    pub fn speed_for_highway(highway: &str) -> u32 {
        match highway {
            "motorway" => 110,
            "motorway_link" => 60,
            "trunk" => 90,
            "trunk_link" => 50,
            "primary" => 70,
            "primary_link" => 40,
            "secondary" => 60,
            "secondary_link" => 40,
            "tertiary" => 50,
            "tertiary_link" => 30,
            "unclassified" => 50,
            "residential" => 30,
            "service" => 20,
            "living_street" => 10,
            _ => Self::DEFAULT_SPEED_KMH,
        }
    }
}

impl CombinedEncoder for CarEncoder {
    fn flags_default(&self, both_directions: bool) -> u32 {
        Self::flags(Self::DEFAULT_SPEED_KMH, both_directions)
    }

    fn swap_direction(&self, flags: u32) -> u32 {
        let dir = flags & DIRECTION_MASK;
        if dir == DIRECTION_MASK || dir == 0 {
            return flags;
        }
        flags ^ DIRECTION_MASK
    }
}

impl VehicleEncoder for CarEncoder {
    fn speed(&self, flags: u32) -> f64 {
        ((flags & SPEED_MASK) >> SPEED_SHIFT) as f64
    }

    fn forward(&self, flags: u32) -> bool {
        flags & FORWARD != 0
    }

    fn backward(&self, flags: u32) -> bool {
        flags & BACKWARD != 0
    }
}

//! Particle class codes.
//!
//! A code packs three fields into 16 bits: the special state (normal,
//! periodic or one of the out states), the particle type and an object value.

use bytemuck::{Pod, Zeroable};

use crate::constants::*;

/// Particle type stored in the type bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParticleKind {
    Fixed,
    Moving,
    Floating,
    Fluid,
}

/// Packed particle class code.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct ParticleCode(pub u16);

impl ParticleCode {
    /// Normal particle of the given kind and object value.
    pub fn new(kind: ParticleKind, value: u16) -> Self {
        let kind_bits = match kind {
            ParticleKind::Fixed => CODE_TYPE_FIXED,
            ParticleKind::Moving => CODE_TYPE_MOVING,
            ParticleKind::Floating => CODE_TYPE_FLOATING,
            ParticleKind::Fluid => CODE_TYPE_FLUID,
        };
        Self(CODE_NORMAL | kind_bits | (value & CODE_MASK_VALUE))
    }

    pub fn fixed(value: u16) -> Self {
        Self::new(ParticleKind::Fixed, value)
    }

    pub fn moving(value: u16) -> Self {
        Self::new(ParticleKind::Moving, value)
    }

    pub fn floating(value: u16) -> Self {
        Self::new(ParticleKind::Floating, value)
    }

    pub fn fluid(value: u16) -> Self {
        Self::new(ParticleKind::Fluid, value)
    }

    #[inline]
    pub fn special(self) -> u16 {
        self.0 & CODE_MASK_SPECIAL
    }

    #[inline]
    pub fn kind(self) -> ParticleKind {
        match self.0 & CODE_MASK_TYPE {
            CODE_TYPE_FIXED => ParticleKind::Fixed,
            CODE_TYPE_MOVING => ParticleKind::Moving,
            CODE_TYPE_FLOATING => ParticleKind::Floating,
            _ => ParticleKind::Fluid,
        }
    }

    #[inline]
    pub fn value(self) -> u16 {
        self.0 & CODE_MASK_VALUE
    }

    #[inline]
    pub fn is_fluid(self) -> bool {
        self.0 & CODE_MASK_TYPE == CODE_TYPE_FLUID
    }

    /// True for any of the out states. Out particles are excluded from
    /// bounds and sorted into the reserved out cell.
    #[inline]
    pub fn is_out(self) -> bool {
        self.special() >= CODE_OUTIGNORE
    }

    #[inline]
    pub fn is_periodic(self) -> bool {
        self.special() == CODE_PERIODIC
    }

    /// Same code with its special state replaced.
    #[inline]
    pub fn with_special(self, special: u16) -> Self {
        Self((self.0 & !CODE_MASK_SPECIAL) | (special & CODE_MASK_SPECIAL))
    }
}

//! Slot layout of the `atm`/`bas`/`env` arrays consumed by libcint-style
//! integral libraries.
//!
//!   atm[natm][ATM_SLOTS]  : atom data
//!   bas[nbas][BAS_SLOTS]  : shell data (ECP shells share the same shape)
//!   env[]                 : header + coordinates/exponents/coefficients
//!
//! These numbers are a fixed contract with the native library. Do not renumber.

// ─── atm slot indices ────────────────────────────────────────────────────────
pub const CHARGE_OF: usize = 0;
pub const PTR_COORD: usize = 1;
pub const NUC_MOD_OF: usize = 2;
pub const PTR_ZETA: usize = 3;
pub const RESERVE_ATMSLOT1: usize = 4;
pub const RESERVE_ATMSLOT2: usize = 5;
pub const ATM_SLOTS: usize = 6;

// ─── bas slot indices ────────────────────────────────────────────────────────
pub const ATOM_OF: usize = 0;
pub const ANG_OF: usize = 1;
pub const NPRIM_OF: usize = 2;
pub const NCTR_OF: usize = 3;
/// ECP shells keep the radial power in the contraction-count slot.
pub const RADI_POWER: usize = 3;
pub const KAPPA_OF: usize = 4;
pub const PTR_EXP: usize = 5;
pub const PTR_COEFF: usize = 6;
pub const RESERVE_BASLOT: usize = 7;
pub const BAS_SLOTS: usize = 8;

// ─── env header offsets ──────────────────────────────────────────────────────
pub const PTR_LIGHT_SPEED: usize = 0;
pub const PTR_COMMON_ORIG: usize = 1; // 3 floats
pub const PTR_RINV_ORIG: usize = 4; // 3 floats
pub const PTR_RINV_ZETA: usize = 7;
pub const PTR_RANGE_OMEGA: usize = 8;
pub const PTR_F12_ZETA: usize = 9;
pub const PTR_ECPBAS_OFFSET: usize = 18;
pub const PTR_NECPBAS: usize = 19;
pub const PTR_ENV_START: usize = 20;

// ─── nuclear model tags ──────────────────────────────────────────────────────
pub const NUC_POINT: i32 = 1;
pub const NUC_GAUSS: i32 = 2;

/// Angular momentum marker of the local (unprojected) ECP term.
pub const ECP_LOCAL: i32 = -1;

// ─── physical constants ──────────────────────────────────────────────────────
pub const LIGHT_SPEED: f64 = 137.03599967994;
/// Bohr radius in Angstrom.
pub const BOHR: f64 = 0.52917721092;

/// One atom row of the `atm` table.
pub type AtmRecord = [i32; ATM_SLOTS];
/// One shell row of the `bas` (or `ecpbas`) table.
pub type BasRecord = [i32; BAS_SLOTS];

//! AO bookkeeping over a `bas` table.

use crate::consts::*;

/// Number of spinors of a shell; `4l+2` when `kappa == 0`.
pub fn len_spinor(l: i32, kappa: i32) -> usize {
    let n = if kappa == 0 {
        l * 4 + 2
    } else if kappa < 0 {
        l * 2 + 2
    } else {
        l * 2
    };
    n.max(0) as usize
}

pub fn len_cart(l: i32) -> usize {
    let l = l.max(0) as usize;
    (l + 1) * (l + 2) / 2
}

pub fn len_sph(l: i32) -> usize {
    (l.max(0) * 2 + 1) as usize
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AoKind {
    Spherical,
    Cartesian,
    Spinor,
}

impl AoKind {
    pub fn nr(cart: bool) -> Self {
        if cart {
            AoKind::Cartesian
        } else {
            AoKind::Spherical
        }
    }

    /// Functions per contracted function of the shell.
    pub fn shell_dim(self, b: &BasRecord) -> usize {
        match self {
            AoKind::Spherical => len_sph(b[ANG_OF]),
            AoKind::Cartesian => len_cart(b[ANG_OF]),
            AoKind::Spinor => len_spinor(b[ANG_OF], b[KAPPA_OF]),
        }
    }
}

fn nctr(b: &BasRecord) -> usize {
    b[NCTR_OF].max(0) as usize
}

fn nprim(b: &BasRecord) -> usize {
    b[NPRIM_OF].max(0) as usize
}

/// Offset of the first function of every shell, plus the total as last item.
pub fn make_loc(bas: &[BasRecord], kind: AoKind) -> Vec<usize> {
    let mut loc = Vec::with_capacity(bas.len() + 1);
    let mut off = 0;
    loc.push(off);
    for b in bas {
        off += kind.shell_dim(b) * nctr(b);
        loc.push(off);
    }
    loc
}

/// Number of primitive GTOs.
pub fn npgto_nr(bas: &[BasRecord], cart: bool) -> usize {
    let kind = AoKind::nr(cart);
    bas.iter().map(|b| kind.shell_dim(b) * nprim(b)).sum()
}

pub fn nao_nr(bas: &[BasRecord], cart: bool) -> usize {
    let kind = AoKind::nr(cart);
    bas.iter().map(|b| kind.shell_dim(b) * nctr(b)).sum()
}

pub fn nao_cart(bas: &[BasRecord]) -> usize {
    nao_nr(bas, true)
}

pub fn nao_2c(bas: &[BasRecord]) -> usize {
    bas.iter().map(|b| AoKind::Spinor.shell_dim(b) * nctr(b)).sum()
}

pub fn ao_loc_nr(bas: &[BasRecord], cart: bool) -> Vec<usize> {
    make_loc(bas, AoKind::nr(cart))
}

pub fn ao_loc_2c(bas: &[BasRecord]) -> Vec<usize> {
    make_loc(bas, AoKind::Spinor)
}

/// AO index range `[start, stop)` spanned by shells `bas_id0..bas_id1`.
pub fn nao_range(bas: &[BasRecord], bas_id0: usize, bas_id1: usize, kind: AoKind) -> (usize, usize) {
    let bas_id1 = bas_id1.min(bas.len());
    let bas_id0 = bas_id0.min(bas_id1);
    let loc = make_loc(&bas[..bas_id1], kind);
    (loc[bas_id0], loc[bas_id1])
}

pub fn nao_nr_range(bas: &[BasRecord], bas_id0: usize, bas_id1: usize, cart: bool) -> (usize, usize) {
    nao_range(bas, bas_id0, bas_id1, AoKind::nr(cart))
}

pub fn nao_2c_range(bas: &[BasRecord], bas_id0: usize, bas_id1: usize) -> (usize, usize) {
    nao_range(bas, bas_id0, bas_id1, AoKind::Spinor)
}

/// Per atom `[shell start, shell stop, ao start, ao stop]`. Shells are
/// expected to be grouped by atom; an atom without shells gets an empty range
/// at the position of the next atom's shells.
pub fn aoslice_by_atom(bas: &[BasRecord], natm: usize, ao_loc: &[usize]) -> Vec<[usize; 4]> {
    let mut slices = Vec::with_capacity(natm);
    let mut ib = 0;
    for ia in 0..natm {
        let start = ib;
        while ib < bas.len() && bas[ib][ATOM_OF] as usize == ia {
            ib += 1;
        }
        slices.push([start, ib, ao_loc[start], ao_loc[ib]]);
    }
    slices
}

/// Time-reversal partner of every spinor, 1-based and signed: `T|i> = -|j>`
/// is stored as `-j`.
pub fn time_reversal_map(bas: &[BasRecord]) -> Vec<i32> {
    let mut tao = Vec::with_capacity(nao_2c(bas));
    let mut i: i32 = 0;
    for b in bas {
        let l = b[ANG_OF];
        let kappa = b[KAPPA_OF];
        let djs = if kappa == 0 {
            vec![l * 2, l * 2 + 2]
        } else if kappa > 0 {
            vec![l * 2]
        } else {
            vec![l * 2 + 2]
        };
        let sign = if l % 2 == 0 { -1 } else { 1 };
        for _ in 0..nctr(b) {
            for &dj in &djs {
                for m in (0..dj).step_by(2) {
                    tao.push(sign * (i + dj - m));
                    tao.push(-sign * (i + dj - m - 1));
                }
                i += dj;
            }
        }
    }
    tao
}

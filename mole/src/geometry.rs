//! Molecular geometry input.
//!
//! Atoms are given either as a text block
//!
//! ```text
//! O 0 0 0; H 0 1 0
//! H, 0, 0, 1      # commas are accepted too
//! ```
//!
//! or as a list of `(label, [x, y, z])` entries. A text block whose first
//! line has fewer than four fields is read as a z-matrix.

use std::str::FromStr;

use nalgebra::{Matrix3, Rotation3, Unit as Axis, Vector3};
use serde::{Deserialize, Serialize};

use crate::consts::BOHR;
use crate::element::AtomSymbol;
use crate::error::{MoleError, MoleResult};

/// Length unit of the input coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Unit {
    #[default]
    #[serde(alias = "angstrom", alias = "Ang", alias = "ang", alias = "A")]
    Angstrom,
    #[serde(alias = "bohr", alias = "AU", alias = "au", alias = "B")]
    Bohr,
    /// Value of one Bohr in the input unit of length (Angstrom scale).
    Custom(f64),
}

impl Unit {
    /// Factor converting an input coordinate to Bohr.
    pub fn to_bohr(self) -> f64 {
        match self {
            Unit::Angstrom => 1.0 / BOHR,
            Unit::Bohr => 1.0,
            Unit::Custom(b) => 1.0 / b,
        }
    }
}

impl FromStr for Unit {
    type Err = MoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(b) = s.parse::<f64>() {
            if b > 0.0 {
                return Ok(Unit::Custom(b));
            }
        } else if s.starts_with(['B', 'b']) || s.eq_ignore_ascii_case("au") {
            return Ok(Unit::Bohr);
        } else if s.starts_with(['A', 'a']) {
            return Ok(Unit::Angstrom);
        }
        Err(MoleError::InvalidParameter {
            name: "unit",
            reason: format!("unknown length unit '{}'", s),
        })
    }
}

/// One entry of a list-form geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AtomItem {
    Entry(String, [f64; 3]),
    Line(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AtomInput {
    Text(String),
    List(Vec<AtomItem>),
}

impl Default for AtomInput {
    fn default() -> Self {
        AtomInput::List(Vec::new())
    }
}

impl From<&str> for AtomInput {
    fn from(text: &str) -> Self {
        AtomInput::Text(text.to_string())
    }
}

impl From<Vec<(&str, [f64; 3])>> for AtomInput {
    fn from(atoms: Vec<(&str, [f64; 3])>) -> Self {
        AtomInput::List(
            atoms
                .into_iter()
                .map(|(s, c)| AtomItem::Entry(s.to_string(), c))
                .collect(),
        )
    }
}

/// Atom with its parsed label and Bohr coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedAtom {
    pub symbol: AtomSymbol,
    pub coord: Vector3<f64>,
}

fn parse_coord(token: &str, line: &str) -> MoleResult<f64> {
    token
        .parse::<f64>()
        .map_err(|_| MoleError::InvalidGeometry(format!("bad coordinate '{}' in '{}'", token, line)))
}

fn parse_cartesian_line(line: &str) -> MoleResult<(AtomSymbol, Vector3<f64>)> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 4 {
        return Err(MoleError::InvalidGeometry(format!(
            "expected 'symbol x y z', got '{}'",
            line
        )));
    }
    let symbol = AtomSymbol::parse(fields[0])?;
    let coord = Vector3::new(
        parse_coord(fields[1], line)?,
        parse_coord(fields[2], line)?,
        parse_coord(fields[3], line)?,
    );
    Ok((symbol, coord))
}

fn normalize_text(text: &str) -> String {
    text.replace(';', "\n").replace([',', '\t'], " ")
}

fn content_lines(text: &str) -> Vec<String> {
    normalize_text(text)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(String::from)
        .collect()
}

/// Parse the geometry and express it in Bohr, in the frame given by `origin`
/// and `axes` (rows are the new x, y and z axes in input coordinates).
pub fn format_atom(
    input: &AtomInput,
    origin: &Vector3<f64>,
    axes: &Matrix3<f64>,
    unit: Unit,
) -> MoleResult<Vec<FormattedAtom>> {
    let raw: Vec<(AtomSymbol, Vector3<f64>)> = match input {
        AtomInput::Text(text) => {
            let lines = content_lines(text);
            match lines.first() {
                None => Vec::new(),
                Some(first) if first.split_whitespace().count() < 4 => from_zmatrix(&lines.join("\n"))?,
                Some(_) => lines
                    .iter()
                    .map(|l| parse_cartesian_line(l))
                    .collect::<MoleResult<_>>()?,
            }
        }
        AtomInput::List(items) => {
            let mut atoms = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    AtomItem::Entry(label, c) => {
                        atoms.push((AtomSymbol::parse(label)?, Vector3::new(c[0], c[1], c[2])))
                    }
                    AtomItem::Line(line) => {
                        let line = normalize_text(line);
                        let line = line.trim();
                        if !line.starts_with('#') {
                            atoms.push(parse_cartesian_line(line)?);
                        }
                    }
                }
            }
            atoms
        }
    };

    let convert = unit.to_bohr();
    Ok(raw
        .into_iter()
        .map(|(symbol, c)| FormattedAtom {
            symbol,
            coord: axes * (c - origin) * convert,
        })
        .collect())
}

fn rotation(axis: &Vector3<f64>, angle: f64) -> MoleResult<Rotation3<f64>> {
    let axis = Axis::try_new(*axis, 1e-12).ok_or_else(|| {
        MoleError::InvalidGeometry(String::from("z-matrix reference atoms are collinear or coincide"))
    })?;
    Ok(Rotation3::from_axis_angle(&axis, angle))
}

fn ref_atom(token: &str, atoms: &[(AtomSymbol, Vector3<f64>)], line: &str) -> MoleResult<Vector3<f64>> {
    let idx: usize = token
        .parse()
        .map_err(|_| MoleError::InvalidGeometry(format!("bad reference atom '{}' in '{}'", token, line)))?;
    if idx == 0 || idx > atoms.len() {
        return Err(MoleError::InvalidGeometry(format!(
            "reference atom {} not defined before '{}'",
            idx, line
        )));
    }
    Ok(atoms[idx - 1].1)
}

/// Cartesian coordinates from a z-matrix.
///
/// ```text
/// H
/// H 1 2.67247631453057
/// H 1 4.22555607338457 2 50.7684795164077
/// H 1 2.90305235726773 2 79.3904651036893 3 6.20854462618583
/// ```
///
/// The first atom sits at the origin, the second on the x axis, the third in
/// the xz plane. Angles are in degrees, reference atoms count from 1.
pub fn from_zmatrix(text: &str) -> MoleResult<Vec<(AtomSymbol, Vector3<f64>)>> {
    let mut atoms: Vec<(AtomSymbol, Vector3<f64>)> = Vec::new();
    for line in content_lines(text) {
        let f: Vec<&str> = line.split_whitespace().collect();
        let symbol = AtomSymbol::parse(f[0])?;
        let coord = match f.len() {
            1 | 2 => Vector3::zeros(),
            3 => Vector3::new(parse_coord(f[2], &line)?, 0.0, 0.0),
            5 | 7 => {
                let a = ref_atom(f[1], &atoms, &line)?;
                let bond = parse_coord(f[2], &line)?;
                let b = ref_atom(f[3], &atoms, &line)?;
                let ang = parse_coord(f[4], &line)?.to_radians();
                if ang < 0.0 {
                    return Err(MoleError::InvalidGeometry(format!("negative bond angle in '{}'", line)));
                }
                let v1 = b - a;
                if v1.norm() < 1e-12 {
                    return Err(MoleError::InvalidGeometry(format!("reference atoms coincide in '{}'", line)));
                }
                let vecn = if f.len() == 5 {
                    if v1.x.abs() > 1e-8 || v1.y.abs() > 1e-8 {
                        v1.cross(&Vector3::z())
                    } else {
                        Vector3::z()
                    }
                } else {
                    let d = ref_atom(f[5], &atoms, &line)?;
                    let dih = parse_coord(f[6], &line)?.to_radians();
                    let v2 = d - b;
                    let n = v2.cross(&-v1);
                    rotation(&v1, -dih)? * n
                };
                let c = rotation(&vecn, ang)? * v1 * (bond / v1.norm());
                a + c
            }
            _ => {
                return Err(MoleError::InvalidGeometry(format!(
                    "z-matrix line needs 1, 3, 5 or 7 fields: '{}'",
                    line
                )))
            }
        };
        atoms.push((symbol, coord));
    }
    Ok(atoms)
}

fn angle(u: &Vector3<f64>, v: &Vector3<f64>) -> f64 {
    (u.dot(v) / (u.norm() * v.norm())).clamp(-1.0, 1.0).acos()
}

/// Z-matrix (without atom labels) describing `coords`, the inverse of
/// [`from_zmatrix`] up to a rigid motion.
pub fn cart2zmat(coords: &[Vector3<f64>]) -> String {
    let mut zstr = vec![String::from("1")];
    if coords.len() > 1 {
        let r1 = coords[1] - coords[0];
        zstr.push(format!("1 {}", r1.norm()));
    }
    if coords.len() > 2 {
        let r1 = coords[1] - coords[0];
        let r2 = coords[2] - coords[0];
        zstr.push(format!("1 {} 2 {}", r2.norm(), angle(&r1, &r2).to_degrees()));
    }
    if coords.len() > 3 {
        let o0 = coords[0];
        let o1 = coords[1];
        let mut o2 = coords[2];
        let mut p2 = 3;
        for (k, c) in coords[3..].iter().enumerate() {
            let r0 = c - o0;
            let r1 = o1 - o0;
            let a1 = angle(&r0, &r1).to_degrees();
            let b0 = r0.cross(&r1);
            let b1 = (o2 - o0).cross(&r1);
            let a2 = if b0.norm() < 1e-7 {
                0.0
            } else if b1.norm() < 1e-7 {
                // o0, o1, o2 collinear: use this atom as the next dihedral reference
                let line = format!("1 {} 2 {} {} 0", r0.norm(), a1, p2);
                o2 = *c;
                p2 = 4 + k;
                zstr.push(line);
                continue;
            } else {
                let a = angle(&b1, &b0);
                if b1.cross(&b0).dot(&r1) < 0.0 {
                    a.to_degrees()
                } else {
                    -a.to_degrees()
                }
            };
            zstr.push(format!("1 {} 2 {} {} {}", r0.norm(), a1, p2, a2));
        }
    }
    zstr.join("\n")
}

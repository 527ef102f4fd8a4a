//! NWChem basis / ECP text format.
//!
//! ```text
//! BASIS "ao basis" SPHERICAL PRINT
//! #BASIS SET: (4s,1p) -> [2s,1p]
//! H    S
//!       0.1873113696E+02       0.3349460434E-01
//!       0.2825394365E+01       0.2347269535E+00
//!       0.6401216923E+00       0.8137573261E+00
//! H    S
//!       0.1612777588E+00       1.0000000
//! END
//! ECP
//! Na nelec 10
//! Na ul
//! 2      1.0000000              0.0000000
//! Na S
//! 0      8.8886000            -18.3979179
//! END
//! ```
//!
//! `SP` shells are split into an s and a p shell on the same exponents.

use std::collections::BTreeMap;

use crate::basis::ShellSpec;
use crate::consts::ECP_LOCAL;
use crate::ecp::{EcpBlock, EcpData};
use crate::element::AtomSymbol;
use crate::error::{MoleError, MoleResult};

const SHELL_LETTERS: &str = "SPDFGHIK";

fn shell_l(c: char) -> Option<i32> {
    SHELL_LETTERS
        .find(c.to_ascii_uppercase())
        .map(|l| l as i32)
}

fn parse_float(token: &str, symbol: &str) -> MoleResult<f64> {
    token
        .replace(['D', 'd'], "E")
        .parse::<f64>()
        .map_err(|_| MoleError::MalformedBasis {
            symbol: symbol.to_string(),
            reason: format!("cannot parse number '{}'", token),
        })
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(i) => &line[..i],
        None => line,
    }
    .trim()
}

fn element_of(token: &str) -> MoleResult<String> {
    AtomSymbol::parse(token).map(|s| s.element)
}

fn is_keyword(head: &str, keyword: &str) -> bool {
    head.eq_ignore_ascii_case(keyword)
}

/// Contraction being collected: element, shell letters, primitive rows.
struct Block {
    element: String,
    ls: Vec<i32>,
    rows: Vec<Vec<f64>>,
}

impl Block {
    fn flush(self, out: &mut BTreeMap<String, Vec<ShellSpec>>) -> MoleResult<()> {
        let shells = out.entry(self.element.clone()).or_default();
        if self.ls.len() == 1 {
            shells.push(ShellSpec::new(self.ls[0], self.rows));
            return Ok(());
        }
        // combined shells (SP): one coefficient column per letter
        for (k, &l) in self.ls.iter().enumerate() {
            let rows = self
                .rows
                .iter()
                .map(|r| {
                    r.get(k + 1)
                        .map(|c| vec![r[0], *c])
                        .ok_or_else(|| MoleError::MalformedBasis {
                            symbol: self.element.clone(),
                            reason: format!("combined shell row {:?} is too short", r),
                        })
                })
                .collect::<MoleResult<Vec<_>>>()?;
            shells.push(ShellSpec::new(l, rows));
        }
        Ok(())
    }
}

/// Parse the orbital basis blocks, keyed by element symbol. ECP sections
/// are skipped.
pub fn parse_nwchem(text: &str) -> MoleResult<BTreeMap<String, Vec<ShellSpec>>> {
    let mut out = BTreeMap::new();
    let mut current: Option<Block> = None;
    let mut in_ecp = false;

    for raw in text.lines() {
        let line = strip_comment(raw);
        if line.is_empty() {
            continue;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let head = tokens[0];

        if is_keyword(head, "ECP") {
            in_ecp = true;
            continue;
        }
        if is_keyword(head, "END") {
            if let Some(block) = current.take() {
                block.flush(&mut out)?;
            }
            in_ecp = false;
            continue;
        }
        if in_ecp || is_keyword(head, "BASIS") {
            continue;
        }

        let starts_numeric = head
            .chars()
            .next()
            .map(|c| c.is_ascii_digit() || c == '.' || c == '-' || c == '+')
            .unwrap_or(false);

        if starts_numeric {
            let block = current.as_mut().ok_or_else(|| MoleError::MalformedBasis {
                symbol: String::from("?"),
                reason: format!("primitive line before any shell header: '{}'", line),
            })?;
            let row = tokens
                .iter()
                .map(|t| parse_float(t, &block.element))
                .collect::<MoleResult<Vec<_>>>()?;
            block.rows.push(row);
            continue;
        }

        if tokens.len() < 2 {
            return Err(MoleError::MalformedBasis {
                symbol: head.to_string(),
                reason: format!("unexpected line '{}'", line),
            });
        }
        let ls = tokens[1]
            .chars()
            .map(|c| {
                shell_l(c).ok_or_else(|| MoleError::MalformedBasis {
                    symbol: head.to_string(),
                    reason: format!("unknown shell type '{}'", tokens[1]),
                })
            })
            .collect::<MoleResult<Vec<_>>>()?;
        if let Some(block) = current.take() {
            block.flush(&mut out)?;
        }
        current = Some(Block {
            element: element_of(head)?,
            ls,
            rows: Vec::new(),
        });
    }

    if let Some(block) = current.take() {
        block.flush(&mut out)?;
    }
    Ok(out)
}

/// Parse the `ECP ... END` sections, keyed by element symbol.
pub fn parse_nwchem_ecp(text: &str) -> MoleResult<BTreeMap<String, EcpData>> {
    let mut out: BTreeMap<String, EcpData> = BTreeMap::new();
    let mut in_ecp = false;
    let mut current: Option<(String, usize)> = None;

    for raw in text.lines() {
        let line = strip_comment(raw);
        if line.is_empty() {
            continue;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let head = tokens[0];

        if is_keyword(head, "ECP") {
            in_ecp = true;
            continue;
        }
        if is_keyword(head, "END") {
            in_ecp = false;
            current = None;
            continue;
        }
        if !in_ecp {
            continue;
        }

        let numeric = head.chars().all(|c| c.is_ascii_digit());
        if numeric {
            let (element, block) = current.as_ref().ok_or_else(|| MoleError::MalformedBasis {
                symbol: String::from("?"),
                reason: format!("ECP term before any block header: '{}'", line),
            })?;
            if tokens.len() < 3 {
                return Err(MoleError::MalformedBasis {
                    symbol: element.clone(),
                    reason: format!("ECP term needs 'r exponent coefficient': '{}'", line),
                });
            }
            let r: usize = head.parse().map_err(|_| MoleError::MalformedBasis {
                symbol: element.clone(),
                reason: format!("bad radial power '{}'", head),
            })?;
            let e = parse_float(tokens[1], element)?;
            let c = parse_float(tokens[2], element)?;
            let data = out.entry(element.clone()).or_default();
            let terms = &mut data.blocks[*block].terms;
            if terms.len() <= r {
                terms.resize(r + 1, Vec::new());
            }
            terms[r].push((e, c));
            continue;
        }

        if tokens.len() < 2 {
            return Err(MoleError::MalformedBasis {
                symbol: head.to_string(),
                reason: format!("unexpected ECP line '{}'", line),
            });
        }
        let element = element_of(head)?;
        let data = out.entry(element.clone()).or_default();
        let kind = tokens[1];
        if is_keyword(kind, "nelec") {
            let n = tokens.get(2).ok_or_else(|| MoleError::MalformedBasis {
                symbol: element.clone(),
                reason: String::from("nelec without a count"),
            })?;
            data.nelec = n.parse().map_err(|_| MoleError::MalformedBasis {
                symbol: element.clone(),
                reason: format!("bad nelec '{}'", n),
            })?;
            current = None;
            continue;
        }
        let l = if is_keyword(kind, "ul") {
            ECP_LOCAL
        } else {
            let mut chars = kind.chars();
            match (chars.next().and_then(shell_l), chars.next()) {
                (Some(l), None) => l,
                _ => {
                    return Err(MoleError::MalformedBasis {
                        symbol: element,
                        reason: format!("unknown ECP block '{}'", kind),
                    })
                }
            }
        };
        data.blocks.push(EcpBlock { l, terms: Vec::new() });
        current = Some((element, data.blocks.len() - 1));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const H_631G: &str = r#"
#  Basis set: 6-31G
BASIS "ao basis" SPHERICAL PRINT
#BASIS SET: (4s) -> [2s]
H    S
      0.1873113696E+02       0.3349460434E-01
      0.2825394365E+01       0.2347269535E+00
      0.6401216923E+00       0.8137573261E+00
H    S
      0.1612777588E+00       1.0000000
END
"#;

    const C_SP: &str = r#"
BASIS "ao basis" PRINT
C    S
 0.3047524880D+04  0.1834737132D-02
 0.4573695180D+03  0.1403732281D-01
C    SP
 0.7868272350D+01 -0.1193324198D+00  0.6899906659D-01
 0.1881288540D+01 -0.1608541517D+00  0.3164239610D+00
C    D
 0.8000000000D+00  1.0
END
"#;

    #[test]
    fn test_parse_h_631g() {
        let basis = parse_nwchem(H_631G).unwrap();
        let h = &basis["H"];
        assert_eq!(h.len(), 2);
        assert_eq!(h[0].l, 0);
        assert_eq!(h[0].nprim(), 3);
        assert_eq!(h[0].nctr(), 1);
        assert!((h[0].primitives[0][0] - 18.73113696).abs() < 1e-10);
        assert_eq!(h[1].primitives, vec![vec![0.1612777588, 1.0]]);
    }

    #[test]
    fn test_parse_sp_and_d_exponent_marker() {
        let basis = parse_nwchem(C_SP).unwrap();
        let c = &basis["C"];
        let ls: Vec<i32> = c.iter().map(|s| s.l).collect();
        assert_eq!(ls, vec![0, 0, 1, 2]);
        assert!((c[0].primitives[0][0] - 3047.52488).abs() < 1e-8);
        assert_eq!(c[1].primitives[1], vec![1.881288540, -0.1608541517]);
        assert_eq!(c[2].primitives[1], vec![1.881288540, 0.3164239610]);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_nwchem("H  X\n 1.0 1.0\n").is_err());
        assert!(parse_nwchem(" 1.0 1.0\n").is_err());
        assert!(parse_nwchem("H  S\n 1.0 abc\n").is_err());
        assert!(parse_nwchem("Xx S\n 1.0 1.0\n").is_err());
    }

    #[test]
    fn test_parse_ecp() {
        let text = r#"
ECP
Na nelec 10
Na ul
2      1.0000000              0.0000000
Na S
0      8.8886000            -18.3979179
2      2.0205000             -3.3368000
END
"#;
        let ecp = parse_nwchem_ecp(text).unwrap();
        let na = &ecp["Na"];
        assert_eq!(na.nelec, 10);
        assert_eq!(na.blocks.len(), 2);
        assert_eq!(na.blocks[0].l, ECP_LOCAL);
        assert_eq!(na.blocks[0].terms[2], vec![(1.0, 0.0)]);
        assert_eq!(na.blocks[1].l, 0);
        assert_eq!(na.blocks[1].terms[0], vec![(8.8886, -18.3979179)]);
        assert!(na.blocks[1].terms[1].is_empty());
        // orbital parser ignores the ECP section
        assert!(parse_nwchem(text).unwrap().is_empty());
    }
}

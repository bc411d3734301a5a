use once_cell::sync::Lazy;
use regex::Regex;

use super::pdb::{self, PdbAtom};
use super::{parse_leading_int, FormatError};
use crate::config::limits::HARTREE_TO_KJ_PER_MOL;

// SAFETY: literal pattern, validated by the unit tests below.
static FIRST_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[-+]?\d+\.?\d*").expect("first-number regex"));

/// Convert an XYZ structure to PDB text.
///
/// Only the first frame is read. Atom rows that are blank, have fewer than
/// four fields, or carry non-numeric coordinates are skipped; the serial
/// number still follows the row's declared position.
pub fn xyz_to_pdb(text: &str) -> Result<String, FormatError> {
    let lines: Vec<&str> = text.trim().split('\n').collect();
    if lines.len() < 3 {
        return Err(FormatError::XyzTooShort);
    }
    let declared = parse_leading_int(lines[0]).ok_or(FormatError::XyzBadAtomCount)?;
    let comment = lines[1].trim();

    let mut atoms = Vec::new();
    let count = usize::try_from(declared).unwrap_or(0);
    for i in 0..count {
        let Some(line) = lines.get(i + 2) else {
            break;
        };
        if let Some((element, x, y, z)) = parse_atom_row(line) {
            atoms.push(PdbAtom {
                serial: i + 1,
                name: element.to_string(),
                element: element.to_string(),
                x,
                y,
                z,
            });
        }
    }

    let remarks = vec![
        "XYZ file converted to PDB".to_string(),
        comment.to_string(),
    ];
    Ok(pdb::render(&remarks, None, &atoms))
}

fn parse_atom_row(line: &str) -> Option<(&str, f64, f64, f64)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 4 {
        return None;
    }
    let x = parts[1].parse::<f64>().ok()?;
    let y = parts[2].parse::<f64>().ok()?;
    let z = parts[3].parse::<f64>().ok()?;
    Some((parts[0], x, y, z))
}

/// One frame of a (possibly multi-frame) XYZ trajectory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XyzFrame {
    pub atom_count: usize,
    pub comment: String,
    /// The frame re-serialized as a standalone XYZ file.
    pub text: String,
}

/// Split a trajectory into frames. Stops at the first block whose count line
/// is not an integer or that is truncated.
pub fn xyz_frames(text: &str) -> Vec<XyzFrame> {
    let lines: Vec<&str> = text.lines().collect();
    let mut frames = Vec::new();
    let mut idx = 0;
    while idx < lines.len() {
        if lines[idx].trim().is_empty() {
            idx += 1;
            continue;
        }
        let Some(count) = parse_leading_int(lines[idx]).and_then(|n| usize::try_from(n).ok())
        else {
            break;
        };
        let end = idx + 2 + count;
        if end > lines.len() {
            break;
        }
        let comment = lines[idx + 1].trim().to_string();
        let mut text = lines[idx..end].join("\n");
        text.push('\n');
        frames.push(XyzFrame {
            atom_count: count,
            comment,
            text,
        });
        idx = end;
    }
    frames
}

/// First number on the comment line, read as hartree, in kJ/mol.
pub fn xyz_comment_energy(text: &str) -> Option<f64> {
    let lines: Vec<&str> = text.trim().split('\n').collect();
    let comment = lines.get(1)?;
    let found = FIRST_NUMBER.find(comment)?;
    let hartree = found.as_str().parse::<f64>().ok()?;
    Some(hartree * HARTREE_TO_KJ_PER_MOL)
}

/// `-38.25 kJ/mol` style label for [`xyz_comment_energy`].
pub fn format_energy(kj_per_mol: f64) -> String {
    format!("{kj_per_mol:.2} kJ/mol")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::samples::WATER_XYZ;

    #[test]
    fn water_converts_to_three_atoms() {
        let pdb = xyz_to_pdb(WATER_XYZ).expect("water converts");
        let lines: Vec<&str> = pdb.lines().collect();
        assert_eq!(lines[0], "REMARK   XYZ file converted to PDB");
        assert_eq!(lines[1], "REMARK   Water molecule");
        let atoms: Vec<&&str> = lines.iter().filter(|l| l.starts_with("ATOM")).collect();
        assert_eq!(atoms.len(), 3);
        assert!(atoms[1].contains("   0.75"), "row: {}", atoms[1]);
        assert_eq!(lines.last().copied(), Some("END"));
    }

    #[test]
    fn rejects_short_and_non_numeric_headers() {
        assert_eq!(xyz_to_pdb("1\nonly"), Err(FormatError::XyzTooShort));
        assert_eq!(
            xyz_to_pdb("abc\ncomment\nH 0 0 0"),
            Err(FormatError::XyzBadAtomCount)
        );
    }

    #[test]
    fn skips_bad_rows_but_keeps_declared_serials() {
        let text = "3\nc\nH 0 0 0\nH x y z\nO 1 1 1\n";
        let pdb = xyz_to_pdb(text).expect("converts");
        let atoms: Vec<&str> = pdb.lines().filter(|l| l.starts_with("ATOM")).collect();
        assert_eq!(atoms.len(), 2);
        assert!(atoms[1].starts_with("ATOM      3 O"));
    }

    #[test]
    fn declared_count_beyond_lines_stops_early() {
        let pdb = xyz_to_pdb("10\nc\nH 0 0 0").expect("converts");
        assert_eq!(pdb.lines().filter(|l| l.starts_with("ATOM")).count(), 1);
    }

    #[test]
    fn trajectory_frames_split() {
        let text = "1\nE=-0.5\nH 0 0 0\n2\nE=-1.0\nH 0 0 0\nH 0 0 1\n";
        let frames = xyz_frames(text);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].atom_count, 2);
        assert_eq!(frames[1].comment, "E=-1.0");
        assert_eq!(xyz_comment_energy(&frames[0].text), Some(-0.5 * HARTREE_TO_KJ_PER_MOL));
    }

    #[test]
    fn energy_label_uses_two_decimals() {
        let kj = xyz_comment_energy("2\n-0.014567 hartree\nH 0 0 0\nH 0 0 1").expect("energy");
        assert_eq!(format_energy(kj), "-38.25 kJ/mol");
        assert_eq!(xyz_comment_energy("1\nno energy\nH 0 0 0"), None);
    }
}

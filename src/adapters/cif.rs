use super::pdb::{self, PdbAtom, UnitCell};
use super::FormatError;

/// Convert a CIF structure to PDB text (asymmetric unit only).
///
/// Fractional coordinates are scaled by the cell lengths alone; cell angles
/// are recorded in `CRYST1` but not applied, so non-orthogonal cells come out
/// skewed.
pub fn cif_to_pdb(text: &str) -> Result<String, FormatError> {
    let mut cell = UnitCell::default();
    let mut atoms: Vec<PdbAtom> = Vec::new();
    let mut in_atom_loop = false;

    for raw in text.trim().lines() {
        let line = raw.trim();

        if let Some(value) = tag_value(line, "_cell_length_a") {
            cell.a = value;
        } else if let Some(value) = tag_value(line, "_cell_length_b") {
            cell.b = value;
        } else if let Some(value) = tag_value(line, "_cell_length_c") {
            cell.c = value;
        } else if let Some(value) = tag_value(line, "_cell_angle_alpha") {
            cell.alpha = value;
        } else if let Some(value) = tag_value(line, "_cell_angle_beta") {
            cell.beta = value;
        } else if let Some(value) = tag_value(line, "_cell_angle_gamma") {
            cell.gamma = value;
        }

        if line.starts_with("_atom_site_label") {
            in_atom_loop = true;
            continue;
        }
        if !in_atom_loop || line.is_empty() || line.starts_with('_') {
            continue;
        }
        if line.starts_with("loop_") || line.starts_with("data_") {
            in_atom_loop = false;
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 5 {
            continue;
        }
        let (Some(fx), Some(fy), Some(fz)) = (
            cif_number(parts[2]),
            cif_number(parts[3]),
            cif_number(parts[4]),
        ) else {
            continue;
        };
        atoms.push(PdbAtom {
            serial: atoms.len() + 1,
            name: parts[1].to_string(),
            element: parts[1].to_string(),
            x: fx * cell.a,
            y: fy * cell.b,
            z: fz * cell.c,
        });
    }

    if atoms.is_empty() {
        return Err(FormatError::CifNoAtoms);
    }

    let remarks = vec!["CIF file converted to PDB (asymmetric unit only)".to_string()];
    Ok(pdb::render(&remarks, Some(&cell), &atoms))
}

fn tag_value(line: &str, tag: &str) -> Option<f64> {
    let rest = line.strip_prefix(tag)?;
    rest.split_whitespace().next().and_then(cif_number)
}

/// CIF numbers may carry a standard uncertainty suffix: `5.582(2)`.
fn cif_number(raw: &str) -> Option<f64> {
    let value = raw.split_once('(').map(|(v, _)| v).unwrap_or(raw);
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

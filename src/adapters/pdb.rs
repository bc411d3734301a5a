//! Fixed-width PDB record writer shared by the structure converters.

use std::fmt::Write as _;

/// One atom ready for an `ATOM` record.
#[derive(Debug, Clone, PartialEq)]
pub struct PdbAtom {
    pub serial: usize,
    pub name: String,
    pub element: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Unit cell carried by a `CRYST1` record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitCell {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl Default for UnitCell {
    fn default() -> Self {
        Self {
            a: 1.0,
            b: 1.0,
            c: 1.0,
            alpha: 90.0,
            beta: 90.0,
            gamma: 90.0,
        }
    }
}

pub const RESIDUE_NAME: &str = "MOL";
pub const CHAIN_ID: char = 'A';
pub const RESIDUE_SEQ: u32 = 1;

/// `ATOM` record: serial, atom name, residue `MOL`, chain `A`, residue 1,
/// coordinates 8.3, occupancy 1.00, temperature factor 0.00, element.
pub fn atom_record(atom: &PdbAtom) -> String {
    let name: String = atom.name.chars().take(4).collect();
    format!(
        "ATOM  {serial:>5} {name:<4} {res:<3} {chain}{seq:>4}    {x:>8.3}{y:>8.3}{z:>8.3}  1.00{temp:>6}{element:>12}",
        serial = atom.serial,
        name = name,
        res = RESIDUE_NAME,
        chain = CHAIN_ID,
        seq = RESIDUE_SEQ,
        x = atom.x,
        y = atom.y,
        z = atom.z,
        temp = "0.00",
        element = atom.element,
    )
}

pub fn cryst1_record(cell: &UnitCell) -> String {
    format!(
        "CRYST1{:>9.3}{:>9.3}{:>9.3}{:>7.2}{:>7.2}{:>7.2} P 1           1",
        cell.a, cell.b, cell.c, cell.alpha, cell.beta, cell.gamma
    )
}

/// Assemble remarks, an optional cell, atoms and the `END` terminator.
pub fn render(remarks: &[String], cell: Option<&UnitCell>, atoms: &[PdbAtom]) -> String {
    let mut out = String::new();
    for remark in remarks {
        let _ = writeln!(out, "REMARK   {remark}");
    }
    if let Some(cell) = cell {
        let _ = writeln!(out, "{}", cryst1_record(cell));
    }
    for atom in atoms {
        let _ = writeln!(out, "{}", atom_record(atom));
    }
    out.push_str("END");
    out
}

//! Format adapters on the bundled samples and on hand-written grids.

use occ_playground::adapters::{cif_to_pdb, cube_range, xyz_to_pdb, FormatError};
use occ_playground::samples::{UREA_CIF, WATER_XYZ};

#[test]
fn water_sample_converts_to_three_atoms_and_end() {
    let pdb = xyz_to_pdb(WATER_XYZ).expect("water converts");
    let atoms = pdb.lines().filter(|l| l.starts_with("ATOM")).count();
    assert_eq!(atoms, 3);
    assert_eq!(pdb.lines().last(), Some("END"));
    assert!(pdb.starts_with("REMARK   XYZ file converted to PDB"));
}

#[test]
fn urea_sample_carries_its_cell() {
    let pdb = cif_to_pdb(UREA_CIF).expect("urea converts");
    let cryst = pdb.lines().find(|l| l.starts_with("CRYST1")).expect("CRYST1");
    assert!(cryst.contains("5.582"));
    assert!(pdb.lines().filter(|l| l.starts_with("ATOM")).count() > 0);
}

#[test]
fn malformed_inputs_are_rejected() {
    assert!(matches!(xyz_to_pdb("3\nonly two"), Err(FormatError::XyzTooShort)));
    assert!(matches!(xyz_to_pdb("x\ncomment\nH 0 0 0"), Err(FormatError::XyzBadAtomCount)));
    assert!(matches!(cif_to_pdb("data_empty\n_cell_length_a 1\n"), Err(FormatError::CifNoAtoms)));
}

#[test]
fn non_negative_cube_keeps_min_above_floor() {
    let cube = "\
density
comment
    1    0.000000    0.000000    0.000000
    2    0.200000    0.000000    0.000000
    2    0.000000    0.200000    0.000000
    2    0.000000    0.000000    0.200000
    1    0.000000    0.000000    0.000000    0.000000
  0.00000  0.00000  0.00100  0.00200
  0.00300  0.00400  0.00500  0.00600
";
    let range = cube_range(cube);
    assert!(range.min >= 1e-5, "min {}", range.min);
    assert!(range.max <= 1.0);
    assert!(range.max > range.min);
}

#[test]
fn short_cube_uses_fallback_range() {
    let range = cube_range("a\nb\nc\n");
    assert_eq!((range.min, range.max), (1e-5, 0.5));
}

//! Pure converters from `occ` output formats to what a molecular viewer
//! consumes: PDB text for structures, bounds and a value range for cube grids.
//!
//! Every function here is deterministic and side-effect free.

pub mod cif;
pub mod cube;
pub mod pdb;
pub mod xyz;

pub use cif::cif_to_pdb;
pub use cube::{cube_bounds, cube_range, CubeBounds, ValueRange};
pub use pdb::{PdbAtom, UnitCell};
pub use xyz::{xyz_comment_energy, xyz_frames, xyz_to_pdb, XyzFrame};

use crate::config::errors::{ERR_CIF_FORMAT, ERR_XYZ_FORMAT};

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("Invalid XYZ file: too few lines")]
    XyzTooShort,
    #[error("Invalid XYZ file: first line must be number of atoms")]
    XyzBadAtomCount,
    #[error("No atoms found in CIF file")]
    CifNoAtoms,
}

impl FormatError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::XyzTooShort | Self::XyzBadAtomCount => ERR_XYZ_FORMAT,
            Self::CifNoAtoms => ERR_CIF_FORMAT,
        }
    }
}

/// Structure/grid formats a viewer knows how to prepare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureFormat {
    Xyz,
    Cif,
    Pdb,
    Cube,
}

impl StructureFormat {
    /// Pick the format from a file extension (case-insensitive).
    pub fn from_path(path: &str) -> Option<Self> {
        let ext = path.rsplit_once('.')?.1.to_ascii_lowercase();
        match ext.as_str() {
            "xyz" => Some(Self::Xyz),
            "cif" => Some(Self::Cif),
            "pdb" => Some(Self::Pdb),
            "cube" | "cub" => Some(Self::Cube),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Xyz => "xyz",
            Self::Cif => "cif",
            Self::Pdb => "pdb",
            Self::Cube => "cube",
        }
    }

    /// Convert structure text to PDB. PDB passes through; cube files are
    /// grids, not structures, and pass through unchanged as well.
    pub fn to_pdb(self, text: &str) -> Result<String, FormatError> {
        match self {
            Self::Xyz => xyz_to_pdb(text),
            Self::Cif => cif_to_pdb(text),
            Self::Pdb | Self::Cube => Ok(text.to_string()),
        }
    }
}

/// Leading-integer parse: `"3 atoms"` -> 3, `"x"` -> None.
pub(crate) fn parse_leading_int(raw: &str) -> Option<i64> {
    let s = raw.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'-') | Some(b'+')) {
        end = 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end == digits_start {
        return None;
    }
    s[..end].parse().ok()
}

//! Sample structures seeded into every fresh terminal filesystem.

pub const WATER_XYZ_PATH: &str = "/water.xyz";
pub const UREA_CIF_PATH: &str = "/urea.cif";

pub const WATER_XYZ: &str = "3
Water molecule
O          0.00000        0.00000        0.11779
H          0.00000        0.75545       -0.47116
H          0.00000       -0.75545       -0.47116
";

pub const UREA_CIF: &str = "data_urea
_symmetry_space_group_name_H-M 'P -4 21 m'
_symmetry_Int_Tables_number 113
loop_
_symmetry_equiv_pos_as_xyz
x,y,z
-x,-y,z
y,-x,-z
-y,x,-z
1/2+x,1/2-y,-z
1/2-x,1/2+y,-z
1/2+y,1/2+x,z
1/2-y,1/2-x,z
_cell_length_a 5.582
_cell_length_b 5.582
_cell_length_c 4.686
_cell_angle_alpha 90
_cell_angle_beta 90
_cell_angle_gamma 90
_cell_volume 146.01
_cell_formula_units_Z 2
loop_
_atom_site_label
_atom_site_type_symbol
_atom_site_fract_x
_atom_site_fract_y
_atom_site_fract_z
C1 C 0.0000 0.5000 0.3272
H1 H 0.2690 0.7690 0.2790
H2 H 0.1420 0.6420 -0.0280
N1 N 0.1455 0.6455 0.1800
O1 O 0.0000 0.5000 0.5966
N1B N -0.1455 0.3545 0.1800
H1B H -0.2690 0.2310 0.2790
H2B H -0.1420 0.3580 -0.0280
";

/// `(path, contents)` pairs, in seeding order.
pub fn sample_files() -> [(&'static str, &'static str); 2] {
    [(WATER_XYZ_PATH, WATER_XYZ), (UREA_CIF_PATH, UREA_CIF)]
}

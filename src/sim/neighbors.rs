use rkyv::{Archive, Deserialize, Serialize};

use super::cell::Lattice;

/// The stencil used for neighbor enumeration, chosen once at
/// construction.
#[derive(Archive, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
#[archive(check_bytes)]
pub enum Neighborhood {
    /// All 26 cells of the surrounding 3x3x3 block.
    Moore,
    /// The 6 face-adjacent cells (Manhattan distance 1).
    VonNeumann,
}

/// Populates every cell's neighbor list. Periodic axes wrap modulo
/// their size; on non-periodic axes an out-of-range neighbor is simply
/// omitted, so edge cells legitimately end up with fewer neighbors.
///
/// The x axis wraps over the padded slab width, not the global lattice
/// width: ghost rows take part like any other row.
pub fn link_neighbors(lattice: &mut Lattice, method: Neighborhood, periodic: bool) {
    let (x_size, y_size, z_size) = lattice.dims();
    for x in 0..x_size {
        for y in 0..y_size {
            for z in 0..z_size {
                for dx in -1isize..=1 {
                    for dy in -1isize..=1 {
                        for dz in -1isize..=1 {
                            if dx == 0 && dy == 0 && dz == 0 {
                                continue;
                            }
                            if method == Neighborhood::VonNeumann
                                && dx.abs() + dy.abs() + dz.abs() != 1
                            {
                                continue;
                            }
                            let resolved = (
                                resolve(x as isize + dx, x_size, periodic),
                                resolve(y as isize + dy, y_size, periodic),
                                resolve(z as isize + dz, z_size, periodic),
                            );
                            if let (Some(nx), Some(ny), Some(nz)) = resolved {
                                lattice.cell_mut(x, y, z).add_neighbor(nx, ny, nz);
                            }
                        }
                    }
                }
            }
        }
    }
}

fn resolve(coord: isize, size: usize, periodic: bool) -> Option<usize> {
    if (0..size as isize).contains(&coord) {
        Some(coord as usize)
    } else if periodic {
        Some(coord.rem_euclid(size as isize) as usize)
    } else {
        None
    }
}

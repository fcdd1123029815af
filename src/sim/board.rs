use std::{fs, path::Path};

use super::error::Error;

/// The assembled global lattice: every rank's owned slab concatenated
/// in rank order, x-major.
#[derive(Clone, Debug, PartialEq)]
pub struct Board {
    x_size: usize,
    y_size: usize,
    z_size: usize,
    cells: Vec<i32>,
}

impl Board {
    pub fn new(x_size: usize, y_size: usize, z_size: usize, cells: Vec<i32>) -> Self {
        debug_assert_eq!(cells.len(), x_size * y_size * z_size);
        Self {
            x_size,
            y_size,
            z_size,
            cells,
        }
    }

    pub fn dims(&self) -> (usize, usize, usize) {
        (self.x_size, self.y_size, self.z_size)
    }

    pub fn state_at(&self, x: usize, y: usize, z: usize) -> i32 {
        self.cells[(x * self.y_size + y) * self.z_size + z]
    }

    pub fn cells(&self) -> &[i32] {
        &self.cells
    }

    /// Writes `XxYxZ` on the first line and the comma-separated labels
    /// on the second, x-major. Every label is followed by a comma,
    /// including the last.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let mut out = String::with_capacity(self.cells.len() * 3 + 16);
        out.push_str(&format!("{}x{}x{}\n", self.x_size, self.y_size, self.z_size));
        for state in &self.cells {
            out.push_str(&state.to_string());
            out.push(',');
        }
        out.push('\n');
        fs::write(path, out)?;
        Ok(())
    }

    /// Reads a board written by [`Board::write_to`].
    pub fn read_from(path: impl AsRef<Path>) -> Result<Self, Error> {
        let text = fs::read_to_string(path)?;
        let mut lines = text.lines();
        let header = lines
            .next()
            .ok_or_else(|| Error::MalformedBoard("missing size header".into()))?;
        let dims = header
            .split('x')
            .map(str::parse)
            .collect::<Result<Vec<usize>, _>>()
            .map_err(|_| Error::MalformedBoard(format!("bad size header '{header}'")))?;
        let &[x_size, y_size, z_size] = dims.as_slice() else {
            return Err(Error::MalformedBoard(format!(
                "expected three dimensions in '{header}'"
            )));
        };
        let mut cells = Vec::with_capacity(x_size * y_size * z_size);
        for token in lines.next().unwrap_or("").split(',') {
            let token = token.trim();
            if token.is_empty() {
                // the writer leaves a trailing comma
                continue;
            }
            cells.push(
                token
                    .parse()
                    .map_err(|_| Error::MalformedBoard(format!("bad label '{token}'")))?,
            );
        }
        if cells.len() != x_size * y_size * z_size {
            return Err(Error::MalformedBoard(format!(
                "expected {} labels, found {}",
                x_size * y_size * z_size,
                cells.len()
            )));
        }
        Ok(Self {
            x_size,
            y_size,
            z_size,
            cells,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("polygrain-{}-{}", std::process::id(), name))
    }

    #[test]
    fn file_round_trip() {
        let board = Board::new(2, 2, 1, vec![1, 1, 2, 2]);
        let path = scratch_path("round-trip.txt");
        board.write_to(&path).unwrap();
        let read = Board::read_from(&path).unwrap();
        fs::remove_file(&path).ok();
        assert_eq!(read, board);
    }

    #[test]
    fn written_form_is_header_then_labels() {
        let board = Board::new(1, 2, 1, vec![3, 4]);
        let path = scratch_path("format.txt");
        board.write_to(&path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        fs::remove_file(&path).ok();
        assert_eq!(text, "1x2x1\n3,4,\n");
    }

    #[test]
    fn label_count_mismatch_is_rejected() {
        let path = scratch_path("short.txt");
        fs::write(&path, "2x2x2\n1,2,3,\n").unwrap();
        let result = Board::read_from(&path);
        fs::remove_file(&path).ok();
        assert!(matches!(result, Err(Error::MalformedBoard(_))));
    }

    #[test]
    fn indexing_is_x_major() {
        let board = Board::new(2, 2, 2, vec![0, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(board.state_at(0, 0, 1), 1);
        assert_eq!(board.state_at(0, 1, 0), 2);
        assert_eq!(board.state_at(1, 0, 0), 4);
    }
}

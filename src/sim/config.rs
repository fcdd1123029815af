use std::{fs, path::Path, str::FromStr};

use rkyv::{Archive, Deserialize, Serialize};
use tracing::warn;
use typed_builder::TypedBuilder;

use super::{error::Error, neighbors::Neighborhood};

/// Global simulation parameters as read from the configuration file.
#[derive(Clone, Debug, PartialEq)]
pub struct SimConfig {
    pub periodic: bool,
    pub method: Neighborhood,
    pub x_size: usize,
    pub y_size: usize,
    pub z_size: usize,
    pub random_seeds: usize,
    pub mc_iterations: usize,
    pub mc_kt: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            periodic: false,
            method: Neighborhood::Moore,
            x_size: 10,
            y_size: 10,
            z_size: 10,
            random_seeds: 10,
            mc_iterations: 0,
            mc_kt: 0.6,
        }
    }
}

impl SimConfig {
    pub fn read_from(path: impl AsRef<Path>) -> Result<Self, Error> {
        let text = fs::read_to_string(path)?;
        Ok(Self::parse(&text))
    }

    /// Parses `key=value` lines. Unknown keys and unparseable values
    /// are reported and the previous value kept; any `method` other
    /// than `Moore` selects the Von Neumann stencil.
    pub fn parse(text: &str) -> Self {
        let mut config = Self::default();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                warn!("config '{}' not supported", line);
                continue;
            };
            match key {
                "periodic" => match value {
                    "yes" => config.periodic = true,
                    "no" => config.periodic = false,
                    other => {
                        warn!("config value '{}' for 'periodic' not supported", other)
                    }
                },
                "method" => {
                    config.method = if value == "Moore" {
                        Neighborhood::Moore
                    } else {
                        Neighborhood::VonNeumann
                    };
                }
                "x_size" => parse_into(&mut config.x_size, key, value),
                "y_size" => parse_into(&mut config.y_size, key, value),
                "z_size" => parse_into(&mut config.z_size, key, value),
                "random_seeds" => parse_into(&mut config.random_seeds, key, value),
                "MC_iterations" => parse_into(&mut config.mc_iterations, key, value),
                "MC_kt" => parse_into(&mut config.mc_kt, key, value),
                _ => warn!("config '{}' not supported", line),
            }
        }
        config
    }

    /// Startup validation. A zero-sized axis cannot host a slab, and
    /// catching it here beats an index panic mid-sweep.
    pub fn validate(&self) -> Result<(), Error> {
        if self.x_size == 0 || self.y_size == 0 || self.z_size == 0 {
            return Err(Error::InvalidConfig(format!(
                "lattice dimensions must be positive, got {}x{}x{}",
                self.x_size, self.y_size, self.z_size
            )));
        }
        Ok(())
    }
}

fn parse_into<T: FromStr>(slot: &mut T, key: &str, value: &str) {
    match value.parse() {
        Ok(parsed) => *slot = parsed,
        Err(_) => warn!("config value '{}' for '{}' not supported", value, key),
    }
}

/// Per-rank parameters scattered by rank 0 before any worker builds its
/// slab. Label ranges are disjoint across ranks: this rank labels its
/// seeds from `seed_counter_start + 1` upward, and `max_seeds` is the
/// global total so vote tallies are sized identically everywhere.
#[derive(Archive, Serialize, Deserialize, TypedBuilder, Clone, Debug)]
#[archive(check_bytes)]
pub struct RankConfig {
    pub periodic: bool,
    pub method: Neighborhood,
    /// Owned slab width, before ghost padding.
    pub x_size: u32,
    pub y_size: u32,
    pub z_size: u32,
    /// How many seeds this rank scatters.
    pub seed_count: u32,
    pub seed_counter_start: u32,
    pub max_seeds: u32,
    pub mc_iterations: u32,
    /// Temperature, carried from the configuration. The relaxation
    /// acceptance rule is strictly "not worse", so the value currently
    /// has no effect on it.
    pub mc_kt: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_reference_values() {
        let config = SimConfig::default();
        assert!(!config.periodic);
        assert_eq!(config.method, Neighborhood::Moore);
        assert_eq!(
            (config.x_size, config.y_size, config.z_size),
            (10, 10, 10)
        );
        assert_eq!(config.random_seeds, 10);
        assert_eq!(config.mc_iterations, 0);
        assert_eq!(config.mc_kt, 0.6);
    }

    #[test]
    fn parses_a_full_file() {
        let config = SimConfig::parse(
            "periodic=yes\nmethod=VonNeumann\nx_size=32\ny_size=16\nz_size=8\nrandom_seeds=40\nMC_iterations=5\nMC_kt=0.1\n",
        );
        assert!(config.periodic);
        assert_eq!(config.method, Neighborhood::VonNeumann);
        assert_eq!((config.x_size, config.y_size, config.z_size), (32, 16, 8));
        assert_eq!(config.random_seeds, 40);
        assert_eq!(config.mc_iterations, 5);
        assert_eq!(config.mc_kt, 0.1);
    }

    #[test]
    fn bad_lines_keep_prior_values() {
        let config = SimConfig::parse(
            "x_size=24\nx_size=many\nperiodic=maybe\ngravity=9.8\nnot a pair\n",
        );
        assert_eq!(config.x_size, 24);
        assert!(!config.periodic);
    }

    #[test]
    fn any_other_method_means_von_neumann() {
        assert_eq!(
            SimConfig::parse("method=Margolus").method,
            Neighborhood::VonNeumann
        );
        assert_eq!(SimConfig::parse("method=Moore").method, Neighborhood::Moore);
    }

    #[test]
    fn zero_axes_are_fatal() {
        let mut config = SimConfig::default();
        config.y_size = 0;
        assert!(config.validate().is_err());
    }
}

use std::path::PathBuf;

use clap::Parser;

use crate::error::Error;
use crate::error::Result;
use crate::flags::SimulationFlags;

#[derive(Parser, Debug, Clone)]
#[command(name = "wfbuffered")]
#[command(about = "Wright-Fisher simulation recording a tree sequence, with optional edge buffering", long_about = None)]
#[command(version)]
pub struct CommandLineOptions {
    /// Diploid population size
    #[arg(short = 'N', long = "popsize", value_name = "INT", default_value_t = 1000)]
    pub popsize: u32,

    /// Survival probability
    #[arg(long, value_name = "FLOAT", default_value_t = 0.0)]
    pub psurvival: f64,

    /// Number of time steps to evolve
    #[arg(long, value_name = "INT", default_value_t = 1000)]
    pub nsteps: u32,

    /// Time steps between simplifications
    #[arg(long = "simplify", value_name = "INT", default_value_t = 100)]
    pub simplification_interval: u32,

    /// Scaled recombination rate, 4Nr
    #[arg(long, value_name = "FLOAT", default_value_t = 0.0)]
    pub rho: f64,

    /// Output file name
    #[arg(long, value_name = "FILE", default_value = "treefile.trees")]
    pub treefile: PathBuf,

    /// Use the edge buffering algorithm instead of sort and simplify
    #[arg(long = "buffer")]
    pub buffer_new_edges: bool,

    /// Sort edges natively instead of with tskit
    #[arg(long)]
    pub native_sort: bool,

    /// Sort edges in parallel (implies --native-sort)
    #[arg(long)]
    pub parallel_sort: bool,

    /// Run tskit's integrity checks after every stitch
    #[arg(long)]
    pub validate: bool,

    /// Random number seed
    #[arg(long, value_name = "INT", default_value_t = 42)]
    pub seed: u64,

    /// Verbosity (-v = debug, -vv = trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Default for CommandLineOptions {
    fn default() -> Self {
        Self {
            popsize: 1000,
            psurvival: 0.,
            nsteps: 1000,
            simplification_interval: 100,
            rho: 0.,
            treefile: PathBuf::from("treefile.trees"),
            buffer_new_edges: false,
            native_sort: false,
            parallel_sort: false,
            validate: false,
            seed: 42,
            verbose: 0,
        }
    }
}

/// Everything the driver needs to run.
#[derive(Debug, Clone, Copy)]
pub struct SimulationParameters {
    pub popsize: u32,
    pub psurvival: f64,
    pub nsteps: u32,
    pub simplification_interval: u32,
    pub rho: f64,
    pub seed: u64,
    pub flags: SimulationFlags,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            popsize: 1000,
            psurvival: 0.,
            nsteps: 1000,
            simplification_interval: 100,
            rho: 0.,
            seed: 42,
            flags: SimulationFlags::default(),
        }
    }
}

impl SimulationParameters {
    pub fn validate(&self) -> Result<()> {
        if self.popsize == 0 {
            return Err(Error::InvalidParameter(
                "population size must be > 0".to_owned(),
            ));
        }
        if !self.psurvival.is_finite() || self.psurvival < 0. || self.psurvival >= 1. {
            return Err(Error::InvalidParameter(
                "psurvival must be 0.0 <= p < 1.0".to_owned(),
            ));
        }
        if self.simplification_interval == 0 {
            return Err(Error::InvalidParameter(
                "simplification interval must be > 0".to_owned(),
            ));
        }
        if !self.rho.is_finite() || self.rho < 0. {
            return Err(Error::InvalidParameter("rho must be >= 0.0".to_owned()));
        }
        if self.rho > 0. {
            return Err(Error::InvalidParameter(
                "recombination is not supported: rho must be 0.0".to_owned(),
            ));
        }
        Ok(())
    }
}

impl CommandLineOptions {
    pub fn validate(&self) -> Result<()> {
        if self.treefile.as_os_str().is_empty() {
            return Err(Error::InvalidParameter(
                "treefile must not be an empty string".to_owned(),
            ));
        }
        self.parameters().validate()
    }

    pub fn flags(&self) -> SimulationFlags {
        let mut flags = SimulationFlags::default();
        if self.buffer_new_edges {
            flags = flags.with_buffered_edges();
        }
        if self.native_sort {
            flags = flags.with_native_sort();
        }
        if self.parallel_sort {
            flags = flags.with_parallel_sort();
        }
        if self.validate {
            flags = flags.with_stitch_validation();
        }
        flags
    }

    pub fn parameters(&self) -> SimulationParameters {
        SimulationParameters {
            popsize: self.popsize,
            psurvival: self.psurvival,
            nsteps: self.nsteps,
            simplification_interval: self.simplification_interval,
            rho: self.rho,
            seed: self.seed,
            flags: self.flags(),
        }
    }
}

#[cfg(test)]
mod test_options {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let options = CommandLineOptions::parse_from(["wfbuffered"]);
        assert!(options.validate().is_ok());
        assert_eq!(options.popsize, 1000);
        assert_eq!(options.simplification_interval, 100);
        assert_eq!(options.treefile, PathBuf::from("treefile.trees"));
        assert!(!options.flags().buffer_new_edges());
        assert!(SimulationParameters::default().validate().is_ok());
    }

    #[test]
    fn test_parse_flags() {
        let options = CommandLineOptions::parse_from([
            "wfbuffered",
            "-N",
            "10",
            "--psurvival",
            "0.5",
            "--simplify",
            "7",
            "--buffer",
            "--parallel-sort",
            "--seed",
            "101",
        ]);
        assert!(options.validate().is_ok());
        let params = options.parameters();
        assert_eq!(params.popsize, 10);
        assert_eq!(params.psurvival, 0.5);
        assert_eq!(params.simplification_interval, 7);
        assert_eq!(params.seed, 101);
        assert!(params.flags.buffer_new_edges());
        assert!(params.flags.native_sort());
        assert!(params.flags.parallel_sort());
        assert!(!params.flags.validate_stitch());
    }

    #[test]
    fn test_invalid_parameters() {
        let valid = CommandLineOptions::default();
        assert!(valid.validate().is_ok());
        let cases = [
            CommandLineOptions {
                popsize: 0,
                ..valid.clone()
            },
            CommandLineOptions {
                psurvival: 1.0,
                ..valid.clone()
            },
            CommandLineOptions {
                psurvival: -0.1,
                ..valid.clone()
            },
            CommandLineOptions {
                psurvival: f64::NAN,
                ..valid.clone()
            },
            CommandLineOptions {
                rho: -1.0,
                ..valid.clone()
            },
            CommandLineOptions {
                rho: f64::INFINITY,
                ..valid.clone()
            },
            CommandLineOptions {
                rho: 1.0,
                ..valid.clone()
            },
            CommandLineOptions {
                simplification_interval: 0,
                ..valid.clone()
            },
            CommandLineOptions {
                treefile: PathBuf::new(),
                ..valid.clone()
            },
        ];
        for options in cases {
            assert!(matches!(
                options.validate(),
                Err(Error::InvalidParameter(_))
            ));
        }
    }
}

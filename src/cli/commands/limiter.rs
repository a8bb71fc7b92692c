use anyhow::{Result, bail};
use clap::{Arg, ArgMatches, Command, builder::BoolishValueParser};

pub const ARG_LIMITER_RPS: &str = "limiter-rps";
pub const ARG_LIMITER_BURST: &str = "limiter-burst";
pub const ARG_LIMITER_ENABLED: &str = "limiter-enabled";

#[derive(Debug, Clone, Copy)]
pub struct Options {
    pub enabled: bool,
    pub rps: f64,
    pub burst: u32,
}

impl Options {
    /// Parse admission limiter arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the rate is not a positive number or the burst is
    /// zero.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let enabled = matches
            .get_one::<bool>(ARG_LIMITER_ENABLED)
            .copied()
            .unwrap_or(true);
        let rps = matches.get_one::<f64>(ARG_LIMITER_RPS).copied().unwrap_or(3.0);
        let burst = matches
            .get_one::<u32>(ARG_LIMITER_BURST)
            .copied()
            .unwrap_or(6);

        if !(rps.is_finite() && rps > 0.0) {
            bail!("--{ARG_LIMITER_RPS} must be a positive number, got {rps}");
        }
        if burst == 0 {
            bail!("--{ARG_LIMITER_BURST} must be greater than 0");
        }

        Ok(Self {
            enabled,
            rps,
            burst,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_LIMITER_RPS)
                .long(ARG_LIMITER_RPS)
                .help("Requests per second refilled into the admission bucket")
                .env("WORKOUT_TRACKER_LIMITER_RPS")
                .default_value("3")
                .value_parser(clap::value_parser!(f64)),
        )
        .arg(
            Arg::new(ARG_LIMITER_BURST)
                .long(ARG_LIMITER_BURST)
                .help("Admission bucket capacity")
                .env("WORKOUT_TRACKER_LIMITER_BURST")
                .default_value("6")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_LIMITER_ENABLED)
                .long(ARG_LIMITER_ENABLED)
                .help("Enable the admission limiter (true/false)")
                .env("WORKOUT_TRACKER_LIMITER_ENABLED")
                .default_value("true")
                .value_parser(BoolishValueParser::new()),
        )
}

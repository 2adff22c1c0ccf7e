use crate::poller::AdaptivePoller;
use clap::Args;
use std::time::Duration;

/// Log polling options. A front end flattens this into its own parser with
/// `#[command(flatten)]`.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct PollArgs {
    /// Base log poll interval in seconds, used while API quota is plentiful
    #[arg(long = "poll-interval", default_value_t = 2, value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_interval: u64,

    /// Longest log poll interval in seconds, used when API quota runs low
    #[arg(long = "max-poll-interval", default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    pub max_poll_interval: u64,

    /// Enable verbose logging to $XDG_STATE_HOME/<app>/debug.log
    #[arg(long)]
    pub verbose: bool,
}

impl PollArgs {
    pub fn poller(&self) -> AdaptivePoller {
        AdaptivePoller::new(
            Duration::from_secs(self.poll_interval),
            Duration::from_secs(self.max_poll_interval),
        )
    }
}

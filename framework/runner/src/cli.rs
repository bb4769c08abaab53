use crate::executor::StepFailurePolicy;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(about, long_about = None)]
pub struct SquallCli {
    /// Prefix used to derive a unique name for each run in a batch
    #[clap(long, default_value = "run")]
    pub run_prefix: String,

    /// The number of runs to drive concurrently
    #[clap(long, default_value = "1")]
    pub runs: usize,

    /// The number of trading rounds each game script plays after the join round
    #[clap(long, default_value = "2")]
    pub rounds: usize,

    /// What to do when a single step submission fails. Either `skip` to leave the response empty
    /// and move on, or `retry:<attempts>` to retry the same step in place before skipping it.
    ///
    /// Either way the script keeps running; a failed step never aborts the whole game.
    #[clap(long, default_value = "skip", value_parser = parse_step_policy)]
    pub step_policy: StepFailurePolicy,

    /// The number of terms an alliance remains active for
    #[clap(long, default_value = "3")]
    pub alliance_lifespan: u32,

    /// Do not create alliances during runs
    #[clap(long, default_value = "false")]
    pub no_alliance: bool,

    /// The number of items to publish in the bulk workload after each game script. Zero disables
    /// the bulk workload.
    #[clap(long, default_value = "0")]
    pub bulk_items: usize,
}

fn parse_step_policy(s: &str) -> anyhow::Result<StepFailurePolicy> {
    match s.split_once(':') {
        None if s == "skip" => Ok(StepFailurePolicy::Skip),
        Some(("retry", attempts)) => {
            let attempts = attempts
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid retry attempt count: {attempts}"))?;
            Ok(StepFailurePolicy::RetryInPlace { attempts })
        }
        _ => Err(anyhow::anyhow!(
            "Unknown step policy `{s}`, expected `skip` or `retry:<attempts>`"
        )),
    }
}

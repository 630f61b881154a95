use std::panic::{self, AssertUnwindSafe};

use clap::Parser;
use graphit_template::{
    app,
    config::{AppConfig, Cli},
    logging,
};
use log::error;

fn main() {
    let config = AppConfig::from(Cli::parse());
    logging::init(config.verbose);

    match panic::catch_unwind(AssertUnwindSafe(|| app::run(&config))) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            error!("application threw an error");
            error!("{err}");
            error!("application cannot continue");
        }
        Err(_) => error!("application panicked"),
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tracing::error;

use carf::config::Config;

#[tokio::main]
async fn main() {
    let config = Config::parse();

    if let Err(e) = config.validate() {
        eprintln!("error: {e}");
        std::process::exit(2);
    }

    carf::run::init_tracing(&config);

    if let Err(e) = carf::run::run(config).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}

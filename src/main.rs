#![cfg(not(tarpaulin_include))]

use sleepwatch::Config;
use std::env;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut config = Config::from_env();

    // Optional positional override: `dashboard [api_base_url]`
    let args: Vec<String> = env::args().collect();
    if args.len() >= 2 {
        config.api_base_url = args[1].clone();
    }

    sleepwatch::app::run(config).await
}

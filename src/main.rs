use clap::Parser;
use docker_stream::cli::{Args, Runner};
use docker_stream::logging;
use std::process;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    logging::init(args.verbose, args.quiet);

    let runner = match Runner::new(args) {
        Ok(runner) => runner,
        Err(e) => {
            eprintln!("❌ {}", e);
            process::exit(2);
        }
    };

    if let Err(e) = runner.run().await {
        eprintln!("❌ {}", e);
        process::exit(1);
    }
}

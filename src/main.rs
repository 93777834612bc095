use clap::Parser;
use log::info;

use local_run_ci::cli::{parse_exit_code, Cli};
use local_run_ci::output::{self, report_failure};

#[tokio::main]
async fn main() {
    env_logger::init();

    output::print_banner();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = parse_exit_code(&err);
            let _ = err.print();
            std::process::exit(code);
        }
    };
    info!("Starting local-run-ci");

    if let Err(err) = cli.execute().await {
        std::process::exit(report_failure(&err));
    }
}

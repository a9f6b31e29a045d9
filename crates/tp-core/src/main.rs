//! tableprov - CSV table snapshot provider.

use clap::Parser;
use tp_core::cli::{self, Cli};
use tp_core::logging::init_logging;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.verbose);
    let code = cli::run(cli);
    std::process::exit(code.as_i32());
}

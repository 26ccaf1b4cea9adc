#![forbid(unsafe_code)]

//! appstate demo binary entry point.

use appstate_demo::{app, cli, logging};

fn main() {
    let opts = cli::Opts::parse();
    logging::init(opts.log_filter.as_deref());

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if let Err(e) = app::run(&opts, &mut out) {
        eprintln!("Runtime error: {e}");
        std::process::exit(1);
    }
}

// src/main.rs

use plansched::{cli, logging, run};

fn main() {
    if let Err(err) = run_main() {
        eprintln!("plansched error: {err:?}");
        std::process::exit(1);
    }
}

fn run_main() -> anyhow::Result<()> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;

    // The runner's size is decided here, outside the library.
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if let Some(n) = args.worker_threads {
        builder.worker_threads(n.max(1));
    }
    let runtime = builder.build()?;

    runtime.block_on(run(args))
}

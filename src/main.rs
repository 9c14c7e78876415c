mod cancel;
mod cli;
mod config;
mod counter;
mod error;
mod geometry;
mod landmarks;
mod logging;
mod pipeline;
mod processor;

fn main() -> anyhow::Result<()> {
    logging::init();
    cli::run()
}

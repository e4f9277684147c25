use clap::Parser;

use wf_edge_buffer::options::CommandLineOptions;
use wf_edge_buffer::simulate;
use wf_edge_buffer::tables::make_table_collection;

fn run(options: &CommandLineOptions) -> wf_edge_buffer::Result<()> {
    options.validate()?;
    let parameters = options.parameters();
    log::info!(
        "N = {}, psurvival = {}, nsteps = {}, simplify every {} steps, seed = {}, {:?}",
        parameters.popsize,
        parameters.psurvival,
        parameters.nsteps,
        parameters.simplification_interval,
        parameters.seed,
        parameters.flags
    );

    let mut tables = make_table_collection(1.)?;
    simulate(&parameters, &mut tables)?;

    let _ = tables.build_index()?;
    let _ = tables.dump(
        &options.treefile.to_string_lossy(),
        tskit::TableOutputOptions::default(),
    )?;
    log::info!("wrote {}", options.treefile.display());
    Ok(())
}

fn main() {
    let options = CommandLineOptions::parse();

    let log_level = match options.verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    if let Err(e) = run(&options) {
        log::error!("{e}");
        std::process::exit(1);
    }
}

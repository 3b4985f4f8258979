use clap::Parser;
use gnmsg::Cli;
use miette::Result;

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.verbose.log_level_filter())
        .format_timestamp(None)
        .target(env_logger::Target::Stderr)
        .init();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    gnmsg::run(&cli, &mut out)
}

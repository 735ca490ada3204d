use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use anyextract::cli::{handle_error, Cli, Commands};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init(args) => anyextract::cli::commands::init::execute(args, cli.json).await,
        Commands::Task(args) => anyextract::cli::commands::task::execute(args, cli.json).await,
        Commands::Doc(args) => anyextract::cli::commands::doc::execute(args, cli.json).await,
        Commands::Run(args) => anyextract::cli::commands::run::execute(args, cli.json).await,
        Commands::Evolve(args) => anyextract::cli::commands::evolve::execute(args, cli.json).await,
        Commands::Feedback(args) => {
            anyextract::cli::commands::feedback::execute(args, cli.json).await
        }
        Commands::Observe(args) => {
            anyextract::cli::commands::observe::execute(args, cli.json).await
        }
        Commands::Pattern(args) => {
            anyextract::cli::commands::pattern::execute(args, cli.json).await
        }
    };

    if let Err(err) = result {
        handle_error(err, cli.json);
    }
}

//! fluxpreview CLI - render and diff Flux GitOps repositories

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod display;
mod error;
mod exit_codes;
mod logging;
mod report;

use commands::diff::DiffOutput;
use commands::{GlobalArgs, RenderArgs};

#[derive(Parser)]
#[command(name = "fluxpreview")]
#[command(author = "fluxpreview Contributors")]
#[command(version)]
#[command(about = "Render and diff Flux repositories, HelmReleases included", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalArgs,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a repository checkout to a YAML stream
    Render {
        /// Repository checkout
        repo: PathBuf,

        #[command(flatten)]
        args: RenderArgs,
    },

    /// Diff the rendered output of two repository checkouts
    Diff {
        /// Checkout before the change
        repo_a: PathBuf,

        /// Checkout after the change
        repo_b: PathBuf,

        #[command(flatten)]
        args: RenderArgs,

        /// Also write a markdown report to this file
        #[arg(long, value_name = "FILE")]
        markdown_out: Option<PathBuf>,

        /// MiniJinja template for the markdown report
        #[arg(long, value_name = "FILE", requires = "markdown_out")]
        markdown_template: Option<PathBuf>,

        /// Print a change summary to stderr
        #[arg(long)]
        summary: bool,
    },
}

#[tokio::main]
async fn main() {
    miette::set_panic_hook();
    let _ = miette::set_hook(Box::new(|_| {
        Box::new(miette::MietteHandlerOpts::new().wrap_lines(false).build())
    }));

    let cli = Cli::parse();
    logging::init(cli.debug);

    let result = match &cli.command {
        Commands::Render { repo, args } => commands::render::run(repo, args, &cli.global).await,

        Commands::Diff {
            repo_a,
            repo_b,
            args,
            markdown_out,
            markdown_template,
            summary,
        } => {
            let output = DiffOutput {
                markdown_out: markdown_out.clone(),
                markdown_template: markdown_template.clone(),
                summary: *summary,
            };
            commands::diff::run(repo_a, repo_b, args, &cli.global, &output).await
        }
    };

    if let Err(err) = result {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use debarrel_rewrite::Config;
use log::{debug, info};
use std::io::{BufWriter, Write};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "debarrel")]
#[command(about = "Rewrite imports that go through barrel files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Point barrel imports at the modules that declare the imported bindings
    Rewrite(Config),
}

fn main() -> Result<()> {
    env_logger::init();

    // stdio is blocked by LineWriter, use a BufWriter to reduce syscalls.
    // See https://github.com/rust-lang/rust/issues/60673
    let mut stdout = BufWriter::new(std::io::stdout());

    let cli = Cli::parse();
    debug!("Parsed CLI arguments: {:?}", cli.command);

    let start = Instant::now();

    match cli.command {
        Commands::Rewrite(cfg) => {
            let num_threads = rayon::current_num_threads();
            info!("Running barrel import rewrite (using {} threads)", num_threads);
            debug!("Config: root={:?}, filter={:?}, write={}", cfg.root, cfg.filter, cfg.write);

            let json = cfg.json;
            let result = debarrel_rewrite::run_rewrite(cfg)?;
            debug!("{} files changed", result.files_changed);

            if json {
                serde_json::to_writer_pretty(&mut stdout, &result)?;
                writeln!(stdout)?;
                stdout.flush()?;
                return Ok(());
            }

            let elapsed_ms = start.elapsed().as_millis();

            if result.changes.is_empty() {
                debarrel_rewrite::print_no_changes_message(&mut stdout, &result)?;
            } else {
                debarrel_rewrite::print_changes_tree(&mut stdout, &result)?;
            }
            writeln!(
                stdout,
                "\n{} Finished in {}ms on {} files, {} modules inspected (using {} threads).",
                "●".bright_blue(),
                elapsed_ms.to_string().cyan(),
                result.files_scanned.to_string().cyan(),
                result.modules_loaded.to_string().cyan(),
                num_threads.to_string().cyan()
            )?;
            stdout.flush()?;

            Ok(())
        }
    }
}

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process::Command;

#[derive(Parser)]
#[command(name = "xtask", about = "Workspace automation for afterglow")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run fmt, clippy, tests and doc in order
    Check,
    /// Run cargo fmt --check on all crates
    Fmt,
    /// Run clippy on all crates, warnings as errors
    Clippy,
    /// Run all tests
    Test,
    /// Run the per-frame benchmark in release mode
    Bench,
    /// Build rustdoc for the workspace
    Doc,
    /// Build the entire workspace
    Build,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    run(cli.command)
}

fn run(step: Commands) -> Result<()> {
    let (name, args): (&str, &[&str]) = match step {
        Commands::Fmt => ("fmt", &["fmt", "--all", "--", "--check"]),
        Commands::Clippy => (
            "clippy",
            &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
        ),
        Commands::Test => ("test", &["test", "--workspace"]),
        Commands::Bench => (
            "bench",
            &["bench", "-p", "afterglow-render", "--bench", "bench_frame"],
        ),
        Commands::Doc => ("doc", &["doc", "--workspace", "--no-deps"]),
        Commands::Build => ("build", &["build", "--workspace"]),
        Commands::Check => {
            for step in [Commands::Fmt, Commands::Clippy, Commands::Test, Commands::Doc] {
                run(step)?;
            }
            return Ok(());
        }
    };
    cargo(name, args)
}

fn cargo(name: &str, args: &[&str]) -> Result<()> {
    println!("==> Running cargo {}", args.join(" "));
    let status = Command::new("cargo").args(args).status()?;
    if !status.success() {
        anyhow::bail!("cargo {name} failed");
    }
    Ok(())
}

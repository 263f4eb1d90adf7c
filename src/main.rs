use anyhow::{Context, Result};
use clap::Parser;
use std::io::Read;
use tagsrv::tags::scan::ScanOptions;
use tagsrv::{cli, events, rpc, tags, util};

fn init_logging() {
    use tracing_subscriber::EnvFilter;
    // stdout carries protocol frames; diagnostics go to stderr only.
    let filter = EnvFilter::try_from_env("TAGSRV_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_logging();
    let args = cli::Args::parse();

    match args.command {
        cli::Command::Serve {
            transport,
            addr,
            no_ignore,
        } => {
            let scan = ScanOptions::new(no_ignore);
            match transport {
                cli::Transport::Stdio => rpc::serve_stdio(scan),
                cli::Transport::Tcp => rpc::serve_tcp(&addr, scan),
                cli::Transport::Http => rpc::http::serve_http(&addr, scan),
            }
        }
        cli::Command::Events {
            commit,
            repo_slug,
            diff_file,
        } => {
            let diff = match diff_file {
                Some(path) => util::read_to_string(&path)?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buf)
                        .context("read diff from stdin")?;
                    buf
                }
            };
            let events = events::correlate(&diff, &commit, &repo_slug)?;
            println!("{}", serde_json::to_string_pretty(&events)?);
            Ok(())
        }
        cli::Command::Tags { format, files } => {
            let parsed = tags::scan::run_tagging_tool(format, &files)?;
            println!("{}", serde_json::to_string_pretty(&tags::dump(&parsed))?);
            Ok(())
        }
        cli::Command::Request {
            method,
            params,
            id,
            no_ignore,
        } => {
            let response = rpc::call(method, &params, &id, ScanOptions::new(no_ignore))?;
            println!("{response}");
            Ok(())
        }
    }
}

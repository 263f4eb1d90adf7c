use crate::tags::TagFormat;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "tagsrv",
    version,
    about = "ctags-backed symbol server and diff correlator",
    after_help = r#"Examples:
  tagsrv serve
  tagsrv serve --transport tcp --addr 127.0.0.1:9090
  tagsrv serve --transport http --addr 127.0.0.1:9090
  tagsrv request --method textDocument/documentSymbol --params '{"textDocument":{"uri":"file:///srv/app/main.go"}}'
  tagsrv tags --format extended src/main.go
  git show --unified=1 | tagsrv events --commit $(git rev-parse HEAD) --repo-slug github.com/acme/app
"#
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(ValueEnum, Clone, Copy, Debug, Eq, PartialEq)]
pub enum Transport {
    Stdio,
    Tcp,
    Http,
}

#[derive(Subcommand)]
pub enum Command {
    /// Serve symbol queries over a transport.
    Serve {
        /// Transport binding: stdio|tcp|http.
        #[arg(long, default_value = "stdio")]
        transport: Transport,
        /// Listen address for the tcp and http transports.
        #[arg(long, default_value = "127.0.0.1:9090")]
        addr: String,
        /// Include files ignored by .gitignore in directory scans.
        #[arg(long)]
        no_ignore: bool,
    },
    /// Correlate a unified diff against the tag table and emit change events.
    Events {
        /// Commit hash the diff was produced from.
        #[arg(long)]
        commit: String,
        /// Repository slug used to build event URLs, e.g. github.com/acme/app.
        #[arg(long)]
        repo_slug: String,
        /// Read the diff from this file instead of stdin.
        #[arg(long, value_name = "PATH")]
        diff_file: Option<PathBuf>,
    },
    /// Run the tagging tool and dump the parsed tag table as JSON.
    Tags {
        /// Tag table grammar to request from the tool: legacy|extended.
        #[arg(long, default_value = "extended")]
        format: TagFormat,
        /// Files to tag; empty means a recursive scan of the working tree.
        files: Vec<PathBuf>,
    },
    /// Run a single protocol request through the dispatcher and exit.
    Request {
        /// Wire method name, e.g. textDocument/documentSymbol.
        #[arg(long)]
        method: String,
        #[arg(long, default_value = "{}")]
        params: String,
        #[arg(long, default_value = "1")]
        id: String,
        /// Include files ignored by .gitignore in directory scans.
        #[arg(long)]
        no_ignore: bool,
    },
}

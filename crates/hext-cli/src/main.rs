use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod extensions_cmd;
mod ticket_cmd;

/// Inspect TLS hello extensions and session tickets.
#[derive(Parser)]
#[command(name = "hext")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log engine decisions to stderr (repeat for more detail).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the records of a hex-encoded extension block.
    Extensions {
        /// Extension block in hex, without the outer length field.
        blob: String,
    },
    /// Build a ClientHello extension block and print it as hex.
    ClientHello {
        /// Host name for server_name.
        #[arg(long)]
        server_name: Option<String>,
        /// ALPN protocols (comma-separated, e.g. "h2,http/1.1").
        #[arg(long)]
        alpn: Option<String>,
        /// Highest version to offer: "1.2" or "1.3".
        #[arg(long = "tls", default_value = "1.3")]
        tls_version: String,
        /// Size of the hello before the extension block, for padding.
        #[arg(long, default_value = "80")]
        prefix_len: usize,
    },
    /// Session ticket operations.
    Ticket {
        #[command(subcommand)]
        command: TicketCommands,
    },
}

#[derive(Subcommand)]
enum TicketCommands {
    /// Seal a session state into a ticket.
    Issue {
        /// Long-term server key the ticket keys are derived from.
        #[arg(short, long)]
        key: String,
        /// Session version: "1.2" or "1.3".
        #[arg(long = "tls", default_value = "1.2")]
        tls_version: String,
        /// Cipher suite code in hex (e.g. c02b).
        #[arg(long, default_value = "c02b")]
        cipher: String,
        /// Master secret in hex.
        #[arg(long)]
        master_secret: String,
        /// Host name remembered with the session.
        #[arg(long)]
        server_name: Option<String>,
        /// Issue time in seconds (default: now).
        #[arg(long)]
        timestamp: Option<u32>,
    },
    /// Decrypt a ticket and print the session it carries.
    Inspect {
        /// Long-term server key the ticket keys are derived from.
        #[arg(short, long)]
        key: String,
        /// Ticket in hex.
        ticket: String,
        /// Ticket lifetime in seconds.
        #[arg(long, default_value = "172800")]
        lifetime: u32,
        /// Evaluate expiry at this time instead of now.
        #[arg(long)]
        now: Option<u32>,
    },
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match &cli.command {
        Commands::Extensions { blob } => extensions_cmd::run(blob),
        Commands::ClientHello {
            server_name,
            alpn,
            tls_version,
            prefix_len,
        } => extensions_cmd::client_hello(
            server_name.as_deref(),
            alpn.as_deref(),
            tls_version,
            *prefix_len,
        ),
        Commands::Ticket { command } => match command {
            TicketCommands::Issue {
                key,
                tls_version,
                cipher,
                master_secret,
                server_name,
                timestamp,
            } => ticket_cmd::issue(
                key,
                tls_version,
                cipher,
                master_secret,
                server_name.as_deref(),
                *timestamp,
            ),
            TicketCommands::Inspect {
                key,
                ticket,
                lifetime,
                now,
            } => ticket_cmd::inspect(key, ticket, *lifetime, *now),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::io::BufReader;

use mi_bridge::{repl, BridgeConfig, HttpTransport, Result, Session};

#[derive(Parser, Debug)]
#[command(name = "mi-bridge", version, about = "Step through a C program on a GDB/MI backend")]
struct Cli {
    /// C source file to compile and debug
    source: PathBuf,

    /// Backend base URL, e.g. http://localhost:5000
    #[arg(long)]
    server: Option<String>,

    /// TOML config file (defaults to ./mi-bridge.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Skip address and size lookups for variables
    #[arg(long)]
    no_addresses: bool,
}

impl Cli {
    fn config(&self) -> Result<BridgeConfig> {
        let mut config = BridgeConfig::load(self.config.as_deref())?;
        if let Some(server) = &self.server {
            config.server = server.clone();
        }
        if let Some(timeout) = self.timeout {
            config.request_timeout_secs = timeout;
        }
        if self.no_addresses {
            config.resolve_addresses = false;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("mi_bridge=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "mi-bridge failed");
            eprintln!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.config()?;
    let source = std::fs::read_to_string(&cli.source)?;
    let transport = HttpTransport::new(config.server_url()?)?;
    tracing::info!(server = %transport.base(), source = %cli.source.display(), "connecting");

    let mut session = Session::start(transport, config.session_options()).await?;

    let cancel = session.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, cancelling");
            cancel.cancel();
        }
    });

    let mut stdout = std::io::stdout();
    let outcome = match repl::load(&mut session, &source, &mut stdout).await {
        Ok(()) => repl::run(&mut session, BufReader::new(tokio::io::stdin()), &mut stdout).await,
        Err(e) => Err(e),
    };

    if let Some(closing) = session.close() {
        let _ = closing.await;
    }
    outcome
}

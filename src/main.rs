use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use solace_companion::api::TokenService;
use solace_companion::auth::{CredentialIssuer, DEFAULT_TTL, RoomPermissions};
use solace_companion::voice::{
    AssemblyAi, Cartesia, EnergyVad, HeuristicTurnDetector, Passthrough,
};
use solace_companion::{
    Adapters, AnthropicClient, Config, Error, SessionOrchestrator, WsRoomTransport,
};

/// Solace - voice companion session runner
#[derive(Parser)]
#[command(name = "solace", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Join a room and run the companion session
    Run {
        /// Room to join
        #[arg(long, env = "SOLACE_ROOM")]
        room: String,

        /// Participant identity for the companion
        #[arg(long, env = "SOLACE_IDENTITY", default_value = "solace")]
        identity: String,
    },
    /// Serve the token issuance endpoint
    Serve {
        /// Port to listen on
        #[arg(long, env = "SOLACE_TOKEN_PORT", default_value = "3001")]
        port: u16,
    },
    /// Mint one access token and print it
    IssueToken {
        /// Room to grant access to
        #[arg(long)]
        room: String,

        /// Participant identity
        #[arg(long)]
        identity: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,solace_companion=info",
        1 => "info,solace_companion=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Run { room, identity } => run_session(&room, &identity).await,
        Command::Serve { port } => serve_tokens(port).await,
        Command::IssueToken { room, identity } => issue_token(&room, &identity),
    }
}

/// Join the room and converse until interrupted
async fn run_session(room: &str, identity: &str) -> anyhow::Result<()> {
    let mut config = Config::load(room, identity)?;
    tracing::info!(room, identity, "starting companion session");

    let keys = std::mem::take(&mut config.api_keys);
    let issuer = CredentialIssuer::new(
        &keys.room_api_key,
        keys.room_api_secret
            .ok_or_else(|| Error::Config("SOLACE_API_SECRET is required".to_string()))?,
    )?;
    let grant = issuer.issue(
        identity,
        room,
        RoomPermissions::participant(room),
        DEFAULT_TTL,
    )?;

    let anthropic_key = keys
        .anthropic
        .ok_or_else(|| Error::Config("ANTHROPIC_API_KEY is required".to_string()))?;
    let cartesia_key = keys
        .cartesia
        .ok_or_else(|| Error::Config("CARTESIA_API_KEY is required".to_string()))?;
    let assemblyai_key = keys
        .assemblyai
        .ok_or_else(|| Error::Config("ASSEMBLYAI_API_KEY is required".to_string()))?;

    let adapters = Adapters {
        transport: Arc::new(WsRoomTransport),
        llm: Arc::new(AnthropicClient::new(
            anthropic_key,
            &config.voice.llm_model,
        )?),
        tts: Arc::new(Cartesia::new(
            cartesia_key,
            &config.voice.tts_model,
            &config.voice.tts_voice,
        )?),
        stt: Arc::new(AssemblyAi::new(assemblyai_key)?),
        turn_detector: Arc::new(HeuristicTurnDetector),
        vad: Box::new(EnergyVad::new()),
        denoise: Box::new(Passthrough),
    };

    let (mut orchestrator, handle) = SessionOrchestrator::new(&config, adapters);
    orchestrator.on_shutdown(|summary| {
        tracing::info!(usage = %summary, "final usage");
    });

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.stop();
        }
    });

    orchestrator.run(&grant).await?;
    Ok(())
}

/// Run the token issuance endpoint
async fn serve_tokens(port: u16) -> anyhow::Result<()> {
    // Room/identity placeholders: the service issues per-request grants
    let mut config = Config::load("-", "-")?;

    let keys = std::mem::take(&mut config.api_keys);
    let issuer = CredentialIssuer::new(
        &keys.room_api_key,
        keys.room_api_secret
            .ok_or_else(|| Error::Config("SOLACE_API_SECRET is required".to_string()))?,
    )?;

    let service = Arc::new(TokenService::new(issuer, config.room_url));
    service.serve(port).await?;
    Ok(())
}

/// Mint a token and print it to stdout
fn issue_token(room: &str, identity: &str) -> anyhow::Result<()> {
    let mut config = Config::load(room, identity)?;

    let keys = std::mem::take(&mut config.api_keys);
    let issuer = CredentialIssuer::new(
        &keys.room_api_key,
        keys.room_api_secret
            .ok_or_else(|| Error::Config("SOLACE_API_SECRET is required".to_string()))?,
    )?;
    let grant = issuer.issue(
        identity,
        room,
        RoomPermissions::participant(room),
        DEFAULT_TTL,
    )?;

    println!("{}", grant.token);
    println!("expires: {}", grant.expires_at);
    Ok(())
}

use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use drill_client::config::ClientConfig;
use drill_client::controller;
use drill_client::http_authority::{HttpAuthority, HttpAuthorityConfig};
use drill_core::config::{AiLevel, HandConfig, SessionConfig, TrainingConfig};
use drill_core::protocol::{DEFAULT_TIME_BUDGET_SECS, Difficulty, Position};
use drill_core::sizing::{Rounding, Sizing};
use tracing_subscriber::EnvFilter;

mod client;

#[derive(Parser)]
#[command(name = "drill")]
#[command(about = "Run timed GTO drills against a strategy server", long_about = None)]
struct Cli {
    /// Base URL of the strategy API
    #[arg(short, long, env = "DRILL_API_URL", default_value = "http://127.0.0.1:8000/api/v1")]
    server: String,

    /// Bearer token for the API
    #[arg(short, long, env = "DRILL_API_TOKEN")]
    token: Option<String>,

    /// Pause before other seats act, in milliseconds
    #[arg(long, env = "DRILL_SETTLE_MS", default_value_t = 500)]
    settle_ms: u64,

    /// Per-request timeout, in seconds
    #[arg(long, default_value_t = 10)]
    request_timeout: u64,

    /// Countdown for items without their own limit, in seconds
    #[arg(long, default_value_t = DEFAULT_TIME_BUDGET_SECS)]
    default_budget: u32,

    /// How preset bet sizes snap to the 0.5 BB grid
    #[arg(long, value_enum, default_value_t = RoundingArg::Floor)]
    rounding: RoundingArg,

    /// Do not consult the daily quota before starting
    #[arg(long)]
    skip_quota: bool,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Timed preflop decisions
    Train {
        /// Stack depth in big blinds (50 or 100)
        #[arg(long, default_value_t = 100)]
        stack: u32,

        /// Hero position (UTG, MP, CO, BTN, SB, BB)
        #[arg(short, long, default_value = "BTN")]
        position: Position,

        /// Situation facing the hero, e.g. `open` or `vs_raise`
        #[arg(short, long, default_value = "open")]
        action: String,

        /// Number of items
        #[arg(short = 'n', long, default_value_t = 10)]
        count: u32,

        #[arg(short, long, value_enum)]
        difficulty: Option<DifficultyArg>,
    },
    /// A full hand against the table
    Hand {
        /// Table format (6max or hu)
        #[arg(long, default_value = "6max")]
        table: String,

        /// Stack depth in big blinds
        #[arg(long, default_value_t = 100)]
        stack: u32,

        #[arg(long, value_enum, default_value_t = AiArg::Standard)]
        ai: AiArg,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum DifficultyArg {
    Easy,
    Normal,
    Hard,
}

impl From<DifficultyArg> for Difficulty {
    fn from(d: DifficultyArg) -> Self {
        match d {
            DifficultyArg::Easy => Difficulty::Easy,
            DifficultyArg::Normal => Difficulty::Normal,
            DifficultyArg::Hard => Difficulty::Hard,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum AiArg {
    Easy,
    Standard,
    Hard,
}

impl From<AiArg> for AiLevel {
    fn from(a: AiArg) -> Self {
        match a {
            AiArg::Easy => AiLevel::Easy,
            AiArg::Standard => AiLevel::Standard,
            AiArg::Hard => AiLevel::Hard,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum RoundingArg {
    Floor,
    Nearest,
}

impl From<RoundingArg> for Rounding {
    fn from(r: RoundingArg) -> Self {
        match r {
            RoundingArg::Floor => Rounding::Floor,
            RoundingArg::Nearest => Rounding::Nearest,
        }
    }
}

impl Mode {
    fn session_config(self) -> SessionConfig {
        match self {
            Mode::Train {
                stack,
                position,
                action,
                count,
                difficulty,
            } => SessionConfig::Training(TrainingConfig {
                stack_bb: stack,
                position,
                action_to_you: action,
                item_count: count,
                difficulty: difficulty.map(Difficulty::from),
            }),
            Mode::Hand { table, stack, ai } => SessionConfig::Hand(HandConfig {
                table_type: table,
                stack_bb: stack,
                ai_level: ai.into(),
            }),
        }
    }
}

#[tokio::main]
async fn main() {
    // Logs go to stderr so they never interleave with prompts.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut http = HttpAuthorityConfig::new(&cli.server)
        .with_timeout(Duration::from_secs(cli.request_timeout));
    if let Some(token) = cli.token {
        http = http.with_token(token);
    }
    let authority = match HttpAuthority::new(http) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let config = ClientConfig::default()
        .with_settle_delay(Duration::from_millis(cli.settle_ms))
        .with_default_time_budget(cli.default_budget)
        .with_sizing(Sizing::default().with_rounding(cli.rounding.into()))
        .with_quota_check(!cli.skip_quota);

    tracing::info!(server = %cli.server, "connecting");
    let (handle, events) = controller::spawn(authority, config);

    if let Err(e) = client::run(handle, events, cli.mode.session_config()).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

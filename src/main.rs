use battleship_mp::{
    demo, init_logging, serve, GameSession, MatchConfig, ServerConfig, TcpTransport,
    DEFAULT_BIND, DEFAULT_SERVER, MAX_MESSAGE_SIZE,
};

use clap::Parser;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use tokio::time::Duration;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser)]
enum Commands {
    /// Run the match server.
    Serve {
        #[arg(long, default_value = DEFAULT_BIND)]
        bind: String,
        #[arg(long, help = "Per-operation TCP timeout; unset waits forever")]
        io_timeout_secs: Option<u64>,
        #[arg(long, help = "Longest a match waits for a player's message; unset waits forever")]
        round_timeout_secs: Option<u64>,
        #[arg(long, default_value_t = MAX_MESSAGE_SIZE)]
        max_message_size: u32,
    },
    /// Play one game as a random player against whoever the server pairs us with.
    Play {
        #[arg(long, default_value = DEFAULT_SERVER)]
        connect: String,
        #[arg(long, help = "Name shown to the opponent; random if unset")]
        name: Option<String>,
        #[arg(long, help = "Fix RNG seed for reproducible games (e.g., --seed 12345)")]
        seed: Option<u64>,
    },
    /// Run random games between two in-process players.
    Simulate {
        #[arg(long, default_value_t = 8)]
        games: usize,
        #[arg(long, help = "Fix RNG seed for reproducible games (e.g., --seed 12345)")]
        seed: Option<u64>,
    },
}

fn seeded(seed: Option<u64>) -> SmallRng {
    match seed {
        Some(s) => SmallRng::seed_from_u64(s),
        None => SmallRng::from_rng(&mut rand::rng()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            bind,
            io_timeout_secs,
            round_timeout_secs,
            max_message_size,
        } => {
            let config = ServerConfig {
                bind,
                io_timeout: io_timeout_secs.map(Duration::from_secs),
                max_message_size,
                matches: MatchConfig {
                    round_timeout: round_timeout_secs.map(Duration::from_secs),
                },
            };
            serve(config).await?;
        }
        Commands::Play {
            connect,
            name,
            seed,
        } => {
            let mut rng = seeded(seed);
            let transport = TcpTransport::connect(&connect).await?;
            println!("Connected to {}, waiting for an opponent...", connect);
            let mut session = GameSession::start(name.as_deref(), transport).await?;
            println!(
                "{} vs {} ({} shoots first)",
                session.name(),
                session.opponent(),
                if session.first() { session.name() } else { session.opponent() }
            );
            let winner = demo::play(&mut session, &mut rng).await?;
            match winner {
                Some(winner) => println!("Winner: {}", winner),
                None => println!("No winner"),
            }
        }
        Commands::Simulate { games, seed } => {
            let seed = seed.unwrap_or_else(rand::random);
            println!("Running {} games (seed {})", games, seed);
            for report in demo::simulate(games, seed).await? {
                println!(
                    "{} vs {} => {:?}",
                    report.players[0],
                    report.players[1],
                    report.outcome.winner()
                );
            }
        }
    }
    Ok(())
}

use battleship_mp::{demo, init_logging, MatchOutcome};
use serde_json::json;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 3 {
        eprintln!("Usage: {} <games> <seed>", args[0]);
        std::process::exit(1);
    }
    let games: usize = args[1].parse()?;
    let seed: u64 = args[2].parse()?;

    let reports = demo::simulate(games, seed).await?;
    let failed = reports.iter().filter(|r| r.outcome.is_failed()).count();
    let draws = reports
        .iter()
        .filter(|r| matches!(r.outcome, MatchOutcome::Finished { winner: None }))
        .count();

    let result = json!({
        "games": reports,
        "failed": failed,
        "draws": draws,
    });

    println!("{}", serde_json::to_string(&result)?);
    Ok(())
}

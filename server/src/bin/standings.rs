use leaderboard_server::{config::Config, service::LeaderboardService, store};
use shared::protocol::Standings;
use std::env;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let mut search: Option<String> = None;
    let mut json = false;
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--json" => json = true,
            "--search" => match args.next() {
                Some(q) => search = Some(q),
                None => anyhow::bail!("--search needs a value"),
            },
            "-h" | "--help" => {
                eprintln!("Usage: cargo run -p leaderboard-server --bin standings -- [--search <text>] [--json]");
                return Ok(());
            }
            other => anyhow::bail!("unknown argument {:?}", other),
        }
    }

    let config = Config::from_env()?;
    let store = store::connect(&config.backend).await?;
    let service = LeaderboardService::from_config(store, &config);
    service.verify_schema().await?;

    let standings = service.standings(search.as_deref()).await?;
    info!("Fetched {} entries", standings.entries.len());

    if json {
        println!("{}", serde_json::to_string_pretty(&standings)?);
    } else {
        print!("{}", render(&standings));
    }
    Ok(())
}

fn render(standings: &Standings) -> String {
    let name_width = standings
        .entries
        .iter()
        .map(|e| e.name.chars().count())
        .max()
        .unwrap_or(0)
        .max(4);

    let mut out = format!(
        "{:>4}  {:<name_width$}  {:>7}  {:>5}  {}\n",
        "RANK", "NAME", "SCORE", "EXP", "MEDAL"
    );
    for e in &standings.entries {
        out.push_str(&format!(
            "{:>4}  {:<name_width$}  {:>7}  {:>5}  {}\n",
            e.rank, e.name, e.score, e.exp, e.medal
        ));
    }
    out
}

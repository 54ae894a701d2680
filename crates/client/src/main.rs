//! # cellar
//!
//! Command-line client for the wine cellar inventory.
//!
//! Every invocation loads the inventory from the API, runs one command through
//! the [`InventoryStore`] and prints the result. `--demo` swaps the REST API for
//! an in-process inventory seeded with a few bottles (nothing is persisted).

use std::io::{self, BufRead, Write};

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};

use cellar_client::{ClientConfig, HttpGateway, InMemoryGateway, InventoryStore, RemoteGateway};
use cellar_core::BottleId;
use cellar_inventory::{
    BottleDraft, BottlePatch, BottleRecord, Color, Position, RackIntent, RackOccupancy,
    RackSelection, SortDirection, SortKey, SortState,
};

#[derive(Parser)]
#[command(name = "cellar")]
#[command(about = "Keep track of the bottles in your wine cellar")]
struct Cli {
    /// Use a throwaway in-process inventory instead of the API
    #[arg(long, global = true)]
    demo: bool,

    /// Base URL of the cellar API
    #[arg(long, global = true, env = "CELLAR_API_URL")]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List bottles
    List {
        #[arg(long, default_value = "year")]
        sort: SortKey,
        /// Sort descending
        #[arg(long)]
        desc: bool,
    },
    /// Add a bottle
    Add {
        name: String,
        year: i32,
        #[arg(long, default_value = "white")]
        color: Color,
    },
    /// Change fields of a bottle
    Edit {
        id: BottleId,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        color: Option<Color>,
        #[arg(long)]
        rating: Option<f64>,
    },
    /// Delete a bottle
    Remove {
        id: BottleId,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Append a tasting note
    Comment { id: BottleId, text: String },
    /// Look up the rating of one bottle
    Rate { id: BottleId },
    /// Look up the rating of every bottle
    RateAll,
    /// Put a bottle into a rack cell, moving out whoever is there
    Place { id: BottleId, row: u16, col: u16 },
    /// Move the bottle in one cell into another cell
    MoveCell {
        from_row: u16,
        from_col: u16,
        to_row: u16,
        to_col: u16,
    },
    /// Take a bottle out of the rack
    Unplace { id: BottleId },
    /// Show the rack
    Rack,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    cellar_observability::init();

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env().context("invalid configuration")?;
    if let Some(url) = cli.api_url {
        config.api_url = url.trim_end_matches('/').to_string();
    }

    if cli.demo {
        tracing::info!("using demo inventory");
        let store = InventoryStore::new(demo_gateway()?, config.rack);
        run(store, cli.command).await
    } else {
        tracing::debug!(api_url = %config.api_url, "using cellar API");
        let store = InventoryStore::new(HttpGateway::from_config(&config), config.rack);
        run(store, cli.command).await
    }
}

async fn run<G: RemoteGateway>(
    mut store: InventoryStore<G>,
    command: Commands,
) -> anyhow::Result<()> {
    store.load().await.context("failed to load the inventory")?;

    match command {
        Commands::List { sort, desc } => {
            let direction = if desc {
                SortDirection::Descending
            } else {
                SortDirection::Ascending
            };
            let view = store.sorted(SortState::new(sort, direction));
            if view.is_empty() {
                println!("The cellar is empty.");
            }
            for bottle in view {
                println!("{}", summary_line(bottle));
            }
        }
        Commands::Add { name, year, color } => {
            let draft = BottleDraft::new(name, year).with_color(color);
            let id = store.add(&draft).await.context("could not add the bottle")?;
            if let Some(bottle) = store.get(id) {
                println!("Added {}", summary_line(bottle));
            }
        }
        Commands::Edit {
            id,
            name,
            year,
            color,
            rating,
        } => {
            let mut patch = BottlePatch::new();
            if let Some(name) = name {
                patch = patch.name(name);
            }
            if let Some(year) = year {
                patch = patch.year(year);
            }
            if let Some(color) = color {
                patch = patch.color(color);
            }
            if let Some(rating) = rating {
                patch = patch.rating(rating);
            }
            store
                .apply_change(id, patch.into())
                .await
                .with_context(|| format!("could not update bottle #{id}"))?;
            print_bottle(&store, id)?;
        }
        Commands::Remove { id, yes } => {
            let bottle = lookup(&store, id)?;
            if !yes && !confirm(&format!("Remove {} ({})?", bottle.name(), bottle.year()))? {
                println!("Kept.");
                return Ok(());
            }
            store
                .remove(id)
                .await
                .with_context(|| format!("could not remove bottle #{id}"))?;
            println!("Removed #{id}");
        }
        Commands::Comment { id, text } => {
            let sent = store
                .add_comment_to(id, &text)
                .await
                .with_context(|| format!("could not comment on bottle #{id}"))?;
            if sent {
                print_bottle(&store, id)?;
            } else {
                println!("Empty comment ignored.");
            }
        }
        Commands::Rate { id } => {
            store
                .refresh_rating(id)
                .await
                .with_context(|| format!("could not rate bottle #{id}"))?;
            print_bottle(&store, id)?;
        }
        Commands::RateAll => {
            let summary = store
                .refresh_all_ratings()
                .await
                .context("could not refresh ratings")?;
            println!("Updated {} ratings, {} failed", summary.updated, summary.failed);
        }
        Commands::Place { id, row, col } => {
            place(&mut store, id, Position::new(row, col)).await?;
        }
        Commands::MoveCell {
            from_row,
            from_col,
            to_row,
            to_col,
        } => {
            let mut selection = RackSelection::new();
            let intent = selection.click(Position::new(from_row, from_col), &store.occupancy());
            let RackIntent::Select(_) = intent else {
                return Err(anyhow!("cell {from_row},{from_col} is empty"));
            };
            let intent = selection.click(Position::new(to_row, to_col), &store.occupancy());
            match intent {
                RackIntent::Move { bottle, to } => place(&mut store, bottle, to).await?,
                other => tracing::debug!(?other, "nothing to move"),
            }
        }
        Commands::Unplace { id } => {
            store
                .unplace(id)
                .await
                .with_context(|| format!("could not take bottle #{id} out of the rack"))?;
            println!("#{id} is out of the rack");
        }
        Commands::Rack => {
            let occupancy = store.occupancy();
            print!("{}", occupancy.render());
            for line in rack_summary(store.bottles(), &occupancy) {
                println!("{line}");
            }
        }
    }

    Ok(())
}

async fn place<G: RemoteGateway>(
    store: &mut InventoryStore<G>,
    id: BottleId,
    target: Position,
) -> anyhow::Result<()> {
    let plan = store
        .place(id, target)
        .await
        .with_context(|| format!("could not place bottle #{id} at {target}"))?;

    if plan.unchanged {
        println!("#{id} is already at {target}");
        return Ok(());
    }
    for displaced in &plan.displaced {
        println!("#{displaced} moved out of {target}");
    }
    println!("#{id} placed at {target}");
    Ok(())
}

fn lookup<G: RemoteGateway>(
    store: &InventoryStore<G>,
    id: BottleId,
) -> anyhow::Result<&BottleRecord> {
    store.get(id).ok_or_else(|| anyhow!("no bottle with id {id}"))
}

fn print_bottle<G: RemoteGateway>(store: &InventoryStore<G>, id: BottleId) -> anyhow::Result<()> {
    let bottle = lookup(store, id)?;
    println!("{}", summary_line(bottle));
    if let Some(url) = bottle.vivino_url() {
        println!("  {url}");
    }
    for comment in bottle.comments() {
        println!("  - {comment}");
    }
    Ok(())
}

/// Footer under the rack grid: usage, unracked bottles, and anything the grid cannot show.
fn rack_summary(bottles: &[BottleRecord], occupancy: &RackOccupancy<'_>) -> Vec<String> {
    let unracked = bottles.iter().filter(|b| !b.is_racked()).count();
    let mut lines = vec![format!(
        "{} of {} cells used, {unracked} bottles not racked",
        occupancy.len(),
        occupancy.dimensions().capacity()
    )];
    for collision in occupancy.collisions() {
        lines.push(format!(
            "warning: #{} shares cell {} with #{}",
            collision.shadowed, collision.position, collision.occupant
        ));
    }
    for id in occupancy.out_of_rack() {
        lines.push(format!("warning: #{id} is positioned outside the rack"));
    }
    lines
}

fn summary_line(bottle: &BottleRecord) -> String {
    let cell = bottle
        .position()
        .map(|p| p.to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "#{:<4} {:<32} {:>4}  {:<5}  {:.1}  [{cell}]",
        bottle.id().to_string(),
        bottle.name(),
        bottle.year(),
        bottle.color().as_str(),
        bottle.rating()
    )
}

fn confirm(question: &str) -> anyhow::Result<bool> {
    let mut stdout = io::stdout();
    write!(stdout, "{question} [y/N] ")?;
    stdout.flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn demo_gateway() -> anyhow::Result<InMemoryGateway> {
    let gateway = InMemoryGateway::new()
        .with_rating("Chablis Premier Cru", 4.1)
        .with_rating("Château Margaux", 4.7)
        .with_rating("Barolo Riserva", 4.3);

    let seeds = [
        ("Chablis Premier Cru", 2019, Color::White, Some(Position::new(1, 1))),
        ("Château Margaux", 2015, Color::Red, Some(Position::new(1, 2))),
        ("Barolo Riserva", 2016, Color::Red, None),
        ("Sancerre", 2021, Color::White, Some(Position::new(2, 3))),
    ];
    for (name, year, color, position) in seeds {
        gateway.seed(BottleDraft::new(name, year).with_color(color), |b| {
            b.with_position(position)
        })?;
    }
    Ok(gateway)
}

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use env_logger::{Builder, Target};
use futures::future::join_all;
use log::{LevelFilter, warn};

use mapch_client::infra::api::{BoardQuery, BoardsApi, PostsApi, SpotsApi};
use mapch_client::{ApiClient, EventBus, ReqwestTransport};
use mapch_config::ConfigLoader;
use mapch_model::{BoardRow, BoardSort, PageCursor, SpotId, ViewportSnapshot};

/// Diagnostics against a map channel backend.
#[derive(Parser, Debug)]
#[command(name = "mapch")]
#[command(about = "Query a map channel backend through the client layer")]
struct Cli {
    /// TOML config file (overrides MAPCH_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// `.env` file to load before reading MAPCH_* variables
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List spots inside a viewport
    Spots {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        /// Latitude span in degrees
        #[arg(long, default_value_t = 0.1)]
        span_lat: f64,
        /// Longitude span in degrees
        #[arg(long, default_value_t = 0.1)]
        span_lon: f64,
        /// Result cap (defaults to the configured limit)
        #[arg(long)]
        limit: Option<u32>,
    },
    /// List reviews posted on one or more spots
    Posts {
        #[arg(required = true)]
        spot_ids: Vec<i64>,
    },
    /// Show one page of the community board
    Boards {
        #[arg(long, default_value = "latest")]
        sort: BoardSort,
        #[arg(long)]
        category: Option<i64>,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
}

fn init_logger() {
    if std::env::var("RUST_LOG").is_ok() {
        env_logger::init();
    } else {
        Builder::new()
            .target(Target::Stderr)
            .filter_level(LevelFilter::Warn)
            .filter_module("mapch_client", LevelFilter::Info)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_config_path(path);
    }
    if let Some(path) = &cli.env_file {
        loader = loader.with_env_file(path);
    }
    let load = loader.load().context("failed to load configuration")?;
    for warning in load.warnings.iter() {
        warn!("config: {warning}");
    }
    let config = load.config;

    let transport =
        ReqwestTransport::new().context("failed to build HTTP client")?;
    let client = ApiClient::new(&config, Arc::new(transport));

    match cli.command {
        Command::Spots {
            lat,
            lon,
            span_lat,
            span_lon,
            limit,
        } => {
            let bounds =
                ViewportSnapshot::new(lat, lon, span_lat, span_lon)
                    .bounding_box();
            let api = SpotsApi::new(client, EventBus::default());
            let limit = limit.unwrap_or(config.map.result_limit);
            let spots = api
                .fetch_in_bounds(bounds, limit)
                .await
                .context("spot fetch failed")?;
            println!("{} spots", spots.len());
            for spot in spots {
                println!(
                    "#{:<6} {:.5},{:.5}  {}/5  {}",
                    spot.id,
                    spot.latitude,
                    spot.longitude,
                    spot.rating(),
                    spot.name
                );
            }
        }
        Command::Posts { spot_ids } => {
            let api = PostsApi::new(client);
            let listings = join_all(
                spot_ids.iter().map(|id| api.list_posts(SpotId(*id))),
            )
            .await;
            for (id, listing) in spot_ids.iter().zip(listings) {
                let posts = listing
                    .with_context(|| format!("post listing for #{id} failed"))?;
                println!("#{id}: {} posts", posts.len());
                for review in posts.iter().filter_map(|p| p.to_review()) {
                    println!(
                        "  [{}/5] {}: {}",
                        review.rating, review.author, review.text
                    );
                }
            }
        }
        Command::Boards {
            sort,
            category,
            page,
        } => {
            let api = BoardsApi::new(client);
            let cursor = PageCursor {
                page: page.max(1),
                per_page: config.boards.per_page,
            };
            let query = BoardQuery {
                sort,
                category_id: category,
            };
            let result = api
                .fetch_boards(query, cursor)
                .await
                .context("board listing failed")?;
            for row in result.response.data.iter().map(BoardRow::from) {
                println!(
                    "#{:<6} [{}] {} ({} likes): {}",
                    row.id,
                    row.category_name,
                    row.author_name,
                    row.likes,
                    row.content
                );
            }
            match result.next {
                Some(next) => println!("more: --page {}", next.page),
                None => println!("end of board"),
            }
        }
    }
    Ok(())
}

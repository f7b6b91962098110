use anyhow::{bail, Result};
use chrono::{Duration, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use storage::Storage;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/site.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    CreateUser {
        username: String,
    },
    /// Publishes one news item, dated today unless `--date` is given.
    CreateNews {
        #[arg(long)]
        title: String,
        #[arg(long)]
        text: String,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Fills the feed with `count` items, one per day going back from today.
    SeedNews {
        #[arg(long, default_value_t = 11)]
        count: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;

    match cli.command {
        Command::CreateUser { username } => {
            let username = username.trim();
            if username.is_empty() {
                bail!("username must not be empty");
            }
            if storage.user_by_username(username).await?.is_some() {
                bail!("user '{username}' already exists");
            }
            let user_id = storage.create_user(username).await?;
            println!("created user_id={}", user_id.0);
        }
        Command::CreateNews { title, text, date } => {
            let date = date.unwrap_or_else(|| Utc::now().date_naive());
            let news_id = storage.create_news(&title, &text, date).await?;
            println!("created news_id={} date={date}", news_id.0);
        }
        Command::SeedNews { count } => {
            let today = Utc::now().date_naive();
            for index in 0..count {
                let date = today - Duration::days(i64::from(index));
                storage
                    .create_news(&format!("News {index}"), "Just text.", date)
                    .await?;
            }
            println!("seeded {count} news items");
        }
    }

    Ok(())
}

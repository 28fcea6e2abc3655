//! Tutorbot binary.
//!
//! Start the bot with:
//! ```bash
//! TELEGRAM_BOT_TOKEN=xxx OPENROUTER_API_KEY=yyy cargo run -p tutor-telegram
//! ```

use clap::Parser;
use tutor_core::Settings;
use tutor_telegram::{BotState, TutorBot};
use tracing_subscriber::EnvFilter;

/// Tutorbot - a course assistant on Telegram
#[derive(Parser, Debug)]
#[command(name = "tutorbot")]
#[command(about = "Telegram teaching assistant with document search and instructor reports")]
struct Args {
    /// Verbose logging (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tutor_core::load_env();

    let filter = match args.verbose {
        0 => "tutor_telegram=info,tutor_agent=info,teloxide=warn",
        1 => "tutor_telegram=debug,tutor_agent=debug,tutor_memory=debug,teloxide=info",
        2 => "tutor_telegram=trace,tutor_agent=trace,tutor_memory=trace,teloxide=debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = tutor_core::ensure_all_dirs() {
        tracing::warn!(error = %e, "Failed to create all directories");
    }

    let settings = Settings::from_env();
    let state = BotState::from_env(settings).await?;
    let bot = TutorBot::new(state)?;

    match bot.get_me().await {
        Ok(username) => {
            tracing::info!(username = %username, "Bot initialized successfully");
            println!("\n[tutorbot] Telegram bot @{}", username);
            println!("   State: {}", tutor_core::state_dir().display());
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to get bot info");
            return Err(e.into());
        }
    }

    println!("\nOpen Telegram and send /start to begin");
    println!("   Press Ctrl+C to stop\n");

    bot.start_polling().await?;

    Ok(())
}

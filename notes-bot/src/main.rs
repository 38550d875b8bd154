use dotenv::dotenv;
use std::sync::Arc;
use teloxide::Bot;

mod channels;
mod config;
mod error;
mod notes;
mod records;
mod sessions;

use channels::ConversationController;
use config::Config;
use notes::NoteStore;
use records::RecordSource;
use sessions::SessionCache;

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Store notes bot v{}", env!("CARGO_PKG_VERSION"));

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    log::info!(
        "Loading dataset from {} (id column {:?})",
        config.dataset_path.display(),
        config.dataset_id_column
    );
    let records = match RecordSource::from_csv_path(&config.dataset_path, &config.dataset_id_column) {
        Ok(records) => records,
        Err(e) => {
            log::error!("Failed to load dataset: {}", e);
            std::process::exit(1);
        }
    };
    log::info!("Loaded {} records", records.len());

    let notes = NoteStore::new(config.notes_file.clone());

    let sessions = Arc::new(SessionCache::new(config.session_idle_timeout, config.max_sessions));
    let _evictor = sessions.start_idle_evictor(config.session_sweep_interval);
    log::info!(
        "Session idle timeout {:?}, sweep every {:?}, capacity {}",
        config.session_idle_timeout,
        config.session_sweep_interval,
        config.max_sessions
    );

    let controller = Arc::new(ConversationController::new(
        Arc::new(records),
        Arc::new(notes),
        sessions,
    ));

    channels::telegram::run(Bot::new(config.bot_token), controller).await;
}

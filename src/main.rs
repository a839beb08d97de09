use chatsync::api::client::ReplayClient;
use chatsync::app::AppConfig;
use chatsync::engine::{Engine, Signal};
use chatsync::storage::Store;
use chatsync::utils::{RUNTIME, spawn_async};
use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Some(recording) = std::env::args_os().nth(1).map(PathBuf::from) else {
        eprintln!("usage: chatsync <events.jsonl>");
        return ExitCode::from(2);
    };

    let mut cfg = AppConfig::load();
    // A recording is exactly one session; don't replay it again on close.
    cfg.max_retries = 0;
    let settle = cfg.debounce();

    let store = match Store::open_default(&cfg) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("cannot open store: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let client = match ReplayClient::from_file(&recording) {
        Ok(client) => client,
        Err(e) => {
            error!("cannot read {}: {}", recording.display(), e);
            return ExitCode::FAILURE;
        }
    };

    RUNTIME.block_on(async move {
        let engine = Engine::new(client, store, cfg);
        let mut signals = engine.subscribe();
        let watcher = spawn_async(async move {
            loop {
                match signals.recv().await {
                    Ok(Signal::ConnectionState(state)) => debug!("state -> {}", state),
                    Ok(Signal::PairingChallenge(code)) => info!("pairing challenge: {}", code),
                    Ok(Signal::MessageAvailable(msg)) => {
                        info!("{} <{}>: {}", msg.conversation_id, msg.sender_name, msg.body)
                    }
                    Ok(Signal::StoreChanged) => debug!("store changed"),
                    Err(RecvError::Lagged(n)) => warn!("observer lagged by {} signals", n),
                    Err(RecvError::Closed) => break,
                }
            }
        });

        let state = engine.run().await;
        tokio::time::sleep(settle).await;
        watcher.abort();
        info!("engine stopped: {}", state);

        match engine.conversations() {
            Ok(chats) => {
                for chat in chats {
                    println!(
                        "{:<28} {:>3}  {}",
                        chat.name, chat.unread, chat.last_message
                    );
                }
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("cannot list conversations: {}", e);
                ExitCode::FAILURE
            }
        }
    })
}

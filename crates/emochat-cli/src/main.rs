use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{command, CommandFactory, Parser};
use emochat_core::{
    load::{load_engine, load_session, LoadRequest},
    Engine, Session,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

mod config;

const PROMPT: &str = ">>> ";

/// Read and parse the TOML configuration at `path`.
pub async fn load_config(path: impl AsRef<Path>) -> Result<config::Config> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path).await?;
    let config = toml::from_str(&contents)
        .map_err(|err| anyhow::anyhow!("invalid config {}: {}", path.display(), err))?;
    Ok(config)
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[arg(long, short, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Prefer a personality mentioning this keyword.
    #[arg(long, short)]
    persona: Option<String>,
    #[arg(long, short)]
    seed: Option<u64>,
}

async fn chat(engine: Engine, mut session: Session) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(PROMPT.as_bytes()).await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break Ok(());
        };
        let input = line.trim().to_string();
        if input.is_empty() {
            println!("Prompt should not be empty!");
            continue;
        }

        let engine = engine.clone();
        let (returned, result) = tokio::task::spawn_blocking(move || {
            let result = engine.respond(&mut session, &input);
            (session, result)
        })
        .await?;
        session = returned;

        let result = result?;
        log::debug!("user: {} {}", result.emotion, result.emoji);
        log::debug!("history: {:?}", session.history.entries());
        println!("{}", result.text);
    }
}

#[tokio::main]
async fn main() {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Warn)
        .with_module_level("emochat", log::LevelFilter::Info)
        .with_module_level("emochat_core", log::LevelFilter::Info)
        .init()
        .expect("start logger");

    let args = Args::parse();

    let cmd = Args::command();
    let version = cmd.get_version().unwrap_or("0.0.1");
    let bin_name = cmd.get_bin_name().unwrap_or("emochat");

    log::info!("{}\tversion: {}", bin_name, version);

    let mut config = {
        let path = args
            .config
            .clone()
            .unwrap_or("assets/configs/Config.toml".into());
        log::info!("reading config {}...", path.to_string_lossy());
        load_config(path).await.expect("load config failed")
    };
    if let Some(keyword) = args.persona {
        config.persona.keyword = keyword;
    }
    if let Some(seed) = args.seed {
        config.session.seed = seed;
    }

    let request: LoadRequest = config.try_into().expect("invalid config");
    let (engine, session) = tokio::task::spawn_blocking(move || -> Result<_> {
        let engine = load_engine(&request)?;
        let session = load_session(&request, &engine)?;
        Ok((engine, session))
    })
    .await
    .expect("loader panicked")
    .expect("load model failed");

    println!("{}", session.personality.text);

    if let Err(err) = chat(engine, session).await {
        log::error!("{}", err);
        std::process::exit(1);
    }
}

//! Sluice CLI binary entry point.

use std::io::Write;
use std::sync::Arc;

use clap::Parser;
use futures::StreamExt;
use sluice::agent_loop::{AgentLoop, AgentRequest};
use sluice::cli::{init_tracing, ChatArgs, Cli, Commands};
use sluice::config::SluiceConfig;
use sluice::provider::OpenAiResponsesService;
use sluice::tools::builtin::builtin_registry;
use sluice::tools::{ToolExecutor, UserId};
use sluice::transcript::with_preamble;
use sluice::turn::{ChatTurn, MemoryTranscript};
use sluice::types::InputItem;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Chat(args) => handle_chat(cli.config, args).await,
        Commands::Tools => handle_tools(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn handle_tools() -> Result<(), Box<dyn std::error::Error>> {
    let registry = builtin_registry();
    let user = UserId::new("cli");
    let names: Vec<String> = registry.names().map(str::to_string).collect();
    for def in registry.definitions(&names, &user) {
        println!("{:<16} {}", def.name, def.description);
    }
    Ok(())
}

async fn handle_chat(
    config_path: Option<std::path::PathBuf>,
    args: ChatArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = SluiceConfig::load(config_path.as_deref())?;
    if let Some(model) = args.model {
        config.model = model;
    }
    if let Some(instructions) = args.instructions {
        config.instructions = Some(instructions);
    }
    if let Some(max) = args.max_iterations {
        config.max_iterations = max;
    }
    config.validate()?;

    let schema = args
        .schema
        .as_deref()
        .map(serde_json::from_str::<serde_json::Value>)
        .transpose()?;

    let registry = builtin_registry();
    let tools = if args.tools.is_empty() {
        registry.names().map(str::to_string).collect()
    } else {
        args.tools
    };

    let service = Arc::new(OpenAiResponsesService::from_config(&config)?);
    let agent = AgentLoop::from_config(&config, service, ToolExecutor::new(Arc::new(registry)));
    let turn = ChatTurn::new(agent, Arc::new(MemoryTranscript::new()));

    let request = AgentRequest::builder()
        .user_id(args.user)
        .model(config.model.clone())
        .maybe_instructions(config.instructions.clone())
        .tools(tools)
        .input(with_preamble(vec![InputItem::user(args.prompt)], schema.as_ref()))
        .build();

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let mut frames = turn.frames(request, cancel);
    let mut stdout = std::io::stdout();
    while let Some(frame) = frames.next().await {
        stdout.write_all(frame?.as_bytes())?;
        stdout.flush()?;
    }
    Ok(())
}

use std::env;
use std::fs;
use std::io::{self, BufRead, Write};

use tracing::error;

use feeder_core::config::{absolutize, Config};
use feeder_core::logging;
use feeder_embed::get_default_embedder;
use feeder_llm::OllamaClient;
use feeder_rag::{ConversationState, HistoryPolicy, RagSession, Retriever};

const PROMPT_FILE: &str = "default_prompt.txt";
const INDEX_FILE: &str = "codebase_index.lance";
const METADATA_FILE: &str = "metadata.txt";

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || args.len() > 3 {
        eprintln!("Usage: {} <project_dir> [model]", args[0]);
        std::process::exit(1);
    }
    let settings = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?.settings()?;
    let project_dir = absolutize(&args[1])?;
    let (prompt_path, index_path, metadata_path) = (project_dir.join(PROMPT_FILE), project_dir.join(INDEX_FILE), project_dir.join(METADATA_FILE));
    let missing: Vec<String> = [&prompt_path, &index_path, &metadata_path].iter().filter(|p| !p.exists()).map(|p| p.display().to_string()).collect();
    if !missing.is_empty() {
        eprintln!("Error: One or more required files are missing in {}: {}", project_dir.display(), missing.join(", "));
        std::process::exit(1);
    }
    let default_prompt = fs::read_to_string(&prompt_path)?.trim().to_string();

    let mut client = OllamaClient::new(&settings.llm)?;
    if let Some(model) = args.get(2) { client = client.with_model(model.as_str()); }
    let embedder = get_default_embedder(&settings.embedding)?;
    let retriever = Retriever::open(&index_path, &metadata_path, embedder.as_ref()).await?;
    println!("Interactive Codebase Session. Type 'exit' to quit.");
    println!("Using prompt: {}", default_prompt);
    println!("Model: {} at {}", client.model(), client.endpoint());
    let session = RagSession::new(retriever, client, settings.retrieval.top_k);
    let mut state = ConversationState::new(default_prompt, HistoryPolicy::from(&settings.history));

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("\nYour question: "); io::stdout().flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 { break; }
        let query = line.trim();
        if query.eq_ignore_ascii_case("exit") { break; }
        if query.is_empty() { continue; }
        match session.ask(&mut state, query).await {
            Ok(turn) => {
                if !turn.has_context() { println!("No relevant results found in the codebase. Interacting with LLM only."); }
                println!("\nOllama Response:\n{}", turn.answer);
            }
            Err(e) => { error!("Query failed: {:#}", e); eprintln!("Error: {}", e); }
        }
    }
    Ok(())
}

use std::env;

use feeder_core::config::{absolutize, Config};
use feeder_core::logging;
use feeder_embed::get_default_embedder;
use feeder_rag::retrieve;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let args: Vec<String> = env::args().collect();
    if args.len() < 4 {
        eprintln!("Usage: {} <index_path> <metadata_file> <query> [--limit N]", args[0]);
        eprintln!("Example: {} ./project/codebase_index.lance ./project/metadata.txt 'config loading' --limit 5", args[0]);
        std::process::exit(1);
    }
    let settings = Config::load()?.settings()?;
    let index_path = absolutize(&args[1])?; let metadata_path = absolutize(&args[2])?; let query_text = &args[3];
    let mut limit = settings.retrieval.top_k;
    let mut i = 4; while i < args.len() { match args[i].as_str() {
        "--limit" => { match args.get(i + 1).and_then(|l| l.parse::<usize>().ok()) { Some(l) => { limit = l; i += 1; } None => { eprintln!("Error: --limit requires a number"); std::process::exit(1); } } }
        other => eprintln!("Ignoring unknown argument: {}", other) } i += 1; }

    let embedder = get_default_embedder(&settings.embedding)?;
    let results = retrieve(query_text, &index_path, embedder.as_ref(), &metadata_path, limit).await?;
    println!("\nFound {} results for: \"{}\"", results.len(), query_text);
    for (rank, result) in results.iter().enumerate() {
        println!("\n  {}. distance={:.4}  id={}  path={}", rank + 1, result.distance, result.id, result.file_path);
        println!("     {}", result.text);
    }
    Ok(())
}

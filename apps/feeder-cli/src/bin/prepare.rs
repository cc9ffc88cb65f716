use std::env;

use feeder_core::config::{absolutize, Config};
use feeder_core::corpus::CorpusLoader;
use feeder_core::logging;
use feeder_embed::get_default_embedder;
use feeder_vector::IndexBuilder;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let args: Vec<String> = env::args().collect();
    if args.len() != 4 {
        eprintln!("Usage: {} <codebase_dir> <index_path> <metadata_file>", args[0]);
        std::process::exit(1);
    }
    let settings = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?.settings()?;
    let codebase_dir = absolutize(&args[1])?; let index_path = absolutize(&args[2])?; let metadata_path = absolutize(&args[3])?;
    println!("Codebase directory: {}", codebase_dir.display());
    println!("Index path: {}", index_path.display());
    println!("Metadata file: {}", metadata_path.display());

    let loader = CorpusLoader::new(settings.chunking.clone()).with_excluded_extensions(settings.corpus.excluded_extensions.clone());
    let chunks = loader.load_chunks(&codebase_dir)?;
    println!("Generated {} chunks (window={} chars)", chunks.len(), settings.chunking.window);

    let embedder = get_default_embedder(&settings.embedding)?;
    let report = IndexBuilder::new(&index_path, &metadata_path).with_batch_size(settings.index.batch_size).build(&chunks, embedder.as_ref()).await?;
    println!("\nIndexed {} chunks (dim={})", report.records, report.dim);
    println!("Index saved to {}", report.index_path.display());
    println!("Metadata saved to {}", report.metadata_path.display());
    Ok(())
}

use std::env;
use std::sync::Arc;

use reportqa_core::chunker::Chunker;
use reportqa_core::report::ReportSerializer;
use reportqa_core::traits::ReportSource;
use reportqa_embed::get_default_embedder;
use reportqa_vector::{IndexBuilder, Retriever};

use reportqa_cli::{bootstrap, logging};

fn main() -> anyhow::Result<()> {
    logging::init();
    let settings = bootstrap::load_settings()?;

    let args: Vec<String> = env::args().skip(1).collect();
    let mut k = settings.retrieval.k;
    let mut query = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--k" | "-k" => {
                match args.get(i + 1).and_then(|v| v.parse::<usize>().ok()).filter(|&v| v > 0) {
                    Some(v) => { k = v; i += 1; }
                    None => { eprintln!("Error: --k requires a positive number"); std::process::exit(1); }
                }
            }
            arg if !arg.starts_with('-') => query = Some(arg.to_string()),
            _ => {}
        }
        i += 1;
    }

    println!("🔎 reportqa-index\n================");
    let source = bootstrap::report_source(&settings)?;
    println!("Report: {}", source.path().display());
    let report = source.load()?;

    let embedder = get_default_embedder(&settings.embedding)?;
    let builder = IndexBuilder::new(
        ReportSerializer::new(settings.report.source_tag.clone()),
        Chunker::new(settings.chunking)?,
        embedder.clone(),
    )
    .with_metric(settings.retrieval.metric)
    .with_progress(true);
    let (index, stats) = builder.build(&report)?;
    println!("📊 Created {} documents", stats.documents);
    println!("📊 Created {} chunks ({} dimensions, {:?} distance)", stats.chunks, stats.dim, index.metric());

    let Some(query) = query else {
        println!("\n💡 Pass a query to see the retrieved chunks: reportqa-index '<query>' [--k N]");
        return Ok(());
    };
    let retriever = Retriever::new(Arc::new(index), embedder, k)?;
    let hits = retriever.search(&query, k)?;
    println!("\n🔍 Top {} chunks for: \"{}\"", hits.len(), query);
    for (rank, (text, distance)) in hits.iter().enumerate() {
        println!("\n  {}. distance={:.4}", rank + 1, distance);
        for line in text.lines() {
            println!("     {}", line);
        }
    }
    Ok(())
}

//! List a RAR archive's entries, optionally extracting stored files.
//!
//! Usage:
//!   cargo run --example list -- archive.rar [output_dir/]
//!
//! Set `RUST_LOG=rar_reader=trace` to watch the engine calls.

use std::path::Path;

use rar_reader::Archive;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: list <archive.rar> [output_dir]");
        eprintln!("  list ./photos.rar ./out/");
        std::process::exit(1);
    }
    let output_dir = args.get(2).map(Path::new);

    let mut archive = Archive::open(&args[1])?;
    while let Some(header) = archive.next()? {
        let kind = if header.is_dir() { "dir " } else { "file" };
        println!(
            "{kind} {:>12} {:>12}  {:08x}  {}",
            header.packed_size, header.unpacked_size, header.crc, header.name
        );

        let Some(output_dir) = output_dir else {
            continue;
        };
        let out_path = output_dir.join(&header.name);
        if header.is_dir() {
            std::fs::create_dir_all(&out_path)?;
            continue;
        }
        match archive.read_all() {
            Ok(content) => {
                if let Some(parent) = out_path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&out_path, content)?;
            }
            Err(e) => eprintln!("  skipped {}: {e}", header.name),
        }
    }

    archive.close()?;
    Ok(())
}

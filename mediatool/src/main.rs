// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Reads a media file, logging its events, and optionally copies it to one or
//! more destinations.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::Parser;
use mediatool::{
    EventKind, MediaGenerator, ReaderState, Result, ToolFactory,
    backend::file::FileBackend, config::ToolConfig, listener::shared,
};

#[derive(Debug, Parser)]
#[command(version, about = "Read a media file and copy it to destinations", long_about = None)]
struct Cli {
    /// File to read.
    source: Option<PathBuf>,

    /// Files to write a copy of the source to.
    destinations: Vec<PathBuf>,

    /// Hand out native buffers without copying them.
    #[arg(long)]
    turbo: bool,

    /// JSON tool configuration.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Packet size in bytes; overrides the configuration.
    #[arg(long, value_name = "BYTES")]
    chunk_size: Option<usize>,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let Some(source) = cli.source.as_deref() else {
        println!("Must enter at least one Source File to read.");
        std::process::exit(0);
    };
    if !source.exists() {
        println!("Source file does not exist: {}", source.display());
        std::process::exit(0);
    }

    match run(&cli, source) {
        Ok(()) => std::process::exit(0),
        Err(err) => {
            tracing::error!(error = %err, "Pipeline failed");
            std::process::exit(1);
        }
    }
}

fn run(cli: &Cli, source: &Path) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => ToolConfig::from_file(path)?,
        None => ToolConfig::default(),
    };
    if let Some(chunk_size) = cli.chunk_size {
        config.chunk_size = chunk_size;
    }
    if cli.turbo {
        ToolFactory::set_turbo_charged(true);
    }

    let backend = FileBackend::new(config.chunk_size)?;
    let factory = ToolFactory::from_config(&config, Arc::new(backend));
    let url = source.to_string_lossy().into_owned();

    let mut reader = factory.make_reader(url.as_str())?;
    let debug = shared(factory.make_debug_listener());
    reader.add_listener(debug.clone());
    for destination in &cli.destinations {
        let writer = factory.make_writer(destination.to_string_lossy(), &reader)?;
        reader.add_listener(shared(writer));
    }

    let signal = loop {
        if let Some(signal) = reader.read_packet()? {
            break signal;
        }
    };
    if reader.state() != ReaderState::Closed {
        reader.close()?;
    }

    let packets = debug.borrow().count(EventKind::ReadPacket);
    if signal.is_eof() {
        tracing::info!(%url, packets, destinations = cli.destinations.len(), "Finished reading");
    } else {
        tracing::warn!(%url, packets, %signal, "Reading stopped early");
    }
    Ok(())
}

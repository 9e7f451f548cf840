//! Duplex Cat
//!
//! Wraps stdin and stdout into one duplex stream and pipes the stream into
//! itself, so everything read from stdin is written to stdout.
//!
//! `DUPLEX_CHUNK_SIZE` sets the read size (default 8192).

use std::sync::Arc;

use duplexstream::stdio::DEFAULT_CHUNK_SIZE;
use duplexstream::{pipe, DuplexStream, EventKind, IoReadable, IoWritable, StreamEvent, Stream};

fn chunk_size_from_env() -> usize {
    match std::env::var("DUPLEX_CHUNK_SIZE") {
        Ok(value) => value.parse().unwrap_or_else(|_| {
            log::warn!("DUPLEX_CHUNK_SIZE={value:?} is not a number, using {DEFAULT_CHUNK_SIZE}");
            DEFAULT_CHUNK_SIZE
        }),
        Err(_) => DEFAULT_CHUNK_SIZE,
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let input = Arc::new(IoReadable::with_chunk_size(
        std::io::stdin(),
        chunk_size_from_env(),
    ));
    let output = Arc::new(IoWritable::new(std::io::stdout()));
    let duplex = Arc::new(DuplexStream::new(&input, &output)?);

    duplex.events().on(EventKind::Error, |event| {
        if let StreamEvent::Error(err) = event {
            eprintln!("duplex_cat: {err}");
        }
    });
    duplex.events().on(EventKind::Finish, |_| log::debug!("output finished"));

    let pipeline = pipe(&duplex, &duplex);
    let total = input.pump_to_end()?;

    log::info!("copied {total} bytes, pipeline active: {}", pipeline.is_active());
    Ok(())
}

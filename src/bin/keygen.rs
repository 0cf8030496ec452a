//! Print a random hex key suitable for `VIDEOTUBE_SIGNING_KEY` or
//! `VIDEOTUBE_FINGERPRINT_KEY`.
//!
//! $ cargo run --bin keygen -- --bytes 64

use argon2::password_hash::rand_core::{OsRng, RngCore};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Number of random bytes before hex encoding.
    #[arg(long, default_value_t = 64)]
    bytes: usize,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    if args.bytes < 16 {
        return Err(anyhow::anyhow!("keys need at least 16 bytes"));
    }

    let mut key = vec![0u8; args.bytes];
    OsRng.fill_bytes(&mut key);
    println!("{}", hex::encode(key));
    Ok(())
}

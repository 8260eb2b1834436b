//! # Voxel Mesher Entry Point
//!
//! Calls into the library's `run()` and reports a fatal error.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release -- path/to/config.json
//! ```

use std::process::ExitCode;

fn main() -> ExitCode {
    match voxel_mesher::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            log::error!("{}", error);
            eprintln!("voxel-mesher: {}", error);
            ExitCode::FAILURE
        }
    }
}

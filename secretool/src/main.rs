mod cli;
mod cluster;
mod config;
mod controller;
mod credentials;
mod image;
mod patch;
mod plan;
mod tls;
mod webhook;
mod workload;
mod shadow {
    #![allow(clippy::needless_raw_string_hashes)]
    use shadow_rs::shadow;
    shadow!(build);

    pub use self::build::*;
}

use self::cli::Cli;

fn main() {
    if rustls::crypto::aws_lc_rs::default_provider().install_default().is_err() {
        eprintln!("Error: failed to install the default TLS crypto provider");
        std::process::exit(1);
    }

    match Cli::default().run() {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(err) => {
            eprintln!("Error: {err}");
            std::process::exit(1);
        }
    }
}

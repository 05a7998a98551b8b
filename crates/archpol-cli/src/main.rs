//! `archpol` entrypoint.

fn main() {
    std::process::exit(archpol_cli::run());
}

// Entrypoint for the CLI application.
// - Keeps `main` small: initialize logging and hand control to the
//   dispatcher in `cli`.
// - Returns `anyhow::Result` so fatal errors print once and exit non-zero.

fn main() -> anyhow::Result<()> {
    // Progress and diagnostics go through `log`; default to info so the
    // request trace is visible without RUST_LOG being set.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    dmx_cli::cli::run()
}

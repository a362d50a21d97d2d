// Library root
// -----------
// This crate exposes a small library surface for the CLI. The binary
// (`main.rs`) uses these modules to implement the command dispatcher.
//
// Module responsibilities:
// - `config`: Resolves server, port and credentials from a local dmx.cfg
//   file or from a remote DMX installation's config.properties.
// - `api`: Encapsulates HTTP interactions with the DMX service (session
//   login, read/write executors, topic/workspace/user operations).
// - `payload`: Loads JSON payload files and renders JSON for display.
// - `cli`: Parses flags into typed commands and dispatches them.
//
// Keeping this separation makes it easier to test the API logic or
// replace the flag surface in the future.
pub mod api;
pub mod cli;
pub mod config;
pub mod payload;

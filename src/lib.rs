// Library root
// -----------
// The binary (`main.rs`) is a thin shell over these modules so the API
// and session logic can be tested without a terminal.
//
// - `session`: the persisted `{access_token, base_url}` pair.
// - `api`: blocking HTTP client for the patient service.
// - `model`: patient request/response shapes and merge-on-blank updates.
// - `cli`: clap commands mapped onto API calls.
// - `ui`: prompts, spinner, tables and coloured output.
// - `error`: error taxonomy and exit codes.
pub mod api;
pub mod cli;
pub mod error;
pub mod logging;
pub mod model;
pub mod session;
pub mod ui;

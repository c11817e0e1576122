// Command surface: parses arguments with clap and maps each command onto
// one API call, then renders the result. Errors bubble up as `anyhow`
// errors; `main` prints them and picks the exit code.

use crate::api::ApiClient;
use crate::error::PmsError;
use crate::model::{NewPatient, Patient, PatientUpdate};
use crate::session::SessionStore;
use crate::ui;
use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use reqwest::StatusCode;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "pms", version, about = "PMS CLI: Patient Management System")]
pub struct Cli {
    /// Session file to use instead of ~/.pms/config
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// More log output on stderr (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Log in and save the access token
    Login {
        /// Username to authenticate as
        identifier: String,
        /// Prompted for when omitted
        password: Option<String>,
        /// Server to log in to; defaults to the configured one
        #[arg(long, value_name = "URL")]
        base_url: Option<String>,
    },
    /// Forget the saved access token
    Logout,
    /// List patients, or search by name or email
    Patients {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    /// Register a new patient; missing fields are prompted for
    AddPatient {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        address: Option<String>,
        /// Date of birth, YYYY-MM-DD
        #[arg(long = "dob", value_name = "DATE")]
        date_of_birth: Option<String>,
    },
    /// Edit a patient interactively; blank answers keep the current value
    UpdatePatient {
        #[arg(long)]
        email: String,
    },
    /// Delete a patient by email or id
    DeletePatient {
        #[arg(long, conflicts_with = "id", required_unless_present = "id")]
        email: Option<String>,
        #[arg(long)]
        id: Option<String>,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Show the analytics service status
    Status,
}

pub fn run(cli: Cli) -> Result<()> {
    let store = cli
        .config
        .map(SessionStore::new)
        .unwrap_or_else(SessionStore::open_default);

    match cli.command {
        Command::Login {
            identifier,
            password,
            base_url,
        } => login(&store, &identifier, password, base_url),
        Command::Logout => logout(&store),
        Command::Patients { name, email } => {
            patients(&connect(&store)?, name.as_deref(), email.as_deref())
        }
        Command::AddPatient {
            name,
            email,
            address,
            date_of_birth,
        } => {
            let new = NewPatient {
                name: given_or_prompt(name, "Name", ui::prompt_required)?,
                email: given_or_prompt(email, "Email", ui::prompt_required)?,
                address: given_or_prompt(address, "Address", ui::prompt_required)?,
                date_of_birth: given_or_prompt(date_of_birth, "Date of birth", ui::prompt_date)?,
            };
            add_patient(&connect(&store)?, new)
        }
        Command::UpdatePatient { email } => update_patient(&connect(&store)?, &email),
        Command::DeletePatient { email, id, yes } => {
            let target = match (email, id) {
                (_, Some(id)) => DeleteTarget::Id(id),
                (Some(email), None) => DeleteTarget::Email(email),
                (None, None) => {
                    return Err(PmsError::InvalidArgument("give --email or --id".into()).into())
                }
            };
            delete_patient(&connect(&store)?, target, yes)
        }
        Command::Status => status(&connect(&store)?),
    }
}

/// A hint for errors the user can fix themselves.
pub fn hint_for(err: &anyhow::Error) -> Option<&'static str> {
    match err.chain().find_map(|e| e.downcast_ref::<PmsError>())? {
        PmsError::Http { status, .. }
            if *status == StatusCode::UNAUTHORIZED || *status == StatusCode::FORBIDDEN =>
        {
            Some("Your session may have expired. Run `pms login` first.")
        }
        PmsError::Transport(_) => {
            Some("Is the server running? Check the base URL with `pms login --base-url`.")
        }
        _ => None,
    }
}

fn connect(store: &SessionStore) -> Result<ApiClient> {
    let session = store.load().context("Reading session")?;
    if !session.is_logged_in() {
        info!("no saved token; sending unauthenticated request");
    }
    Ok(ApiClient::from_session(&session)?)
}

fn given_or_prompt(
    value: Option<String>,
    label: &str,
    prompt: fn(&str) -> std::io::Result<String>,
) -> Result<String> {
    match value {
        Some(v) => Ok(v),
        None => Ok(prompt(label)?),
    }
}

fn login(
    store: &SessionStore,
    identifier: &str,
    password: Option<String>,
    base_url: Option<String>,
) -> Result<()> {
    let mut file = store.open().context("Reading session")?;
    let base_url = base_url.unwrap_or_else(|| file.session().base_url().to_string());
    let password = match password {
        Some(p) => p,
        None => ui::prompt_password("Password")?,
    };
    let client = ApiClient::new(base_url, None)?;
    let token = ui::with_spinner("Logging in...", || client.login(identifier, &password))
        .context("Login failed")?;
    file.set_login(&token, client.base_url());
    file.write().context("Saving session")?;
    ui::success("Login successful!");
    Ok(())
}

fn logout(store: &SessionStore) -> Result<()> {
    store.clear_token().context("Clearing session")?;
    ui::notice("Logged out.");
    Ok(())
}

fn patients(client: &ApiClient, name: Option<&str>, email: Option<&str>) -> Result<()> {
    let found = ui::with_spinner("Fetching patients...", || {
        if name.is_none() && email.is_none() {
            client.list_patients()
        } else {
            client.search_patients(name, email)
        }
    })
    .context("Fetching patients")?;
    print_patients(&found);
    Ok(())
}

fn print_patients(patients: &[Patient]) {
    if patients.is_empty() {
        ui::notice("No patients found.");
    } else {
        println!("{}", ui::patients_table(patients));
    }
}

fn add_patient(client: &ApiClient, new: NewPatient) -> Result<()> {
    let created = ui::with_spinner("Creating patient...", || client.create_patient(new))
        .context("Creating patient")?;
    ui::success("Patient created.");
    if created != Patient::default() {
        print_patients(std::slice::from_ref(&created));
    }
    Ok(())
}

fn update_patient(client: &ApiClient, email: &str) -> Result<()> {
    update_patient_with(client, email, |existing| {
        print_patients(std::slice::from_ref(existing));
        println!("Press Enter to keep the current value.");
        Ok(PatientUpdate {
            name: ui::prompt_keep("Name", existing.name.as_deref(), false)?,
            email: ui::prompt_keep("Email", existing.email.as_deref(), false)?,
            address: ui::prompt_keep("Address", existing.address.as_deref(), false)?,
            date_of_birth: ui::prompt_keep(
                "Date of birth",
                existing.date_of_birth.as_deref(),
                true,
            )?,
        })
    })
}

/// Look up by email, collect edits with `ask`, merge blanks onto the
/// current record and send the update.
fn update_patient_with(
    client: &ApiClient,
    email: &str,
    ask: impl FnOnce(&Patient) -> std::io::Result<PatientUpdate>,
) -> Result<()> {
    let existing = ui::with_spinner("Looking up patient...", || {
        client.get_patient_by_email(email)
    })
    .context("Looking up patient")?;
    let Some(existing) = existing else {
        ui::notice(&format!("No patient found with email {email}."));
        return Ok(());
    };

    let payload = ask(&existing)?.merge_onto(&existing);

    let updated = ui::with_spinner("Updating patient...", || {
        client.update_patient_by_email(email, &payload)
    })
    .context("Updating patient")?;
    ui::success("Patient updated.");
    if updated != Patient::default() {
        print_patients(std::slice::from_ref(&updated));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum DeleteTarget {
    Id(String),
    Email(String),
}

fn delete_patient(client: &ApiClient, target: DeleteTarget, yes: bool) -> Result<()> {
    let label = match &target {
        DeleteTarget::Id(id) => format!("patient {id}"),
        DeleteTarget::Email(email) => format!("patient with email {email}"),
    };
    if !yes && !ui::confirm(&format!("Delete {label}?"))? {
        ui::notice("Aborted.");
        return Ok(());
    }
    ui::with_spinner("Deleting patient...", || match &target {
        DeleteTarget::Id(id) => client.delete_patient_by_id(id),
        DeleteTarget::Email(email) => client.delete_patient_by_email(email),
    })
    .context("Deleting patient")?;
    ui::success(&format!("Deleted {label}."));
    Ok(())
}

fn status(client: &ApiClient) -> Result<()> {
    let status = ui::with_spinner("Checking analytics...", || client.analytics_status())
        .context("Fetching analytics status")?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use mockito::{Matcher, Server};
    use serde_json::json;
    use tempfile::TempDir;

    fn parse(args: &[&str]) -> std::result::Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("pms").chain(args.iter().copied()))
    }

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn login_takes_optional_password() {
        let cli = parse(&["login", "admin"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Login {
                identifier: "admin".into(),
                password: None,
                base_url: None,
            }
        );

        let cli = parse(&["login", "admin", "s3cret", "--base-url", "http://h:1"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Login { password: Some(ref p), base_url: Some(ref u), .. }
                if p == "s3cret" && u == "http://h:1"
        ));
    }

    #[test]
    fn global_flags_work_after_subcommand() {
        let cli = parse(&["patients", "--name", "Ada", "-vv", "--config", "/tmp/pms"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/pms")));
        assert_eq!(
            cli.command,
            Command::Patients {
                name: Some("Ada".into()),
                email: None,
            }
        );
    }

    #[test]
    fn delete_needs_exactly_one_target() {
        assert!(parse(&["delete-patient"]).is_err());
        assert!(parse(&["delete-patient", "--email", "a@b.c", "--id", "1"]).is_err());
        let cli = parse(&["delete-patient", "--id", "1", "-y"]).unwrap();
        assert_eq!(
            cli.command,
            Command::DeletePatient {
                email: None,
                id: Some("1".into()),
                yes: true,
            }
        );
    }

    #[test]
    fn update_requires_email() {
        assert!(parse(&["update-patient"]).is_err());
        assert!(parse(&["update-patient", "--email", "a@b.c"]).is_ok());
    }

    #[test]
    fn add_patient_accepts_dob_flag() {
        let cli = parse(&["add-patient", "--dob", "2000-01-31"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::AddPatient { date_of_birth: Some(ref d), .. } if d == "2000-01-31"
        ));
    }

    #[test]
    fn unauthorized_gets_login_hint() {
        let err: anyhow::Error = PmsError::Http {
            status: StatusCode::UNAUTHORIZED,
            body: String::new(),
        }
        .into();
        assert!(hint_for(&err).unwrap().contains("pms login"));

        let err: anyhow::Error = PmsError::Http {
            status: StatusCode::CONFLICT,
            body: String::new(),
        }
        .into();
        assert!(hint_for(&err).is_none());
    }

    #[test]
    fn search_conflict_fails_before_network() {
        // Port 9 (discard) is never contacted: the filter check comes first.
        let client = ApiClient::new("http://127.0.0.1:9", Some("t".into())).unwrap();
        let err = patients(&client, Some("Ada"), Some("a@b.c")).unwrap_err();
        assert_eq!(crate::error::exit_code_for(&err), crate::error::exit::INVALID_ARGUMENT);
    }

    #[test]
    fn login_saves_token_and_server() {
        let mut server = Server::new();
        let _m = server
            .mock("POST", "/auth/login")
            .with_status(200)
            .with_body(r#"{"access_token":"jwt-7"}"#)
            .create();
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().join("config"));

        login(&store, "admin", Some("pw".into()), Some(server.url())).unwrap();

        let session = store.load().unwrap();
        assert_eq!(session.token(), Some("jwt-7"));
        assert_eq!(session.base_url(), server.url());
    }

    #[test]
    fn rejected_login_leaves_session_file_alone() {
        let mut server = Server::new();
        let _m = server
            .mock("POST", "/auth/login")
            .with_status(401)
            .with_body("bad credentials")
            .create();
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().join("config"));
        store.save("old-token", "http://old:1").unwrap();
        let before = std::fs::read_to_string(store.path()).unwrap();

        let err = login(&store, "admin", Some("nope".into()), Some(server.url())).unwrap_err();

        assert_eq!(crate::error::exit_code_for(&err), crate::error::exit::HTTP);
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), before);
    }

    #[test]
    fn rejected_first_login_creates_no_file() {
        let mut server = Server::new();
        let _m = server.mock("POST", "/auth/login").with_status(500).create();
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().join("config"));

        assert!(login(&store, "admin", Some("pw".into()), Some(server.url())).is_err());
        assert!(!store.path().exists());
    }

    fn search_by_email(server: &mut Server, body: serde_json::Value) -> mockito::Mock {
        server
            .mock("GET", Matcher::Regex(r"^/api/patients/search(\?|$)".into()))
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("query".into(), "ada@example.org".into()),
                Matcher::UrlEncoded("flag".into(), "email".into()),
            ]))
            .with_status(200)
            .with_body(body.to_string())
            .create()
    }

    fn update_path() -> Matcher {
        Matcher::Regex(r"^/api/patients/update-by-email(\?|$)".into())
    }

    #[test]
    fn update_flow_merges_blank_answers_onto_current_record() {
        let mut server = Server::new();
        let lookup = search_by_email(
            &mut server,
            json!([{
                "id": "p-1",
                "name": "Ada",
                "email": "ada@example.org",
                "address": "London",
                "dateOfBirth": "1815-12-10",
            }]),
        );
        let put = server
            .mock("PUT", update_path())
            .match_query(Matcher::UrlEncoded("email".into(), "ada@example.org".into()))
            .match_body(Matcher::Json(json!({
                "name": "Ada",
                "email": "ada@example.org",
                "address": "Ockham Park",
                "dateOfBirth": "1815-12-10",
            })))
            .with_status(200)
            .create();
        let client = ApiClient::new(server.url(), Some("t".into())).unwrap();

        update_patient_with(&client, "ada@example.org", |current| {
            assert_eq!(current.id_text(), "p-1");
            Ok(PatientUpdate {
                address: "Ockham Park".into(),
                ..Default::default()
            })
        })
        .unwrap();

        lookup.assert();
        put.assert();
    }

    #[test]
    fn update_of_unknown_email_sends_nothing() {
        let mut server = Server::new();
        let _lookup = search_by_email(&mut server, json!([]));
        let put = server.mock("PUT", update_path()).expect(0).create();
        let client = ApiClient::new(server.url(), Some("t".into())).unwrap();

        update_patient_with(&client, "ada@example.org", |_| {
            panic!("no prompt for a missing patient")
        })
        .unwrap();
        put.assert();
    }

    #[test]
    fn failed_update_surfaces_http_error() {
        let mut server = Server::new();
        let _lookup = search_by_email(&mut server, json!([{"email": "ada@example.org"}]));
        let _put = server
            .mock("PUT", update_path())
            .with_status(409)
            .with_body("email already taken")
            .create();
        let client = ApiClient::new(server.url(), Some("t".into())).unwrap();

        let err = update_patient_with(&client, "ada@example.org", |_| Ok(PatientUpdate::default()))
            .unwrap_err();
        assert_eq!(crate::error::exit_code_for(&err), crate::error::exit::HTTP);
    }
}

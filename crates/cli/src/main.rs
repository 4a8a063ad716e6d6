use clap::{Parser, Subcommand, ValueEnum};
use clinic_core::config::{
    resolve_graph_connection, save_credentials, ConfigValues, ENV_CREDENTIALS_FILE,
};
use clinic_core::constants::DEFAULT_CREDENTIALS_FILE;
use clinic_core::{
    schema, AccountKind, ClinicRecords, ConversationOrder, CoreConfig, DraftAttachment,
    GraphStore, MessageDraft, NewAccount, Section, Session,
};
use clinic_types::{EntityId, NonEmptyText};
use std::error::Error;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod entities;

use entities::{
    AppointmentCommand, ClinicCommand, DepartmentCommand, DiagnosisCommand, DoctorCommand,
    ObservationCommand, PatientCommand,
};

#[derive(Parser)]
#[command(name = "clinic")]
#[command(about = "Clinic records manager CLI")]
struct Cli {
    /// Login name
    #[arg(long, global = true, env = "CLINIC_LOGIN")]
    login: Option<String>,
    /// Password for the login
    #[arg(long, global = true, env = "CLINIC_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the graph store, counters and default accounts, and cache the credentials
    Bootstrap {
        /// `memory:` or `file://<path>` of the graph store
        #[arg(long, env = "CLINIC_GRAPH_URI")]
        graph_uri: Option<String>,
        /// Graph store user
        #[arg(long, env = "CLINIC_GRAPH_USER")]
        graph_user: Option<String>,
        /// Graph store password
        #[arg(long, env = "CLINIC_GRAPH_PASSWORD", hide_env_values = true)]
        graph_password: Option<String>,
        /// Skip the default admin/admin and user1/user123 accounts
        #[arg(long)]
        no_seed: bool,
    },
    /// Register a standard account for yourself
    Register {
        name: String,
        #[arg(long)]
        new_password: String,
        #[arg(long)]
        confirm: String,
    },
    /// Show who you are logged in as and which sections you can use
    Whoami,
    /// Manage accounts
    #[command(subcommand)]
    Account(AccountCommand),
    /// Clinics
    #[command(subcommand)]
    Clinic(ClinicCommand),
    /// Departments
    #[command(subcommand)]
    Department(DepartmentCommand),
    /// Doctors
    #[command(subcommand)]
    Doctor(DoctorCommand),
    /// Patients
    #[command(subcommand)]
    Patient(PatientCommand),
    /// Appointments
    #[command(subcommand)]
    Appointment(AppointmentCommand),
    /// Observations
    #[command(subcommand)]
    Observation(ObservationCommand),
    /// Diagnoses
    #[command(subcommand)]
    Diagnosis(DiagnosisCommand),
    /// Store a file as an attachment and print its handle
    Attach { path: PathBuf },
    /// List the people you can message
    Recipients,
    /// Send a message
    Send {
        /// Doctor or patient id of the receiver
        to: String,
        #[arg(long)]
        text: Option<String>,
        /// File to attach
        #[arg(long, conflicts_with = "handle")]
        file: Option<PathBuf>,
        /// Handle of an already stored attachment
        #[arg(long)]
        handle: Option<u64>,
    },
    /// Show the conversation with another person
    Conversation {
        other: String,
        #[arg(long, value_enum, default_value_t = OrderArg::Oldest)]
        order: OrderArg,
        /// Maximum number of messages (default 200, at most 1000)
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[derive(Subcommand)]
enum AccountCommand {
    /// Change your own login name and/or password
    Change {
        #[arg(long)]
        new_name: Option<String>,
        #[arg(long)]
        new_password: Option<String>,
    },
    /// Create an account mapped to a doctor or patient (administrators only)
    Create {
        #[arg(value_enum)]
        kind: KindArg,
        name: EntityId,
        #[arg(long)]
        new_password: NonEmptyText,
        /// Doctor or patient id; defaults to the login name
        #[arg(long)]
        person_id: Option<EntityId>,
    },
    /// List accounts (administrators only)
    List,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Admin,
    User,
}

#[derive(Clone, Copy, ValueEnum)]
enum OrderArg {
    Oldest,
    Newest,
}

fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let Some(command) = cli.command else {
        println!("Use 'clinic --help' for commands");
        return Ok(());
    };

    let command = match command {
        Commands::Bootstrap {
            graph_uri,
            graph_user,
            graph_password,
            no_seed,
        } => return bootstrap(graph_uri, graph_user, graph_password, !no_seed),
        other => other,
    };

    let config = CoreConfig::resolve(ConfigValues::from_env())?;
    let records = ClinicRecords::open(&config)?;

    let command = match command {
        Commands::Register {
            name,
            new_password,
            confirm,
        } => {
            records
                .accounts()
                .register_user(&name, &new_password, &confirm)?;
            println!("Registered {}", name.trim());
            return Ok(());
        }
        other => other,
    };

    let session = login(&records, cli.login.as_deref(), cli.password.as_deref())?;

    match command {
        Commands::Bootstrap { .. } | Commands::Register { .. } => Ok(()),
        Commands::Whoami => {
            let me = records.identity().resolve(&session)?;
            println!(
                "{} ({}) acting as {} {}",
                me.login_name, me.role, me.user_type, me.person_id
            );
            let sections: Vec<String> = me
                .sections()
                .iter()
                .map(|s| format!("{:?}", s).to_lowercase())
                .collect();
            println!("Sections: {}", sections.join(", "));
            Ok(())
        }
        Commands::Account(command) => run_account(&records, &session, command),
        Commands::Clinic(command) => {
            require_section(&records, &session, Section::Clinics)?;
            entities::run_clinic(&records, &session, command)
        }
        Commands::Department(command) => {
            require_section(&records, &session, Section::Departments)?;
            entities::run_department(&records, &session, command)
        }
        Commands::Doctor(command) => {
            require_section(&records, &session, Section::Doctors)?;
            entities::run_doctor(&records, &session, command)
        }
        Commands::Patient(command) => {
            require_section(&records, &session, Section::Patients)?;
            entities::run_patient(&records, &session, command)
        }
        Commands::Appointment(command) => {
            require_section(&records, &session, Section::Appointments)?;
            entities::run_appointment(&records, &session, command)
        }
        Commands::Observation(command) => {
            require_section(&records, &session, Section::Observations)?;
            entities::run_observation(&records, &session, command)
        }
        Commands::Diagnosis(command) => {
            require_section(&records, &session, Section::Diagnoses)?;
            entities::run_diagnosis(&records, &session, command)
        }
        Commands::Attach { path } => {
            let stored = records.attachments().save_file(&path)?;
            println!(
                "Stored {} as handle {} ({} bytes, sha256 {})",
                path.display(),
                stored.handle,
                stored.size_bytes,
                stored.sha256
            );
            Ok(())
        }
        Commands::Recipients => {
            let people = records.identity().counterparts(&session)?;
            if people.is_empty() {
                println!("No recipients.");
            }
            for person in people {
                println!("{}\t{}", person.id, person.name.unwrap_or_default());
            }
            Ok(())
        }
        Commands::Send {
            to,
            text,
            file,
            handle,
        } => {
            let attachment = match (file, handle) {
                (Some(path), _) => Some(DraftAttachment::Path(path)),
                (None, Some(handle)) => Some(DraftAttachment::Stored(handle)),
                (None, None) => None,
            };
            let id = records
                .messaging()
                .send(&session, &to, MessageDraft { text, attachment })?;
            println!("Sent message {}", id);
            Ok(())
        }
        Commands::Conversation {
            other,
            order,
            limit,
        } => {
            let order = match order {
                OrderArg::Oldest => ConversationOrder::OldestFirst,
                OrderArg::Newest => ConversationOrder::NewestFirst,
            };
            let messages = records
                .messaging()
                .conversation(&session, &other, order, limit)?;
            if messages.is_empty() {
                println!("No messages.");
            }
            for m in messages {
                println!(
                    "[{}] {} -> {}: {}{}",
                    m.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
                    m.sender_id,
                    m.receiver_id,
                    m.text.unwrap_or_default(),
                    m.file_url
                        .map(|url| format!(" (attachment: {})", url))
                        .unwrap_or_default()
                );
            }
            Ok(())
        }
    }
}

fn login(
    records: &ClinicRecords,
    name: Option<&str>,
    password: Option<&str>,
) -> Result<Session, Box<dyn Error>> {
    match (name, password) {
        (Some(name), Some(password)) => Ok(records.accounts().login(name, password)?),
        _ => Err("--login and --password (or CLINIC_LOGIN and CLINIC_PASSWORD) are required".into()),
    }
}

fn require_section(
    records: &ClinicRecords,
    session: &Session,
    section: Section,
) -> Result<(), Box<dyn Error>> {
    if records.identity().resolve(session)?.can_open(section) {
        Ok(())
    } else {
        Err(format!("'{}' cannot open {:?}", session.login_name, section).into())
    }
}

fn run_account(
    records: &ClinicRecords,
    session: &Session,
    command: AccountCommand,
) -> Result<(), Box<dyn Error>> {
    match command {
        AccountCommand::Change {
            new_name,
            new_password,
        } => {
            let updated = records.accounts().change_own_credentials(
                session,
                new_name.as_deref(),
                new_password.as_deref(),
            )?;
            if updated == *session {
                println!("Nothing to change.");
            } else {
                println!("Account updated; log in as {}", updated.login_name);
            }
        }
        AccountCommand::Create {
            kind,
            name,
            new_password,
            person_id,
        } => {
            let kind = match kind {
                KindArg::Admin => AccountKind::Admin,
                KindArg::User => AccountKind::User,
            };
            records.accounts().create_account(
                session,
                NewAccount {
                    kind,
                    name: name.clone(),
                    password: new_password,
                    person_id,
                },
            )?;
            println!("Created account {}", name);
        }
        AccountCommand::List => {
            for account in records.accounts().list(session)? {
                println!(
                    "{}\t{:?}\t{}",
                    account.name, account.kind, account.person_id
                );
            }
        }
    }
    Ok(())
}

fn bootstrap(
    graph_uri: Option<String>,
    graph_user: Option<String>,
    graph_password: Option<String>,
    seed_defaults: bool,
) -> Result<(), Box<dyn Error>> {
    let credentials_file = std::env::var(ENV_CREDENTIALS_FILE)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CREDENTIALS_FILE));

    let connection =
        resolve_graph_connection(graph_uri, graph_user, graph_password, &credentials_file)?;
    let store = GraphStore::create(&connection)?;
    let report = schema::bootstrap(&store, seed_defaults)?;
    save_credentials(&credentials_file, &connection)?;

    println!("Graph store ready at {}", connection.uri());
    if report.created_counters {
        println!("Created attachment counter");
    }
    for name in &report.created_accounts {
        println!("Created default account {}", name);
    }
    println!("Saved credentials to {}", credentials_file.display());
    Ok(())
}

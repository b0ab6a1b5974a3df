//! Medrec command-line tool.
//!
//! Inspects and populates the records store using the same configuration
//! as the service (`MEDREC_*` environment variables, overridable by flags).

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use medrec_core::{NewAssignment, NewPatient, NewRecord, Store, StoreConfig};
use serde_json::{json, Value};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "medrec")]
#[command(about = "Medical records store maintenance")]
struct Cli {
    #[command(flatten)]
    store: StoreConfig,

    /// Log level used when RUST_LOG is not set.
    #[arg(long, env = "MEDREC_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print every record.
    Records {
        /// Embed each record's patient.
        #[arg(long)]
        embed_patient: bool,
    },
    /// Print every record with its patient and medication assignments.
    DoctorView,
    /// Print a patient and their records.
    Patient { id: String },
    /// Print a record and its medication assignments.
    Record { id: String },
    /// Create a patient.
    AddPatient {
        #[arg(long)]
        name: String,
        /// Date of birth (YYYY-MM-DD).
        #[arg(long)]
        dob: String,
    },
    /// Create a record for an existing patient.
    AddRecord {
        #[arg(long)]
        patient_id: String,
        /// Condition; repeat for several.
        #[arg(long = "condition", required = true)]
        conditions: Vec<String>,
        /// Date of last visit (defaults to today).
        #[arg(long)]
        last_visit: Option<String>,
    },
    /// Assign a medication to an existing record.
    Assign {
        #[arg(long)]
        record_id: String,
        #[arg(long)]
        doctor: String,
        #[arg(long)]
        medication: String,
        #[arg(long)]
        notes: Option<String>,
    },
    /// List uploaded documents for a patient.
    Documents { patient_id: String },
}

/// Initializes the tracing subscriber, writing to stderr.
fn init_logging(level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("medrec_core={0},medrec={0}", level)));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Execute one command and return what should be printed.
fn run(store: &Store, command: Command) -> anyhow::Result<Value> {
    let output = match command {
        Command::Records { embed_patient } => {
            if embed_patient {
                serde_json::to_value(store.list_records_with_patients()?)?
            } else {
                serde_json::to_value(store.list_records()?)?
            }
        }
        Command::DoctorView => serde_json::to_value(store.get_all_records_with_assignments()?)?,
        Command::Patient { id } => {
            let Some(patient) = store.get_patient_by_id(&id)? else {
                bail!("patient {} not found", id);
            };
            let records = store.get_records_by_patient(&patient.id)?;
            json!({ "patient": patient, "records": records })
        }
        Command::Record { id } => {
            let Some(record) = store.get_record_by_id(&id)? else {
                bail!("record {} not found", id);
            };
            let assignments = store.get_assignments_for_record(&record.id)?;
            let mut output = serde_json::to_value(record)?;
            output["assignments"] = serde_json::to_value(assignments)?;
            output
        }
        Command::AddPatient { name, dob } => {
            let patient = store.add_patient(NewPatient::new(name, dob))?;
            info!(id = %patient.id, "Patient created");
            serde_json::to_value(patient)?
        }
        Command::AddRecord {
            patient_id,
            conditions,
            last_visit,
        } => {
            if store.get_patient_by_id(&patient_id)?.is_none() {
                bail!("patient {} not found", patient_id);
            }
            let new = NewRecord {
                patient_id,
                conditions: conditions.into(),
                last_visit,
            };
            let record = store.add_record(new)?;
            info!(id = %record.id, "Record created");
            serde_json::to_value(record)?
        }
        Command::Assign {
            record_id,
            doctor,
            medication,
            notes,
        } => {
            if store.get_record_by_id(&record_id)?.is_none() {
                bail!("record {} not found", record_id);
            }
            let new = NewAssignment {
                record_id,
                doctor,
                medication,
                notes,
            };
            let assignment = store.add_assignment(new)?;
            info!(id = %assignment.id, "Assignment created");
            serde_json::to_value(assignment)?
        }
        Command::Documents { patient_id } => {
            serde_json::to_value(store.get_documents_for_patient(&patient_id)?)?
        }
    };
    Ok(output)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let store = Store::open(&cli.store).context("failed to open store")?;
    let output = run(&store, cli.command)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

//! Per-entity subcommands: `list`, `search`, `add`, `update` and `delete`.
//!
//! Rows are printed one JSON object per line. Update options that are not given leave the stored
//! value unchanged; an empty `--address`, `--location` or `--comment` clears it.

use clap::{Args, Subcommand};
use clinic_core::repositories::appointment::{AppointmentFilter, AppointmentPatch, NewAppointment};
use clinic_core::repositories::clinic::{ClinicFilter, ClinicPatch, NewClinic};
use clinic_core::repositories::department::{DepartmentFilter, DepartmentPatch, NewDepartment};
use clinic_core::repositories::diagnosis::{DiagnosisFilter, DiagnosisPatch, NewDiagnosis};
use clinic_core::repositories::doctor::{DoctorFilter, DoctorPatch, NewDoctor};
use clinic_core::repositories::observation::{NewObservation, ObservationFilter, ObservationPatch};
use clinic_core::repositories::patient::{NewPatient, PatientFilter, PatientPatch};
use clinic_core::{ClinicRecords, DateParts, Session};
use clinic_types::{EntityId, NonEmptyText};
use serde::Serialize;
use std::error::Error;

type CliResult = Result<(), Box<dyn Error>>;

/// Date given as separate parts; any part may be omitted.
#[derive(Args, Debug, Clone, Default)]
pub struct DateArgs {
    #[arg(long)]
    pub year: Option<i64>,
    #[arg(long)]
    pub month: Option<i64>,
    #[arg(long)]
    pub day: Option<i64>,
}

impl From<DateArgs> for DateParts {
    fn from(args: DateArgs) -> Self {
        DateParts::new(args.year, args.month, args.day)
    }
}

fn print_rows<T: Serialize>(rows: &[T]) -> CliResult {
    if rows.is_empty() {
        println!("No records found.");
    }
    for row in rows {
        println!("{}", serde_json::to_string(row)?);
    }
    Ok(())
}

// ============================================================================
// CLINICS
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum ClinicCommand {
    /// List every clinic
    List,
    /// Search clinics by substring
    Search {
        #[arg(long)]
        cli_id: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        address: Option<String>,
    },
    /// Add a clinic
    Add {
        cli_id: EntityId,
        name: NonEmptyText,
        #[arg(long)]
        address: Option<String>,
    },
    /// Update a clinic
    Update {
        cli_id: EntityId,
        #[arg(long)]
        name: Option<NonEmptyText>,
        #[arg(long)]
        address: Option<String>,
    },
    /// Delete a clinic
    Delete { cli_id: EntityId },
}

pub fn run_clinic(records: &ClinicRecords, session: &Session, command: ClinicCommand) -> CliResult {
    let repo = records.clinics();
    match command {
        ClinicCommand::List => print_rows(&repo.list()?),
        ClinicCommand::Search {
            cli_id,
            name,
            address,
        } => print_rows(&repo.search(&ClinicFilter {
            cli_id,
            cli_name: name,
            address,
        })?),
        ClinicCommand::Add {
            cli_id,
            name,
            address,
        } => {
            repo.create(
                session,
                NewClinic {
                    cli_id: cli_id.clone(),
                    cli_name: name,
                    address,
                },
            )?;
            println!("Added clinic {}", cli_id);
            Ok(())
        }
        ClinicCommand::Update {
            cli_id,
            name,
            address,
        } => {
            repo.update(
                session,
                &cli_id,
                ClinicPatch {
                    cli_name: name,
                    address,
                },
            )?;
            println!("Updated clinic {}", cli_id);
            Ok(())
        }
        ClinicCommand::Delete { cli_id } => {
            repo.delete(session, &cli_id)?;
            println!("Deleted clinic {}", cli_id);
            Ok(())
        }
    }
}

// ============================================================================
// DEPARTMENTS
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum DepartmentCommand {
    /// List every department with its clinic
    List,
    /// Search departments by substring
    Search {
        #[arg(long)]
        dept_id: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        cli_id: Option<String>,
        #[arg(long)]
        cli_name: Option<String>,
    },
    /// Add a department, optionally in a clinic
    Add {
        dept_id: EntityId,
        name: NonEmptyText,
        #[arg(long)]
        cli_id: Option<EntityId>,
    },
    /// Update a department
    Update {
        dept_id: EntityId,
        #[arg(long)]
        name: Option<NonEmptyText>,
        #[arg(long)]
        cli_id: Option<EntityId>,
    },
    /// Delete a department
    Delete { dept_id: EntityId },
}

pub fn run_department(
    records: &ClinicRecords,
    session: &Session,
    command: DepartmentCommand,
) -> CliResult {
    let repo = records.departments();
    match command {
        DepartmentCommand::List => print_rows(&repo.list()?),
        DepartmentCommand::Search {
            dept_id,
            name,
            cli_id,
            cli_name,
        } => print_rows(&repo.search(&DepartmentFilter {
            dept_id,
            dept_name: name,
            cli_id,
            cli_name,
        })?),
        DepartmentCommand::Add {
            dept_id,
            name,
            cli_id,
        } => {
            repo.create(
                session,
                NewDepartment {
                    dept_id: dept_id.clone(),
                    dept_name: name,
                    cli_id,
                },
            )?;
            println!("Added department {}", dept_id);
            Ok(())
        }
        DepartmentCommand::Update {
            dept_id,
            name,
            cli_id,
        } => {
            repo.update(
                session,
                &dept_id,
                DepartmentPatch {
                    dept_name: name,
                    cli_id,
                },
            )?;
            println!("Updated department {}", dept_id);
            Ok(())
        }
        DepartmentCommand::Delete { dept_id } => {
            repo.delete(session, &dept_id)?;
            println!("Deleted department {}", dept_id);
            Ok(())
        }
    }
}

// ============================================================================
// DOCTORS
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum DoctorCommand {
    /// List doctors, one row per assigned patient
    List,
    /// Search doctors by substring
    Search {
        #[arg(long)]
        doctor_id: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        dept_id: Option<String>,
        #[arg(long)]
        patient_id: Option<String>,
        #[arg(long)]
        patient_name: Option<String>,
    },
    /// Add a doctor, optionally working in a department
    Add {
        doctor_id: EntityId,
        name: NonEmptyText,
        #[arg(long)]
        dept_id: Option<EntityId>,
    },
    /// Update a doctor
    Update {
        doctor_id: EntityId,
        #[arg(long)]
        name: Option<NonEmptyText>,
        #[arg(long)]
        dept_id: Option<EntityId>,
    },
    /// Delete a doctor
    Delete { doctor_id: EntityId },
}

pub fn run_doctor(records: &ClinicRecords, session: &Session, command: DoctorCommand) -> CliResult {
    let repo = records.doctors();
    match command {
        DoctorCommand::List => print_rows(&repo.list()?),
        DoctorCommand::Search {
            doctor_id,
            name,
            dept_id,
            patient_id,
            patient_name,
        } => print_rows(&repo.search(&DoctorFilter {
            doctor_id,
            name,
            dept_id,
            patient_id,
            patient_name,
        })?),
        DoctorCommand::Add {
            doctor_id,
            name,
            dept_id,
        } => {
            repo.create(
                session,
                NewDoctor {
                    doctor_id: doctor_id.clone(),
                    name,
                    dept_id,
                },
            )?;
            println!("Added doctor {}", doctor_id);
            Ok(())
        }
        DoctorCommand::Update {
            doctor_id,
            name,
            dept_id,
        } => {
            repo.update(session, &doctor_id, DoctorPatch { name, dept_id })?;
            println!("Updated doctor {}", doctor_id);
            Ok(())
        }
        DoctorCommand::Delete { doctor_id } => {
            repo.delete(session, &doctor_id)?;
            println!("Deleted doctor {}", doctor_id);
            Ok(())
        }
    }
}

// ============================================================================
// PATIENTS
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum PatientCommand {
    /// List patients with their assigned doctor
    List,
    /// Search patients by substring
    Search {
        #[arg(long)]
        patient_id: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        doctor_id: Option<String>,
        #[arg(long)]
        doctor_name: Option<String>,
    },
    /// Add a patient, optionally assigned to a doctor
    Add {
        patient_id: EntityId,
        name: NonEmptyText,
        #[arg(long)]
        doctor_id: Option<EntityId>,
    },
    /// Update a patient
    Update {
        patient_id: EntityId,
        #[arg(long)]
        name: Option<NonEmptyText>,
        #[arg(long)]
        doctor_id: Option<EntityId>,
    },
    /// Delete a patient
    Delete { patient_id: EntityId },
}

pub fn run_patient(records: &ClinicRecords, session: &Session, command: PatientCommand) -> CliResult {
    let repo = records.patients();
    match command {
        PatientCommand::List => print_rows(&repo.list()?),
        PatientCommand::Search {
            patient_id,
            name,
            doctor_id,
            doctor_name,
        } => print_rows(&repo.search(&PatientFilter {
            patient_id,
            name,
            doctor_id,
            doctor_name,
        })?),
        PatientCommand::Add {
            patient_id,
            name,
            doctor_id,
        } => {
            repo.create(
                session,
                NewPatient {
                    patient_id: patient_id.clone(),
                    name,
                    doctor_id,
                },
            )?;
            println!("Added patient {}", patient_id);
            Ok(())
        }
        PatientCommand::Update {
            patient_id,
            name,
            doctor_id,
        } => {
            repo.update(session, &patient_id, PatientPatch { name, doctor_id })?;
            println!("Updated patient {}", patient_id);
            Ok(())
        }
        PatientCommand::Delete { patient_id } => {
            repo.delete(session, &patient_id)?;
            println!("Deleted patient {}", patient_id);
            Ok(())
        }
    }
}

// ============================================================================
// APPOINTMENTS
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum AppointmentCommand {
    /// List appointments by date
    List,
    /// Search appointments; date parts match exactly, text by substring
    Search {
        #[arg(long)]
        appoint_id: Option<String>,
        #[command(flatten)]
        date: DateArgs,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        patient_id: Option<String>,
        #[arg(long)]
        patient_name: Option<String>,
        #[arg(long)]
        doctor_id: Option<String>,
        #[arg(long)]
        doctor_name: Option<String>,
    },
    /// Add an appointment
    Add {
        appoint_id: EntityId,
        #[command(flatten)]
        date: DateArgs,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        patient_id: Option<EntityId>,
        #[arg(long)]
        doctor_id: Option<EntityId>,
    },
    /// Update an appointment; given date parts are merged with the stored date
    Update {
        appoint_id: EntityId,
        #[command(flatten)]
        date: DateArgs,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        patient_id: Option<EntityId>,
        #[arg(long)]
        doctor_id: Option<EntityId>,
    },
    /// Delete an appointment
    Delete { appoint_id: EntityId },
}

pub fn run_appointment(
    records: &ClinicRecords,
    session: &Session,
    command: AppointmentCommand,
) -> CliResult {
    let repo = records.appointments();
    match command {
        AppointmentCommand::List => print_rows(&repo.list()?),
        AppointmentCommand::Search {
            appoint_id,
            date,
            location,
            patient_id,
            patient_name,
            doctor_id,
            doctor_name,
        } => print_rows(&repo.search(&AppointmentFilter {
            appoint_id,
            year: date.year,
            month: date.month,
            day: date.day,
            location,
            patient_id,
            patient_name,
            doctor_id,
            doctor_name,
        })?),
        AppointmentCommand::Add {
            appoint_id,
            date,
            location,
            patient_id,
            doctor_id,
        } => {
            repo.create(
                session,
                NewAppointment {
                    appoint_id: appoint_id.clone(),
                    date: date.into(),
                    location,
                    patient_id,
                    doctor_id,
                },
            )?;
            println!("Added appointment {}", appoint_id);
            Ok(())
        }
        AppointmentCommand::Update {
            appoint_id,
            date,
            location,
            patient_id,
            doctor_id,
        } => {
            repo.update(
                session,
                &appoint_id,
                AppointmentPatch {
                    date: date.into(),
                    location,
                    patient_id,
                    doctor_id,
                },
            )?;
            println!("Updated appointment {}", appoint_id);
            Ok(())
        }
        AppointmentCommand::Delete { appoint_id } => {
            repo.delete(session, &appoint_id)?;
            println!("Deleted appointment {}", appoint_id);
            Ok(())
        }
    }
}

// ============================================================================
// OBSERVATIONS AND DIAGNOSES
// ============================================================================

/// Search options shared by observations and diagnoses.
#[derive(Args, Debug, Clone, Default)]
pub struct RecordSearch {
    #[command(flatten)]
    pub date: DateArgs,
    #[arg(long)]
    pub appoint_id: Option<String>,
    #[arg(long)]
    pub patient_id: Option<String>,
    #[arg(long)]
    pub patient_name: Option<String>,
    #[arg(long)]
    pub doctor_id: Option<String>,
    #[arg(long)]
    pub doctor_name: Option<String>,
    #[arg(long)]
    pub comment: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum ObservationCommand {
    /// List observations
    List,
    /// Search observations
    Search {
        #[arg(long)]
        obser_id: Option<String>,
        #[command(flatten)]
        search: RecordSearch,
    },
    /// Add an observation
    Add {
        obser_id: EntityId,
        #[command(flatten)]
        date: DateArgs,
        #[arg(long)]
        appoint_id: Option<EntityId>,
        #[arg(long)]
        comment: Option<String>,
        /// Handle of a stored attachment (see `clinic attach`)
        #[arg(long)]
        file: Option<u64>,
    },
    /// Update an observation
    Update {
        obser_id: EntityId,
        #[command(flatten)]
        date: DateArgs,
        #[arg(long)]
        appoint_id: Option<EntityId>,
        #[arg(long)]
        comment: Option<String>,
        #[arg(long)]
        file: Option<u64>,
    },
    /// Delete an observation
    Delete { obser_id: EntityId },
}

pub fn run_observation(
    records: &ClinicRecords,
    session: &Session,
    command: ObservationCommand,
) -> CliResult {
    let repo = records.observations();
    match command {
        ObservationCommand::List => print_rows(&repo.list()?),
        ObservationCommand::Search { obser_id, search } => {
            print_rows(&repo.search(&ObservationFilter {
                obser_id,
                year: search.date.year,
                month: search.date.month,
                day: search.date.day,
                appoint_id: search.appoint_id,
                patient_id: search.patient_id,
                patient_name: search.patient_name,
                doctor_id: search.doctor_id,
                doctor_name: search.doctor_name,
                comment: search.comment,
            })?)
        }
        ObservationCommand::Add {
            obser_id,
            date,
            appoint_id,
            comment,
            file,
        } => {
            repo.create(
                session,
                NewObservation {
                    obser_id: obser_id.clone(),
                    date: date.into(),
                    appoint_id,
                    comment,
                    file_handle: file,
                },
            )?;
            println!("Added observation {}", obser_id);
            Ok(())
        }
        ObservationCommand::Update {
            obser_id,
            date,
            appoint_id,
            comment,
            file,
        } => {
            repo.update(
                session,
                &obser_id,
                ObservationPatch {
                    date: date.into(),
                    appoint_id,
                    comment,
                    file_handle: file,
                },
            )?;
            println!("Updated observation {}", obser_id);
            Ok(())
        }
        ObservationCommand::Delete { obser_id } => {
            repo.delete(session, &obser_id)?;
            println!("Deleted observation {}", obser_id);
            Ok(())
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum DiagnosisCommand {
    /// List diagnoses
    List,
    /// Search diagnoses
    Search {
        #[arg(long)]
        diagn_id: Option<String>,
        #[arg(long)]
        obser_id: Option<String>,
        #[command(flatten)]
        search: RecordSearch,
    },
    /// Add a diagnosis
    Add {
        diagn_id: EntityId,
        #[command(flatten)]
        date: DateArgs,
        #[arg(long)]
        obser_id: Option<EntityId>,
        #[arg(long)]
        comment: Option<String>,
        /// Handle of a stored attachment (see `clinic attach`)
        #[arg(long)]
        file: Option<u64>,
    },
    /// Update a diagnosis
    Update {
        diagn_id: EntityId,
        #[command(flatten)]
        date: DateArgs,
        #[arg(long)]
        obser_id: Option<EntityId>,
        #[arg(long)]
        comment: Option<String>,
        #[arg(long)]
        file: Option<u64>,
    },
    /// Delete a diagnosis
    Delete { diagn_id: EntityId },
}

pub fn run_diagnosis(
    records: &ClinicRecords,
    session: &Session,
    command: DiagnosisCommand,
) -> CliResult {
    let repo = records.diagnoses();
    match command {
        DiagnosisCommand::List => print_rows(&repo.list()?),
        DiagnosisCommand::Search {
            diagn_id,
            obser_id,
            search,
        } => print_rows(&repo.search(&DiagnosisFilter {
            diagn_id,
            year: search.date.year,
            month: search.date.month,
            day: search.date.day,
            obser_id,
            appoint_id: search.appoint_id,
            patient_id: search.patient_id,
            patient_name: search.patient_name,
            doctor_id: search.doctor_id,
            doctor_name: search.doctor_name,
            comment: search.comment,
        })?),
        DiagnosisCommand::Add {
            diagn_id,
            date,
            obser_id,
            comment,
            file,
        } => {
            repo.create(
                session,
                NewDiagnosis {
                    diagn_id: diagn_id.clone(),
                    date: date.into(),
                    obser_id,
                    comment,
                    file_handle: file,
                },
            )?;
            println!("Added diagnosis {}", diagn_id);
            Ok(())
        }
        DiagnosisCommand::Update {
            diagn_id,
            date,
            obser_id,
            comment,
            file,
        } => {
            repo.update(
                session,
                &diagn_id,
                DiagnosisPatch {
                    date: date.into(),
                    obser_id,
                    comment,
                    file_handle: file,
                },
            )?;
            println!("Updated diagnosis {}", diagn_id);
            Ok(())
        }
        DiagnosisCommand::Delete { diagn_id } => {
            repo.delete(session, &diagn_id)?;
            println!("Deleted diagnosis {}", diagn_id);
            Ok(())
        }
    }
}

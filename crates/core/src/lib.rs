//! # Clinic Core
//!
//! Core logic for the clinic records manager.
//!
//! This crate holds the data operations behind every operator surface:
//! - an embedded property graph of clinics, departments, doctors, patients, appointments,
//!   observations and diagnoses ([`graph`], [`schema`], [`repositories`])
//! - login accounts and the mapping of an account to a doctor or patient ([`accounts`],
//!   [`identity`])
//! - the append-only doctor-patient message log ([`documents`], [`messaging`])
//! - attachment handle allocation over the content directory of `clinic_files` ([`attachments`])
//!
//! **No API concerns**: HTTP servers and command-line parsing belong in `api-rest` and
//! `clinic-cli`. Configuration is resolved once at startup ([`config::CoreConfig`]) and passed in;
//! nothing in this crate reads the environment while serving a request.

pub mod accounts;
pub mod attachments;
pub mod config;
pub mod constants;
pub mod documents;
pub mod graph;
pub mod identity;
pub mod messaging;
pub mod password;
pub mod repositories;
pub mod schema;
pub mod session;
pub mod validation;

mod error;

pub use accounts::{AccountKind, AccountRow, AccountService, NewAccount};
pub use attachments::{AttachmentService, BlobInfo, StoredAttachment};
pub use config::{CoreConfig, GraphConnection, StoreUri};
pub use documents::{MessageLog, MessageRecord};
pub use error::{ClinicError, ClinicResult};
pub use graph::GraphStore;
pub use identity::{Counterpart, Identity, IdentityService, PersonKind, Section};
pub use messaging::{ConversationOrder, DraftAttachment, MessageDraft, MessagingService};
pub use session::{Role, Session};
pub use validation::DateParts;

use clinic_files::AttachmentFiles;
use repositories::{
    appointment::AppointmentRepository, clinic::ClinicRepository,
    department::DepartmentRepository, diagnosis::DiagnosisRepository, doctor::DoctorRepository,
    observation::ObservationRepository, patient::PatientRepository,
};
use std::path::Path;
use std::sync::Arc;

/// Every service of the records manager, wired to one graph store, message log and content
/// directory.
#[derive(Clone, Debug)]
pub struct ClinicRecords {
    store: Arc<GraphStore>,
    accounts: AccountService,
    identity: IdentityService,
    attachments: AttachmentService,
    messaging: MessagingService,
    clinics: ClinicRepository,
    departments: DepartmentRepository,
    doctors: DoctorRepository,
    patients: PatientRepository,
    appointments: AppointmentRepository,
    observations: ObservationRepository,
    diagnoses: DiagnosisRepository,
}

impl ClinicRecords {
    /// Opens the stores named by `config`.
    ///
    /// A `memory:` graph store starts empty and is bootstrapped with the default accounts.
    ///
    /// # Errors
    ///
    /// - `ClinicError::Config` if a file graph store has not been bootstrapped
    /// - `ClinicError::StoreAuthentication` if the graph credentials are rejected
    /// - `ClinicError::Files` if the content directory cannot be created
    pub fn open(config: &CoreConfig) -> ClinicResult<Self> {
        let store = Arc::new(GraphStore::open(config.graph())?);
        if *config.graph().uri() == StoreUri::Memory {
            schema::bootstrap(&store, true)?;
        }
        let log = documents::open_message_log(config.document_uri(), config.document_db())?;
        let files = AttachmentFiles::open(config.files_dir())?;

        tracing::info!(
            graph = %config.graph().uri(),
            documents = %config.document_uri(),
            database = config.document_db(),
            files = %files.content_dir().display(),
            "opened clinic records"
        );
        Ok(Self::from_parts(store, log, files))
    }

    /// Memory-only stores with the default accounts, attachments under `files_dir`.
    pub fn in_memory(files_dir: &Path) -> ClinicResult<Self> {
        let store = Arc::new(GraphStore::in_memory());
        schema::bootstrap(&store, true)?;
        let log: Arc<dyn MessageLog> = Arc::new(documents::InMemoryMessageLog::default());
        Ok(Self::from_parts(store, log, AttachmentFiles::open(files_dir)?))
    }

    pub fn from_parts(
        store: Arc<GraphStore>,
        log: Arc<dyn MessageLog>,
        files: AttachmentFiles,
    ) -> Self {
        let attachments = AttachmentService::new(store.clone(), files);
        Self {
            accounts: AccountService::new(store.clone()),
            identity: IdentityService::new(store.clone()),
            messaging: MessagingService::new(store.clone(), log, attachments.clone()),
            attachments,
            clinics: ClinicRepository::new(store.clone()),
            departments: DepartmentRepository::new(store.clone()),
            doctors: DoctorRepository::new(store.clone()),
            patients: PatientRepository::new(store.clone()),
            appointments: AppointmentRepository::new(store.clone()),
            observations: ObservationRepository::new(store.clone()),
            diagnoses: DiagnosisRepository::new(store.clone()),
            store,
        }
    }

    pub fn store(&self) -> &Arc<GraphStore> {
        &self.store
    }

    pub fn accounts(&self) -> &AccountService {
        &self.accounts
    }

    pub fn identity(&self) -> &IdentityService {
        &self.identity
    }

    pub fn attachments(&self) -> &AttachmentService {
        &self.attachments
    }

    pub fn messaging(&self) -> &MessagingService {
        &self.messaging
    }

    pub fn clinics(&self) -> &ClinicRepository {
        &self.clinics
    }

    pub fn departments(&self) -> &DepartmentRepository {
        &self.departments
    }

    pub fn doctors(&self) -> &DoctorRepository {
        &self.doctors
    }

    pub fn patients(&self) -> &PatientRepository {
        &self.patients
    }

    pub fn appointments(&self) -> &AppointmentRepository {
        &self.appointments
    }

    pub fn observations(&self) -> &ObservationRepository {
        &self.observations
    }

    pub fn diagnoses(&self) -> &DiagnosisRepository {
        &self.diagnoses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repositories::doctor::NewDoctor;
    use repositories::patient::NewPatient;
    use tempfile::TempDir;

    fn id(value: &str) -> clinic_types::EntityId {
        clinic_types::EntityId::new(value).unwrap()
    }

    fn text(value: &str) -> clinic_types::NonEmptyText {
        clinic_types::NonEmptyText::new(value).unwrap()
    }

    #[test]
    fn test_end_to_end_doctor_and_patient_messaging() {
        let dir = TempDir::new().unwrap();
        let records = ClinicRecords::in_memory(&dir.path().join("files")).unwrap();
        let admin = records.accounts().login("admin", "admin").unwrap();

        records
            .doctors()
            .create(
                &admin,
                NewDoctor {
                    doctor_id: id("D1"),
                    name: text("Dr Ada"),
                    dept_id: None,
                },
            )
            .unwrap();
        records
            .patients()
            .create(
                &admin,
                NewPatient {
                    patient_id: id("P1"),
                    name: text("Pia"),
                    doctor_id: Some(id("D1")),
                },
            )
            .unwrap();
        for (kind, name, person) in [
            (AccountKind::Admin, "drada", "D1"),
            (AccountKind::User, "pia", "P1"),
        ] {
            records
                .accounts()
                .create_account(
                    &admin,
                    NewAccount {
                        kind,
                        name: id(name),
                        password: text("pw"),
                        person_id: Some(id(person)),
                    },
                )
                .unwrap();
        }

        let doctor = records.accounts().login("drada", "pw").unwrap();
        let patient = records.accounts().login("pia", "pw").unwrap();
        assert_eq!(records.identity().counterparts(&patient).unwrap()[0].id, "D1");

        let handle = records
            .attachments()
            .save_bytes("result.txt", b"ok")
            .unwrap()
            .handle;
        records
            .messaging()
            .send(
                &doctor,
                "P1",
                MessageDraft {
                    text: Some("Your results".into()),
                    attachment: Some(DraftAttachment::Stored(handle)),
                },
            )
            .unwrap();

        let thread = records
            .messaging()
            .conversation(&patient, "D1", ConversationOrder::NewestFirst, None)
            .unwrap();
        assert_eq!(thread.len(), 1);
        assert_eq!(thread[0].file_url.as_deref(), Some("files/1.txt"));
    }

    #[test]
    fn test_open_file_stores_after_bootstrap() {
        let dir = TempDir::new().unwrap();
        let graph = GraphConnection::new(
            StoreUri::File(dir.path().join("graph.json")),
            "clinic",
            "secret",
        )
        .unwrap();
        let config = CoreConfig::new(
            graph.clone(),
            StoreUri::File(dir.path().join("documents")),
            "clinic_app",
            dir.path().join("files"),
        )
        .unwrap();

        assert!(matches!(
            ClinicRecords::open(&config),
            Err(ClinicError::Config(_))
        ));

        let store = GraphStore::create(&graph).unwrap();
        schema::bootstrap(&store, true).unwrap();
        let records = ClinicRecords::open(&config).unwrap();

        assert!(records.accounts().login("admin", "admin").is_ok());
    }
}

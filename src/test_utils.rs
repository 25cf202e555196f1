// Shared fixtures for unit and router tests.
use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

use crate::models::{
    complaintmodel::{Complaint, ComplaintCategory, ComplaintStatus, Department},
    usermodel::{User, UserRole},
};

/// 2024-03-01 00:00 UTC plus `minutes`.
pub fn ts(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes)
}

pub fn user(role: UserRole, department: Option<Department>) -> User {
    let id = Uuid::new_v4();
    User {
        id,
        name: format!("{} user", role.to_str()),
        email: format!("{}@campus.test", id.simple()),
        password: None,
        role,
        department,
        created_at: ts(0),
        updated_at: ts(0),
    }
}

pub fn admin() -> User {
    user(UserRole::Admin, None)
}

pub fn super_admin() -> User {
    user(UserRole::SuperAdmin, None)
}

pub fn department_staff(department: Department) -> User {
    user(UserRole::Department, Some(department))
}

pub fn student() -> User {
    user(UserRole::Student, None)
}

pub fn sample_complaint(status: ComplaintStatus) -> Complaint {
    Complaint {
        id: Uuid::new_v4(),
        reference_number: format!("LDCU-TEST-{}", &Uuid::new_v4().simple().to_string()[..4])
            .to_uppercase(),
        category: ComplaintCategory::Facilities,
        description: "Broken chair in room 204".to_string(),
        attachment_url: None,
        name: "Maria Santos".to_string(),
        email: Some("maria@campus.test".to_string()),
        student_id: Some("2021-00123".to_string()),
        is_anonymous: false,
        user_id: None,
        status,
        assigned_department: None,
        admin_remarks: None,
        department_remarks: None,
        resolution_details: None,
        resolution_image_url: None,
        dispute_reason: None,
        user_verified: false,
        verified_by: None,
        verified_at: None,
        started_by: None,
        started_at: None,
        resolved_by: None,
        resolved_at: None,
        closed_at: None,
        disputed_at: None,
        created_at: ts(0),
        updated_at: ts(0),
    }
}

/// Router-level fixture: in-memory store, recording mailer and fake storage.
pub struct TestApp {
    pub state: std::sync::Arc<crate::AppState>,
    pub store: std::sync::Arc<crate::db::memory::MemoryStore>,
}

impl TestApp {
    /// Stores an account with `role` and returns a bearer token for it.
    pub fn sign_in(&self, role: UserRole, department: Option<Department>) -> String {
        let account = user(role, department);
        self.store.put_user(account.clone());
        crate::utils::token::create_token(
            &account.id.to_string(),
            self.state.env.jwt_secret.as_bytes(),
            self.state.env.jwt_maxage,
        )
        .unwrap()
    }
}

pub fn test_app() -> TestApp {
    use std::sync::Arc;

    use crate::{
        config::Config,
        db::memory::MemoryStore,
        mail::sendmail::testing::RecordingMailer,
        service::storage_service::testing::FakeStorage,
        utils::reference::RandomReference,
        AppState, Backends,
    };

    let store = Arc::new(MemoryStore::new());
    let config = Config::for_tests();

    let state = AppState::with_backends(
        config.clone(),
        Backends {
            complaints: store.clone(),
            users: store.clone(),
            references: Arc::new(RandomReference::new(config.reference_prefix.clone())),
            storage: Arc::new(FakeStorage::default()),
            mailer: Arc::new(RecordingMailer::default()),
        },
    );

    TestApp {
        state: Arc::new(state),
        store,
    }
}

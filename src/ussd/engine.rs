//! UssdEngine: routes one dialog turn to its step handler.
//!
//! Each call decodes the cumulative input, takes the session map lock for
//! the whole turn, and answers with a [`UssdResponse`]. Which handler runs
//! is decided from the input string alone (see [`resolve_stage`]); the
//! stored session only carries collected fields and the attempt count.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::UssdConfig;
use crate::error::FlowError;
use crate::registration::ledger::RegistrationLedger;
use crate::registration::model::{Registration, RegistrationType};
use crate::registration::RegistrationFinalizer;

use super::catalog::MenuCatalog;
use super::input::{
    MenuChoice, SchoolChoice, Stage, SummaryChoice, decode, parse_name, resolve_stage,
};
use super::response::UssdResponse;
use super::retry::{RetryGuard, RetryVerdict};
use super::session::{Session, SessionStore};

/// What a step handler decided.
#[derive(Debug)]
enum Transition {
    Reply(UssdResponse),
    /// The summary was confirmed; the prepared registration awaits recording.
    Confirm(Registration),
}

pub struct UssdEngine {
    catalog: MenuCatalog,
    sessions: Arc<SessionStore>,
    retry: RetryGuard,
    finalizer: RegistrationFinalizer,
}

impl UssdEngine {
    pub fn new(
        config: &UssdConfig,
        sessions: Arc<SessionStore>,
        finalizer: RegistrationFinalizer,
    ) -> Self {
        Self::with_catalog(MenuCatalog::new(config), config, sessions, finalizer)
    }

    pub fn with_catalog(
        catalog: MenuCatalog,
        config: &UssdConfig,
        sessions: Arc<SessionStore>,
        finalizer: RegistrationFinalizer,
    ) -> Self {
        Self {
            catalog,
            sessions,
            retry: RetryGuard::new(config.max_attempts),
            finalizer,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn ledger(&self) -> &Arc<RegistrationLedger> {
        self.finalizer.ledger()
    }

    pub fn catalog(&self) -> &MenuCatalog {
        &self.catalog
    }

    /// Process one dialog turn.
    pub async fn handle(&self, phone_number: &str, text: &str, session_id: &str) -> UssdResponse {
        let input = decode(text);
        let mut sessions = self.sessions.lock().await;
        let session = sessions.get_or_create(session_id, phone_number);

        if input.is_initial() {
            session.step = 1;
            debug!(session_id, "Dialog started");
            return UssdResponse::Continue(self.catalog.main_menu());
        }

        session.step = input.step;
        let stage = resolve_stage(&input.tokens, self.catalog.offered_count());
        debug!(session_id, step = input.step, ?stage, "Routing input");

        match self.route(session, stage, &input.last) {
            Ok(Transition::Reply(response)) => {
                if response.is_terminal() {
                    sessions.remove(session_id);
                }
                response
            }
            Ok(Transition::Confirm(prepared)) => {
                sessions.remove(session_id);
                drop(sessions);

                let registration = self.finalizer.finalize(prepared).await;
                info!(
                    session_id,
                    registration_id = %registration.id,
                    "Registration confirmed"
                );
                UssdResponse::Terminate(self.catalog.confirmation(&registration))
            }
            Err(e) => {
                error!(session_id, step = input.step, "USSD routing error: {}", e);
                UssdResponse::Terminate(self.catalog.system_error())
            }
        }
    }

    fn route(
        &self,
        session: &mut Session,
        stage: Stage,
        token: &str,
    ) -> Result<Transition, FlowError> {
        match stage {
            Stage::MainMenu => Ok(self.on_main_menu(session, token)),
            Stage::NameEntry(kind) => Ok(self.on_name(session, kind, token)),
            Stage::SchoolSelection => Ok(self.on_school(session, token)),
            Stage::CustomSchoolEntry => Ok(self.on_custom_school(session, token)),
            Stage::Summary => self.on_summary(session, token),
            Stage::Closed => Err(FlowError::UnknownStep { step: session.step }),
        }
    }

    // ── Step handlers ───────────────────────────────────────────────

    fn on_main_menu(&self, session: &mut Session, token: &str) -> Transition {
        let response = match MenuChoice::parse(token) {
            Some(MenuChoice::Register(kind)) => {
                session.data.registration_type = Some(kind);
                UssdResponse::Continue(self.catalog.name_prompt(kind))
            }
            Some(MenuChoice::EventInformation) => {
                UssdResponse::Terminate(self.catalog.event_information())
            }
            Some(MenuChoice::Contact) => UssdResponse::Terminate(self.catalog.contact_information()),
            Some(MenuChoice::Exit) => UssdResponse::Terminate(self.catalog.exit()),
            None => {
                let screen = self.catalog.main_menu();
                self.invalid_input(session, &screen)
            }
        };
        Transition::Reply(response)
    }

    fn on_name(&self, session: &mut Session, kind: RegistrationType, token: &str) -> Transition {
        let response = match parse_name(token) {
            Some(name) => {
                session.data.registration_type = Some(kind);
                session.data.full_name = Some(name.to_string());
                UssdResponse::Continue(self.catalog.school_list())
            }
            None => {
                let screen = self.catalog.invalid_name_prompt();
                self.invalid_input(session, &screen)
            }
        };
        Transition::Reply(response)
    }

    fn on_school(&self, session: &mut Session, token: &str) -> Transition {
        let choice = SchoolChoice::parse(token, self.catalog.offered_count());
        let response = match choice {
            Some(SchoolChoice::Custom) => UssdResponse::Continue(self.catalog.custom_school_prompt()),
            Some(SchoolChoice::Catalog(index)) => match self.catalog.school(index) {
                Some(school) => {
                    session.data.school = Some(school.clone());
                    session.data.custom_school = None;
                    UssdResponse::Continue(self.catalog.summary(&session.phone_number, &session.data))
                }
                None => self.invalid_input(session, &self.catalog.school_list()),
            },
            None => {
                let screen = self.catalog.school_list();
                self.invalid_input(session, &screen)
            }
        };
        Transition::Reply(response)
    }

    fn on_custom_school(&self, session: &mut Session, token: &str) -> Transition {
        let response = match parse_name(token) {
            Some(name) => {
                session.data.custom_school = Some(name.to_string());
                session.data.school = None;
                UssdResponse::Continue(self.catalog.summary(&session.phone_number, &session.data))
            }
            None => {
                let screen = self.catalog.invalid_custom_school_prompt();
                self.invalid_input(session, &screen)
            }
        };
        Transition::Reply(response)
    }

    fn on_summary(&self, session: &mut Session, token: &str) -> Result<Transition, FlowError> {
        let response = match SummaryChoice::parse(token) {
            Some(SummaryChoice::Confirm) => {
                return Ok(Transition::Confirm(self.finalizer.prepare(session)?));
            }
            Some(SummaryChoice::Edit) => UssdResponse::Continue(self.catalog.main_menu()),
            Some(SummaryChoice::Cancel) => UssdResponse::Terminate(self.catalog.exit()),
            None => {
                let screen = self.catalog.summary(&session.phone_number, &session.data);
                self.invalid_input(session, &screen)
            }
        };
        Ok(Transition::Reply(response))
    }

    /// Count an invalid input and either re-prompt `screen` or end the dialog.
    fn invalid_input(&self, session: &mut Session, screen: &str) -> UssdResponse {
        match self.retry.register_failure(session) {
            RetryVerdict::Retry { attempt, max } => {
                debug!(session_id = %session.id, attempt, max, "Invalid input");
                UssdResponse::Continue(self.catalog.retry(attempt, max, screen))
            }
            RetryVerdict::Exhausted => {
                warn!(session_id = %session.id, "Too many invalid attempts");
                UssdResponse::Terminate(self.catalog.too_many_attempts())
            }
        }
    }
}

//! Scriptable calendar backends
//!
//! Each `MockBackend` answers from canned data or a canned error and records
//! the writes it receives, so tests can assert on what reached the remote.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bookline_core::{BackendFactory, CalendarBackend};
use bookline_domain::{
    AppointmentDraft, BackendKind, BookingConfig, BooklineError, BusyInterval, CustomerInfo,
    DateRange, RemoteAppointment, RemoteCustomer, Result as DomainResult,
};
use chrono::{NaiveDate, NaiveTime};

#[derive(Default)]
struct Script {
    free_slots: Option<DomainResult<Vec<NaiveTime>>>,
    busy: Option<DomainResult<Vec<BusyInterval>>>,
    appointments: Option<DomainResult<Vec<RemoteAppointment>>>,
    create_error: Option<BooklineError>,
    delay: Option<Duration>,
}

/// In-memory mock for `CalendarBackend`.
pub struct MockBackend {
    kind: BackendKind,
    script: Mutex<Script>,
    requires_email: bool,
    accepts_events: bool,
    customers: Mutex<Vec<CustomerInfo>>,
    created: Mutex<Vec<AppointmentDraft>>,
    cancelled: Mutex<Vec<String>>,
    reads: AtomicUsize,
}

impl MockBackend {
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            script: Mutex::new(Script::default()),
            requires_email: false,
            accepts_events: true,
            customers: Mutex::new(Vec::new()),
            created: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
            reads: AtomicUsize::new(0),
        }
    }

    pub fn with_free_slots(self, slots: Vec<NaiveTime>) -> Self {
        self.script.lock().unwrap().free_slots = Some(Ok(slots));
        self
    }

    pub fn with_busy(self, busy: Vec<BusyInterval>) -> Self {
        self.script.lock().unwrap().busy = Some(Ok(busy));
        self
    }

    /// Every read fails with `error`.
    pub fn failing_reads(self, error: BooklineError) -> Self {
        {
            let mut script = self.script.lock().unwrap();
            script.free_slots = Some(Err(error.clone()));
            script.busy = Some(Err(error.clone()));
            script.appointments = Some(Err(error));
        }
        self
    }

    pub fn failing_writes(self, error: BooklineError) -> Self {
        self.script.lock().unwrap().create_error = Some(error);
        self
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        self.script.lock().unwrap().delay = Some(delay);
        self
    }

    pub fn requiring_email(mut self) -> Self {
        self.requires_email = true;
        self
    }

    pub fn without_event_creation(mut self) -> Self {
        self.accepts_events = false;
        self
    }

    /// Replace the appointments returned by `list_appointments`.
    pub fn set_appointments(&self, appointments: Vec<RemoteAppointment>) {
        self.script.lock().unwrap().appointments = Some(Ok(appointments));
    }

    pub fn created(&self) -> Vec<AppointmentDraft> {
        self.created.lock().unwrap().clone()
    }

    pub fn customers(&self) -> Vec<CustomerInfo> {
        self.customers.lock().unwrap().clone()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().unwrap().clone()
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        let delay = self.script.lock().unwrap().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl CalendarBackend for MockBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn list_available_slots(&self, _date: NaiveDate) -> DomainResult<Vec<NaiveTime>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        let scripted = self.script.lock().unwrap().free_slots.clone();
        scripted.unwrap_or_else(|| Err(BooklineError::NotConfigured(format!("{} free slots", self.kind))))
    }

    async fn list_busy_intervals(&self, _date: NaiveDate) -> DomainResult<Vec<BusyInterval>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        let scripted = self.script.lock().unwrap().busy.clone();
        scripted.unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn find_or_create_customer(&self, customer: &CustomerInfo) -> DomainResult<RemoteCustomer> {
        self.customers.lock().unwrap().push(customer.clone());
        Ok(RemoteCustomer { id: format!("{}-customer", self.kind) })
    }

    async fn create_appointment(
        &self,
        _customer: &RemoteCustomer,
        draft: &AppointmentDraft,
    ) -> DomainResult<String> {
        self.pause().await;
        let error = self.script.lock().unwrap().create_error.clone();
        if let Some(error) = error {
            return Err(error);
        }
        let mut created = self.created.lock().unwrap();
        created.push(draft.clone());
        Ok(format!("{}-{}", self.kind, created.len()))
    }

    async fn list_appointments(&self, range: DateRange) -> DomainResult<Vec<RemoteAppointment>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        let scripted = self.script.lock().unwrap().appointments.clone();
        scripted
            .unwrap_or_else(|| Ok(Vec::new()))
            .map(|items| items.into_iter().filter(|item| range.contains(item.date)).collect())
    }

    async fn cancel_appointment(&self, external_id: &str) -> DomainResult<()> {
        self.cancelled.lock().unwrap().push(external_id.to_string());
        Ok(())
    }

    fn requires_customer_email(&self) -> bool {
        self.requires_email
    }

    fn supports_event_creation(&self) -> bool {
        self.accepts_events
    }
}

/// Hands out the registered mock for each kind, `NotConfigured` otherwise.
#[derive(Default, Clone)]
pub struct MockBackendFactory {
    backends: Arc<Mutex<HashMap<BackendKind, Arc<MockBackend>>>>,
}

impl MockBackendFactory {
    pub fn with(self, backend: Arc<MockBackend>) -> Self {
        self.backends.lock().unwrap().insert(backend.kind, backend);
        self
    }
}

impl BackendFactory for MockBackendFactory {
    fn backend(&self, _config: &BookingConfig, kind: BackendKind) -> DomainResult<Arc<dyn CalendarBackend>> {
        self.backends
            .lock()
            .unwrap()
            .get(&kind)
            .cloned()
            .map(|backend| backend as Arc<dyn CalendarBackend>)
            .ok_or_else(|| BooklineError::NotConfigured(format!("{kind} has no mock registered")))
    }
}

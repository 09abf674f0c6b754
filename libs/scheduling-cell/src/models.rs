// libs/scheduling-cell/src/models.rs
use chrono::{DateTime, Datelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// CORE SCHEDULING MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub patient_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Cancelled,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Closed set of specialties providers register under.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Specialty {
    #[serde(alias = "Orthopedics")]
    Orthopedics,

    #[serde(alias = "Cardiology")]
    Cardiology,

    #[serde(alias = "Gynecology")]
    Gynecology,

    #[serde(alias = "Dermatology")]
    Dermatology,
}

impl Specialty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Specialty::Orthopedics => "orthopedics",
            Specialty::Cardiology => "cardiology",
            Specialty::Gynecology => "gynecology",
            Specialty::Dermatology => "dermatology",
        }
    }
}

impl fmt::Display for Specialty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Provider read model. Profiles are owned elsewhere; the scheduling cell
/// only consumes identity, active flag and specialty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub specialty: Specialty,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

/// Transient input describing a desired appointment. Never persisted as-is;
/// consumed by the coordinator to produce an `Appointment`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationRequest {
    pub provider_id: Option<Uuid>,
    pub patient_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub specialty: Option<Specialty>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationConfirmation {
    pub appointment_id: Uuid,
    pub provider_id: Uuid,
    pub patient_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
}

impl From<&Appointment> for ReservationConfirmation {
    fn from(appointment: &Appointment) -> Self {
        Self {
            appointment_id: appointment.id,
            provider_id: appointment.provider_id,
            patient_id: appointment.patient_id,
            scheduled_at: appointment.scheduled_at,
        }
    }
}

// ==============================================================================
// SCHEDULING POLICY
// ==============================================================================

/// Clinic-wide booking constraints. Appointments last a fixed hour, so the
/// last bookable hour is one appointment short of closing.
#[derive(Debug, Clone)]
pub struct SchedulingPolicy {
    pub opening_hour: u32,
    pub closing_hour: u32,
    pub appointment_minutes: u32,
    pub closed_weekday: Weekday,
    pub min_lead_minutes: i64,
}

impl Default for SchedulingPolicy {
    fn default() -> Self {
        Self {
            opening_hour: 7,
            closing_hour: 19,
            appointment_minutes: 60,
            closed_weekday: Weekday::Sun,
            min_lead_minutes: 30,
        }
    }
}

impl SchedulingPolicy {
    pub fn last_bookable_hour(&self) -> u32 {
        self.closing_hour - self.appointment_minutes / 60
    }

    /// Business-hours window of the requested day, the span a patient may
    /// hold at most one Scheduled appointment in. Bounds are inclusive and
    /// deliberately not midnight-to-midnight.
    pub fn day_window(&self, scheduled_at: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let day = scheduled_at.date_naive();
        let start = day.and_hms_opt(self.opening_hour, 0, 0).unwrap().and_utc();
        let end = day.and_hms_opt(self.last_bookable_hour(), 0, 0).unwrap().and_utc();
        (start, end)
    }

    pub fn is_closed_on(&self, scheduled_at: DateTime<Utc>) -> bool {
        scheduled_at.weekday() == self.closed_weekday
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum SchedulingError {
    #[error("patient not found")]
    PatientNotFound,

    #[error("provider not found")]
    ProviderNotFound,

    #[error("appointment not found")]
    AppointmentNotFound,

    #[error("outside business hours")]
    OutsideBusinessHours,

    #[error("insufficient lead time")]
    InsufficientLeadTime,

    #[error("provider inactive")]
    ProviderInactive,

    #[error("patient inactive")]
    PatientInactive,

    #[error("provider already booked")]
    ProviderAlreadyBooked,

    #[error("patient already has an appointment that day")]
    PatientDayTaken,

    #[error("specialty required when no provider given")]
    SpecialtyRequired,

    #[error("no provider available")]
    NoProviderAvailable,

    #[error("database error: {0}")]
    Database(String),
}

//! Provider configuration.
//!
//! Providers are declared in the host configuration under
//! `catalog.providers.knativeEventType` or `catalog.providers.knativeEventMesh`,
//! one table per provider id:
//!
//! ```toml
//! [catalog.providers.knativeEventType.dev]
//! baseUrl = "http://event-mesh.dev.svc/eventtypes"
//! schedule = { frequency = { minutes = 30 }, timeout = { minutes = 3 } }
//!
//! [catalog.providers.knativeEventMesh.prod]
//! baseUrl = "http://event-mesh.prod.svc/eventtypes"
//! schedule = { frequency = "PT30M", timeout = "PT3M" }
//! ```
//!
//! Reading is strict: a provider without a usable `baseUrl`, or with a
//! malformed `schedule`, fails the whole read. These errors are meant to stop
//! the process at startup.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{ProviderError, Result};

/// Path of the table holding every provider section.
pub const PROVIDERS_PATH: [&str; 2] = ["catalog", "providers"];

/// Which provider section an entry was declared in.
///
/// Both kinds poll the same kind of endpoint and emit the same entities; they
/// differ in their config section and in the prefix of their provider name, so
/// providers of different kinds never share a location key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    EventType,
    EventMesh,
}

impl ProviderKind {
    /// Every kind, in the order their sections are read.
    pub const ALL: [ProviderKind; 2] = [ProviderKind::EventType, ProviderKind::EventMesh];

    /// Key of the kind's section under `catalog.providers`.
    pub fn section(self) -> &'static str {
        match self {
            ProviderKind::EventType => "knativeEventType",
            ProviderKind::EventMesh => "knativeEventMesh",
        }
    }

    /// Prefix of provider names and location keys.
    pub fn name_prefix(self) -> &'static str {
        match self {
            ProviderKind::EventType => "knative-event-type-provider",
            ProviderKind::EventMesh => "knative-event-mesh-provider",
        }
    }
}

/// One polling target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Section the provider was declared in.
    pub kind: ProviderKind,
    /// Key of the provider's table. Used for logging, task naming, and as the
    /// lifecycle of every entity the provider emits.
    pub id: String,
    /// Endpoint that returns the JSON array of event types.
    pub base_url: String,
    /// Recurrence for this provider. `None` means "use the startup default".
    pub schedule: Option<ScheduleDefinition>,
}

/// How often a task runs and how long a single run may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleDefinition {
    pub frequency: Duration,
    pub timeout: Duration,
    pub initial_delay: Option<Duration>,
}

impl ScheduleDefinition {
    /// Build a definition without checking it. Executors reject zero
    /// durations through [`ScheduleDefinition::validate`].
    pub fn new(frequency: Duration, timeout: Duration) -> Self {
        Self {
            frequency,
            timeout,
            initial_delay: None,
        }
    }

    /// Like [`ScheduleDefinition::new`], but fails on a zero frequency or
    /// timeout.
    pub fn try_new(frequency: Duration, timeout: Duration) -> Result<Self> {
        let schedule = Self::new(frequency, timeout);
        schedule.validate()?;
        Ok(schedule)
    }

    /// A zero frequency cannot drive an interval and a zero timeout abandons
    /// every run, so both are configuration errors.
    pub fn validate(&self) -> Result<()> {
        if self.frequency.is_zero() {
            return Err(ProviderError::config("schedule frequency must be greater than zero"));
        }
        if self.timeout.is_zero() {
            return Err(ProviderError::config("schedule timeout must be greater than zero"));
        }
        Ok(())
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = Some(delay);
        self
    }

    /// Parse a `schedule` table as written in the host configuration.
    pub fn from_toml(value: &toml::Value) -> Result<Self> {
        let raw: RawSchedule = value
            .clone()
            .try_into()
            .map_err(|e| ProviderError::config(format!("invalid schedule: {e}")))?;

        let mut schedule = Self::try_new(
            raw.frequency.to_duration("frequency")?,
            raw.timeout.to_duration("timeout")?,
        )?;
        schedule.initial_delay = raw
            .initial_delay
            .map(|d| d.to_duration("initialDelay"))
            .transpose()?;
        Ok(schedule)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawSchedule {
    #[serde(alias = "interval")]
    frequency: HumanDuration,
    timeout: HumanDuration,
    initial_delay: Option<HumanDuration>,
}

/// A duration as people write it in config: whole seconds, an ISO-8601
/// string such as `"PT5M30S"`, or a table such as `{ minutes = 5, seconds = 30 }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HumanDuration {
    Seconds(u64),
    Iso(String),
    Parts(DurationParts),
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct DurationParts {
    days: Option<u64>,
    hours: Option<u64>,
    minutes: Option<u64>,
    seconds: Option<u64>,
    milliseconds: Option<u64>,
}

impl HumanDuration {
    fn to_duration(&self, field: &str) -> Result<Duration> {
        let parts = match self {
            HumanDuration::Seconds(secs) => return Ok(Duration::from_secs(*secs)),
            HumanDuration::Iso(text) => {
                return parse_iso_duration(text).ok_or_else(|| {
                    ProviderError::config(format!(
                        "schedule {field} {text:?} is not an ISO-8601 duration"
                    ))
                })
            }
            HumanDuration::Parts(parts) => parts,
        };

        let units = [
            (parts.days, 86_400_000u64),
            (parts.hours, 3_600_000),
            (parts.minutes, 60_000),
            (parts.seconds, 1_000),
            (parts.milliseconds, 1),
        ];
        if units.iter().all(|(v, _)| v.is_none()) {
            return Err(ProviderError::config(format!(
                "schedule {field} must set at least one of days, hours, minutes, seconds, milliseconds"
            )));
        }

        let mut millis: u64 = 0;
        for (value, scale) in units {
            let Some(value) = value else { continue };
            millis = value
                .checked_mul(scale)
                .and_then(|v| millis.checked_add(v))
                .ok_or_else(|| ProviderError::config(format!("schedule {field} is too large")))?;
        }
        Ok(Duration::from_millis(millis))
    }
}

const DATE_UNITS: &[(char, u64)] = &[('W', 604_800_000), ('D', 86_400_000)];
const TIME_UNITS: &[(char, u64)] = &[('H', 3_600_000), ('M', 60_000), ('S', 1_000)];

/// Parse `P[nW][nD][T[nH][nM][n[.f]S]]`. Years and months have no fixed
/// length and are rejected. Precision is milliseconds.
fn parse_iso_duration(text: &str) -> Option<Duration> {
    let body = text.strip_prefix('P')?;
    let (date, time) = match body.split_once('T') {
        Some((_, "")) => return None,
        Some((date, time)) => (date, time),
        None => (body, ""),
    };

    let mut millis: u64 = 0;
    let mut seen = false;
    for (section, units) in [(date, DATE_UNITS), (time, TIME_UNITS)] {
        // Designators must appear in order, each at most once.
        let mut allowed = units;
        let mut rest = section;
        while !rest.is_empty() {
            let end = rest.find(|c: char| !(c.is_ascii_digit() || c == '.'))?;
            let (number, tail) = rest.split_at(end);
            let designator = tail.chars().next()?;
            let pos = allowed.iter().position(|(d, _)| *d == designator)?;
            millis = millis.checked_add(scaled(number, allowed[pos].1)?)?;
            allowed = &allowed[pos + 1..];
            rest = &tail[designator.len_utf8()..];
            seen = true;
        }
    }
    seen.then(|| Duration::from_millis(millis))
}

/// `number` (digits, optionally with a fraction) times `scale` milliseconds.
fn scaled(number: &str, scale: u64) -> Option<u64> {
    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    if whole.is_empty() || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let mut millis = whole.parse::<u64>().ok()?.checked_mul(scale)?;
    let fraction = &fraction[..fraction.len().min(9)];
    if !fraction.is_empty() {
        let numerator: u64 = fraction.parse().ok()?;
        let denominator = 10u64.pow(fraction.len() as u32);
        millis = millis.checked_add(numerator.checked_mul(scale)? / denominator)?;
    }
    Some(millis)
}

/// Read every configured provider: first the `knativeEventType` section, then
/// `knativeEventMesh`, each in the order its ids appear in the configuration.
/// Absent sections contribute nothing.
pub fn read_provider_configs(root: &toml::Value) -> Result<Vec<ProviderConfig>> {
    let mut providers = Some(root);
    for key in PROVIDERS_PATH {
        providers = providers.and_then(|v| v.get(key));
    }
    let Some(providers) = providers else {
        return Ok(Vec::new());
    };

    let mut configs = Vec::new();
    for kind in ProviderKind::ALL {
        let Some(section) = providers.get(kind.section()) else {
            continue;
        };
        let table = section.as_table().ok_or_else(|| {
            ProviderError::config(format!(
                "{}.{} must be a table",
                PROVIDERS_PATH.join("."),
                kind.section()
            ))
        })?;
        for (id, value) in table {
            configs.push(read_provider_config(kind, id, value)?);
        }
    }
    Ok(configs)
}

fn read_provider_config(kind: ProviderKind, id: &str, value: &toml::Value) -> Result<ProviderConfig> {
    let table = value
        .as_table()
        .ok_or_else(|| ProviderError::config(format!("provider {id}: entry must be a table")))?;

    let base_url = match table.get("baseUrl") {
        Some(toml::Value::String(url)) => url.clone(),
        Some(_) => {
            return Err(ProviderError::config(format!(
                "provider {id}: baseUrl must be a string"
            )))
        }
        None => {
            return Err(ProviderError::config(format!(
                "provider {id}: missing required key baseUrl"
            )))
        }
    };
    reqwest::Url::parse(&base_url).map_err(|e| {
        ProviderError::config(format!("provider {id}: invalid baseUrl {base_url:?}: {e}"))
    })?;

    let schedule = table
        .get("schedule")
        .map(ScheduleDefinition::from_toml)
        .transpose()
        .map_err(|e| match e {
            ProviderError::Configuration(msg) => {
                ProviderError::config(format!("provider {id}: {msg}"))
            }
            other => other,
        })?;

    Ok(ProviderConfig {
        kind,
        id: id.to_string(),
        base_url,
        schedule,
    })
}

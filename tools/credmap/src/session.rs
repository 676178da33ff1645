//! One editing session: the loaded recording, its partition, the password
//! options and the last payload. Events are applied one at a time through
//! `&mut self`; a new load discards everything derived from the previous
//! recording.

use crate::config::AppConfig;
use crate::errors::{CredmapError, MoveError};
use crate::field::{extract, FieldId};
use crate::logging::{EventLog, LogEvent, LogLevel};
use crate::moves::MoveRequest;
use crate::options::PasswordOptions;
use crate::partition::{BucketId, BucketsView, Partition, RoleSpec};
use crate::readiness::{check, Readiness};
use crate::recording::{self, Recording};
use crate::synthesize::{synthesize, Payload, SynthesisPlan};
use serde_json::{json, Value};
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub roles: Vec<RoleSpec>,
    pub plan: SynthesisPlan,
    pub password_options: PasswordOptions,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for SessionSettings {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            roles: cfg.roles.clone(),
            plan: cfg.synthesis_plan(),
            password_options: cfg.password_options.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    pub title: Option<String>,
    pub steps: usize,
    pub fields: usize,
}

#[derive(Debug, Clone)]
struct Loaded {
    recording: Recording,
    partition: Partition,
    undo: Vec<Partition>,
    redo: Vec<Partition>,
    payload: Option<Payload>,
}

pub struct Session {
    settings: SessionSettings,
    options: PasswordOptions,
    loaded: Option<Loaded>,
    log: Option<Box<dyn EventLog>>,
}

impl Session {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            options: settings.password_options.clone(),
            settings,
            loaded: None,
            log: None,
        }
    }

    pub fn with_log(mut self, log: Box<dyn EventLog>) -> Self {
        self.log = Some(log);
        self
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn load(&mut self, raw: &str) -> Result<LoadSummary, CredmapError> {
        let loaded = recording::load(raw);
        self.install(loaded)
    }

    pub async fn load_file(&mut self, path: &Path) -> Result<LoadSummary, CredmapError> {
        let loaded = recording::load_file(path).await;
        self.install(loaded)
    }

    fn install(
        &mut self,
        loaded: Result<Recording, CredmapError>,
    ) -> Result<LoadSummary, CredmapError> {
        let recording = match loaded {
            Ok(recording) => recording,
            Err(err) => {
                self.emit(LogLevel::Warn, "recording_rejected", json!({ "error": err.to_string() }));
                return Err(err);
            }
        };
        let partition = Partition::new(extract(&recording), &self.settings.roles);
        let summary = LoadSummary {
            title: recording.title().map(str::to_string),
            steps: recording.steps().len(),
            fields: partition.len(),
        };
        self.loaded = Some(Loaded {
            recording,
            partition,
            undo: Vec::new(),
            redo: Vec::new(),
            payload: None,
        });
        self.emit(
            LogLevel::Info,
            "recording_loaded",
            json!({ "steps": summary.steps, "fields": summary.fields }),
        );
        Ok(summary)
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    pub fn partition(&self) -> Option<&Partition> {
        self.loaded.as_ref().map(|loaded| &loaded.partition)
    }

    fn loaded(&self) -> Result<&Loaded, CredmapError> {
        self.loaded.as_ref().ok_or(CredmapError::NoRecording)
    }

    fn loaded_mut(&mut self) -> Result<&mut Loaded, CredmapError> {
        self.loaded.as_mut().ok_or(CredmapError::NoRecording)
    }

    pub fn buckets_view(&self) -> Result<BucketsView, CredmapError> {
        Ok(self.loaded()?.partition.buckets_view())
    }

    pub fn readiness(&self) -> Result<Readiness, CredmapError> {
        Ok(check(&self.loaded()?.partition, &self.settings.plan.readiness))
    }

    /// False until a recording is loaded.
    pub fn is_ready(&self) -> bool {
        self.readiness().map_or(false, |report| report.is_ready())
    }

    pub fn move_field(&mut self, request: &MoveRequest) -> Result<(), CredmapError> {
        let loaded = self.loaded_mut()?;
        match loaded.partition.apply_move(request) {
            Ok(next) => {
                let previous = std::mem::replace(&mut loaded.partition, next);
                loaded.undo.push(previous);
                loaded.redo.clear();
                self.emit(
                    LogLevel::Info,
                    "field_moved",
                    json!({
                        "field": request.field.short_digest(),
                        "from": request.from.as_str(),
                        "from_index": request.from_index,
                        "to": request.to.as_str(),
                        "to_index": request.to_index,
                    }),
                );
                Ok(())
            }
            Err(err) => {
                self.emit(LogLevel::Warn, "move_rejected", json!({ "error": err.to_string() }));
                Err(err.into())
            }
        }
    }

    /// Moves whatever sits at `from[from_index]`.
    pub fn move_at(
        &mut self,
        from: BucketId,
        from_index: usize,
        to: BucketId,
        to_index: usize,
    ) -> Result<FieldId, CredmapError> {
        let request =
            self.plan_move(|partition| MoveRequest::at(partition, from, from_index, to, to_index))?;
        self.move_field(&request)?;
        Ok(request.field)
    }

    /// Moves `field` to the end of `to`.
    pub fn move_to_end(&mut self, field: &FieldId, to: BucketId) -> Result<(), CredmapError> {
        let request = self.plan_move(|partition| MoveRequest::append(partition, field, to))?;
        self.move_field(&request)
    }

    fn plan_move(
        &self,
        build: impl FnOnce(&Partition) -> Result<MoveRequest, MoveError>,
    ) -> Result<MoveRequest, CredmapError> {
        build(&self.loaded()?.partition).map_err(|err| {
            self.emit(LogLevel::Warn, "move_rejected", json!({ "error": err.to_string() }));
            err.into()
        })
    }

    /// Length of `bucket`, or zero when no such bucket exists.
    pub fn bucket_len(&self, bucket: &BucketId) -> Result<usize, CredmapError> {
        Ok(self.loaded()?.partition.bucket(bucket).map_or(0, <[FieldId]>::len))
    }

    /// Moves `unassigned[index]` to the end of `role`.
    pub fn assign(&mut self, role: BucketId, index: usize) -> Result<FieldId, CredmapError> {
        let end = self.bucket_len(&role)?;
        self.move_at(BucketId::Unassigned, index, role, end)
    }

    /// Moves `role[index]` to the end of the unassigned bucket.
    pub fn unassign(&mut self, role: BucketId, index: usize) -> Result<FieldId, CredmapError> {
        let end = self.bucket_len(&BucketId::Unassigned)?;
        self.move_at(role, index, BucketId::Unassigned, end)
    }

    /// Finds the single field whose short digest starts with `prefix`.
    pub fn find_field(&self, prefix: &str) -> Result<FieldId, CredmapError> {
        let prefix = prefix.trim().to_ascii_lowercase();
        let matches = self
            .loaded()?
            .partition
            .fields()
            .iter()
            .filter(|field| !prefix.is_empty() && field.short_digest().starts_with(&prefix))
            .collect::<Vec<_>>();
        match matches.as_slice() {
            [field] => Ok((*field).clone()),
            [] => Err(CredmapError::Cli(format!("no field matches {prefix:?}"))),
            _ => Err(CredmapError::Cli(format!(
                "{} fields match {prefix:?}; use a longer prefix",
                matches.len()
            ))),
        }
    }

    pub fn undo(&mut self) -> Result<bool, CredmapError> {
        let loaded = self.loaded_mut()?;
        let Some(previous) = loaded.undo.pop() else {
            return Ok(false);
        };
        let current = std::mem::replace(&mut loaded.partition, previous);
        loaded.redo.push(current);
        self.emit(LogLevel::Info, "history_restored", json!({ "direction": "undo" }));
        Ok(true)
    }

    pub fn redo(&mut self) -> Result<bool, CredmapError> {
        let loaded = self.loaded_mut()?;
        let Some(next) = loaded.redo.pop() else {
            return Ok(false);
        };
        let current = std::mem::replace(&mut loaded.partition, next);
        loaded.undo.push(current);
        self.emit(LogLevel::Info, "history_restored", json!({ "direction": "redo" }));
        Ok(true)
    }

    pub fn options(&self) -> &PasswordOptions {
        &self.options
    }

    pub fn set_option(&mut self, name: &str, text: &str) -> Result<(), CredmapError> {
        let spec = self.options.set(name, text)?;
        self.emit(LogLevel::Info, "option_changed", json!({ "option": spec.name }));
        Ok(())
    }

    pub fn synthesize(&mut self) -> Result<Payload, CredmapError> {
        let loaded = self.loaded()?;
        let result = synthesize(
            &loaded.recording,
            &loaded.partition,
            &self.settings.plan,
            &self.options,
        );
        match result {
            Ok(payload) => {
                let counts = payload
                    .mappings
                    .iter()
                    .map(|mapping| (mapping.role.to_string(), Value::from(mapping.selectors.len())))
                    .collect::<serde_json::Map<_, _>>();
                self.emit(LogLevel::Info, "payload_synthesized", json!({ "mappings": counts }));
                self.loaded_mut()?.payload = Some(payload.clone());
                Ok(payload)
            }
            Err(err) => {
                self.emit(LogLevel::Warn, "synthesis_rejected", json!({ "error": err.to_string() }));
                Err(err.into())
            }
        }
    }

    pub fn last_payload(&self) -> Option<&Payload> {
        self.loaded.as_ref().and_then(|loaded| loaded.payload.as_ref())
    }

    fn emit(&self, level: LogLevel, event_type: &str, payload: Value) {
        if let Some(log) = &self.log {
            let _ = log.record(&LogEvent {
                level,
                event_type,
                payload,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Session, SessionSettings};
    use crate::errors::{CredmapError, MoveError, SynthesisError};
    use crate::field::FieldId;
    use crate::logging::MemoryLog;
    use crate::partition::{BucketId, NEW_PASSWORD_ROLE, PASSWORD_ROLE, USERNAME_ROLE};
    use serde_json::json;

    fn raw() -> String {
        json!({
            "title": "rotate",
            "steps": [
                {"type": "change", "selectors": [["#user"]], "value": "alice"},
                {"type": "change", "selectors": [["#old"]], "value": "old"},
                {"type": "change", "selectors": [["#new"]], "value": "fresh"}
            ]
        })
        .to_string()
    }

    fn session() -> (Session, MemoryLog) {
        let log = MemoryLog::default();
        let session = Session::new(SessionSettings::default()).with_log(Box::new(log.clone()));
        (session, log)
    }

    fn map_all(session: &mut Session) {
        for role in [USERNAME_ROLE, PASSWORD_ROLE, NEW_PASSWORD_ROLE] {
            session
                .move_at(BucketId::Unassigned, 0, BucketId::role(role), 0)
                .expect("move");
        }
    }

    #[test]
    fn operations_need_a_recording() {
        let (mut session, _) = session();
        assert!(matches!(session.buckets_view(), Err(CredmapError::NoRecording)));
        assert!(matches!(session.synthesize(), Err(CredmapError::NoRecording)));
        assert!(!session.is_ready());
        assert!(matches!(session.undo(), Err(CredmapError::NoRecording)));
    }

    #[test]
    fn load_move_and_synthesize() {
        let (mut session, log) = session();
        let summary = session.load(&raw()).expect("load");
        assert_eq!((summary.steps, summary.fields), (3, 3));
        assert_eq!(summary.title.as_deref(), Some("rotate"));
        assert!(!session.is_ready());

        map_all(&mut session);
        assert!(session.is_ready());
        let payload = session.synthesize().expect("payload");
        assert_eq!(payload.username, "alice");
        assert_eq!(payload.password, "fresh");
        assert_eq!(session.last_payload(), Some(&payload));

        let types = log.event_types();
        assert_eq!(types.first().map(String::as_str), Some("recording_loaded"));
        assert_eq!(types.last().map(String::as_str), Some("payload_synthesized"));
        let logged = serde_json::to_string(&log.events().into_iter().map(|(_, _, p)| p).collect::<Vec<_>>())
            .expect("json");
        assert!(!logged.contains("alice"));
        assert!(!logged.contains("fresh"));
    }

    #[test]
    fn failed_load_keeps_previous_state() {
        let (mut session, log) = session();
        session.load(&raw()).expect("load");
        session
            .move_at(BucketId::Unassigned, 0, BucketId::role(USERNAME_ROLE), 0)
            .expect("move");
        let before = session.buckets_view().expect("view");

        let err = session.load("{\"steps\": 1}").expect_err("malformed");
        assert!(matches!(err, CredmapError::MalformedInput(_)));
        assert_eq!(session.buckets_view().expect("view"), before);
        assert!(log.event_types().contains(&"recording_rejected".to_string()));
    }

    #[test]
    fn new_load_resets_partition_history_and_payload() {
        let (mut session, _) = session();
        session.load(&raw()).expect("load");
        map_all(&mut session);
        session.synthesize().expect("payload");

        session.load(&raw()).expect("reload");
        assert_eq!(session.partition().map(|p| p.unassigned().len()), Some(3));
        assert!(session.last_payload().is_none());
        assert!(!session.undo().expect("undo"));
    }

    #[test]
    fn rejected_move_is_reported_and_leaves_snapshot() {
        let (mut session, log) = session();
        session.load(&raw()).expect("load");
        let before = session.buckets_view().expect("view");
        let err = session
            .move_at(BucketId::Unassigned, 9, BucketId::role(USERNAME_ROLE), 0)
            .expect_err("bad index");
        assert!(matches!(err, CredmapError::Move(MoveError::InvalidIndex { .. })));
        assert_eq!(session.buckets_view().expect("view"), before);
        assert_eq!(log.event_types().last().map(String::as_str), Some("move_rejected"));
    }

    #[test]
    fn unplaceable_moves_are_logged_before_any_change() {
        let (mut session, log) = session();
        session.load(&raw()).expect("load");
        let before = session.buckets_view().expect("view");
        let stranger = FieldId::parse(r##"[["#nowhere"]]"##).expect("field");

        let err = session
            .move_to_end(&stranger, BucketId::role(USERNAME_ROLE))
            .expect_err("unknown field");
        assert!(matches!(err, CredmapError::Move(MoveError::UnknownField { .. })));
        let err = session
            .move_at(BucketId::role("otpMappings"), 0, BucketId::Unassigned, 0)
            .expect_err("unknown bucket");
        assert!(matches!(err, CredmapError::Move(MoveError::UnknownBucket(_))));

        let rejected = log
            .event_types()
            .iter()
            .filter(|event| event.as_str() == "move_rejected")
            .count();
        assert_eq!(rejected, 2);
        assert_eq!(session.buckets_view().expect("view"), before);
    }

    #[test]
    fn undo_and_redo_walk_history() {
        let (mut session, _) = session();
        session.load(&raw()).expect("load");
        let initial = session.buckets_view().expect("view");
        session
            .move_at(BucketId::Unassigned, 0, BucketId::role(USERNAME_ROLE), 0)
            .expect("move");
        let moved = session.buckets_view().expect("view");

        assert!(session.undo().expect("undo"));
        assert_eq!(session.buckets_view().expect("view"), initial);
        assert!(!session.undo().expect("nothing left"));
        assert!(session.redo().expect("redo"));
        assert_eq!(session.buckets_view().expect("view"), moved);
        assert!(!session.redo().expect("nothing left"));
    }

    #[test]
    fn synthesis_before_mapping_is_not_ready() {
        let (mut session, _) = session();
        session.load(&raw()).expect("load");
        let err = session.synthesize().expect_err("not ready");
        assert!(matches!(err, CredmapError::Synthesis(SynthesisError::NotReady(_))));
        assert!(session.last_payload().is_none());
    }

    #[test]
    fn find_field_by_digest_prefix() {
        let (mut session, _) = session();
        session.load(&raw()).expect("load");
        let field = session.partition().expect("partition").fields()[1].clone();
        let found = session.find_field(&field.short_digest()).expect("found");
        assert_eq!(found, field);
        assert!(session.find_field("").is_err());

        session.move_to_end(&field, BucketId::role(PASSWORD_ROLE)).expect("move");
        assert_eq!(
            session.partition().and_then(|p| p.is_assigned(&field)),
            Some(BucketId::role(PASSWORD_ROLE))
        );
    }

    #[test]
    fn assign_and_unassign_append_to_the_target() {
        let (mut session, _) = session();
        session.load(&raw()).expect("load");
        let first = session.assign(BucketId::role(USERNAME_ROLE), 1).expect("assign");
        let second = session.assign(BucketId::role(USERNAME_ROLE), 0).expect("assign");
        let view = session.buckets_view().expect("view");
        let bucket = view.bucket(&BucketId::role(USERNAME_ROLE)).expect("bucket");
        assert_eq!(bucket.fields, vec![first.clone(), second]);

        let back = session.unassign(BucketId::role(USERNAME_ROLE), 0).expect("unassign");
        assert_eq!(back, first);
        let unassigned = session.partition().expect("partition").unassigned().to_vec();
        assert_eq!(unassigned.last(), Some(&first));
        assert!(matches!(
            session.assign(BucketId::role("otpMappings"), 0),
            Err(CredmapError::Move(MoveError::UnknownBucket(_)))
        ));
    }

    #[test]
    fn option_edits_survive_reload_and_reach_payload() {
        let (mut session, _) = session();
        session.set_option("length", "32").expect("set");
        assert!(session.set_option("length", "x").is_err());
        session.load(&raw()).expect("load");
        map_all(&mut session);
        assert_eq!(session.synthesize().expect("payload").password_options.length, 32);
    }
}

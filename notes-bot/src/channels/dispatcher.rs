use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use super::format::{format_notes_overview, format_record, format_search_result};
use super::intent::{callbacks, labels, parse_position};
use super::texts;
use super::transport::Transport;
use super::types::{Command, InboundEvent, InlineButton, Intent, Keyboard, OutboundMessage};
use super::util::{split_html_message, split_message, TELEGRAM_MAX_MESSAGE_CHARS};
use crate::error::{BotError, NoteAction};
use crate::notes::NoteStore;
use crate::records::{Record, RecordSource};
use crate::sessions::cache::SessionHandle;
use crate::sessions::{ConversationState, SearchSession, SessionCache};

type StepResult = Result<Vec<OutboundMessage>, BotError>;

/// Drives each user through search → choose result → add/delete note.
pub struct ConversationController {
    records: Arc<RecordSource>,
    notes: Arc<NoteStore>,
    sessions: Arc<SessionCache>,
}

impl ConversationController {
    pub fn new(records: Arc<RecordSource>, notes: Arc<NoteStore>, sessions: Arc<SessionCache>) -> Self {
        Self {
            records,
            notes,
            sessions,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionCache> {
        &self.sessions
    }

    /// Process an event off the async runtime, then deliver the replies.
    /// No store or session lock is held while talking to the transport.
    pub async fn handle<T>(self: &Arc<Self>, event: InboundEvent, transport: &T)
    where
        T: Transport + ?Sized,
    {
        let user_id = event.user_id;
        let controller = Arc::clone(self);
        let replies = match tokio::task::spawn_blocking(move || controller.process(&event)).await {
            Ok(replies) => replies,
            Err(e) => {
                log::error!("[CONTROLLER] Worker for user {} failed: {}", user_id, e);
                vec![OutboundMessage::text(texts::INTERNAL_FAILURE)]
            }
        };

        // One rejected reply must not swallow the keyboard that follows it
        for reply in replies {
            if let Err(e) = transport.send(user_id, reply).await {
                log::error!("[CONTROLLER] Failed to deliver reply to {}: {}", user_id, e);
            }
        }
    }

    /// Run one conversation step and return the replies to render.
    /// Panics are contained here so one broken session never takes down the
    /// loop serving everybody else.
    pub fn process(&self, event: &InboundEvent) -> Vec<OutboundMessage> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.step(event))) {
            Ok(replies) => replies,
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                log::error!(
                    "[CONTROLLER] Internal fault handling {:?} for user {}: {}",
                    event.intent,
                    event.user_id,
                    reason
                );
                vec![OutboundMessage::text(texts::INTERNAL_FAILURE)]
            }
        }
    }

    fn step(&self, event: &InboundEvent) -> Vec<OutboundMessage> {
        let user_id = event.user_id;

        match &event.intent {
            Intent::Start => {
                log::info!("[CONTROLLER] User {} started a new search", user_id);
                self.sessions.reset(user_id);
                vec![OutboundMessage::text(texts::SEARCH_PROMPT).with_keyboard(Keyboard::Remove)]
            }
            Intent::ViewNotes => self.settle(user_id, None, self.view_notes()),
            Intent::Unsupported => vec![OutboundMessage::text(texts::UNRECOGNIZED)],
            Intent::AddNoteFor(record_id) => {
                let (handle, result) = self
                    .sessions
                    .with_session_or_create(user_id, |session| self.on_add_note_button(session, record_id));
                self.settle(user_id, Some(&handle), result)
            }
            Intent::DeleteNotesFor(record_id) => {
                let (handle, result) = self
                    .sessions
                    .with_session_or_create(user_id, |session| self.on_delete_notes_button(session, record_id));
                self.settle(user_id, Some(&handle), result)
            }
            Intent::Text(_) | Intent::Command { .. } => {
                let stepped = self.sessions.with_session(user_id, |session| {
                    let from = session.state;
                    let result = match from {
                        ConversationState::Search => self.on_search(session, &event.intent),
                        ConversationState::ChooseResult => self.on_choose_result(session, &event.intent),
                        ConversationState::Note => self.on_note(session, event),
                        ConversationState::DeleteNote => self.on_delete_note(session, &event.intent),
                    };
                    if from != session.state {
                        log::debug!(
                            "[CONTROLLER] User {}: {} -> {}",
                            user_id,
                            from.as_str(),
                            session.state.as_str()
                        );
                    }
                    result
                });

                match stepped {
                    Some((handle, result)) => self.settle(user_id, Some(&handle), result),
                    None => {
                        log::debug!("[CONTROLLER] Message from user {} without a session", user_id);
                        vec![OutboundMessage::text(texts::SESSION_FINISHED).with_keyboard(Keyboard::Remove)]
                    }
                }
            }
        }
    }

    /// Turn a step outcome into replies, applying the error policy.
    fn settle(&self, user_id: i64, handle: Option<&SessionHandle>, result: StepResult) -> Vec<OutboundMessage> {
        match result {
            Ok(replies) => replies,
            Err(BotError::Validation(message)) => vec![OutboundMessage::text(message)],
            Err(BotError::NotFound(detail)) => {
                log::warn!("[CONTROLLER] Ending session of user {}: {}", user_id, detail);
                if let Some(handle) = handle {
                    self.sessions.remove(user_id, handle);
                }
                vec![OutboundMessage::text(texts::SESSION_FINISHED).with_keyboard(Keyboard::Remove)]
            }
            Err(BotError::Persistence { action, source }) => {
                log::error!("[CONTROLLER] {} failed for user {}: {}", action, user_id, source);
                vec![OutboundMessage::text(texts::persistence_failure(action, &source))]
            }
        }
    }

    fn on_search(&self, session: &mut SearchSession, intent: &Intent) -> StepResult {
        let keyword = intent.free_text().unwrap_or_default().trim();
        if keyword.is_empty() {
            return Err(BotError::Validation(texts::EMPTY_KEYWORD.to_string()));
        }

        let results = self.records.search(keyword);
        log::info!("[CONTROLLER] Search {:?} returned {} results", keyword, results.len());
        if results.is_empty() {
            return Ok(vec![OutboundMessage::text(texts::NOTHING_FOUND)]);
        }

        let mut replies = Vec::new();
        for (index, record) in results.iter().enumerate() {
            let notes = self
                .notes
                .list_by_record(&record.id)
                .map_err(BotError::persistence(NoteAction::Load))?;
            push_chunked(&mut replies, format_search_result(index, record, &notes));
        }
        replies.push(OutboundMessage::text(texts::PICK_RESULT).with_keyboard(result_picker(results.len())));

        session.store_results(keyword, results);
        session.state = ConversationState::ChooseResult;
        Ok(replies)
    }

    fn on_choose_result(&self, session: &mut SearchSession, intent: &Intent) -> StepResult {
        if intent.command() == Some(Command::NewSearch) {
            session.clear_results();
            session.state = ConversationState::Search;
            return Ok(vec![
                OutboundMessage::text(texts::NEW_SEARCH_PROMPT).with_keyboard(Keyboard::Remove),
            ]);
        }

        let text = intent.free_text().unwrap_or_default().trim();
        let position =
            parse_position(text).ok_or_else(|| BotError::Validation(texts::NOT_A_NUMBER.to_string()))?;
        let record = session
            .result_at(position)
            .cloned()
            .ok_or_else(|| BotError::Validation(texts::RESULT_OUT_OF_RANGE.to_string()))?;

        let notes = self
            .notes
            .list_by_record(&record.id)
            .map_err(BotError::persistence(NoteAction::Load))?;

        let mut replies = Vec::new();
        push_chunked(&mut replies, format_search_result(position - 1, &record, &notes));
        replies.push(self.note_actions_prompt(notes.len()));

        session.state = if notes.is_empty() {
            ConversationState::Note
        } else {
            ConversationState::DeleteNote
        };
        session.select(record, notes);
        Ok(replies)
    }

    fn on_note(&self, session: &mut SearchSession, event: &InboundEvent) -> StepResult {
        let Some(record) = session.selected_record.clone() else {
            return Err(BotError::NotFound("note entered with no selected record".to_string()));
        };

        let text = event.intent.free_text().unwrap_or_default().trim();
        if text.is_empty() {
            return Err(BotError::Validation(texts::EMPTY_NOTE.to_string()));
        }

        let store_name = record.store_name().unwrap_or(texts::UNSPECIFIED_STORE);
        self.notes
            .add(&record.id, text, &event.user_name, store_name)
            .map_err(BotError::persistence(NoteAction::Add))?;

        session.selected_record = None;
        session.related_notes.clear();
        session.state = ConversationState::Search;
        Ok(vec![
            OutboundMessage::text(texts::NOTE_ADDED),
            OutboundMessage::text(texts::SEARCH_PROMPT).with_keyboard(Keyboard::Remove),
        ])
    }

    fn on_delete_note(&self, session: &mut SearchSession, intent: &Intent) -> StepResult {
        match intent.command() {
            Some(Command::AddNote) => {
                session.state = ConversationState::Note;
                Ok(vec![OutboundMessage::text(texts::ENTER_NOTE).with_keyboard(Keyboard::Remove)])
            }
            Some(Command::DeleteNote(position)) => {
                let note = position
                    .and_then(|p| session.related_note_at(p))
                    .cloned()
                    .ok_or_else(|| BotError::Validation(texts::NOTE_OUT_OF_RANGE.to_string()))?;

                let removed = self
                    .notes
                    .remove_one(&note.record_id, &note.text)
                    .map_err(BotError::persistence(NoteAction::Delete))?;
                if !removed {
                    return Err(BotError::NotFound(format!(
                        "note on record {} was already removed",
                        note.record_id
                    )));
                }

                session.selected_record = None;
                session.related_notes.clear();
                session.state = ConversationState::Search;
                Ok(vec![
                    OutboundMessage::text(texts::NOTE_DELETED),
                    OutboundMessage::text(texts::SEARCH_PROMPT).with_keyboard(Keyboard::Remove),
                ])
            }
            Some(Command::DeleteAll) => {
                let Some(record) = session.selected_record.clone() else {
                    return Err(BotError::NotFound("delete-all with no selected record".to_string()));
                };
                self.notes
                    .remove_all_for_record(&record.id)
                    .map_err(BotError::persistence(NoteAction::DeleteAll))?;

                session.selected_record = None;
                session.related_notes.clear();
                session.state = ConversationState::Search;
                Ok(vec![
                    OutboundMessage::text(texts::ALL_NOTES_DELETED),
                    OutboundMessage::text(texts::SEARCH_PROMPT).with_keyboard(Keyboard::Remove),
                ])
            }
            Some(Command::Back) => {
                session.state = ConversationState::ChooseResult;
                Ok(vec![
                    OutboundMessage::text(texts::PICK_RESULT)
                        .with_keyboard(result_picker(session.last_results.len())),
                ])
            }
            Some(Command::NewSearch) | None => Err(BotError::Validation(texts::BAD_ACTION.to_string())),
        }
    }

    /// Inline "add" under a `/view_notes` entry: go straight to note entry.
    fn on_add_note_button(&self, session: &mut SearchSession, record_id: &str) -> StepResult {
        let record = self.resolve_record(record_id);
        log::info!("[CONTROLLER] Adding a note to record {} from the notes list", record.id);

        session.select(record, Vec::new());
        session.state = ConversationState::Note;
        Ok(vec![OutboundMessage::text(texts::ENTER_NEW_NOTE).with_keyboard(Keyboard::Remove)])
    }

    /// Inline "delete" under a `/view_notes` entry: show the record's notes
    /// with the delete keyboard.
    fn on_delete_notes_button(&self, session: &mut SearchSession, record_id: &str) -> StepResult {
        let record = self.resolve_record(record_id);
        let notes = self
            .notes
            .list_by_record(&record.id)
            .map_err(BotError::persistence(NoteAction::Load))?;

        let mut replies = Vec::new();
        push_chunked(&mut replies, format_record(&record, &notes));
        replies.push(self.note_actions_prompt(notes.len()));

        session.state = if notes.is_empty() {
            ConversationState::Note
        } else {
            ConversationState::DeleteNote
        };
        session.select(record, notes);
        Ok(replies)
    }

    fn view_notes(&self) -> StepResult {
        let groups = self
            .notes
            .grouped_by_record()
            .map_err(BotError::persistence(NoteAction::Load))?;

        if groups.is_empty() {
            return Ok(vec![
                OutboundMessage::text(texts::NO_NOTES_YET),
                OutboundMessage::text(texts::START_HINT),
            ]);
        }

        let mut replies = Vec::new();
        for (record_id, notes) in &groups {
            let store_name = self
                .records
                .find_by_id(record_id)
                .and_then(Record::store_name)
                .unwrap_or(texts::UNKNOWN_STORE);
            for chunk in split_message(
                &format_notes_overview(store_name, record_id, notes),
                TELEGRAM_MAX_MESSAGE_CHARS,
            ) {
                replies.push(OutboundMessage::text(chunk));
            }
            replies.push(
                OutboundMessage::text(texts::CHOOSE_ACTION).with_keyboard(Keyboard::Inline(vec![vec![
                    InlineButton {
                        label: labels::INLINE_ADD.to_string(),
                        data: format!("{}{}", callbacks::ADD_PREFIX, record_id),
                    },
                    InlineButton {
                        label: labels::INLINE_DELETE.to_string(),
                        data: format!("{}{}", callbacks::DELETE_PREFIX, record_id),
                    },
                ]])),
            );
        }
        replies.push(OutboundMessage::text(texts::START_HINT));
        Ok(replies)
    }

    /// Look a record up by id, tolerating ids that left the dataset.
    fn resolve_record(&self, record_id: &str) -> Record {
        self.records
            .find_by_id(record_id)
            .cloned()
            .unwrap_or_else(|| Record::placeholder(record_id, texts::UNSPECIFIED_STORE))
    }

    /// Prompt shown after a record is selected: note entry when it has no
    /// notes, otherwise the add/delete keyboard.
    fn note_actions_prompt(&self, note_count: usize) -> OutboundMessage {
        if note_count == 0 {
            OutboundMessage::text(texts::ENTER_NOTE).with_keyboard(Keyboard::Remove)
        } else {
            OutboundMessage::text(texts::CHOOSE_ACTION).with_keyboard(note_actions_keyboard(note_count))
        }
    }
}

fn push_chunked(replies: &mut Vec<OutboundMessage>, html: String) {
    for chunk in split_html_message(&html, TELEGRAM_MAX_MESSAGE_CHARS) {
        replies.push(OutboundMessage::html(chunk));
    }
}

/// "New search" on top, then one row per result position.
fn result_picker(result_count: usize) -> Keyboard {
    let mut rows = vec![vec![labels::NEW_SEARCH.to_string()]];
    rows.extend((1..=result_count).map(|position| vec![position.to_string()]));
    Keyboard::Reply(rows)
}

fn note_actions_keyboard(note_count: usize) -> Keyboard {
    let mut first_row = vec![labels::ADD_NOTE.to_string()];
    if note_count > 1 {
        first_row.push(labels::DELETE_ALL.to_string());
    }

    let mut rows = vec![first_row];
    rows.extend((1..=note_count).map(|position| vec![format!("{} {}", labels::DELETE_NOTE, position)]));
    rows.push(vec![labels::BACK.to_string()]);
    Keyboard::Reply(rows)
}

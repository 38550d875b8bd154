use crate::notes::Note;
use crate::records::{Record, MAX_SEARCH_RESULTS};

/// Where a user is in the search → select → note workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    Search,
    ChooseResult,
    Note,
    DeleteNote,
}

impl ConversationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationState::Search => "search",
            ConversationState::ChooseResult => "choose_result",
            ConversationState::Note => "note",
            ConversationState::DeleteNote => "delete_note",
        }
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        ConversationState::Search
    }
}

/// Ephemeral per-user state.
#[derive(Debug, Clone, Default)]
pub struct SearchSession {
    pub state: ConversationState,
    pub last_keyword: Option<String>,
    /// Results of the last successful search, at most ten.
    pub last_results: Vec<Record>,
    pub selected_record: Option<Record>,
    /// Notes of the selected record as they were shown to the user.
    /// "delete note k" indexes into this snapshot.
    pub related_notes: Vec<Note>,
}

impl SearchSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a fresh result set and drop any previous selection.
    pub fn store_results(&mut self, keyword: &str, mut results: Vec<Record>) {
        results.truncate(MAX_SEARCH_RESULTS);
        self.last_keyword = Some(keyword.to_string());
        self.last_results = results;
        self.selected_record = None;
        self.related_notes.clear();
    }

    pub fn clear_results(&mut self) {
        self.last_keyword = None;
        self.last_results.clear();
        self.selected_record = None;
        self.related_notes.clear();
    }

    /// Result at a 1-based position, as the user sees it.
    pub fn result_at(&self, position: usize) -> Option<&Record> {
        position
            .checked_sub(1)
            .and_then(|index| self.last_results.get(index))
    }

    pub fn select(&mut self, record: Record, related_notes: Vec<Note>) {
        self.selected_record = Some(record);
        self.related_notes = related_notes;
    }

    /// Snapshot note at a 1-based position.
    pub fn related_note_at(&self, position: usize) -> Option<&Note> {
        position
            .checked_sub(1)
            .and_then(|index| self.related_notes.get(index))
    }
}

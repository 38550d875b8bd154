//! Notes system: free-text notes attached to dataset records
//!
//! The ledger is a CSV file (`UniqueID,Note,User,Magazin`) that stays
//! readable by the spreadsheet tooling the operators already use.
//! All mutations go through [`NoteStore`], which serializes them.

pub mod ledger;
pub mod store;

pub use ledger::Note;
pub use store::NoteStore;

//! Household enumeration record-keeping.
//!
//! Tracks households discovered on plots, repeated enumeration visit
//! attempts, and the derived status flags a survey round needs: refused,
//! no informant, representative present or absent. Storage is SQLite;
//! every mutation recomputes its derived state in the same transaction.

pub mod assessment;
pub mod db;
pub mod enumeration;
pub mod export;
mod id;
pub mod household;
pub mod logging;
pub mod members;
pub mod migrate;
pub mod plot;
pub mod refusal;
pub mod status;
pub mod survey;
mod time;

pub use assessment::{
    create_assessment, get_assessment, AssessmentInput, HouseholdAssessment,
    HouseholdAssessmentError,
};
pub use enumeration::{
    add_log_entry, aggregate, delete_log_entry, entries_for_log, get_log_for_structure,
    Aggregates, EntrySnapshot, HouseholdLog, HouseholdLogEntry, LogEntryError, NewLogEntry,
    FAILED_ATTEMPTS_THRESHOLD,
};
pub use export::natural_keys;
pub use household::{
    delete_check, delete_household, get_household, get_structure, households_for_plot,
    structures_for_household, DeleteCheck, Household, HouseholdDeleteError, HouseholdStructure,
};
pub use members::{
    add_household_member, record_representative_eligibility, HouseholdMember, MemberError,
    RepresentativeEligibility,
};
pub use plot::{get_plot, save_plot, Plot, PlotInput, PlotSaveError};
pub use refusal::{confirm_refusal, delete_refusal, get_refusal, HouseholdRefusal, RefusalError};
pub use status::HouseholdStatus;
pub use survey::{SurveySchedule, SurveySchedules};

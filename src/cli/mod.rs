pub mod context;
pub mod doctor;
pub mod notes;

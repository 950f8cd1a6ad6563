pub mod chart;
pub mod gameplay;
pub mod judgment;
pub mod note;
pub mod rotation;
pub mod scores;
pub mod table;

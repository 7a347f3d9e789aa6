pub mod posting;
pub mod report;

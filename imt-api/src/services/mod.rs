//! Service layer: external collaborators and the import pipeline

pub mod attachments;
pub mod import;
pub mod kpi;
pub mod normalizer;
pub mod predictor;
pub mod spreadsheet;

pub mod defects;
pub mod events;
pub mod insights;
pub mod models;
pub mod reports;
pub mod scene;
pub mod vocabulary;

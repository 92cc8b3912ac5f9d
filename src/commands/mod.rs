pub mod answer;
pub mod collate;
pub mod curves;
pub mod disagreements;
pub mod extract;
pub mod fallback;
pub mod filter;
pub mod folds;
pub mod interpret;
pub mod oracle;
pub mod pairs;
pub mod sample;
pub mod voting;

pub mod checkpoint;
pub mod correct;
pub mod export;
pub mod fetch;
pub mod model;
pub mod orchestrator;
pub mod values;

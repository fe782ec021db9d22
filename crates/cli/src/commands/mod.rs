pub mod capture;
pub mod dedup;
pub mod run;
pub mod setup;
pub mod sync;

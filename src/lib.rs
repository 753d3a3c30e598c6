pub mod controller;
pub mod domain;
pub mod inputter;
pub mod loader;
pub mod logging;
pub mod model;
pub mod query;
pub mod ui;

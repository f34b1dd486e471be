pub mod feed;
pub mod model;
pub mod service;
pub mod store;
pub mod util;

pub mod dispatcher;
pub mod exchange;
pub mod sweep;

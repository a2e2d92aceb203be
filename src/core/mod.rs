pub mod app;
pub mod assets;
pub mod functions;
pub(crate) mod layout;
pub(crate) mod reload;
pub mod sniff;
pub mod source;
pub mod syntax;

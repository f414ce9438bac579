pub mod mail;
pub mod network_tools;

pub mod clienv;
pub mod config;
pub mod daemon;
pub mod error;
pub mod host;
pub mod manifest;
pub mod resolver;
pub mod version;

pub use config::HostConfig;
pub use error::{ConnectionError, HostError, Result};
pub use host::{Skill, SkillFactory, SkillHost};
pub use manifest::SkillManifest;
pub use resolver::DependencyResolver;

// Player settings module
// Preferences persisted as JSON in the application directory

#[allow(clippy::module_inception)]
pub mod settings;

pub use settings::PlayerSettings;

pub mod loader;
pub mod model;

pub use loader::ConfigLoader;
pub use model::{AppConfig, GatewayConfig, GeoConfig, GeoProviderConfig, RelayConfig, StoreConfig};

//! Client side of the facematchd D-Bus interface.

use anyhow::{Context, Result};

// `#[zbus::proxy]` generates `FaceMatchProxy` (async) and a blocking variant;
// only the async one is used.
#[zbus::proxy(
    interface = "org.freedesktop.FaceMatch1",
    default_service = "org.freedesktop.FaceMatch1",
    default_path = "/org/freedesktop/FaceMatch1"
)]
pub trait FaceMatch {
    async fn match_image(&self, path: &str) -> zbus::Result<String>;
    async fn reload(&self) -> zbus::Result<u32>;
    async fn register(&self, path: &str, name: &str) -> zbus::Result<String>;
    async fn remove(&self, identity: &str) -> zbus::Result<bool>;
    async fn list_references(&self) -> zbus::Result<String>;
    async fn status(&self) -> zbus::Result<String>;
}

/// Connect to the daemon on the session bus, or the system bus if `system`.
pub async fn connect(system: bool) -> Result<FaceMatchProxy<'static>> {
    let conn = if system {
        zbus::Connection::system().await
    } else {
        zbus::Connection::session().await
    }
    .context("connecting to D-Bus")?;

    FaceMatchProxy::new(&conn)
        .await
        .context("facematchd not reachable")
}

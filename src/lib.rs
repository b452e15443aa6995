use tauri::{
  plugin::{Builder, TauriPlugin},
  Manager, RunEvent, Runtime,
};

pub use models::*;

#[cfg(desktop)]
mod desktop;
#[cfg(mobile)]
mod mobile;

mod commands;
mod error;
mod models;
pub mod vault;

pub use error::{Error, Result};

#[cfg(desktop)]
use desktop::Pinvault;
#[cfg(mobile)]
use mobile::Pinvault;

/// Extensions to [`tauri::App`], [`tauri::AppHandle`] and [`tauri::Window`] to access the pinvault APIs.
pub trait PinvaultExt<R: Runtime> {
  fn pinvault(&self) -> &Pinvault<R>;
}

impl<R: Runtime, T: Manager<R>> crate::PinvaultExt<R> for T {
  fn pinvault(&self) -> &Pinvault<R> {
    self.state::<Pinvault<R>>().inner()
  }
}

/// Initializes the plugin.
pub fn init<R: Runtime>() -> TauriPlugin<R> {
  Builder::new("pinvault")
    .invoke_handler(tauri::generate_handler![
      commands::is_device_secure,
      commands::make_device_secure,
      commands::keystore_init,
      commands::store_pin,
      commands::retrieve_pin,
      commands::delete_key,
    ])
    .setup(|app, api| {
      #[cfg(mobile)]
      let pinvault = mobile::init(app, api)?;
      #[cfg(desktop)]
      let pinvault = desktop::init(app, api)?;
      app.manage(pinvault);
      Ok(())
    })
    .on_event(|app, event| {
      // A torn-down host must not leave credential challenges dangling
      if matches!(event, RunEvent::Exit) {
        if let Some(pinvault) = app.try_state::<Pinvault<R>>() {
          pinvault.cancel_pending();
        }
      }
    })
    .build()
}

mod desktop;
mod dispatch;
mod sapgui;

use tracing::debug;
use windows::core::HRESULT;
use windows::Win32::System::Com::{CoInitializeEx, COINIT_APARTMENTTHREADED};

use crate::errors::AutomationError;
use crate::platforms::Engines;

pub use desktop::DesktopWindows;
pub use sapgui::SapScripting;

/// COM was already initialized on this thread with another model.
const RPC_E_CHANGED_MODE: HRESULT = HRESULT(0x80010106u32 as i32);

pub fn create_engines() -> Result<Engines, AutomationError> {
    let hr = unsafe { CoInitializeEx(None, COINIT_APARTMENTTHREADED) };
    if hr == RPC_E_CHANGED_MODE {
        debug!("COM already initialized in this thread");
    } else if hr.is_err() {
        return Err(AutomationError::PlatformError(format!(
            "Failed to initialize COM: {hr}"
        )));
    }

    Ok(Engines {
        scripting: Box::new(SapScripting::new()),
        desktop: Box::new(DesktopWindows::new()?),
    })
}

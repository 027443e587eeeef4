//! Interposed `drmModeGetConnector`.
//!
//! Loaded with `LD_PRELOAD=libdrmhook.so`, the exported function shadows
//! libdrm's. Each call forwards to the genuine implementation, then rewrites the
//! preferred flag of the returned modes from the override file.

use crate::config::{read_override, HookSettings};
use crate::drm::Connector;
use crate::selection::{select_preferred, DisplayMode, Selection};
use crate::{init_hook_logging, Result};
use lazy_static::lazy_static;
use log::{debug, error, info, warn};
use std::ffi::{c_void, CStr};
use std::os::raw::c_int;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

mod symbol;

pub use symbol::{resolve_next, SymbolCache};

/// Signature of libdrm's `drmModeGetConnector`.
pub type GetConnectorFn = unsafe extern "C" fn(fd: c_int, connector_id: u32) -> *mut Connector;

/// Name the genuine implementation is looked up under.
pub const GENUINE_SYMBOL: &CStr = c"drmModeGetConnector";

lazy_static! {
    static ref SETTINGS: HookSettings = HookSettings::from_env();
    static ref GENUINE: SymbolCache<GetConnectorFn> = SymbolCache::new();
}

/// What the interceptor did with one connector query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The genuine call returned null.
    UpstreamAbsent,
    /// The connector advertised no modes.
    NoModes,
    /// The override file was missing, unreadable, or malformed.
    ConfigUnavailable,
    /// The mode at `from_index` is now preferred and first.
    Promoted { from_index: usize },
    /// The override parsed but no mode matched it.
    TargetNotFound,
    /// The rewrite panicked; the connector is returned as the rewrite left it.
    Aborted,
}

/// Result of one intercepted call.
#[derive(Debug)]
pub struct Interception {
    /// Exactly what the caller receives
    pub connector: *mut Connector,
    pub outcome: Outcome,
}

/// Replacement for libdrm's `drmModeGetConnector`.
///
/// Returns null only when the genuine function cannot be found or itself
/// returns null. The connector stays owned by libdrm; callers free it with
/// `drmModeFreeConnector` as usual.
///
/// # Safety
/// Same contract as the libdrm function it replaces.
#[no_mangle]
#[allow(non_snake_case)]
pub unsafe extern "C" fn drmModeGetConnector(fd: c_int, connector_id: u32) -> *mut Connector {
    let settings = &*SETTINGS;
    init_hook_logging(settings);

    let genuine = match genuine_get_connector() {
        Ok(genuine) => genuine,
        Err(e) => {
            error!("Failed to find original drmModeGetConnector: {}", e);
            return ptr::null_mut();
        }
    };

    intercept_with(genuine, fd, connector_id, settings).connector
}

/// Resolves libdrm's implementation on first use and caches it for the process.
pub fn genuine_get_connector() -> Result<GetConnectorFn> {
    GENUINE.get_or_resolve(|| {
        let symbol = resolve_next(GENUINE_SYMBOL)?;
        debug!("Resolved original drmModeGetConnector at {:p}", symbol);
        // SAFETY: the symbol is libdrm's drmModeGetConnector, whose C signature
        // is exactly `GetConnectorFn`.
        Ok(unsafe { std::mem::transmute::<*mut c_void, GetConnectorFn>(symbol) })
    })
}

/// Forwards to `genuine`, then applies the mode override to what it returned.
///
/// # Safety
/// `genuine` must honour the `drmModeGetConnector` contract: it returns null or
/// a valid connector whose `modes` array holds `count_modes` entries and is not
/// accessed elsewhere until this returns.
pub unsafe fn intercept_with(
    genuine: GetConnectorFn,
    fd: c_int,
    connector_id: u32,
    settings: &HookSettings,
) -> Interception {
    let connector = genuine(fd, connector_id);

    let outcome = match connector.as_mut() {
        None => {
            info!("Connector {} is NULL, nothing to override", connector_id);
            Outcome::UpstreamAbsent
        }
        Some(found) if found.mode_count() == 0 => {
            info!("No modes found on connector {}", connector_id);
            Outcome::NoModes
        }
        Some(found) => panic::catch_unwind(AssertUnwindSafe(|| apply_override(found, settings)))
            .unwrap_or_else(|_| {
                error!("Mode override on connector {} panicked", connector_id);
                Outcome::Aborted
            }),
    };

    Interception { connector, outcome }
}

/// Reads the override file and rewrites the connector's mode list.
fn apply_override(connector: &mut Connector, settings: &HookSettings) -> Outcome {
    let connector_id = connector.connector_id;

    let target = match read_override(&settings.mode_file) {
        Ok(target) => target,
        Err(e) => {
            info!(
                "Failed to read {} ({}), keeping original preferred mode",
                settings.mode_file.display(),
                e
            );
            return Outcome::ConfigUnavailable;
        }
    };

    // SAFETY: mode_count() > 0 was checked by the caller and libdrm hands the
    // array to us exclusively for the duration of this call.
    let modes = unsafe { connector.modes_mut() };

    match select_preferred(&mut *modes, &target, settings.policy) {
        Selection::Promoted { from_index } => {
            let mode = &modes[0];
            info!(
                "Updated preferred mode to: {} {}x{}@{}Hz",
                mode.label(),
                mode.width(),
                mode.height(),
                mode.refresh()
            );
            debug!(
                "Moved mode from index {} to the front of connector {}",
                from_index, connector_id
            );
            Outcome::Promoted { from_index }
        }
        Selection::NotFound => {
            warn!(
                "Mode {} not offered by connector {}, keeping mode order",
                target, connector_id
            );
            Outcome::TargetNotFound
        }
    }
}
